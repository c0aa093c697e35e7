//! CLI binary for edgequake-pdf2quiz.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalysisConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf2quiz::sink::to_json;
use edgequake_pdf2quiz::{
    analyze_to_file, AnalysisConfig, AnalysisProgressCallback, ImageCaptioner, ProgressCallback,
    VisionCaptioner,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    fallbacks: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_analysis_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            fallbacks: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Analyzing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&page_num)
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_analysis_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Analyzing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_image_captioned(&self, page_num: usize, ordinal: usize, used_fallback: bool) {
        if used_fallback {
            self.fallbacks.fetch_add(1, Ordering::SeqCst);
        }
        self.bar.set_message(format!("page {page_num}, image {ordinal}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, image_count: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{image_count:>3} images")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_analysis_complete(&self, total_pages: usize, total_images: usize) {
        self.bar.finish_and_clear();
        let fallbacks = self.fallbacks.load(Ordering::SeqCst);
        eprintln!(
            "{} {} pages, {} images captioned{}",
            if fallbacks == 0 { green("✔") } else { cyan("⚠") },
            bold(&total_pages.to_string()),
            bold(&total_images.to_string()),
            if fallbacks == 0 {
                String::new()
            } else {
                format!("  ({} fallback captions)", red(&fallbacks.to_string()))
            },
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyze a worksheet; writes extracted_content.json and images/
  pdf2quiz analyze worksheet.pdf

  # Custom output locations
  pdf2quiz analyze worksheet.pdf -o quiz.json --images-dir static/images

  # Analyze from URL with a specific model
  pdf2quiz analyze https://example.com/worksheet.pdf --provider openai --model gpt-4.1-mini

  # Start the upload form on port 5000
  pdf2quiz serve --bind 127.0.0.1:5000

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Generate multiple-choice questions from the images in a PDF.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2quiz",
    version,
    about = "Extract PDF text and images, caption each image with a Vision LLM and derive quiz questions",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2QUIZ_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2QUIZ_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one PDF and write the JSON snapshot.
    Analyze(AnalyzeArgs),
    /// Serve the upload form.
    #[cfg(feature = "server")]
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    #[command(flatten)]
    common: CommonArgs,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2QUIZ_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2QUIZ_PASSWORD")]
    password: Option<String>,

    /// Disable progress bar.
    #[arg(long, env = "PDF2QUIZ_NO_PROGRESS")]
    no_progress: bool,

    /// Also print the JSON snapshot to stdout.
    #[arg(long)]
    print: bool,
}

#[cfg(feature = "server")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "PDF2QUIZ_BIND", default_value = "127.0.0.1:5000")]
    bind: String,

    /// Directory uploaded PDFs are stored in.
    #[arg(long, env = "PDF2QUIZ_UPLOAD_DIR", default_value = edgequake_pdf2quiz::server::DEFAULT_UPLOAD_DIR)]
    upload_dir: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

/// Flags shared by `analyze` and `serve`.
#[derive(Args, Debug)]
struct CommonArgs {
    /// Write the JSON snapshot to this file.
    #[arg(short, long, env = "PDF2QUIZ_OUTPUT", default_value = edgequake_pdf2quiz::config::DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    /// Directory extracted images are written to.
    #[arg(long, env = "PDF2QUIZ_IMAGES_DIR", default_value = edgequake_pdf2quiz::config::DEFAULT_IMAGES_DIR)]
    images_dir: PathBuf,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Path to a text file containing a custom caption system prompt.
    #[arg(long, env = "PDF2QUIZ_CAPTION_PROMPT")]
    caption_prompt: Option<PathBuf>,

    /// Max LLM output tokens per caption.
    #[arg(long, env = "PDF2QUIZ_MAX_TOKENS", default_value_t = 64)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2QUIZ_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Per-caption VLM timeout in seconds; 0 disables the timeout.
    #[arg(long, env = "PDF2QUIZ_CAPTION_TIMEOUT", default_value_t = 60)]
    caption_timeout: u64,

    /// Captions generated concurrently within one page.
    #[arg(short, long, env = "PDF2QUIZ_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = match &cli.command {
        Command::Analyze(args) => !cli.quiet && !args.no_progress,
        #[cfg(feature = "server")]
        Command::Serve(_) => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Analyze(args) => run_analyze(args, cli.quiet, show_progress).await,
        #[cfg(feature = "server")]
        Command::Serve(args) => run_serve(args).await,
    }
}

async fn run_analyze(args: AnalyzeArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };

    let mut config = build_config(&args.common, progress_cb).await?;
    config.password = args.password.clone();
    config.download_timeout_secs = args.download_timeout;

    // Resolve the provider before touching the document so a missing key
    // fails fast instead of producing a file full of fallback captions.
    let captioner = Arc::new(VisionCaptioner::new(&config));
    captioner
        .warm_up()
        .await
        .context("Failed to configure vision provider")?;

    let output = analyze_to_file(&args.input, captioner, &config)
        .await
        .context("Analysis failed")?;

    if args.print {
        let json = to_json(&output.result).context("Failed to serialise output")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(&json)
            .and_then(|_| handle.write_all(b"\n"))
            .context("Failed to write to stdout")?;
    }

    if !quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {}/{} pages  {} questions  {}ms  →  {}",
            if stats.failed_pages == 0 { green("✔") } else { cyan("⚠") },
            stats.total_pages - stats.failed_pages,
            stats.total_pages,
            output.result.question_count(),
            stats.total_duration_ms,
            bold(&config.output_path.display().to_string()),
        );
        if !show_progress && stats.fallback_captions > 0 {
            eprintln!(
                "   {} captions fell back to the default sentence",
                red(&stats.fallback_captions.to_string())
            );
        }
    }

    Ok(())
}

#[cfg(feature = "server")]
async fn run_serve(args: ServeArgs) -> Result<()> {
    use edgequake_pdf2quiz::server::{self, AppState};

    let config = build_config(&args.common, None).await?;

    let captioner = Arc::new(VisionCaptioner::new(&config));
    captioner
        .warm_up()
        .await
        .context("Failed to configure vision provider")?;

    let state = AppState::new(captioner, config, &args.upload_dir)
        .context("Failed to initialise web surface")?;

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;

    server::serve(listener, state).await.context("Server error")
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(
    common: &CommonArgs,
    progress: Option<ProgressCallback>,
) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .output_path(&common.output)
        .images_dir(&common.images_dir)
        .max_tokens(common.max_tokens)
        .temperature(common.temperature)
        .caption_concurrency(common.concurrency)
        .caption_timeout_secs(match common.caption_timeout {
            0 => None,
            secs => Some(secs),
        });

    if let Some(ref path) = common.caption_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read caption prompt from {:?}", path))?;
        builder = builder.caption_prompt(prompt);
    }
    if let Some(ref model) = common.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = common.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
