//! Configuration types for PDF analysis.
//!
//! All analysis behaviour is controlled through [`AnalysisConfig`], built via
//! its [`AnalysisConfigBuilder`]. One struct holds every knob so a config can
//! be shared between the CLI, the web surface and tests without drift.

use crate::error::AnalysisError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default directory extracted images are written to.
pub const DEFAULT_IMAGES_DIR: &str = "images";

/// Default location of the JSON snapshot.
pub const DEFAULT_OUTPUT_PATH: &str = "extracted_content.json";

/// Upper bound for [`AnalysisConfig::caption_concurrency`].
pub const MAX_CAPTION_CONCURRENCY: usize = 16;

/// Configuration for one analysis run.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2quiz::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .images_dir("static/images")
///     .model("gpt-4.1-nano")
///     .caption_timeout_secs(Some(30))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Directory extracted images are written to. Default: `images`.
    ///
    /// Files are named `page{N}_image{M}.{ext}`. Re-running into the same
    /// directory overwrites files with the same page, ordinal and extension.
    pub images_dir: PathBuf,

    /// Where the JSON snapshot is written. Default: `extracted_content.json`.
    pub output_path: PathBuf,

    /// Vision model identifier, e.g. "gpt-4.1-nano", "llava".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// VLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed VLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for caption generation. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per caption. Default: 64.
    ///
    /// Captions are one short sentence; a small cap keeps chatty models from
    /// producing paragraphs.
    pub max_tokens: usize,

    /// Per-caption timeout in seconds. Default: `Some(60)`.
    ///
    /// `None` waits indefinitely. A timed-out call yields the fallback
    /// caption like any other caption failure.
    pub caption_timeout_secs: Option<u64>,

    /// How many images of one page may be captioned at once. Default: 1.
    ///
    /// Pages are always processed one at a time. Values above 1 caption the
    /// images of a page concurrently; results are still emitted in ordinal
    /// order.
    pub caption_concurrency: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom captioning system prompt. If None, uses the built-in default.
    pub caption_prompt: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress callback for per-page events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from(DEFAULT_IMAGES_DIR),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 64,
            caption_timeout_secs: Some(60),
            caption_concurrency: 1,
            password: None,
            caption_prompt: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("images_dir", &self.images_dir)
            .field("output_path", &self.output_path)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("caption_timeout_secs", &self.caption_timeout_secs)
            .field("caption_concurrency", &self.caption_concurrency)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.images_dir = dir.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = path.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn caption_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.caption_timeout_secs = secs;
        self
    }

    pub fn caption_concurrency(mut self, n: usize) -> Self {
        self.config.caption_concurrency = n.clamp(1, MAX_CAPTION_CONCURRENCY);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn caption_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.caption_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalysisError> {
        let c = &self.config;
        if c.images_dir.as_os_str().is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "images directory must not be empty".into(),
            ));
        }
        if c.output_path.as_os_str().is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "output path must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.caption_timeout_secs == Some(0) {
            return Err(AnalysisError::InvalidConfig(
                "caption timeout must be ≥ 1s (omit it to wait indefinitely)".into(),
            ));
        }
        Ok(self.config)
    }
}
