//! # edgequake-pdf2quiz
//!
//! Turn the images in a PDF into multiple-choice quiz questions using a
//! Vision Language Model (VLM).
//!
//! For every page the crate records the page text and writes each embedded
//! image to disk. Each image is captioned by a VLM, and the caption becomes
//! the correct answer of a "What does this image show?" question. The whole
//! document is saved as one JSON snapshot.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file, URL or uploaded bytes
//!  ├─ 2. Read      page text + image objects via pdfium (spawn_blocking)
//!  ├─ 3. Extract   trim text, write images/page{N}_image{M}.{ext}
//!  ├─ 4. Caption   one VLM call per image, fallback sentence on failure
//!  ├─ 5. Question  caption → 4-option MCQ
//!  └─ 6. Sink      JSON snapshot (4-space indent, literal UTF-8)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2quiz::{analyze_to_file, AnalysisConfig, VisionCaptioner};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = AnalysisConfig::default();
//!     // The provider is resolved once, before the first page.
//!     let captioner = Arc::new(VisionCaptioner::new(&config));
//!
//!     let output = analyze_to_file("worksheet.pdf", captioner, &config).await?;
//!     eprintln!(
//!         "{} pages, {} questions",
//!         output.stats.total_pages,
//!         output.result.question_count()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `pdf2quiz` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | Upload form and download endpoint (axum + handlebars) |
//!
//! Disable both when using only the library:
//! ```toml
//! edgequake-pdf2quiz = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;
pub mod sink;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_from_bytes, analyze_to_file, DocumentAnalyzer};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{AnalysisError, CaptionError, PageError};
pub use output::{
    AnalysisOutput, AnalysisResult, AnalysisStats, ExtractedImage, McqItem, Page, PageRecord,
    QuestionRecord,
};
pub use pipeline::caption::{ImageCaptioner, VisionCaptioner, FALLBACK_CAPTION};
pub use pipeline::document::{open_document, OpenedDocument, PageContent, RawImage};
pub use pipeline::question::synthesize;
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use sink::ResultSink;
