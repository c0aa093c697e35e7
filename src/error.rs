//! Error types for the edgequake-pdf2quiz library.
//!
//! Three error types reflect three failure granularities:
//!
//! * [`AnalysisError`] — **Fatal**: the run cannot produce a snapshot at all
//!   (input missing, document cannot be opened, images or JSON cannot be
//!   written). Returned as `Err(AnalysisError)` from the top-level
//!   `analyze*` functions.
//!
//! * [`PageError`] — **Non-fatal**: one page could not be read. The page
//!   still yields a record (empty text, no images) and the run continues.
//!   Kept on [`crate::output::PageRecord::error`] for in-memory inspection;
//!   it is never written to the JSON snapshot.
//!
//! * [`CaptionError`] — **Non-fatal**: one image could not be described.
//!   It never leaves [`crate::pipeline::caption::ImageCaptioner::caption`];
//!   the captioner logs it and substitutes
//!   [`crate::pipeline::caption::FALLBACK_CAPTION`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2quiz library.
#[derive(Debug, Error)]
pub enum AnalysisError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Document errors ───────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and the document cannot be opened.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory), place the\n\
library next to the executable, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Captioning errors ─────────────────────────────────────────────────
    /// The configured VLM provider cannot be initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the images directory or write an extracted image.
    #[error("Failed to write image '{path}': {source}")]
    ImageWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the JSON snapshot.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The JSON snapshot exists but cannot be parsed back.
    #[error("Failed to read snapshot '{path}': {detail}")]
    SnapshotUnreadable { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// `true` when the document itself could not be opened or parsed.
    ///
    /// The web surface answers these with `422` instead of `500`.
    pub fn is_document_error(&self) -> bool {
        matches!(
            self,
            AnalysisError::NotAPdf { .. }
                | AnalysisError::CorruptPdf { .. }
                | AnalysisError::PasswordRequired { .. }
                | AnalysisError::WrongPassword { .. }
        )
    }
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// pdfium could not load the page or its text layer.
    #[error("Page {page}: read failed: {detail}")]
    ReadFailed { page: usize, detail: String },
}

/// Why a caption could not be generated for one image.
#[derive(Debug, Error)]
pub enum CaptionError {
    /// Bytes are not a supported image.
    #[error("image decode failed: {0}")]
    Decode(String),

    /// The provider could not be initialised.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider returned an error.
    #[error("provider error: {0}")]
    Provider(String),

    /// The provider did not answer within the configured timeout.
    #[error("caption timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider answered but nothing usable remained after clean-up.
    #[error("empty caption")]
    EmptyResponse,
}
