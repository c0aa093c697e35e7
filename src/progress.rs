//! Progress-callback trait for per-page analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events as the analyzer walks the document. The CLI turns them into a
//! progress bar; a web host could forward them to a channel instead.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2quiz::{AnalysisConfig, AnalysisProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     images: AtomicUsize,
//! }
//!
//! impl AnalysisProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, image_count: usize) {
//!         self.images.fetch_add(image_count, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} images)", page_num, total_pages, image_count);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { images: AtomicUsize::new(0) });
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(counter as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the analyzer as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages arrive strictly in document order; with
/// `caption_concurrency > 1`, `on_image_captioned` still fires in ordinal
/// order.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once after the document is opened, before the first page.
    fn on_analysis_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a page is read.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — total pages in the document
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called after each image caption is settled.
    ///
    /// `used_fallback` is `true` when captioning failed and the fallback
    /// sentinel was substituted.
    fn on_image_captioned(&self, page_num: usize, ordinal: usize, used_fallback: bool) {
        let _ = (page_num, ordinal, used_fallback);
    }

    /// Called when a page record is complete.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — total pages
    /// * `image_count` — images extracted (and questions generated) for the page
    fn on_page_complete(&self, page_num: usize, total_pages: usize, image_count: usize) {
        let _ = (page_num, total_pages, image_count);
    }

    /// Called when a page could not be read. The page still yields an
    /// empty record and the run continues.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after the last page.
    fn on_analysis_complete(&self, total_pages: usize, total_images: usize) {
        let _ = (total_pages, total_images);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
