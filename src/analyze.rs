//! Document analysis entry points.
//!
//! [`DocumentAnalyzer`] drives the page loop over an [`OpenedDocument`]:
//! extract and persist each page's images, caption every image, derive one
//! question per caption, and collect one [`PageRecord`] per page. The free
//! functions below resolve the input, open the document and, for
//! [`analyze_to_file`], hand the result to a [`ResultSink`].
//!
//! Pages are processed strictly in order. Within a page, captions may run
//! concurrently (`caption_concurrency`), but `buffered` yields them in
//! ordinal order so the output never depends on completion order.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, PageError};
use crate::output::{AnalysisOutput, AnalysisResult, AnalysisStats, PageRecord, QuestionRecord};
use crate::pipeline::caption::{ImageCaptioner, FALLBACK_CAPTION};
use crate::pipeline::document::{self, OpenedDocument};
use crate::pipeline::{extract, input, question};
use crate::progress::ProgressCallback;
use crate::sink::ResultSink;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Orchestrates extraction, captioning and question synthesis for one
/// document at a time.
///
/// The captioner is shared, not owned: build it once per process and pass
/// the same `Arc` to every analyzer.
pub struct DocumentAnalyzer {
    captioner: Arc<dyn ImageCaptioner>,
    images_dir: PathBuf,
    caption_concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl DocumentAnalyzer {
    pub fn new(captioner: Arc<dyn ImageCaptioner>, config: &AnalysisConfig) -> Self {
        Self {
            captioner,
            images_dir: config.images_dir.clone(),
            caption_concurrency: config.caption_concurrency.max(1),
            progress: config.progress_callback.clone(),
        }
    }

    /// Analyze every page of `document`.
    ///
    /// Always returns exactly `document.page_count` records, numbered
    /// `1..=page_count`. Unreadable pages become empty records; caption
    /// failures become the fallback caption. Only a captioner that fails to
    /// warm up, or an image that cannot be written to disk, aborts the run.
    pub async fn analyze(
        &self,
        mut document: OpenedDocument,
    ) -> Result<AnalysisOutput, AnalysisError> {
        let start = Instant::now();
        let total_pages = document.page_count;

        self.captioner.warm_up().await?;
        extract::prepare_images_dir(&self.images_dir).await?;

        if let Some(ref cb) = self.progress {
            cb.on_analysis_start(total_pages);
        }

        let mut stats = AnalysisStats {
            total_pages,
            ..Default::default()
        };
        let mut records = Vec::with_capacity(total_pages);

        for page_num in 1..=total_pages {
            if let Some(ref cb) = self.progress {
                cb.on_page_start(page_num, total_pages);
            }

            let read = match document.pages.next().await {
                Some(read) => read,
                None => Err(PageError::ReadFailed {
                    page: page_num,
                    detail: "document reader stopped early".to_string(),
                }),
            };

            let (page, read_error) =
                extract::extract_page(page_num, read, &self.images_dir).await?;

            if let Some(e) = read_error {
                stats.failed_pages += 1;
                if let Some(ref cb) = self.progress {
                    cb.on_page_error(page_num, total_pages, &e.to_string());
                }
                records.push(PageRecord::unreadable(page_num, e));
                continue;
            }

            let caption_start = Instant::now();
            let caption_futures: Vec<_> = page
                .images
                .iter()
                .map(|img| self.captioner.caption(&img.data))
                .collect();
            let captions: Vec<String> = stream::iter(caption_futures)
                .buffered(self.caption_concurrency)
                .collect()
                .await;
            stats.caption_duration_ms += caption_start.elapsed().as_millis() as u64;

            let mut image_paths = Vec::with_capacity(page.images.len());
            let mut questions = Vec::with_capacity(page.images.len());
            for (img, caption) in page.images.iter().zip(captions) {
                let used_fallback = caption == FALLBACK_CAPTION;
                if used_fallback {
                    stats.fallback_captions += 1;
                }
                if let Some(ref cb) = self.progress {
                    cb.on_image_captioned(page_num, img.ordinal, used_fallback);
                }
                debug!("Page {} image {}: {}", page_num, img.ordinal, caption);

                let path = img.path_string();
                questions.push(QuestionRecord::new(path.clone(), question::synthesize(&caption)));
                image_paths.push(path);
            }

            stats.total_images += image_paths.len();
            if let Some(ref cb) = self.progress {
                cb.on_page_complete(page_num, total_pages, image_paths.len());
            }

            records.push(PageRecord {
                page: page_num,
                text: page.text,
                images: image_paths,
                ai_generated_questions: questions,
                error: None,
            });
        }

        if stats.failed_pages > 0 {
            warn!(
                "{} of {} pages could not be read",
                stats.failed_pages, total_pages
            );
        }

        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Analysis complete: {} pages, {} images ({} fallback captions), {}ms",
            total_pages, stats.total_images, stats.fallback_captions, stats.total_duration_ms
        );

        if let Some(ref cb) = self.progress {
            cb.on_analysis_complete(total_pages, stats.total_images);
        }

        Ok(AnalysisOutput {
            result: AnalysisResult { pages: records },
            stats,
        })
    }
}

/// Analyze a PDF file or URL.
///
/// # Errors
/// Returns `Err(AnalysisError)` only for fatal errors:
/// - File not found / permission denied / download failure
/// - Not a valid PDF, or the document cannot be opened
/// - An extracted image cannot be written
pub async fn analyze(
    input_str: impl AsRef<str>,
    captioner: Arc<dyn ImageCaptioner>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let input_str = input_str.as_ref();
    info!("Starting analysis: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    analyze_path(resolved.path(), captioner, config).await
}

/// Analyze a PDF and write the JSON snapshot to `config.output_path`.
///
/// Nothing is written when the document cannot be opened.
pub async fn analyze_to_file(
    input_str: impl AsRef<str>,
    captioner: Arc<dyn ImageCaptioner>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let output = analyze(input_str, captioner, config).await?;
    ResultSink::from_config(config).write(&output.result).await?;
    Ok(output)
}

/// Analyze PDF bytes held in memory, e.g. an HTTP upload.
///
/// The bytes are written to a managed temp file that is removed on return.
/// `file_name` only names that temp file.
pub async fn analyze_from_bytes(
    bytes: &[u8],
    file_name: &str,
    captioner: Arc<dyn ImageCaptioner>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let resolved = input::resolve_bytes(bytes, file_name).await?;
    analyze_path(resolved.path(), captioner, config).await
}

async fn analyze_path(
    pdf_path: &Path,
    captioner: Arc<dyn ImageCaptioner>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let document = document::open_document(pdf_path, config.password.as_deref()).await?;
    info!("{}: {} pages", pdf_path.display(), document.page_count);
    DocumentAnalyzer::new(captioner, config)
        .analyze(document)
        .await
}
