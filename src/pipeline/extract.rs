//! Page extraction: turn one [`PageRead`] into a [`Page`] whose images are
//! persisted on disk.
//!
//! Image files are named `page{N}_image{M}.{ext}` inside the images
//! directory. The name depends only on page number, ordinal and format, so a
//! second run into the same directory silently overwrites the first.

use crate::error::{AnalysisError, PageError};
use crate::output::{ExtractedImage, Page};
use crate::pipeline::document::PageRead;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name for an extracted image.
pub fn image_file_name(page_num: usize, ordinal: usize, format: &str) -> String {
    format!("page{}_image{}.{}", page_num, ordinal, format)
}

/// Full storage path for an extracted image.
pub fn image_path(images_dir: &Path, page_num: usize, ordinal: usize, format: &str) -> PathBuf {
    images_dir.join(image_file_name(page_num, ordinal, format))
}

/// Create the images directory if needed.
pub async fn prepare_images_dir(images_dir: &Path) -> Result<(), AnalysisError> {
    tokio::fs::create_dir_all(images_dir)
        .await
        .map_err(|e| AnalysisError::ImageWriteFailed {
            path: images_dir.to_path_buf(),
            source: e,
        })
}

/// Extract one page.
///
/// A failed read yields an empty page plus the error, never a fatal error.
/// Writing an image file is fatal: the snapshot must never reference a
/// file that does not exist.
pub async fn extract_page(
    page_num: usize,
    read: PageRead,
    images_dir: &Path,
) -> Result<(Page, Option<PageError>), AnalysisError> {
    let content = match read {
        Ok(content) => content,
        Err(e) => {
            warn!("{}; recording empty page", e);
            return Ok((
                Page {
                    index: page_num,
                    text: String::new(),
                    images: Vec::new(),
                },
                Some(e),
            ));
        }
    };

    let mut images = Vec::with_capacity(content.images.len());
    for (i, raw) in content.images.into_iter().enumerate() {
        let ordinal = i + 1;
        let path = image_path(images_dir, page_num, ordinal, &raw.format);

        tokio::fs::write(&path, &raw.data)
            .await
            .map_err(|e| AnalysisError::ImageWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        debug!("Saved image: {}", path.display());

        images.push(ExtractedImage {
            ordinal,
            data: raw.data,
            format: raw.format,
            path,
        });
    }

    Ok((
        Page {
            index: page_num,
            text: content.text.trim().to_string(),
            images,
        },
        None,
    ))
}
