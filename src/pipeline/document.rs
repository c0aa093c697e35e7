//! Document reading via pdfium: page text and embedded images.
//!
//! ## Why a reader thread?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which is not safe
//! to drive from async contexts, and its `PdfDocument` borrows the `Pdfium`
//! instance so neither can be held across `.await` points. The whole
//! document lives on one `spawn_blocking` thread that reads page after page
//! and hands each [`PageContent`] to the analyzer over a channel of capacity
//! one. Only one page is ever buffered, and pages arrive strictly in order.

use crate::error::{AnalysisError, PageError};
use crate::pipeline::encode::{encode_png, PNG_FORMAT};
use image::DynamicImage;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// Raw content of one page as read from the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    /// Page text exactly as pdfium returns it (untrimmed).
    pub text: String,
    /// Images in the page's object order.
    pub images: Vec<RawImage>,
}

/// One embedded image, as stored bytes plus the file extension they
/// belong under (`jpeg`, `jp2`, `png`, `jb2` or `bin`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub data: Vec<u8>,
    /// Format identifier used as file extension.
    pub format: String,
}

/// Outcome of reading one page.
pub type PageRead = Result<PageContent, PageError>;

/// A boxed stream of page reads in document order.
pub type PageStream = Pin<Box<dyn Stream<Item = PageRead> + Send>>;

/// An opened document: its page count and a stream yielding one
/// [`PageRead`] per page.
pub struct OpenedDocument {
    pub page_count: usize,
    pub pages: PageStream,
}

impl OpenedDocument {
    /// Build a document from already-read pages.
    ///
    /// Used for in-memory sources and for driving the analyzer in tests.
    pub fn from_pages(pages: Vec<PageRead>) -> Self {
        Self {
            page_count: pages.len(),
            pages: Box::pin(tokio_stream::iter(pages)),
        }
    }
}

impl std::fmt::Debug for OpenedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedDocument")
            .field("page_count", &self.page_count)
            .finish_non_exhaustive()
    }
}

/// Open a PDF and start streaming its pages.
///
/// Returns only after pdfium has opened the document, so an unreadable file
/// is reported here as a fatal error and no page is ever produced.
pub async fn open_document(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<OpenedDocument, AnalysisError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());
    let (open_tx, open_rx) = oneshot::channel();
    let (page_tx, page_rx) = mpsc::channel(1);

    tokio::task::spawn_blocking(move || read_document_blocking(&path, pwd.as_deref(), open_tx, page_tx));

    let page_count = open_rx
        .await
        .map_err(|_| AnalysisError::Internal("Document reader stopped before opening".into()))??;

    Ok(OpenedDocument {
        page_count,
        pages: Box::pin(ReceiverStream::new(page_rx)),
    })
}

/// Blocking side of [`open_document`]: owns pdfium for the whole read.
fn read_document_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    open_tx: oneshot::Sender<Result<usize, AnalysisError>>,
    page_tx: mpsc::Sender<PageRead>,
) {
    let pdfium = match bind_pdfium() {
        Ok(p) => p,
        Err(e) => {
            let _ = open_tx.send(Err(e));
            return;
        }
    };

    let document = match pdfium.load_pdf_from_file(pdf_path, password) {
        Ok(doc) => doc,
        Err(e) => {
            let _ = open_tx.send(Err(map_open_error(pdf_path, password, e)));
            return;
        }
    };

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);
    if open_tx.send(Ok(total_pages)).is_err() {
        return;
    }

    for idx in 0..total_pages {
        let read = pages
            .get(idx as u16)
            .map_err(|e| PageError::ReadFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })
            .and_then(|page| read_page(&page, idx + 1));

        // The analyzer dropped the stream; nothing left to do.
        if page_tx.blocking_send(read).is_err() {
            debug!("Page consumer gone after page {}", idx + 1);
            return;
        }
    }
}

/// Read the text layer and every image object of one page, including
/// images drawn through form XObjects.
fn read_page(page: &PdfPage<'_>, page_num: usize) -> PageRead {
    let text = page
        .text()
        .map_err(|e| PageError::ReadFailed {
            page: page_num,
            detail: format!("text layer: {:?}", e),
        })?
        .all();

    let mut images = Vec::new();
    for object in page.objects().iter() {
        collect_images(&object, page_num, 0, &mut images);
    }

    debug!(
        "Read page {}: {} chars, {} images",
        page_num,
        text.len(),
        images.len()
    );
    Ok(PageContent { text, images })
}

/// Forms nested deeper than this are not searched for images.
const MAX_FORM_DEPTH: usize = 16;

/// Append the images of `object` in object order, descending into forms.
fn collect_images(
    object: &PdfPageObject<'_>,
    page_num: usize,
    depth: usize,
    images: &mut Vec<RawImage>,
) {
    if let Some(image_object) = object.as_image_object() {
        let filters: Vec<String> = image_object
            .filters()
            .iter()
            .map(|f| f.name().trim_start_matches('/').to_string())
            .collect();
        match select_image_bytes(
            &filters,
            || image_object.get_raw_image_data(),
            || image_object.get_raw_image(),
        ) {
            Ok(image) => images.push(image),
            Err(e) => warn!(
                "Page {}: skipping image {} (no data: {})",
                page_num,
                images.len() + 1,
                e
            ),
        }
    } else if let Some(form) = object.as_x_object_form_object() {
        if depth >= MAX_FORM_DEPTH {
            warn!("Page {}: form nesting too deep, ignoring its images", page_num);
            return;
        }
        for idx in form.as_range() {
            match form.get(idx) {
                Ok(child) => collect_images(&child, page_num, depth + 1, images),
                Err(e) => warn!("Page {}: unreadable form object {}: {:?}", page_num, idx, e),
            }
        }
    }
}

/// Container format of an image stream that is a complete file on its own.
fn container_format(filters: &[String]) -> Option<&'static str> {
    match filters {
        [only] => match only.as_str() {
            "DCTDecode" => Some("jpeg"),
            "JPXDecode" => Some("jp2"),
            _ => None,
        },
        _ => None,
    }
}

/// Extension for a raw stream pdfium could not decode.
fn undecoded_format(filters: &[String]) -> &'static str {
    match filters {
        [only] if only == "JBIG2Decode" => "jb2",
        _ => container_format(filters).unwrap_or(RAW_STREAM_FORMAT),
    }
}

/// Extension of raw streams with no recognisable container.
pub const RAW_STREAM_FORMAT: &str = "bin";

/// Pick the stored bytes for one image.
///
/// JPEG and JPEG 2000 streams are kept exactly as embedded. Other pixel data
/// is decoded and stored as PNG. When decoding fails the raw stream is kept
/// anyway so the image still gets a file and a (fallback) question.
fn select_image_bytes<R, D>(
    filters: &[String],
    mut raw: R,
    decode: D,
) -> Result<RawImage, String>
where
    R: FnMut() -> Result<Vec<u8>, PdfiumError>,
    D: FnOnce() -> Result<DynamicImage, PdfiumError>,
{
    if let Some(format) = container_format(filters) {
        match raw() {
            Ok(data) if !data.is_empty() => {
                return Ok(RawImage {
                    data,
                    format: format.to_string(),
                })
            }
            Ok(_) => debug!("Empty {} stream, decoding instead", format),
            Err(e) => debug!("Raw {} stream unavailable ({:?}), decoding instead", format, e),
        }
    }

    let decode_error = match decode() {
        Ok(img) => match encode_png(&img) {
            Ok(data) => {
                return Ok(RawImage {
                    data,
                    format: PNG_FORMAT.to_string(),
                })
            }
            Err(e) => format!("encode failed: {}", e),
        },
        Err(e) => format!("decode failed: {:?}", e),
    };

    match raw() {
        Ok(data) if !data.is_empty() => {
            let format = undecoded_format(filters);
            warn!(
                "Image {} ({:?}); storing raw stream as .{}",
                decode_error, filters, format
            );
            Ok(RawImage {
                data,
                format: format.to_string(),
            })
        }
        _ => Err(decode_error),
    }
}

fn map_open_error(pdf_path: &Path, password: Option<&str>, e: PdfiumError) -> AnalysisError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            AnalysisError::WrongPassword {
                path: pdf_path.to_path_buf(),
            }
        } else {
            AnalysisError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        AnalysisError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: err_str,
        }
    }
}

// ── pdfium binding ───────────────────────────────────────────────────────────

/// Library location resolved on first bind; later binds reuse it.
static PDFIUM_LIB_DIR: Lazy<Option<PathBuf>> = Lazy::new(|| {
    std::env::var_os("PDFIUM_LIB_PATH").map(|raw| {
        let p = PathBuf::from(raw);
        if p.is_file() {
            p.parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            p
        }
    })
});

/// Bind to a pdfium library.
///
/// Lookup order: `PDFIUM_LIB_PATH` (file or directory), the current
/// directory, then the system library search path.
pub fn bind_pdfium() -> Result<Pdfium, AnalysisError> {
    let mut attempts = Vec::new();

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = PDFIUM_LIB_DIR.as_ref() {
        candidates.push(dir.clone());
    }
    candidates.push(PathBuf::from("./"));

    for dir in candidates {
        match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir)) {
            Ok(bindings) => return Ok(Pdfium::new(bindings)),
            Err(e) => attempts.push(format!("{}: {:?}", dir.display(), e)),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(e) => {
            attempts.push(format!("system library: {:?}", e));
            Err(AnalysisError::PdfiumBindingFailed(attempts.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn from_pages_preserves_order_and_count() {
        let mut doc = OpenedDocument::from_pages(vec![
            Ok(PageContent {
                text: "one".into(),
                images: vec![],
            }),
            Err(PageError::ReadFailed {
                page: 2,
                detail: "x".into(),
            }),
            Ok(PageContent {
                text: "three".into(),
                images: vec![],
            }),
        ]);
        assert_eq!(doc.page_count, 3);

        let mut seen = Vec::new();
        while let Some(read) = doc.pages.next().await {
            seen.push(read.map(|p| p.text).unwrap_or_else(|_| "<err>".into()));
        }
        assert_eq!(seen, vec!["one", "<err>", "three"]);
    }

    fn filters(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn tiny_image() -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(2, 2, image::Rgb([0, 128, 255])))
    }

    #[test]
    fn filter_chain_to_format() {
        assert_eq!(container_format(&filters(&["DCTDecode"])), Some("jpeg"));
        assert_eq!(container_format(&filters(&["JPXDecode"])), Some("jp2"));
        assert_eq!(container_format(&filters(&["FlateDecode"])), None);
        assert_eq!(container_format(&filters(&[])), None);
        // A JPEG wrapped in Flate is not a standalone file.
        assert_eq!(container_format(&filters(&["FlateDecode", "DCTDecode"])), None);

        assert_eq!(undecoded_format(&filters(&["JBIG2Decode"])), "jb2");
        assert_eq!(undecoded_format(&filters(&["JPXDecode"])), "jp2");
        assert_eq!(undecoded_format(&filters(&["CCITTFaxDecode"])), RAW_STREAM_FORMAT);
    }

    #[test]
    fn jpeg_stream_is_kept_verbatim() {
        let stream = b"\xFF\xD8\xFF\xE0 embedded jpeg".to_vec();
        let image = select_image_bytes(
            &filters(&["DCTDecode"]),
            || Ok(stream.clone()),
            || panic!("a JPEG stream must not be decoded"),
        )
        .unwrap();
        assert_eq!(image.format, "jpeg");
        assert_eq!(image.data, stream);
    }

    #[test]
    fn flate_pixels_become_png() {
        let image = select_image_bytes(
            &filters(&["FlateDecode"]),
            || Ok(b"deflated pixels".to_vec()),
            || Ok(tiny_image()),
        )
        .unwrap();
        assert_eq!(image.format, PNG_FORMAT);
        assert_eq!(&image.data[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn undecodable_image_keeps_raw_stream() {
        let image = select_image_bytes(
            &filters(&["JBIG2Decode"]),
            || Ok(b"jbig2 segments".to_vec()),
            || Err(PdfiumError::ImageError),
        )
        .unwrap();
        assert_eq!(image.format, "jb2");
        assert_eq!(image.data, b"jbig2 segments");
    }

    #[test]
    fn empty_jpeg_stream_falls_back_to_decoding() {
        let image = select_image_bytes(
            &filters(&["DCTDecode"]),
            || Ok(Vec::new()),
            || Ok(tiny_image()),
        )
        .unwrap();
        assert_eq!(image.format, PNG_FORMAT);
    }

    #[test]
    fn image_without_any_data_is_skipped() {
        let err = select_image_bytes(
            &filters(&[]),
            || Ok(Vec::new()),
            || Err(PdfiumError::ImageError),
        )
        .unwrap_err();
        assert!(err.contains("decode failed"));
    }

    #[test]
    fn open_error_mentions_password() {
        let path = Path::new("locked.pdf");
        let e = map_open_error(path, None, PdfiumError::PdfiumLibraryInternalError(
            PdfiumInternalError::PasswordError,
        ));
        assert!(matches!(e, AnalysisError::PasswordRequired { .. }));

        let e = map_open_error(path, Some("nope"), PdfiumError::PdfiumLibraryInternalError(
            PdfiumInternalError::PasswordError,
        ));
        assert!(matches!(e, AnalysisError::WrongPassword { .. }));

        let e = map_open_error(path, None, PdfiumError::PdfiumLibraryInternalError(
            PdfiumInternalError::FormatError,
        ));
        assert!(matches!(e, AnalysisError::CorruptPdf { .. }));
    }
}
