//! End-to-end integration tests for edgequake-pdf2quiz.
//!
//! These tests use real PDF files in `./test_cases/`, a real pdfium library
//! and, for captioning, live LLM API calls. They are gated behind the
//! `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   PDFIUM_LIB_PATH=. E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! `test_jpeg_kept_verbatim_and_form_images_found` builds its own PDF and
//! needs only pdfium.
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_open_document -- --nocapture

use edgequake_pdf2quiz::{
    analyze_from_bytes, analyze_to_file, open_document, AnalysisConfig, AnalysisError,
    ImageCaptioner, RawImage, ResultSink, VisionCaptioner, FALLBACK_CAPTION,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_stream::StreamExt;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn config_in(dir: &std::path::Path) -> AnalysisConfig {
    AnalysisConfig::builder()
        .images_dir(dir.join("images"))
        .output_path(dir.join("extracted_content.json"))
        .build()
        .unwrap()
}

/// Stored bytes must match their format tag.
fn assert_image_bytes(image: &RawImage) {
    match image.format.as_str() {
        "png" => assert_eq!(&image.data[..8], b"\x89PNG\r\n\x1a\n"),
        "jpeg" => assert_eq!(&image.data[..2], b"\xFF\xD8"),
        "jp2" | "jb2" | "bin" => assert!(!image.data.is_empty()),
        other => panic!("unexpected image format {other:?}"),
    }
}

/// Serialise numbered objects into a PDF with a correct xref table.
fn build_pdf(objects: &[Vec<u8>]) -> Vec<u8> {
    let mut out = b"%PDF-1.7\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    out
}

fn stream_object(dict: &str, data: &[u8]) -> Vec<u8> {
    let mut obj = format!("<< {} /Length {} >>\nstream\n", dict, data.len()).into_bytes();
    obj.extend_from_slice(data);
    obj.extend_from_slice(b"\nendstream");
    obj
}

fn sample_jpeg() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        8,
        8,
        image::Rgb([200, 30, 30]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .unwrap();
    buf
}

/// One page: a DCT-encoded JPEG drawn directly, then a raw RGB image drawn
/// from inside a form XObject.
fn jpeg_and_form_pdf(jpeg: &[u8]) -> Vec<u8> {
    let raw_pixels = [255u8, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255];
    build_pdf(&[
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec(),
        b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] \
           /Resources << /XObject << /Im1 5 0 R /Fm1 6 0 R >> >> /Contents 4 0 R >>"
            .to_vec(),
        stream_object(
            "",
            b"q 50 0 0 50 10 10 cm /Im1 Do Q q 50 0 0 50 100 100 cm /Fm1 Do Q",
        ),
        stream_object(
            "/Type /XObject /Subtype /Image /Width 8 /Height 8 /ColorSpace /DeviceRGB \
             /BitsPerComponent 8 /Filter /DCTDecode",
            jpeg,
        ),
        stream_object(
            "/Type /XObject /Subtype /Form /BBox [0 0 1 1] \
             /Resources << /XObject << /Im2 7 0 R >> >>",
            b"q 1 0 0 1 0 0 cm /Im2 Do Q",
        ),
        stream_object(
            "/Type /XObject /Subtype /Image /Width 2 /Height 2 /ColorSpace /DeviceRGB \
             /BitsPerComponent 8",
            &raw_pixels,
        ),
    ])
}

// ── Compile-time contracts ───────────────────────────────────────────────────

#[test]
fn test_vision_captioner_is_shareable() {
    fn assert_send_sync<T: Send + Sync + 'static>() {}
    assert_send_sync::<VisionCaptioner>();

    let captioner: Arc<dyn ImageCaptioner> =
        Arc::new(VisionCaptioner::new(&AnalysisConfig::default()));
    let _clone = Arc::clone(&captioner);
}

// ── pdfium only (no API key) ─────────────────────────────────────────────────

#[tokio::test]
async fn test_open_document_reads_every_page() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("worksheet.pdf"));

    let mut doc = open_document(&path, None).await.expect("open failed");
    assert!(doc.page_count > 0);

    let mut seen = 0;
    while let Some(read) = doc.pages.next().await {
        seen += 1;
        let content = read.expect("page read failed");
        for image in &content.images {
            assert_image_bytes(image);
        }
    }
    assert_eq!(seen, doc.page_count);
}

#[tokio::test]
async fn test_jpeg_kept_verbatim_and_form_images_found() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let jpeg = sample_jpeg();
    let path = dir.path().join("jpeg_and_form.pdf");
    std::fs::write(&path, jpeg_and_form_pdf(&jpeg)).unwrap();

    let mut doc = open_document(&path, None).await.expect("open failed");
    assert_eq!(doc.page_count, 1);
    let content = doc.pages.next().await.unwrap().expect("page read failed");

    let formats: Vec<&str> = content.images.iter().map(|i| i.format.as_str()).collect();
    assert_eq!(formats, vec!["jpeg", "png"]);
    assert_eq!(content.images[0].data, jpeg);
    assert_image_bytes(&content.images[1]);
}

#[tokio::test]
async fn test_corrupt_pdf_is_fatal() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let err = analyze_from_bytes(
        b"%PDF-1.7\nthis is not really a pdf",
        "broken.pdf",
        Arc::new(VisionCaptioner::new(&config)),
        &config,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AnalysisError::CorruptPdf { .. }), "{err:?}");
    assert!(!config.output_path.exists());
}

// ── Live provider ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_analyze_worksheet_live() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("worksheet.pdf"));
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let captioner = Arc::new(VisionCaptioner::new(&config));
    captioner.warm_up().await.expect("provider not configured");

    let output = analyze_to_file(path.to_str().unwrap(), captioner, &config)
        .await
        .expect("analysis failed");

    assert_eq!(output.result.len(), output.stats.total_pages);
    for (i, record) in output.result.pages.iter().enumerate() {
        assert_eq!(record.page, i + 1);
        assert_eq!(record.images.len(), record.ai_generated_questions.len());
        for q in &record.ai_generated_questions {
            assert!(!q.caption.is_empty());
            assert_eq!(q.options[0], q.caption);
            assert!(PathBuf::from(&q.image).is_file());
        }
    }
    if output.stats.total_images > 0 {
        assert!(
            output.stats.fallback_captions < output.stats.total_images,
            "every caption fell back to {FALLBACK_CAPTION:?}"
        );
    }

    let back = ResultSink::from_config(&config).read().await.unwrap();
    assert_eq!(back.len(), output.result.len());
    println!(
        "{} pages, {} images, {}ms",
        output.stats.total_pages, output.stats.total_images, output.stats.total_duration_ms
    );
}
