//! Image encoding for storage and for the VLM request.
//!
//! Two directions:
//!
//! * [`encode_png`] — a pdfium-decoded `DynamicImage` → PNG bytes written to
//!   the images directory. PNG is lossless, so the stored pixels are exactly
//!   what the document contains.
//! * [`encode_for_caption`] — stored bytes → canonical 3-channel RGB PNG,
//!   base64-wrapped in `ImageData`. Alpha, palette, grayscale and 16-bit
//!   inputs all reach the model the same way.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Format tag (and file extension) of images produced by [`encode_png`].
pub const PNG_FORMAT: &str = "png";

/// Encode a decoded image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Decode stored image bytes and re-encode them as an RGB PNG for the VLM.
///
/// Fails when the bytes are not a supported image format.
pub fn encode_for_caption(bytes: &[u8]) -> Result<ImageData, image::ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());

    let png = encode_png(&rgb)?;
    let b64 = STANDARD.encode(&png);
    debug!(
        "Prepared {}x{} image for captioning → {} bytes base64",
        rgb.width(),
        rgb.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png"))
}
