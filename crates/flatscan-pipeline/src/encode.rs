//! Encoding pipeline output for hand-off to the host.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use crate::types::ScanError;

/// Encode as baseline JPEG at `quality` (1-100, clamped).
///
/// JPEG has no alpha channel, so alpha is dropped.
///
/// # Errors
///
/// Returns [`ScanError::Encode`] if the encoder rejects the image.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, ScanError> {
    let rgb = image::DynamicImage::ImageRgba8(image.clone()).into_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| ScanError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Encode as lossless RGBA PNG.
///
/// # Errors
///
/// Returns [`ScanError::Encode`] if the encoder rejects the image.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ScanError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgba8)
        .map_err(|e| ScanError::Encode(e.to_string()))?;
    Ok(buf)
}
