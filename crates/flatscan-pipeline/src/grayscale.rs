//! Image decoding and luminance conversion.
//!
//! [`decode`] turns raw file bytes (PNG, JPEG, BMP, WebP) into an RGBA
//! bitmap for hosts that hand over encoded files rather than pixels.
//! [`to_grayscale`] is the first scanning stage: RGBA in, luminance out.

use image::{GrayImage, Luma, RgbaImage};

use crate::types::ScanError;

/// Decode raw image bytes into an RGBA bitmap.
///
/// # Errors
///
/// Returns [`ScanError::EmptyInput`] if `bytes` is empty.
/// Returns [`ScanError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, ScanError> {
    if bytes.is_empty() {
        return Err(ScanError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Convert an RGBA bitmap to luminance.
///
/// Uses the Rec. 601 weights `0.299*R + 0.587*G + 0.114*B`, rounded to
/// the nearest integer. Alpha is ignored, so transparent pixels convert
/// as if opaque.
#[must_use = "returns the grayscale image"]
pub fn to_grayscale(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        Luma([luminance(r, g, b)])
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.114f32.mul_add(
        f32::from(b),
        0.299f32.mul_add(f32::from(r), 0.587 * f32::from(g)),
    );
    y.round().clamp(0.0, 255.0) as u8
}
