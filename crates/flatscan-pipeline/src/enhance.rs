//! Contrast and brightness lift for rectified pages.
//!
//! Paper photographed under room light comes out grey and flat. A linear
//! contrast stretch around mid-grey followed by a small brightness lift
//! pushes the background toward white and the ink toward black.

use image::{Rgba, RgbaImage};

/// Pivot of the contrast stretch.
const MID_GREY: f32 = 128.0;

/// Apply the contrast stretch then the brightness lift to every RGB
/// channel. Alpha is left untouched.
///
/// Each channel becomes `clamp(round((v - 128) * contrast + 128))` and
/// then `clamp(that + brightness)`, both clamps to `[0, 255]`.
#[must_use = "returns the enhanced image"]
pub fn enhance(image: &RgbaImage, contrast: f32, brightness: i16) -> RgbaImage {
    let lut = lookup_table(contrast, brightness);

    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        *pixel = Rgba([
            lut[usize::from(r)],
            lut[usize::from(g)],
            lut[usize::from(b)],
            a,
        ]);
    }
    out
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lookup_table(contrast: f32, brightness: i16) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (v, slot) in (0u8..=255).zip(lut.iter_mut()) {
        let stretched = (f32::from(v) - MID_GREY)
            .mul_add(contrast, MID_GREY)
            .round()
            .clamp(0.0, 255.0) as i16;
        *slot = (stretched + brightness).clamp(0, 255) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(r: u8, g: u8, b: u8, a: u8) -> RgbaImage {
        RgbaImage::from_pixel(1, 1, Rgba([r, g, b, a]))
    }

    #[test]
    fn default_parameters() {
        let out = enhance(&one(200, 128, 0, 255), 1.3, 10);
        // (200-128)*1.3+128 = 221.6 → 222, +10 = 232.
        // 128 stays 128, +10 = 138.
        // (0-128)*1.3+128 = -38.4 → 0, +10 = 10.
        assert_eq!(*out.get_pixel(0, 0), Rgba([232, 138, 10, 255]));
    }

    #[test]
    fn white_saturates() {
        let out = enhance(&one(255, 250, 240, 255), 1.3, 10);
        assert_eq!(*out.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn alpha_untouched() {
        let out = enhance(&one(10, 20, 30, 77), 1.3, 10);
        assert_eq!(out.get_pixel(0, 0).0[3], 77);
    }

    #[test]
    fn neutral_parameters_are_identity() {
        let img = RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 7, 200]));
        assert_eq!(enhance(&img, 1.0, 0), img);
    }

    #[test]
    fn negative_brightness_clamps_at_zero() {
        let out = enhance(&one(5, 128, 250, 255), 1.0, -20);
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 108, 230, 255]));
    }

    #[test]
    fn dimensions_preserved() {
        let img = RgbaImage::new(13, 7);
        assert_eq!(enhance(&img, 1.3, 10).dimensions(), (13, 7));
    }
}
