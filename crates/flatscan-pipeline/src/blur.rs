//! 3×3 binomial smoothing before gradient estimation.
//!
//! A fixed `[[1,2,1],[2,4,2],[1,2,1]] / 16` kernel (the discrete
//! Gaussian approximation) suppresses sensor noise that would otherwise
//! produce spurious Sobel responses. Unlike a sigma-parameterised blur,
//! the result is exact integer arithmetic and therefore byte-identical
//! across platforms.

use image::{GrayImage, Luma};

/// Kernel weights, row-major. They sum to 16.
const KERNEL: [[u32; 3]; 3] = [[1, 2, 1], [2, 4, 2], [1, 2, 1]];

/// Smooth a grayscale image with the 3×3 binomial kernel.
///
/// Interior pixels are replaced by the rounded weighted mean of their
/// 3×3 neighbourhood. The outermost ring of pixels is copied unchanged,
/// as are images narrower or shorter than three pixels.
#[must_use = "returns the smoothed image"]
pub fn smooth(image: &GrayImage) -> GrayImage {
    let (w, h) = image.dimensions();
    let mut out = image.clone();
    if w < 3 || h < 3 {
        return out;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = 0u32;
            for (ky, row) in KERNEL.iter().enumerate() {
                for (kx, &weight) in row.iter().enumerate() {
                    // ky, kx ∈ 0..3, so the offsets stay within 1 pixel.
                    let sx = x + kx as u32 - 1;
                    let sy = y + ky as u32 - 1;
                    acc += weight * u32::from(image.get_pixel(sx, sy).0[0]);
                }
            }
            // Round half up; acc ≤ 16 * 255 so the quotient fits in u8.
            #[allow(clippy::cast_possible_truncation)]
            out.put_pixel(x, y, Luma([((acc + 8) / 16) as u8]));
        }
    }
    out
}
