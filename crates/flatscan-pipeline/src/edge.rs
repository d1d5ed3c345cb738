//! Canny-style edge detection tuned for document boundaries.
//!
//! The procedure runs on the already-smoothed luminance image:
//!
//! 1. Sobel gradients at every interior pixel (`imageproc` 3×3 kernels).
//! 2. [`classify`]: non-maximum suppression along one of four quantised
//!    gradient directions, then double thresholding into strong (255),
//!    weak (128) and suppressed (0) samples.
//! 3. [`link`]: hysteresis. Weak samples connected (8-neighbourhood,
//!    transitively) to a strong sample become strong; everything else
//!    becomes 0.
//!
//! This differs from `imageproc::edges::canny` in three ways the scanner
//! relies on: no internal Gaussian blur (the caller already smoothed),
//! strict `>` threshold comparisons, and an inspectable three-level
//! classification map. The hysteresis walk also bounds-checks every
//! neighbour and visits all eight of them
//! (see <https://github.com/image-rs/imageproc/issues/705>).

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;

/// Edge-map sample for a suppressed or non-edge pixel.
pub const EDGE_NONE: u8 = 0;
/// Edge-map sample for a weak candidate (only before [`link`]).
pub const EDGE_WEAK: u8 = 128;
/// Edge-map sample for a confirmed edge.
pub const EDGE_STRONG: u8 = 255;

/// Trait for edge detection strategies.
///
/// Input: the smoothed luminance image. Output: a binary edge map of the
/// same dimensions whose samples are [`EDGE_NONE`] or [`EDGE_STRONG`].
///
/// The pipeline uses [`CannyDetector`] unless a caller injects another
/// implementation via
/// [`Blurred::detect_edges_with`](crate::pipeline::Blurred::detect_edges_with).
pub trait EdgeDetector {
    /// Produce the binary edge map.
    fn detect(&self, blurred: &GrayImage) -> GrayImage;
}

/// The built-in Canny-style detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CannyDetector {
    /// Weak-candidate threshold.
    pub low: f32,
    /// Strong-edge threshold.
    pub high: f32,
}

impl EdgeDetector for CannyDetector {
    fn detect(&self, blurred: &GrayImage) -> GrayImage {
        canny(blurred, self.low, self.high)
    }
}

/// Detect edges and return the final binary edge map.
///
/// Negative thresholds are clamped to zero and `low` is clamped to at
/// most `high`, so any finite input produces a usable map.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    link(&classify(image, low_threshold, high_threshold))
}

/// Gradient magnitude, NMS, and double thresholding.
///
/// Returns a map whose samples are [`EDGE_STRONG`] (magnitude > `high`),
/// [`EDGE_WEAK`] (magnitude > `low`), or [`EDGE_NONE`]. Only pixels that
/// are local maxima along their gradient direction can be non-zero. The
/// outermost ring is always [`EDGE_NONE`].
#[must_use = "returns the three-level classification map"]
pub fn classify(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(0.0);
    let low = low_threshold.max(0.0).min(high);

    let (w, h) = image.dimensions();
    let mut out = GrayImage::new(w, h);
    if w < 3 || h < 3 {
        return out;
    }

    let gx: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_VERTICAL_3X3);

    // Border gradients come from clamped sampling; zero them so only
    // interior pixels carry magnitude.
    let magnitude = |x: u32, y: u32| -> f32 {
        if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
            return 0.0;
        }
        f32::from(gx.get_pixel(x, y).0[0]).hypot(f32::from(gy.get_pixel(x, y).0[0]))
    };

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let m = magnitude(x, y);
            if m <= low {
                continue;
            }

            let direction = quantize_direction(gx.get_pixel(x, y).0[0], gy.get_pixel(x, y).0[0]);
            let ((ax, ay), (bx, by)) = match direction {
                Direction::Deg0 => ((x - 1, y), (x + 1, y)),
                Direction::Deg45 => ((x + 1, y + 1), (x - 1, y - 1)),
                Direction::Deg90 => ((x, y - 1), (x, y + 1)),
                Direction::Deg135 => ((x - 1, y + 1), (x + 1, y - 1)),
            };

            // Not a local maximum along the gradient: suppress.
            if m < magnitude(ax, ay) || m < magnitude(bx, by) {
                continue;
            }

            let class = if m > high { EDGE_STRONG } else { EDGE_WEAK };
            out.put_pixel(x, y, Luma([class]));
        }
    }
    out
}

/// Hysteresis linking over a [`classify`] map.
///
/// Every strong sample seeds a depth-first walk that promotes 8-adjacent
/// weak samples, which in turn seed further promotion. The output holds
/// only [`EDGE_STRONG`] and [`EDGE_NONE`].
#[must_use = "returns the binary edge map"]
pub fn link(classified: &GrayImage) -> GrayImage {
    let (w, h) = classified.dimensions();
    let mut out = GrayImage::new(w, h);
    let mut stack = Vec::new();

    for (x, y, p) in classified.enumerate_pixels() {
        if p.0[0] == EDGE_STRONG && out.get_pixel(x, y).0[0] == EDGE_NONE {
            out.put_pixel(x, y, Luma([EDGE_STRONG]));
            stack.push((x, y));

            while let Some((cx, cy)) = stack.pop() {
                for (nx, ny) in neighbors8(cx, cy, w, h) {
                    if classified.get_pixel(nx, ny).0[0] == EDGE_WEAK
                        && out.get_pixel(nx, ny).0[0] == EDGE_NONE
                    {
                        out.put_pixel(nx, ny, Luma([EDGE_STRONG]));
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }
    out
}

/// In-bounds 8-neighbours of `(x, y)`.
pub(crate) fn neighbors8(x: u32, y: u32, w: u32, h: u32) -> impl Iterator<Item = (u32, u32)> {
    const OFFSETS: [(i64, i64); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (-1, 0),
        (1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
    ];
    OFFSETS.into_iter().filter_map(move |(dx, dy)| {
        let nx = i64::from(x) + dx;
        let ny = i64::from(y) + dy;
        let in_bounds = (0..i64::from(w)).contains(&nx) && (0..i64::from(h)).contains(&ny);
        // In bounds means both fit in u32.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        in_bounds.then_some((nx as u32, ny as u32))
    })
}

/// Gradient direction quantised to the nearest 45°, modulo 180°.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Deg0,
    Deg45,
    Deg90,
    Deg135,
}

fn quantize_direction(gx: i16, gy: i16) -> Direction {
    let mut angle = f32::from(gy).atan2(f32::from(gx)).to_degrees();
    if angle < 0.0 {
        angle += 180.0;
    }
    if (22.5..67.5).contains(&angle) {
        Direction::Deg45
    } else if (67.5..112.5).contains(&angle) {
        Direction::Deg90
    } else if (112.5..157.5).contains(&angle) {
        Direction::Deg135
    } else {
        Direction::Deg0
    }
}
