//! Perspective rectification: warp the quadrilateral inside the four
//! corners onto an upright rectangle.
//!
//! The output size is the corners' axis-aligned bounding box. Each output
//! pixel is mapped back into the source through the inverse homography
//! and sampled bilinearly; samples landing outside the source are white.
//! When no homography exists for the corners, a bounding-box crop and
//! scale is used instead. Both paths refuse outputs smaller than a
//! configured fraction of the source, or larger than the source itself,
//! returning a pass-through verdict.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::corners::{BoundingBox, CornerSet};
use crate::homography::Homography;
use crate::types::{Dimensions, Fallback, Point};

/// Fill value for samples outside the source image.
const OUTSIDE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Slack on the source bounds so round-off in the inverse mapping does
/// not turn edge samples white.
const EDGE_SLACK: f64 = 1e-6;

/// Warp strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarpKind {
    /// Full projective warp through the corner homography.
    #[default]
    Perspective,
    /// Axis-aligned crop of the corners' bounding box, scaled to the
    /// output size. Ignores keystone distortion.
    BoundingBox,
}

/// Parameters for [`rectify`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectifyOptions {
    /// Minimum output width/height as a fraction of the source
    /// width/height.
    pub min_size_fraction: f64,
    /// Preferred warp.
    pub warp: WarpKind,
}

/// Result of [`rectify`].
#[derive(Debug, Clone, PartialEq)]
pub enum RectifyResult {
    /// A warp was applied.
    Rectified {
        /// The upright page.
        image: RgbaImage,
        /// The warp actually used (may differ from the preferred one).
        warp: WarpKind,
    },
    /// The warp was refused; callers keep the original image.
    PassThrough(Fallback),
}

/// Warp the region inside `corners` to an upright rectangle.
#[must_use]
pub fn rectify(image: &RgbaImage, corners: &CornerSet, options: &RectifyOptions) -> RectifyResult {
    let src_dims = Dimensions::of(image);
    let bbox = corners.bounding_box();

    let Some(out) = output_size(&bbox, src_dims, options.min_size_fraction) else {
        return RectifyResult::PassThrough(Fallback::RectificationUnstable);
    };

    if options.warp == WarpKind::Perspective {
        if let Some(inverse) = perspective_inverse(corners, out) {
            debug!(width = out.width, height = out.height, "perspective warp");
            return RectifyResult::Rectified {
                image: warp_perspective(image, &inverse, out),
                warp: WarpKind::Perspective,
            };
        }
        warn!(?corners, "no homography for corners, using bounding-box warp");
    }

    match warp_bounding_box(image, &bbox, out) {
        Some(warped) => {
            debug!(width = out.width, height = out.height, "bounding-box warp");
            RectifyResult::Rectified {
                image: warped,
                warp: WarpKind::BoundingBox,
            }
        }
        None => {
            warn!(?bbox, "bounding-box scale not usable");
            RectifyResult::PassThrough(Fallback::RectificationUnstable)
        }
    }
}

/// Output dimensions from the bounding box, or `None` when they fall
/// below the minimum fraction of the source or exceed the source.
fn output_size(bbox: &BoundingBox, src: Dimensions, min_fraction: f64) -> Option<Dimensions> {
    let (bw, bh) = (bbox.width(), bbox.height());
    if !bw.is_finite() || !bh.is_finite() || src.is_empty() {
        warn!(bw, bh, "non-finite bounding box");
        return None;
    }

    // Clamped into [1, u32::MAX] before the cast.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let to_px = |v: f64| v.round().clamp(1.0, f64::from(u32::MAX)) as u32;
    let out = Dimensions::new(to_px(bw), to_px(bh));

    let min_w = min_fraction * f64::from(src.width);
    let min_h = min_fraction * f64::from(src.height);
    if f64::from(out.width) < min_w || f64::from(out.height) < min_h {
        warn!(
            width = out.width,
            height = out.height,
            min_w,
            min_h,
            "rectified size below minimum, passing through"
        );
        return None;
    }
    if out.width > src.width || out.height > src.height {
        warn!(
            width = out.width,
            height = out.height,
            src_width = src.width,
            src_height = src.height,
            "rectified size exceeds source, passing through"
        );
        return None;
    }
    Some(out)
}

/// Homography from output pixel space back to source pixel space.
fn perspective_inverse(corners: &CornerSet, out: Dimensions) -> Option<Homography> {
    let (w, h) = (f64::from(out.width), f64::from(out.height));
    let target = [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
    ];
    Homography::from_quad(corners.points(), &target)?.inverse()
}

fn warp_perspective(image: &RgbaImage, inverse: &Homography, out: Dimensions) -> RgbaImage {
    RgbaImage::from_fn(out.width, out.height, |x, y| {
        inverse
            .apply(Point::new(f64::from(x), f64::from(y)))
            .map_or(OUTSIDE, |p| sample_bilinear(image, p))
    })
}

fn warp_bounding_box(image: &RgbaImage, bbox: &BoundingBox, out: Dimensions) -> Option<RgbaImage> {
    let sx = bbox.width() / f64::from(out.width);
    let sy = bbox.height() / f64::from(out.height);
    if !sx.is_finite() || !sy.is_finite() || sx <= 0.0 || sy <= 0.0 {
        return None;
    }

    Some(RgbaImage::from_fn(out.width, out.height, |x, y| {
        let p = Point::new(
            sx.mul_add(f64::from(x), bbox.min_x),
            sy.mul_add(f64::from(y), bbox.min_y),
        );
        sample_bilinear(image, p)
    }))
}

/// Bilinear sample with pixel centres at integer coordinates.
///
/// Points outside `[0, w] × [0, h]` (NaN included) are [`OUTSIDE`];
/// points inside but beyond the last pixel centre clamp to the edge.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sample_bilinear(image: &RgbaImage, p: Point) -> Rgba<u8> {
    let (w, h) = image.dimensions();
    let inside = |v: f64, extent: u32| (-EDGE_SLACK..=f64::from(extent) + EDGE_SLACK).contains(&v);
    if w == 0 || h == 0 || !inside(p.x, w) || !inside(p.y, h) {
        return OUTSIDE;
    }

    let px = p.x.clamp(0.0, f64::from(w - 1));
    let py = p.y.clamp(0.0, f64::from(h - 1));

    // px, py ∈ [0, max], so the floors are valid pixel indices.
    let x0 = px.floor() as u32;
    let y0 = py.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let tx = px - f64::from(x0);
    let ty = py - f64::from(y0);

    let a = image.get_pixel(x0, y0).0;
    let b = image.get_pixel(x1, y0).0;
    let c = image.get_pixel(x0, y1).0;
    let d = image.get_pixel(x1, y1).0;

    let mut out = [0u8; 4];
    for (i, o) in out.iter_mut().enumerate() {
        let top = tx.mul_add(f64::from(b[i]) - f64::from(a[i]), f64::from(a[i]));
        let bottom = tx.mul_add(f64::from(d[i]) - f64::from(c[i]), f64::from(c[i]));
        let v = ty.mul_add(bottom - top, top);
        *o = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}
