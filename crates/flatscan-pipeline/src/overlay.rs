//! Debug overlay: the source image annotated with what the pipeline saw.
//!
//! The source is dimmed, edge pixels are painted cyan, the accepted
//! quadrilateral is stroked green, its axis-aligned bounding box dashed
//! amber, and each corner gets a red marker labelled 1–4 in clockwise
//! order from top-left. Rendering is done with `tiny-skia` at source
//! resolution.

use image::{Rgba, RgbaImage};
use tiny_skia::{
    FillRule, IntSize, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, Stroke, StrokeDash,
    Transform,
};

use crate::corners::{Corner, CornerSet};
use crate::edge::EDGE_STRONG;
use crate::types::{Dimensions, Point, StagedResult};

const EDGE_COLOR: [u8; 3] = [0, 255, 255];
const QUAD_COLOR: [u8; 3] = [0, 230, 0];
const BBOX_COLOR: [u8; 3] = [255, 200, 0];
const MARKER_COLOR: [u8; 3] = [230, 40, 40];
const LABEL_COLOR: [u8; 3] = [255, 255, 255];

/// Seven-segment endpoints in a 1×2 cell: a, b, c, d, e, f, g.
const SEGMENTS: [[(f32, f32); 2]; 7] = [
    [(0.0, 0.0), (1.0, 0.0)],
    [(1.0, 0.0), (1.0, 1.0)],
    [(1.0, 1.0), (1.0, 2.0)],
    [(0.0, 2.0), (1.0, 2.0)],
    [(0.0, 1.0), (0.0, 2.0)],
    [(0.0, 0.0), (0.0, 1.0)],
    [(0.0, 1.0), (1.0, 1.0)],
];

/// Lit segments (indices into [`SEGMENTS`]) for the digits 1–4.
const DIGITS: [&[usize]; 4] = [
    &[1, 2],
    &[0, 1, 6, 4, 3],
    &[0, 1, 6, 2, 3],
    &[5, 6, 1, 2],
];

/// Render the debug overlay for a staged result.
///
/// Edge highlighting is skipped when the edge map does not match the
/// source size (the manual-corner path leaves it empty). An empty source
/// yields an empty image.
#[must_use]
pub fn overlay(staged: &StagedResult) -> RgbaImage {
    let mut base = dim(&staged.original);
    if staged.edges.dimensions() == base.dimensions() {
        for (x, y, p) in staged.edges.enumerate_pixels() {
            if p.0[0] == EDGE_STRONG {
                base.put_pixel(x, y, opaque(EDGE_COLOR));
            }
        }
    }

    let Some(mut pixmap) = to_pixmap(&base) else {
        return base;
    };
    draw_annotations(&mut pixmap, &staged.corners, Dimensions::of(&base));

    let (width, height) = base.dimensions();
    RgbaImage::from_raw(width, height, pixmap.take()).unwrap_or(base)
}

/// Halve every colour channel and force full opacity.
fn dim(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for p in out.pixels_mut() {
        let [r, g, b, _] = p.0;
        *p = Rgba([r / 2, g / 2, b / 2, 255]);
    }
    out
}

const fn opaque([r, g, b]: [u8; 3]) -> Rgba<u8> {
    Rgba([r, g, b, 255])
}

/// Wrap an opaque image as a pixmap. Opaque pixels are identical in
/// premultiplied and straight alpha, so the bytes carry over unchanged.
fn to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(image.width(), image.height())?;
    Pixmap::from_vec(image.as_raw().clone(), size)
}

fn paint([r, g, b]: [u8; 3]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, 255);
    paint.anti_alias = true;
    paint
}

#[allow(clippy::cast_possible_truncation)]
fn draw_annotations(pixmap: &mut Pixmap, corners: &CornerSet, dims: Dimensions) {
    let scale = (dims.shorter_dim() as f32 / 100.0).max(1.0);
    let line = Stroke {
        width: scale,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };

    if let Some(path) = closed_polygon(&corners.bounding_box().corners()) {
        let dashed = Stroke {
            dash: StrokeDash::new(vec![4.0 * scale, 3.0 * scale], 0.0),
            ..line.clone()
        };
        pixmap.stroke_path(&path, &paint(BBOX_COLOR), &dashed, Transform::identity(), None);
    }

    if let Some(path) = closed_polygon(corners.points()) {
        pixmap.stroke_path(&path, &paint(QUAD_COLOR), &line, Transform::identity(), None);
    }

    let radius = 2.5 * scale;
    for corner in Corner::ALL {
        let p = corners.get(corner);
        if !p.is_finite() {
            continue;
        }
        let (x, y) = (p.x as f32, p.y as f32);
        if let Some(dot) = PathBuilder::from_circle(x, y, radius) {
            pixmap.fill_path(&dot, &paint(MARKER_COLOR), FillRule::Winding, Transform::identity(), None);
        }
        if let Some(label) = digit_path(corner.index() + 1, x + radius * 1.5, y + radius * 1.5, 2.0 * scale) {
            pixmap.stroke_path(&label, &paint(LABEL_COLOR), &line, Transform::identity(), None);
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn closed_polygon(points: &[Point]) -> Option<Path> {
    if !points.iter().all(|p| p.is_finite()) {
        return None;
    }
    let mut pb = PathBuilder::new();
    let (first, rest) = points.split_first()?;
    pb.move_to(first.x as f32, first.y as f32);
    for p in rest {
        pb.line_to(p.x as f32, p.y as f32);
    }
    pb.close();
    pb.finish()
}

/// Seven-segment glyph for `digit` (1–4) with its top-left at `(x, y)`
/// and a cell `size` wide.
fn digit_path(digit: usize, x: f32, y: f32, size: f32) -> Option<Path> {
    let lit = DIGITS.get(digit.checked_sub(1)?)?;
    let mut pb = PathBuilder::new();
    for &segment in *lit {
        let [(x0, y0), (x1, y1)] = SEGMENTS[segment];
        pb.move_to(x0.mul_add(size, x), y0.mul_add(size, y));
        pb.line_to(x1.mul_add(size, x), y1.mul_add(size, y));
    }
    pb.finish()
}
