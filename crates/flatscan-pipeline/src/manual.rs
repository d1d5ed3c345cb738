//! Geometry for manual corner adjustment.
//!
//! The host UI shows the source image letterboxed inside a container
//! (uniform scale, centred) and lets the user drag corner handles. This
//! module owns everything about that interaction except drawing:
//! mapping between display and source coordinates, hit-testing handles,
//! and the drag state machine. The resulting [`CornerSet`] carries no
//! interaction state; it is tagged [`CornerOrigin::Manual`] and bypasses
//! validation downstream.
//!
//! [`CornerOrigin::Manual`]: crate::corners::CornerOrigin::Manual

use serde::{Deserialize, Serialize};

use crate::corners::{Corner, CornerSet};
use crate::types::{Dimensions, Point};

/// A letterboxed display of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Display container width.
    pub container_width: f64,
    /// Display container height.
    pub container_height: f64,
    /// Source image size in pixels.
    pub image: Dimensions,
}

impl Viewport {
    /// Create a viewport for an image shown inside a container.
    #[must_use]
    pub const fn new(container_width: f64, container_height: f64, image: Dimensions) -> Self {
        Self {
            container_width,
            container_height,
            image,
        }
    }

    /// Display pixels per source pixel, or `None` when either the image
    /// or the container is empty.
    #[must_use]
    pub fn scale(&self) -> Option<f64> {
        if self.image.is_empty() {
            return None;
        }
        let sx = self.container_width / f64::from(self.image.width);
        let sy = self.container_height / f64::from(self.image.height);
        let s = sx.min(sy);
        (s.is_finite() && s > 0.0).then_some(s)
    }

    /// Top-left of the displayed image inside the container.
    #[must_use]
    pub fn offset(&self) -> Point {
        let s = self.scale().unwrap_or(1.0);
        Point::new(
            (self.container_width - f64::from(self.image.width) * s) / 2.0,
            (self.container_height - f64::from(self.image.height) * s) / 2.0,
        )
    }

    /// Map a display point to source pixel coordinates. Unclamped.
    ///
    /// A degenerate viewport maps points unchanged.
    #[must_use]
    pub fn to_source(&self, p: Point) -> Point {
        let Some(s) = self.scale() else {
            return p;
        };
        let o = self.offset();
        Point::new((p.x - o.x) / s, (p.y - o.y) / s)
    }

    /// Map a source pixel coordinate to display coordinates.
    #[must_use]
    pub fn to_display(&self, p: Point) -> Point {
        let Some(s) = self.scale() else {
            return p;
        };
        let o = self.offset();
        Point::new(p.x.mul_add(s, o.x), p.y.mul_add(s, o.y))
    }
}

/// Map a display point to source coordinates and clamp it into
/// `[0, w] × [0, h]`. Non-finite coordinates clamp to 0.
#[must_use]
pub fn clamp_and_remap(p: Point, viewport: &Viewport) -> Point {
    let s = viewport.to_source(p);
    let clamp = |v: f64, max: u32| {
        if v.is_nan() {
            0.0
        } else {
            v.clamp(0.0, f64::from(max))
        }
    };
    Point::new(
        clamp(s.x, viewport.image.width),
        clamp(s.y, viewport.image.height),
    )
}

/// The corner whose display position is nearest `display_point`, if it
/// lies within `radius` display pixels.
#[must_use]
pub fn nearest_corner(
    corners: &CornerSet,
    display_point: Point,
    viewport: &Viewport,
    radius: f64,
) -> Option<Corner> {
    Corner::ALL
        .into_iter()
        .map(|c| {
            let d = viewport.to_display(corners.get(c)).distance(display_point);
            (c, d)
        })
        .filter(|&(_, d)| d <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
}

/// Whether a corner handle is being dragged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DragState {
    /// No drag in progress.
    #[default]
    Idle,
    /// The given corner follows the pointer.
    Dragging(Corner),
}

/// Drag interaction over one viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerDrag {
    viewport: Viewport,
    state: DragState,
}

impl CornerDrag {
    /// An idle drag controller for `viewport`.
    #[must_use]
    pub const fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            state: DragState::Idle,
        }
    }

    /// Current drag state.
    #[must_use]
    pub const fn state(&self) -> DragState {
        self.state
    }

    /// The viewport pointer events are interpreted in.
    #[must_use]
    pub const fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Replace the viewport, e.g. after the container is resized.
    pub const fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Start dragging `corner`.
    pub const fn begin(&mut self, corner: Corner) {
        self.state = DragState::Dragging(corner);
    }

    /// Hit-test a pointer-down and start dragging the corner under it.
    ///
    /// Returns the grabbed corner, or `None` (staying idle) when no
    /// handle is within `radius`.
    pub fn pointer_down(&mut self, corners: &CornerSet, display_point: Point, radius: f64) -> Option<Corner> {
        let hit = nearest_corner(corners, display_point, &self.viewport, radius)?;
        self.begin(hit);
        Some(hit)
    }

    /// Move the dragged corner to the (clamped, remapped) pointer.
    ///
    /// Returns the updated corners, tagged manual. When idle the corners
    /// are returned unchanged.
    #[must_use]
    pub fn move_pointer(&self, corners: &CornerSet, display_point: Point) -> CornerSet {
        match self.state {
            DragState::Idle => *corners,
            DragState::Dragging(corner) => {
                corners.with_corner(corner, clamp_and_remap(display_point, &self.viewport))
            }
        }
    }

    /// Finish the drag.
    pub const fn end(&mut self) {
        self.state = DragState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corners::CornerOrigin;

    /// 200x100 image in a 400x400 container: scale 2, vertical bars of 100.
    fn viewport() -> Viewport {
        Viewport::new(400.0, 400.0, Dimensions::new(200, 100))
    }

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn letterbox_scale_and_offset() {
        let v = viewport();
        assert_eq!(v.scale(), Some(2.0));
        assert!(close(v.offset(), Point::new(0.0, 100.0)));
    }

    #[test]
    fn pillarbox_offset() {
        let v = Viewport::new(300.0, 100.0, Dimensions::new(100, 100));
        assert_eq!(v.scale(), Some(1.0));
        assert!(close(v.offset(), Point::new(100.0, 0.0)));
    }

    #[test]
    fn to_source_and_back() {
        let v = viewport();
        let display = Point::new(150.0, 180.0);
        let source = v.to_source(display);
        assert!(close(source, Point::new(75.0, 40.0)));
        assert!(close(v.to_display(source), display));
    }

    #[test]
    fn clamp_into_image() {
        let v = viewport();
        // Above the letterboxed image, past the right edge.
        assert!(close(clamp_and_remap(Point::new(500.0, 20.0), &v), Point::new(200.0, 0.0)));
        assert!(close(clamp_and_remap(Point::new(-50.0, 390.0), &v), Point::new(0.0, 100.0)));
        assert!(close(clamp_and_remap(Point::new(f64::NAN, 200.0), &v), Point::new(0.0, 50.0)));
    }

    #[test]
    fn degenerate_viewport_is_identity() {
        let v = Viewport::new(0.0, 0.0, Dimensions::new(10, 10));
        assert_eq!(v.scale(), None);
        assert_eq!(v.to_source(Point::new(3.0, 4.0)), Point::new(3.0, 4.0));
    }

    #[test]
    fn nearest_corner_within_radius() {
        let v = viewport();
        let corners = CornerSet::default_inset(v.image);
        // Top-left at source (20, 10) → display (40, 120).
        assert_eq!(
            nearest_corner(&corners, Point::new(45.0, 118.0), &v, 20.0),
            Some(Corner::TopLeft)
        );
        assert_eq!(nearest_corner(&corners, Point::new(200.0, 200.0), &v, 20.0), None);
    }

    #[test]
    fn drag_moves_only_the_grabbed_corner() {
        let v = viewport();
        let corners = CornerSet::default_inset(v.image);
        let mut drag = CornerDrag::new(v);

        assert_eq!(drag.move_pointer(&corners, Point::new(0.0, 0.0)), corners);

        // Bottom-right at source (180, 90) → display (360, 280).
        assert_eq!(
            drag.pointer_down(&corners, Point::new(362.0, 281.0), 15.0),
            Some(Corner::BottomRight)
        );
        assert_eq!(drag.state(), DragState::Dragging(Corner::BottomRight));

        let moved = drag.move_pointer(&corners, Point::new(380.0, 290.0));
        assert!(close(moved.get(Corner::BottomRight), Point::new(190.0, 95.0)));
        assert_eq!(moved.get(Corner::TopLeft), corners.get(Corner::TopLeft));
        assert_eq!(moved.origin(), CornerOrigin::Manual);

        drag.end();
        assert_eq!(drag.state(), DragState::Idle);
    }

    #[test]
    fn drag_clamps_to_image_bounds() {
        let v = viewport();
        let corners = CornerSet::default_inset(v.image);
        let mut drag = CornerDrag::new(v);
        drag.begin(Corner::TopRight);
        let moved = drag.move_pointer(&corners, Point::new(999.0, -999.0));
        assert!(close(moved.get(Corner::TopRight), Point::new(200.0, 0.0)));
    }

    #[test]
    fn missed_pointer_down_stays_idle() {
        let v = viewport();
        let corners = CornerSet::default_inset(v.image);
        let mut drag = CornerDrag::new(v);
        assert_eq!(drag.pointer_down(&corners, Point::new(200.0, 200.0), 10.0), None);
        assert_eq!(drag.state(), DragState::Idle);
    }
}
