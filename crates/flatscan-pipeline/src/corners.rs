//! The four-corner quadrilateral shared by automatic detection and
//! manual adjustment.
//!
//! A [`CornerSet`] is purely geometric: four points in source-image pixel
//! space, ordered top-left, top-right, bottom-right, bottom-left, plus a
//! tag recording where they came from. Interaction state (which corner is
//! being dragged) lives in [`crate::manual::DragState`], never here.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, Point};

/// Inset of the default rectangle from each image edge, as a fraction
/// of the corresponding side.
pub const DEFAULT_INSET: f64 = 0.1;

/// One of the four corners, in clockwise order from top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    /// Index 0.
    TopLeft,
    /// Index 1.
    TopRight,
    /// Index 2.
    BottomRight,
    /// Index 3.
    BottomLeft,
}

impl Corner {
    /// All corners in storage order.
    pub const ALL: [Self; 4] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomRight,
        Self::BottomLeft,
    ];

    /// Position of this corner in [`CornerSet::points`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::TopLeft => 0,
            Self::TopRight => 1,
            Self::BottomRight => 2,
            Self::BottomLeft => 3,
        }
    }

    /// Corner at a storage index, or `None` if `index > 3`.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::TopLeft),
            1 => Some(Self::TopRight),
            2 => Some(Self::BottomRight),
            3 => Some(Self::BottomLeft),
            _ => None,
        }
    }
}

/// Where a [`CornerSet`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CornerOrigin {
    /// Found by contour analysis and accepted by the validator.
    Detected,
    /// The default inset rectangle, substituted after a rejection.
    Fallback,
    /// Supplied by the user; not re-validated.
    Manual,
}

/// Exactly four corners in TL, TR, BR, BL order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerSet {
    points: [Point; 4],
    origin: CornerOrigin,
}

impl CornerSet {
    /// Create a corner set from already-ordered points.
    #[must_use]
    pub const fn new(points: [Point; 4], origin: CornerOrigin) -> Self {
        Self { points, origin }
    }

    /// User-supplied corners. These bypass validation.
    #[must_use]
    pub const fn manual(points: [Point; 4]) -> Self {
        Self::new(points, CornerOrigin::Manual)
    }

    /// The default inset rectangle: corners at 10% / 90% of each side.
    #[must_use]
    pub fn default_inset(dims: Dimensions) -> Self {
        let w = f64::from(dims.width);
        let h = f64::from(dims.height);
        let (lo, hi) = (DEFAULT_INSET, 1.0 - DEFAULT_INSET);
        Self::new(
            [
                Point::new(lo * w, lo * h),
                Point::new(hi * w, lo * h),
                Point::new(hi * w, hi * h),
                Point::new(lo * w, hi * h),
            ],
            CornerOrigin::Fallback,
        )
    }

    /// The full image rectangle `(0,0),(w,0),(w,h),(0,h)`.
    #[must_use]
    pub fn full_frame(dims: Dimensions) -> Self {
        let w = f64::from(dims.width);
        let h = f64::from(dims.height);
        Self::manual([
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ])
    }

    /// The four points in TL, TR, BR, BL order.
    #[must_use]
    pub const fn points(&self) -> &[Point; 4] {
        &self.points
    }

    /// Where these corners came from.
    #[must_use]
    pub const fn origin(&self) -> CornerOrigin {
        self.origin
    }

    /// The point at one corner.
    #[must_use]
    pub const fn get(&self, corner: Corner) -> Point {
        self.points[corner.index()]
    }

    /// Copy with one corner moved. The result is tagged [`CornerOrigin::Manual`].
    #[must_use]
    pub fn with_corner(&self, corner: Corner, point: Point) -> Self {
        let mut points = self.points;
        points[corner.index()] = point;
        Self::manual(points)
    }

    /// Axis-aligned bounding box of the four corners.
    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for p in &self.points {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        bbox
    }

    /// Smallest distance between any two of the four corners.
    #[must_use]
    pub fn min_pairwise_distance(&self) -> f64 {
        let mut min = f64::INFINITY;
        for i in 0..4 {
            for j in (i + 1)..4 {
                min = min.min(self.points[i].distance(self.points[j]));
            }
        }
        min
    }

    /// Area enclosed by the quadrilateral (shoelace formula).
    #[must_use]
    pub fn area(&self) -> f64 {
        let p = &self.points;
        let twice: f64 = (0..4)
            .map(|i| {
                let a = p[i];
                let b = p[(i + 1) % 4];
                a.x.mul_add(b.y, -(b.x * a.y))
            })
            .sum();
        twice.abs() / 2.0
    }
}

/// Axis-aligned rectangle in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub min_x: f64,
    /// Top edge.
    pub min_y: f64,
    /// Right edge.
    pub max_x: f64,
    /// Bottom edge.
    pub max_y: f64,
}

impl BoundingBox {
    /// `max_x - min_x`.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// `max_y - min_y`.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Corners in TL, TR, BR, BL order.
    #[must_use]
    pub const fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.min_x, self.min_y),
            Point::new(self.max_x, self.min_y),
            Point::new(self.max_x, self.max_y),
            Point::new(self.min_x, self.max_y),
        ]
    }
}

/// Put four arbitrary points into TL, TR, BR, BL order.
///
/// Points are sorted clockwise (in +Y-down image space) by angle around
/// their centroid, then rotated so the point with the smallest `x + y`
/// comes first.
#[must_use]
pub fn order_clockwise(mut points: [Point; 4]) -> [Point; 4] {
    let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;

    // atan2 in +Y-down space increases clockwise on screen.
    points.sort_by(|a, b| {
        let ta = (a.y - cy).atan2(a.x - cx);
        let tb = (b.y - cy).atan2(b.x - cx);
        ta.total_cmp(&tb)
    });

    let start = points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (a.x + a.y).total_cmp(&(b.x + b.y)))
        .map_or(0, |(i, _)| i);
    points.rotate_left(start);
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> [Point; 4] {
        [
            Point::new(10.0, 10.0),
            Point::new(90.0, 10.0),
            Point::new(90.0, 90.0),
            Point::new(10.0, 90.0),
        ]
    }

    #[test]
    fn default_inset_is_ten_percent() {
        let set = CornerSet::default_inset(Dimensions::new(200, 100));
        assert_eq!(set.get(Corner::TopLeft), Point::new(20.0, 10.0));
        assert_eq!(set.get(Corner::TopRight), Point::new(180.0, 10.0));
        assert_eq!(set.get(Corner::BottomRight), Point::new(180.0, 90.0));
        assert_eq!(set.get(Corner::BottomLeft), Point::new(20.0, 90.0));
        assert_eq!(set.origin(), CornerOrigin::Fallback);
    }

    #[test]
    fn corner_index_round_trip() {
        for corner in Corner::ALL {
            assert_eq!(Corner::from_index(corner.index()), Some(corner));
        }
        assert_eq!(Corner::from_index(4), None);
    }

    #[test]
    fn bounding_box_of_skewed_quad() {
        let set = CornerSet::manual([
            Point::new(12.0, 5.0),
            Point::new(80.0, 15.0),
            Point::new(95.0, 70.0),
            Point::new(3.0, 60.0),
        ]);
        let bbox = set.bounding_box();
        assert!((bbox.width() - 92.0).abs() < f64::EPSILON);
        assert!((bbox.height() - 65.0).abs() < f64::EPSILON);
    }

    #[test]
    fn min_pairwise_distance_finds_closest_pair() {
        let mut pts = square();
        pts[1] = Point::new(13.0, 14.0);
        let set = CornerSet::manual(pts);
        assert!((set.min_pairwise_distance() - 5.0).abs() < 1e-10);
    }

    #[test]
    fn area_of_square() {
        let set = CornerSet::manual(square());
        assert!((set.area() - 6400.0).abs() < 1e-9);
    }

    #[test]
    fn with_corner_moves_one_point_and_marks_manual() {
        let set = CornerSet::default_inset(Dimensions::new(100, 100));
        let moved = set.with_corner(Corner::BottomRight, Point::new(95.0, 96.0));
        assert_eq!(moved.get(Corner::BottomRight), Point::new(95.0, 96.0));
        assert_eq!(moved.get(Corner::TopLeft), set.get(Corner::TopLeft));
        assert_eq!(moved.origin(), CornerOrigin::Manual);
    }

    #[test]
    fn order_clockwise_from_shuffled() {
        let [tl, tr, br, bl] = square();
        assert_eq!(order_clockwise([br, tl, bl, tr]), square());
        assert_eq!(order_clockwise([bl, br, tr, tl]), square());
    }

    #[test]
    fn order_clockwise_rotated_quad() {
        // A diamond-ish quad tilted slightly clockwise.
        let tl = Point::new(30.0, 10.0);
        let tr = Point::new(100.0, 30.0);
        let br = Point::new(80.0, 100.0);
        let bl = Point::new(10.0, 80.0);
        assert_eq!(order_clockwise([br, bl, tr, tl]), [tl, tr, br, bl]);
    }
}
