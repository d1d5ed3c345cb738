//! Ramer-Douglas-Peucker simplification for open chains and closed
//! contours.
//!
//! The polygon-approximation corner estimator calls
//! [`simplify_closed`] with a tolerance proportional to the contour's
//! perimeter and looks for a four-vertex result.

use crate::types::{Contour, Point};

/// Simplify an open chain. The first and last points are always kept.
///
/// Points within `tolerance` pixels of the segment between their kept
/// neighbours are removed. Chains with fewer than 3 points are returned
/// unchanged.
#[must_use = "returns the simplified chain"]
pub fn simplify_open(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;

    rdp_recurse(points, 0, points.len() - 1, tolerance, &mut kept);

    points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect()
}

/// Simplify a closed contour into polygon vertices.
///
/// The contour is split at a pair of mutually distant points (the point
/// farthest from the first point, and the point farthest from that);
/// both arcs are simplified as open chains and joined in contour order.
/// Splitting at extremes keeps the split points on true corners of
/// convex shapes. The closing segment is implied, so the result never
/// repeats its first vertex.
#[must_use = "returns the polygon vertices"]
pub fn simplify_closed(contour: &Contour, tolerance: f64) -> Vec<Point> {
    let points = contour.points();
    if points.len() < 3 {
        return points.to_vec();
    }

    let a = farthest_from(points, points[0]);
    let b = farthest_from(points, points[a]);
    let (i, j) = (a.min(b), a.max(b));
    if i == j {
        // Every point coincides.
        return vec![points[i]];
    }

    let forward = &points[i..=j];
    let mut backward = points[j..].to_vec();
    backward.extend_from_slice(&points[..=i]);

    let mut vertices = simplify_open(forward, tolerance);
    vertices.pop();
    let mut rest = simplify_open(&backward, tolerance);
    rest.pop();
    vertices.extend(rest);
    vertices
}

/// Index of the first point at maximum distance from `anchor`.
fn farthest_from(points: &[Point], anchor: Point) -> usize {
    points
        .iter()
        .enumerate()
        .fold((0, 0.0), |(best, best_d), (i, p)| {
            let d = anchor.distance_squared(*p);
            if d > best_d { (i, d) } else { (best, best_d) }
        })
        .0
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// segment between them. If that distance exceeds `tolerance`, the point
/// is kept and both halves are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from `p` to the line through `a` and `b`, or
/// the distance to `a` when the two coincide.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Closed square boundary with one point per unit step, starting at
    /// the top-left and running clockwise.
    fn square_contour(x0: f64, y0: f64, side: u32) -> Contour {
        let s = f64::from(side);
        let mut pts = Vec::new();
        for i in 0..side {
            pts.push(Point::new(x0 + f64::from(i), y0));
        }
        for i in 0..side {
            pts.push(Point::new(x0 + s, y0 + f64::from(i)));
        }
        for i in 0..side {
            pts.push(Point::new(x0 + s - f64::from(i), y0 + s));
        }
        for i in 0..side {
            pts.push(Point::new(x0, y0 + s - f64::from(i)));
        }
        Contour::new(pts)
    }

    #[test]
    fn short_chains_unchanged() {
        assert!(simplify_open(&[], 1.0).is_empty());
        let two = [Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        assert_eq!(simplify_open(&two, 1.0), two.to_vec());
    }

    #[test]
    fn collinear_points_collapse_to_endpoints() {
        let pts: Vec<Point> = (0..5).map(|i| Point::new(f64::from(i), f64::from(i))).collect();
        let result = simplify_open(&pts, 0.1);
        assert_eq!(result, vec![Point::new(0.0, 0.0), Point::new(4.0, 4.0)]);
    }

    #[test]
    fn zigzag_peaks_depend_on_tolerance() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(2.0, 5.0),
            Point::new(4.0, 0.0),
            Point::new(6.0, 5.0),
            Point::new(8.0, 0.0),
        ];
        assert_eq!(simplify_open(&pts, 1.0).len(), 5);
        assert_eq!(simplify_open(&pts, 10.0).len(), 2);
    }

    #[test]
    fn closed_square_reduces_to_four_corners() {
        let contour = square_contour(10.0, 20.0, 50);
        let vertices = simplify_closed(&contour, 0.01 * contour.arc_length());
        assert_eq!(
            vertices,
            vec![
                Point::new(10.0, 20.0),
                Point::new(60.0, 20.0),
                Point::new(60.0, 70.0),
                Point::new(10.0, 70.0),
            ]
        );
    }

    #[test]
    fn closed_result_does_not_repeat_first_vertex() {
        let contour = square_contour(0.0, 0.0, 8);
        let vertices = simplify_closed(&contour, 0.5);
        assert_eq!(vertices.first(), Some(&Point::new(0.0, 0.0)));
        assert_ne!(vertices.last(), Some(&Point::new(0.0, 0.0)));
    }

    #[test]
    fn closed_huge_tolerance_keeps_split_points_only() {
        let contour = square_contour(0.0, 0.0, 20);
        let vertices = simplify_closed(&contour, 1000.0);
        assert_eq!(vertices, vec![Point::new(0.0, 0.0), Point::new(20.0, 20.0)]);
    }

    #[test]
    fn degenerate_closed_contour() {
        let same = Contour::new(vec![Point::new(3.0, 3.0); 5]);
        assert_eq!(simplify_closed(&same, 1.0), vec![Point::new(3.0, 3.0)]);
    }

    #[test]
    fn perpendicular_distance_basic() {
        let d = perpendicular_distance(
            Point::new(5.0, 3.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
        );
        assert!((d - 3.0).abs() < 1e-10);
        let coincident =
            perpendicular_distance(Point::new(3.0, 4.0), Point::new(0.0, 0.0), Point::new(0.0, 0.0));
        assert!((coincident - 5.0).abs() < 1e-10);
    }
}
