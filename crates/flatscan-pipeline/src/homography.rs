//! Planar homographies from four point correspondences.
//!
//! The 3×3 matrix is stored row-major with `h[8]` normalised to 1. It is
//! computed by solving the standard 8×8 direct linear system with
//! Gaussian elimination and partial pivoting, and inverted through the
//! adjugate.

use crate::types::Point;

/// Pivots and determinants smaller than this (relative to the matrix
/// scale) are treated as singular.
const SINGULAR_EPS: f64 = 1e-12;

/// A projective map of the plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(pub [f64; 9]);

impl Homography {
    /// The identity map.
    pub const IDENTITY: Self = Self([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    /// The homography taking each `src[i]` to `dst[i]`.
    ///
    /// Returns `None` when the system is singular (three collinear points,
    /// repeated points) or the solution is not finite.
    #[must_use]
    pub fn from_quad(src: &[Point; 4], dst: &[Point; 4]) -> Option<Self> {
        let mut a = [[0.0f64; 9]; 8];
        for (i, (s, d)) in src.iter().zip(dst).enumerate() {
            a[2 * i] = [s.x, s.y, 1.0, 0.0, 0.0, 0.0, -d.x * s.x, -d.x * s.y, d.x];
            a[2 * i + 1] = [0.0, 0.0, 0.0, s.x, s.y, 1.0, -d.y * s.x, -d.y * s.y, d.y];
        }

        let h = solve8(a)?;
        let m = Self([h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0]);
        m.is_finite().then_some(m)
    }

    /// The inverse map, or `None` if the matrix is singular.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let m = &self.0;
        let adj = [
            m[4] * m[8] - m[5] * m[7],
            m[2] * m[7] - m[1] * m[8],
            m[1] * m[5] - m[2] * m[4],
            m[5] * m[6] - m[3] * m[8],
            m[0] * m[8] - m[2] * m[6],
            m[2] * m[3] - m[0] * m[5],
            m[3] * m[7] - m[4] * m[6],
            m[1] * m[6] - m[0] * m[7],
            m[0] * m[4] - m[1] * m[3],
        ];
        let det = m[0] * adj[0] + m[1] * adj[3] + m[2] * adj[6];
        let scale = m.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        if !det.is_finite() || det.abs() <= SINGULAR_EPS * scale.powi(3) {
            return None;
        }

        // Scale so the bottom-right entry is 1; any non-zero multiple is
        // the same projective map.
        let norm = if adj[8].abs() > SINGULAR_EPS { adj[8] } else { det };
        let inv = Self(adj.map(|v| v / norm));
        inv.is_finite().then_some(inv)
    }

    /// Map a point. Returns `None` when it lands on the line at infinity.
    #[must_use]
    pub fn apply(&self, p: Point) -> Option<Point> {
        let m = &self.0;
        let w = m[6].mul_add(p.x, m[7].mul_add(p.y, m[8]));
        if w.abs() < SINGULAR_EPS {
            return None;
        }
        let x = m[0].mul_add(p.x, m[1].mul_add(p.y, m[2])) / w;
        let y = m[3].mul_add(p.x, m[4].mul_add(p.y, m[5])) / w;
        let out = Point::new(x, y);
        out.is_finite().then_some(out)
    }

    /// Returns `true` if every entry is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

/// Solve the 8×8 system whose augmented matrix is `a` (last column is the
/// right-hand side).
fn solve8(mut a: [[f64; 9]; 8]) -> Option<[f64; 8]> {
    let scale = a
        .iter()
        .flat_map(|row| row[..8].iter())
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let eps = SINGULAR_EPS * scale;

    for col in 0..8 {
        let pivot = (col..8).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() <= eps {
            return None;
        }
        a.swap(col, pivot);

        for row in (col + 1)..8 {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..9 {
                a[row][k] -= factor * a[col][k];
            }
        }
    }

    let mut x = [0.0f64; 8];
    for row in (0..8).rev() {
        let tail: f64 = ((row + 1)..8).map(|k| a[row][k] * x[k]).sum();
        x[row] = (a[row][8] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn unit_square(s: f64) -> [Point; 4] {
        [
            Point::new(0.0, 0.0),
            Point::new(s, 0.0),
            Point::new(s, s),
            Point::new(0.0, s),
        ]
    }

    fn assert_close(a: Point, b: Point) {
        assert!(
            (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn identity_from_equal_quads() {
        let q = unit_square(100.0);
        let h = Homography::from_quad(&q, &q).unwrap();
        for (a, b) in h.0.iter().zip(Homography::IDENTITY.0.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn maps_corners_exactly() {
        let src = [
            Point::new(31.0, 12.0),
            Point::new(410.0, 40.0),
            Point::new(380.0, 500.0),
            Point::new(12.0, 470.0),
        ];
        let dst = unit_square(300.0);
        let h = Homography::from_quad(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            assert_close(h.apply(*s).unwrap(), *d);
        }
    }

    #[test]
    fn inverse_round_trips() {
        let src = [
            Point::new(50.0, 20.0),
            Point::new(260.0, 35.0),
            Point::new(240.0, 310.0),
            Point::new(30.0, 280.0),
        ];
        let dst = unit_square(200.0);
        let h = Homography::from_quad(&src, &dst).unwrap();
        let inv = h.inverse().unwrap();
        assert!((inv.0[8] - 1.0).abs() < 1e-12);
        for d in &dst {
            let back = inv.apply(*d).unwrap();
            assert_close(h.apply(back).unwrap(), *d);
        }
        let mid = Point::new(140.0, 160.0);
        assert_close(inv.apply(h.apply(mid).unwrap()).unwrap(), mid);
    }

    #[test]
    fn pure_translation_and_scale() {
        let src = unit_square(10.0);
        let dst = [
            Point::new(5.0, 7.0),
            Point::new(25.0, 7.0),
            Point::new(25.0, 27.0),
            Point::new(5.0, 27.0),
        ];
        let h = Homography::from_quad(&src, &dst).unwrap();
        assert_close(h.apply(Point::new(5.0, 5.0)).unwrap(), Point::new(15.0, 17.0));
    }

    #[test]
    fn collinear_source_is_singular() {
        let src = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(20.0, 20.0),
            Point::new(30.0, 30.0),
        ];
        assert_eq!(Homography::from_quad(&src, &unit_square(10.0)), None);
    }

    #[test]
    fn repeated_points_are_singular() {
        let p = Point::new(4.0, 4.0);
        assert_eq!(Homography::from_quad(&[p; 4], &unit_square(10.0)), None);
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let h = Homography([1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0]);
        assert_eq!(h.inverse(), None);
    }

    #[test]
    fn apply_rejects_points_at_infinity() {
        let h = Homography([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, -5.0]);
        assert_eq!(h.apply(Point::new(5.0, 3.0)), None);
    }
}
