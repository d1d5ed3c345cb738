//! Corner candidate estimation from the document contour.
//!
//! Two strategies reduce the longest contour to four candidate points:
//!
//! - [`FarthestPoint`]: the four contour points farthest from the
//!   contour's centroid, spaced apart by a minimum distance.
//! - [`PolygonApprox`]: closed Ramer-Douglas-Peucker at increasing
//!   tolerances until exactly four vertices remain.
//!
//! Neither strategy validates its output; that is the job of
//! [`crate::validate`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corners::order_clockwise;
use crate::simplify::simplify_closed;
use crate::types::{Contour, Dimensions, Point};

/// Trait for corner estimation strategies.
///
/// Returns four points in top-left, top-right, bottom-right, bottom-left
/// order, or `None` when the contour cannot be reduced to four corners.
pub trait QuadEstimator {
    /// Estimate four corners of the document outlined by `contour`.
    fn estimate(&self, contour: &Contour, dims: Dimensions) -> Option<[Point; 4]>;
}

/// Available corner estimation strategies, selectable from config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuadEstimatorKind {
    /// Greedy farthest-from-centroid selection.
    FarthestPoint,
    /// Iterative polygon approximation.
    #[default]
    PolygonApprox,
}

/// Pick the four contour points farthest from the centroid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FarthestPoint {
    /// Minimum pairwise spacing of the chosen points, as a fraction of
    /// the shorter image side.
    pub separation: f64,
}

impl QuadEstimator for FarthestPoint {
    fn estimate(&self, contour: &Contour, dims: Dimensions) -> Option<[Point; 4]> {
        let centroid = contour.centroid()?;
        let min_dist = self.separation * dims.shorter_dim();

        let mut ranked: Vec<(f64, Point)> = contour
            .points()
            .iter()
            .map(|&p| (p.distance_squared(centroid), p))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut chosen: Vec<Point> = Vec::with_capacity(4);
        for (_, p) in ranked {
            if chosen.iter().all(|c| c.distance(p) >= min_dist) {
                chosen.push(p);
                if chosen.len() == 4 {
                    break;
                }
            }
        }

        let Ok(chosen) = <[Point; 4]>::try_from(chosen) else {
            debug!(min_dist, "fewer than four spaced candidates");
            return None;
        };
        Some(order_above_below(chosen))
    }
}

/// Reduce the contour with closed RDP until four vertices remain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolygonApprox;

impl PolygonApprox {
    /// Tolerances tried, as fractions of the contour perimeter.
    const FRACTIONS: [f64; 10] = [0.01, 0.02, 0.03, 0.04, 0.05, 0.06, 0.07, 0.08, 0.09, 0.10];
}

impl QuadEstimator for PolygonApprox {
    fn estimate(&self, contour: &Contour, _dims: Dimensions) -> Option<[Point; 4]> {
        if contour.len() < 4 {
            return None;
        }
        let perimeter = contour.arc_length();

        for fraction in Self::FRACTIONS {
            let vertices = simplify_closed(contour, fraction * perimeter);
            match vertices.len() {
                4 => {
                    debug!(fraction, "polygon approximation found a quadrilateral");
                    let quad: [Point; 4] = vertices.try_into().ok()?;
                    return Some(order_clockwise(quad));
                }
                n @ 3..=6 => debug!(fraction, vertices = n, "near-quadrilateral, continuing"),
                n => debug!(fraction, vertices = n, "approximation rejected"),
            }
        }
        None
    }
}

/// Order four points: those above their common centre by ascending x,
/// then those below by descending x.
fn order_above_below(points: [Point; 4]) -> [Point; 4] {
    let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;

    let (mut above, mut below): (Vec<Point>, Vec<Point>) = points.iter().partition(|p| p.y < cy);
    above.sort_by(|a, b| a.x.total_cmp(&b.x));
    below.sort_by(|a, b| b.x.total_cmp(&a.x));

    let mut ordered = points;
    for (slot, p) in ordered.iter_mut().zip(above.into_iter().chain(below)) {
        *slot = p;
    }
    ordered
}
