//! Corner validation: accept a candidate quadrilateral or substitute the
//! default inset rectangle.

use tracing::{debug, warn};

use crate::corners::{CornerOrigin, CornerSet};
use crate::types::{Dimensions, Fallback, Point};

/// Outcome of validating a corner candidate.
///
/// `corners` is always usable. When `fallback` is `Some`, the candidate
/// was rejected and `corners` is the default inset rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Validation {
    /// Accepted or substituted corners.
    pub corners: CornerSet,
    /// Why the candidate was rejected, if it was.
    pub fallback: Option<Fallback>,
}

/// Validate a corner candidate against the image bounds.
///
/// Rejects `None` ([`Fallback::DetectionFailure`]), any non-finite or
/// out-of-bounds coordinate, any pair of corners closer than
/// `min_separation × min(w, h)`, and an enclosed area below
/// `min_area_fraction × w × h` ([`Fallback::GeometryInvalid`]).
#[must_use]
pub fn validate(
    candidate: Option<[Point; 4]>,
    dims: Dimensions,
    min_separation: f64,
    min_area_fraction: f64,
) -> Validation {
    let reject = |reason: Fallback| {
        warn!(%reason, ?candidate, "corner candidate rejected, using default rectangle");
        Validation {
            corners: CornerSet::default_inset(dims),
            fallback: Some(reason),
        }
    };

    let Some(points) = candidate else {
        return reject(Fallback::DetectionFailure);
    };

    if let Some(p) = points.iter().find(|p| !dims.contains(**p)) {
        debug!(x = p.x, y = p.y, "corner outside image");
        return reject(Fallback::GeometryInvalid);
    }

    let corners = CornerSet::new(points, CornerOrigin::Detected);
    let min_dist = min_separation * dims.shorter_dim();
    let closest = corners.min_pairwise_distance();
    if closest < min_dist {
        debug!(closest, min_dist, "corners too close together");
        return reject(Fallback::GeometryInvalid);
    }

    let min_area = min_area_fraction * f64::from(dims.width) * f64::from(dims.height);
    let area = corners.area();
    if area < min_area {
        debug!(area, min_area, "corners enclose too little area");
        return reject(Fallback::GeometryInvalid);
    }

    debug!(closest, area, "corner candidate accepted");
    Validation {
        corners,
        fallback: None,
    }
}
