//! flatscan-pipeline: Pure document detection and rectification (sans-IO).
//!
//! Turns a photo of a paper page into an upright, cropped, contrast
//! enhanced image through:
//! grayscale -> blur -> edge detection -> contour tracing ->
//! corner estimation -> validation -> rectification -> enhancement.
//!
//! Every stage is total. Failed detections and refused warps degrade to a
//! safe substitute (default corners, or the original image passed
//! through) and are reported as [`Fallback`] values next to the result.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! bitmaps and returns structured data. Browser and filesystem
//! interaction lives in `flatscan-worker` and `flatscan-bench`.

pub mod blur;
pub mod contour;
pub mod corners;
pub mod diagnostics;
pub mod edge;
pub mod encode;
pub mod enhance;
pub mod grayscale;
pub mod homography;
pub mod manual;
pub mod overlay;
pub mod page;
pub mod pipeline;
pub mod quad;
pub mod rectify;
pub mod simplify;
pub mod types;
pub mod validate;

pub use corners::{Corner, CornerOrigin, CornerSet};
pub use edge::EdgeDetector;
pub use page::{CaptureSession, Page, PageStatus};
pub use pipeline::Pipeline;
pub use quad::{QuadEstimator, QuadEstimatorKind};
pub use rectify::WarpKind;
pub use types::{
    Contour, Dimensions, Fallback, GrayImage, Point, RgbaImage, ScanConfig, ScanError, ScanOutcome,
    StagedResult,
};

/// Scan one page with automatic corner detection.
///
/// # Pipeline steps
///
/// 1. Luminance conversion
/// 2. 3×3 smoothing
/// 3. Canny edge detection
/// 4. Contour tracing
/// 5. Corner estimation on the longest contour (configured strategy)
/// 6. Validation, substituting the default inset on rejection
/// 7. Perspective rectification (or pass-through)
/// 8. Contrast/brightness enhancement of the rectified page
///
/// A zero-sized `image` is returned unchanged with
/// [`Fallback::StageInputInvalid`].
#[must_use]
pub fn scan(image: &RgbaImage, config: &ScanConfig) -> ScanOutcome {
    scan_staged(image, config).into_outcome()
}

/// Scan one page using user-supplied corners, skipping detection.
///
/// The corners are tagged [`CornerOrigin::Manual`] and are not
/// validated; rectification can still refuse them.
#[must_use]
pub fn scan_with_corners(image: &RgbaImage, corners: CornerSet, config: &ScanConfig) -> ScanOutcome {
    scan_staged_with_corners(image, corners, config).into_outcome()
}

/// Like [`scan`], but keeps every intermediate for inspection.
#[must_use]
pub fn scan_staged(image: &RgbaImage, config: &ScanConfig) -> StagedResult {
    if let Some(empty) = reject_empty(image) {
        return empty;
    }
    Pipeline::new(image.clone(), config.clone())
        .grayscale()
        .blur()
        .detect_edges()
        .trace_contours()
        .estimate_corners()
        .validate()
        .rectify()
        .enhance()
        .into_result()
}

/// Like [`scan_with_corners`], but keeps every intermediate for
/// inspection. Detection rasters are empty.
#[must_use]
pub fn scan_staged_with_corners(image: &RgbaImage, corners: CornerSet, config: &ScanConfig) -> StagedResult {
    if let Some(mut empty) = reject_empty(image) {
        empty.corners = CornerSet::manual(*corners.points());
        return empty;
    }
    Pipeline::new(image.clone(), config.clone())
        .with_corners(corners)
        .rectify()
        .enhance()
        .into_result()
}

/// Pass-through result for a zero-sized bitmap, or `None` if the image
/// has pixels.
fn reject_empty(image: &RgbaImage) -> Option<StagedResult> {
    let dimensions = Dimensions::of(image);
    if !dimensions.is_empty() {
        return None;
    }
    tracing::warn!(
        width = dimensions.width,
        height = dimensions.height,
        "empty input, skipping scan"
    );
    Some(StagedResult {
        original: image.clone(),
        grayscale: GrayImage::new(0, 0),
        blurred: GrayImage::new(0, 0),
        edges: GrayImage::new(0, 0),
        contours: Vec::new(),
        candidate: None,
        corners: CornerSet::default_inset(dimensions),
        rectified: None,
        output: image.clone(),
        fallbacks: vec![Fallback::StageInputInvalid],
        dimensions,
    })
}
