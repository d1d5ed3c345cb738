//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! [`crate::scan`] runs every stage in one call. [`Pipeline`] lets the
//! caller drive execution one step at a time:
//!
//! ```rust
//! # use flatscan_pipeline::{Pipeline, ScanConfig, RgbaImage};
//! # fn run(image: RgbaImage) {
//! let staged = Pipeline::new(image, ScanConfig::default())
//!     .grayscale()
//!     .blur()
//!     .detect_edges()
//!     .trace_contours()
//!     .estimate_corners()
//!     .validate()
//!     .rectify()
//!     .enhance()
//!     .into_result();
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state, carrying
//! every previously computed intermediate. Skipping or reordering stages
//! is a compile error. The stages never fail: rejected detections and
//! refused warps are recorded as [`Fallback`] values and the pipeline
//! continues with a safe substitute.
//!
//! Two seams let callers replace a strategy for a single run:
//! [`Blurred::detect_edges_with`] and
//! [`ContoursTraced::estimate_corners_with`]. Manual corners enter either
//! at the start ([`Pending::with_corners`], skipping detection entirely)
//! or after validation ([`CornersValidated::override_corners`]).

use tracing::{debug, info};

use crate::corners::CornerSet;
use crate::diagnostics::StageMetrics;
use crate::edge::{CannyDetector, EdgeDetector};
use crate::quad::{FarthestPoint, PolygonApprox, QuadEstimator, QuadEstimatorKind};
use crate::rectify::{RectifyOptions, RectifyResult, WarpKind};
use crate::types::{
    Contour, Dimensions, Fallback, GrayImage, Point, RgbaImage, ScanConfig, StagedResult,
};

/// Total number of stages in the pipeline, `Pending` included.
pub const STAGE_COUNT: usize = 9;

/// Shared read access to every stage.
///
/// Used by [`crate::diagnostics`] to label and measure stages without
/// knowing their concrete types.
pub trait PipelineStage {
    /// Human-readable stage name.
    const NAME: &'static str;
    /// Zero-based position in the pipeline.
    const INDEX: usize;

    /// Metrics describing the work done to reach this stage, or `None`
    /// for [`Pending`].
    fn metrics(&self) -> Option<StageMetrics>;
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing, call .grayscale() to continue"]
pub struct Pending {
    config: ScanConfig,
    original: RgbaImage,
}

impl Pending {
    /// The source image.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// Convert to luminance and advance to [`Grayscaled`].
    pub fn grayscale(self) -> Grayscaled {
        let grayscale = crate::grayscale::to_grayscale(&self.original);
        debug!(
            width = grayscale.width(),
            height = grayscale.height(),
            "grayscale"
        );
        Grayscaled {
            config: self.config,
            original: self.original,
            grayscale,
        }
    }

    /// Skip detection and continue with user-supplied corners.
    ///
    /// The corners are not validated. Intermediate rasters in the final
    /// [`StagedResult`] are empty and the contour list is empty.
    pub fn with_corners(self, corners: CornerSet) -> CornersValidated {
        info!(?corners, "using manual corners, detection skipped");
        CornersValidated {
            config: self.config,
            original: self.original,
            grayscale: GrayImage::new(0, 0),
            blurred: GrayImage::new(0, 0),
            edges: GrayImage::new(0, 0),
            contours: Vec::new(),
            candidate: None,
            corners: CornerSet::manual(*corners.points()),
            fallbacks: Vec::new(),
        }
    }
}

// ───────────────────────── Stage 1: Grayscaled ───────────────────────

/// Pipeline state after luminance conversion.
#[must_use = "pipeline stages are consumed by advancing, call .blur() to continue"]
pub struct Grayscaled {
    config: ScanConfig,
    original: RgbaImage,
    grayscale: GrayImage,
}

impl Grayscaled {
    /// The luminance image.
    #[must_use]
    pub const fn grayscale(&self) -> &GrayImage {
        &self.grayscale
    }

    /// Smooth and advance to [`Blurred`].
    pub fn blur(self) -> Blurred {
        let blurred = crate::blur::smooth(&self.grayscale);
        Blurred {
            config: self.config,
            original: self.original,
            grayscale: self.grayscale,
            blurred,
        }
    }
}

// ───────────────────────── Stage 2: Blurred ──────────────────────────

/// Pipeline state after 3×3 smoothing.
#[must_use = "pipeline stages are consumed by advancing, call .detect_edges() to continue"]
pub struct Blurred {
    config: ScanConfig,
    original: RgbaImage,
    grayscale: GrayImage,
    blurred: GrayImage,
}

impl Blurred {
    /// The smoothed luminance image.
    #[must_use]
    pub const fn blurred(&self) -> &GrayImage {
        &self.blurred
    }

    /// Run the built-in Canny detector with the configured thresholds.
    pub fn detect_edges(self) -> EdgesDetected {
        let detector = CannyDetector {
            low: self.config.canny_low,
            high: self.config.canny_high,
        };
        self.detect_edges_with(&detector)
    }

    /// Run a caller-supplied edge detector.
    pub fn detect_edges_with(self, detector: &dyn EdgeDetector) -> EdgesDetected {
        let edges = detector.detect(&self.blurred);
        debug!(
            edge_pixels = crate::diagnostics::count_edge_pixels(&edges),
            "edges detected"
        );
        EdgesDetected {
            config: self.config,
            original: self.original,
            grayscale: self.grayscale,
            blurred: self.blurred,
            edges,
        }
    }
}

// ───────────────────────── Stage 3: EdgesDetected ────────────────────

/// Pipeline state after edge detection.
#[must_use = "pipeline stages are consumed by advancing, call .trace_contours() to continue"]
pub struct EdgesDetected {
    config: ScanConfig,
    original: RgbaImage,
    grayscale: GrayImage,
    blurred: GrayImage,
    edges: GrayImage,
}

impl EdgesDetected {
    /// The binary edge map.
    #[must_use]
    pub const fn edges(&self) -> &GrayImage {
        &self.edges
    }

    /// Trace contours and advance to [`ContoursTraced`].
    ///
    /// An edge map without contours is not an error here; the corner
    /// estimator reports the missing candidate.
    pub fn trace_contours(self) -> ContoursTraced {
        let contours = crate::contour::trace_contours(&self.edges, self.config.min_contour_len);
        ContoursTraced {
            config: self.config,
            original: self.original,
            grayscale: self.grayscale,
            blurred: self.blurred,
            edges: self.edges,
            contours,
        }
    }
}

// ───────────────────────── Stage 4: ContoursTraced ───────────────────

/// Pipeline state after contour tracing.
#[must_use = "pipeline stages are consumed by advancing, call .estimate_corners() to continue"]
pub struct ContoursTraced {
    config: ScanConfig,
    original: RgbaImage,
    grayscale: GrayImage,
    blurred: GrayImage,
    edges: GrayImage,
    contours: Vec<Contour>,
}

impl ContoursTraced {
    /// The traced contours, in discovery order.
    #[must_use]
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    /// Estimate corners with the configured strategy.
    pub fn estimate_corners(self) -> CornersEstimated {
        match self.config.quad_estimator {
            QuadEstimatorKind::FarthestPoint => {
                let estimator = FarthestPoint {
                    separation: self.config.candidate_separation,
                };
                self.estimate_corners_with(&estimator)
            }
            QuadEstimatorKind::PolygonApprox => self.estimate_corners_with(&PolygonApprox),
        }
    }

    /// Estimate corners from the longest contour with a caller-supplied
    /// strategy.
    pub fn estimate_corners_with(self, estimator: &dyn QuadEstimator) -> CornersEstimated {
        let dims = Dimensions::of(&self.original);
        let candidate = crate::contour::longest(&self.contours)
            .and_then(|contour| estimator.estimate(contour, dims));
        debug!(?candidate, "corner candidate");
        CornersEstimated {
            config: self.config,
            original: self.original,
            grayscale: self.grayscale,
            blurred: self.blurred,
            edges: self.edges,
            contours: self.contours,
            candidate,
        }
    }
}

// ───────────────────────── Stage 5: CornersEstimated ─────────────────

/// Pipeline state after corner estimation, before validation.
#[must_use = "pipeline stages are consumed by advancing, call .validate() to continue"]
pub struct CornersEstimated {
    config: ScanConfig,
    original: RgbaImage,
    grayscale: GrayImage,
    blurred: GrayImage,
    edges: GrayImage,
    contours: Vec<Contour>,
    candidate: Option<[Point; 4]>,
}

impl CornersEstimated {
    /// The raw candidate, if the estimator produced one.
    #[must_use]
    pub const fn candidate(&self) -> Option<&[Point; 4]> {
        self.candidate.as_ref()
    }

    /// Validate the candidate and advance to [`CornersValidated`].
    pub fn validate(self) -> CornersValidated {
        let validation = crate::validate::validate(
            self.candidate,
            Dimensions::of(&self.original),
            self.config.min_corner_separation,
            self.config.min_area_fraction,
        );
        CornersValidated {
            config: self.config,
            original: self.original,
            grayscale: self.grayscale,
            blurred: self.blurred,
            edges: self.edges,
            contours: self.contours,
            candidate: self.candidate,
            corners: validation.corners,
            fallbacks: validation.fallback.into_iter().collect(),
        }
    }
}

// ───────────────────────── Stage 6: CornersValidated ─────────────────

/// Pipeline state holding the corners that will be used for
/// rectification.
#[must_use = "pipeline stages are consumed by advancing, call .rectify() to continue"]
pub struct CornersValidated {
    config: ScanConfig,
    original: RgbaImage,
    grayscale: GrayImage,
    blurred: GrayImage,
    edges: GrayImage,
    contours: Vec<Contour>,
    candidate: Option<[Point; 4]>,
    corners: CornerSet,
    fallbacks: Vec<Fallback>,
}

impl CornersValidated {
    /// The accepted corners.
    #[must_use]
    pub const fn corners(&self) -> &CornerSet {
        &self.corners
    }

    /// Degradations so far.
    #[must_use]
    pub fn fallbacks(&self) -> &[Fallback] {
        &self.fallbacks
    }

    /// Replace the accepted corners with user-supplied ones.
    ///
    /// Manual corners take precedence over detection, so any detection
    /// fallback recorded by validation is dropped.
    pub fn override_corners(mut self, corners: CornerSet) -> Self {
        info!(?corners, "manual corners override detection");
        self.corners = CornerSet::manual(*corners.points());
        self.fallbacks.retain(|f| {
            !matches!(f, Fallback::DetectionFailure | Fallback::GeometryInvalid)
        });
        self
    }

    /// Warp the page upright and advance to [`Rectified`].
    pub fn rectify(mut self) -> Rectified {
        let options = RectifyOptions {
            min_size_fraction: self.config.min_size_fraction,
            warp: self.config.warp,
        };
        let (rectified, warp) =
            match crate::rectify::rectify(&self.original, &self.corners, &options) {
                RectifyResult::Rectified { image, warp } => (Some(image), Some(warp)),
                RectifyResult::PassThrough(reason) => {
                    info!(%reason, "rectification refused, keeping original");
                    self.fallbacks.push(reason);
                    (None, None)
                }
            };
        Rectified {
            config: self.config,
            original: self.original,
            grayscale: self.grayscale,
            blurred: self.blurred,
            edges: self.edges,
            contours: self.contours,
            candidate: self.candidate,
            corners: self.corners,
            fallbacks: self.fallbacks,
            rectified,
            warp,
        }
    }
}

// ───────────────────────── Stage 7: Rectified ────────────────────────

/// Pipeline state after the warp (or the decision not to warp).
#[must_use = "pipeline stages are consumed by advancing, call .enhance() to continue"]
pub struct Rectified {
    config: ScanConfig,
    original: RgbaImage,
    grayscale: GrayImage,
    blurred: GrayImage,
    edges: GrayImage,
    contours: Vec<Contour>,
    candidate: Option<[Point; 4]>,
    corners: CornerSet,
    fallbacks: Vec<Fallback>,
    rectified: Option<RgbaImage>,
    warp: Option<WarpKind>,
}

impl Rectified {
    /// The rectified page, or `None` on pass-through.
    #[must_use]
    pub const fn rectified(&self) -> Option<&RgbaImage> {
        self.rectified.as_ref()
    }

    /// The warp used, or `None` on pass-through.
    #[must_use]
    pub const fn warp(&self) -> Option<WarpKind> {
        self.warp
    }

    /// Enhance the rectified page and advance to [`Enhanced`].
    ///
    /// On pass-through the original is used unmodified.
    pub fn enhance(self) -> Enhanced {
        let output = self.rectified.as_ref().map_or_else(
            || self.original.clone(),
            |page| crate::enhance::enhance(page, self.config.contrast, self.config.brightness),
        );
        Enhanced {
            config: self.config,
            original: self.original,
            grayscale: self.grayscale,
            blurred: self.blurred,
            edges: self.edges,
            contours: self.contours,
            candidate: self.candidate,
            corners: self.corners,
            fallbacks: self.fallbacks,
            rectified: self.rectified,
            warp: self.warp,
            output,
        }
    }
}

// ───────────────────────── Stage 8: Enhanced ─────────────────────────

/// Final pipeline state.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Enhanced {
    config: ScanConfig,
    original: RgbaImage,
    grayscale: GrayImage,
    blurred: GrayImage,
    edges: GrayImage,
    contours: Vec<Contour>,
    candidate: Option<[Point; 4]>,
    corners: CornerSet,
    fallbacks: Vec<Fallback>,
    rectified: Option<RgbaImage>,
    warp: Option<WarpKind>,
    output: RgbaImage,
}

impl Enhanced {
    /// The final output image.
    #[must_use]
    pub const fn output(&self) -> &RgbaImage {
        &self.output
    }

    /// Consume the pipeline and return every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            dimensions: Dimensions::of(&self.original),
            original: self.original,
            grayscale: self.grayscale,
            blurred: self.blurred,
            edges: self.edges,
            contours: self.contours,
            candidate: self.candidate,
            corners: self.corners,
            rectified: self.rectified,
            output: self.output,
            fallbacks: self.fallbacks,
        }
    }
}

// ───────────────────────── Stage metrics ─────────────────────────────

impl PipelineStage for Pending {
    const NAME: &'static str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }
}

impl PipelineStage for Grayscaled {
    const NAME: &'static str = "grayscale";
    const INDEX: usize = 1;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Grayscale {
            width: self.grayscale.width(),
            height: self.grayscale.height(),
        })
    }
}

impl PipelineStage for Blurred {
    const NAME: &'static str = "blur";
    const INDEX: usize = 2;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Blur {
            mean_intensity: crate::diagnostics::mean_intensity(&self.blurred),
        })
    }
}

impl PipelineStage for EdgesDetected {
    const NAME: &'static str = "edges";
    const INDEX: usize = 3;

    fn metrics(&self) -> Option<StageMetrics> {
        let high = self.config.canny_high.max(0.0);
        Some(StageMetrics::EdgeDetection {
            low_threshold: self.config.canny_low.max(0.0).min(high),
            high_threshold: high,
            edge_pixel_count: crate::diagnostics::count_edge_pixels(&self.edges),
            total_pixel_count: u64::from(self.edges.width()) * u64::from(self.edges.height()),
        })
    }
}

impl PipelineStage for ContoursTraced {
    const NAME: &'static str = "contours";
    const INDEX: usize = 4;

    fn metrics(&self) -> Option<StageMetrics> {
        let stats = crate::diagnostics::contour_stats(&self.contours);
        Some(StageMetrics::ContourTracing {
            contour_count: self.contours.len(),
            total_point_count: stats.total,
            longest_contour_points: stats.max,
            longest_contour_perimeter: stats.longest_perimeter,
        })
    }
}

impl PipelineStage for CornersEstimated {
    const NAME: &'static str = "estimate";
    const INDEX: usize = 5;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::CornerEstimation {
            estimator: self.config.quad_estimator,
            found: self.candidate.is_some(),
        })
    }
}

impl PipelineStage for CornersValidated {
    const NAME: &'static str = "validate";
    const INDEX: usize = 6;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Validation {
            origin: self.corners.origin(),
            fallback: self.fallbacks.last().copied(),
            min_corner_distance: self.corners.min_pairwise_distance(),
        })
    }
}

impl PipelineStage for Rectified {
    const NAME: &'static str = "rectify";
    const INDEX: usize = 7;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Rectification {
            warp: self.warp,
            width: self.rectified.as_ref().map_or(0, RgbaImage::width),
            height: self.rectified.as_ref().map_or(0, RgbaImage::height),
        })
    }
}

impl PipelineStage for Enhanced {
    const NAME: &'static str = "enhance";
    const INDEX: usize = 8;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Enhancement {
            applied: self.rectified.is_some(),
            contrast: self.config.contrast,
            brightness: self.config.brightness,
        })
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental scanning pipeline.
///
/// Created via [`Pipeline::new`], which stores the source image and
/// config without doing any processing.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from a source image and config.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image: RgbaImage, config: ScanConfig) -> Pending {
        Pending {
            config,
            original: image,
        }
    }
}
