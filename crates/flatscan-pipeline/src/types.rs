//! Shared types for the flatscan pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::corners::CornerSet;
use crate::quad::QuadEstimatorKind;
use crate::rectify::WarpKind;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference the
/// source and rectified images without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point in source-image pixel coordinates (origin top-left, +Y down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Returns `true` if both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// An ordered sequence of pixel coordinates tracing one connected
/// boundary in an edge map.
///
/// Contours produced by the tracer are closed: the last point is
/// 8-adjacent to the first, and the closing segment is implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour(Vec<Point>);

impl Contour {
    /// Create a new contour from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the contour.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the contour and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Perimeter of the closed contour, including the closing segment.
    #[must_use]
    pub fn arc_length(&self) -> f64 {
        let open: f64 = self.0.windows(2).map(|w| w[0].distance(w[1])).sum();
        match (self.0.first(), self.0.last()) {
            (Some(&first), Some(&last)) if self.0.len() > 2 => open + last.distance(first),
            _ => open,
        }
    }

    /// Arithmetic mean of the contour points, or `None` when empty.
    #[must_use]
    pub fn centroid(&self) -> Option<Point> {
        if self.0.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.0.len() as f64;
        let (sx, sy) = self
            .0
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point::new(sx / n, sy / n))
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create dimensions from a width and height.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of any `image` buffer.
    #[must_use]
    pub fn of<P, C>(image: &image::ImageBuffer<P, C>) -> Self
    where
        P: image::Pixel,
        C: std::ops::Deref<Target = [P::Subpixel]>,
    {
        Self::new(image.width(), image.height())
    }

    /// Returns `true` if either side is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The shorter of the two sides, as `f64`.
    #[must_use]
    pub fn shorter_dim(self) -> f64 {
        f64::from(self.width.min(self.height))
    }

    /// Returns `true` if `p` lies in the closed rectangle `[0,w]×[0,h]`.
    #[must_use]
    pub fn contains(self, p: Point) -> bool {
        p.is_finite()
            && (0.0..=f64::from(self.width)).contains(&p.x)
            && (0.0..=f64::from(self.height)).contains(&p.y)
    }
}

/// Why the pipeline degraded instead of producing a normal result.
///
/// None of these are errors: each one names the safe substitute the
/// pipeline chose (default corners or pass-through output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fallback {
    /// No usable contour or corner approximation was found; the default
    /// inset rectangle was substituted.
    DetectionFailure,
    /// Candidate corners were out of bounds, non-finite, or too close
    /// together; the default inset rectangle was substituted.
    GeometryInvalid,
    /// The warp was too small or numerically unstable; the original image
    /// was passed through and enhancement skipped.
    RectificationUnstable,
    /// The input bitmap was zero-sized; nothing was processed.
    StageInputInvalid,
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DetectionFailure => f.write_str("no document boundary detected"),
            Self::GeometryInvalid => f.write_str("detected corners were not a usable quadrilateral"),
            Self::RectificationUnstable => f.write_str("rectification rejected, original kept"),
            Self::StageInputInvalid => f.write_str("input image is empty"),
        }
    }
}

/// Configuration for the scanning pipeline.
///
/// All parameters have defaults tuned for document-on-table photos.
/// [`validate`](Self::validate) checks ranges; the pipeline itself also
/// clamps thresholds so a bad config degrades rather than panics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Canny low threshold: surviving gradient magnitudes above this are
    /// weak edge candidates.
    pub canny_low: f32,

    /// Canny high threshold: surviving gradient magnitudes above this are
    /// strong edges.
    pub canny_high: f32,

    /// Contours with fewer points than this are discarded as noise.
    pub min_contour_len: usize,

    /// Which corner estimation strategy to run on the longest contour.
    pub quad_estimator: QuadEstimatorKind,

    /// Minimum spacing between farthest-point candidates, as a fraction
    /// of the shorter image side.
    pub candidate_separation: f64,

    /// Minimum pairwise corner distance accepted by the validator, as a
    /// fraction of the shorter image side.
    pub min_corner_separation: f64,

    /// Minimum area enclosed by the accepted corners, as a fraction of
    /// the image area.
    pub min_area_fraction: f64,

    /// Minimum rectified width/height as a fraction of the source
    /// width/height. Smaller quadrilaterals are passed through.
    pub min_size_fraction: f64,

    /// Preferred warp. The bounding-box warp is also the automatic
    /// fallback when the perspective solve fails.
    pub warp: WarpKind,

    /// Post-enhancer contrast gain around mid-gray.
    pub contrast: f32,

    /// Post-enhancer brightness lift per channel.
    pub brightness: i16,

    /// JPEG quality (1-100) used when encoding the rectified page.
    pub jpeg_quality: u8,
}

impl ScanConfig {
    /// Default Canny low threshold.
    pub const DEFAULT_CANNY_LOW: f32 = 10.0;
    /// Default Canny high threshold.
    pub const DEFAULT_CANNY_HIGH: f32 = 30.0;
    /// Default minimum contour length in points.
    pub const DEFAULT_MIN_CONTOUR_LEN: usize = 10;
    /// Default farthest-point candidate spacing.
    pub const DEFAULT_CANDIDATE_SEPARATION: f64 = 0.03;
    /// Default final corner spacing.
    pub const DEFAULT_MIN_CORNER_SEPARATION: f64 = 0.05;
    /// Default minimum enclosed area fraction.
    pub const DEFAULT_MIN_AREA_FRACTION: f64 = 0.05;
    /// Default minimum rectified size fraction.
    pub const DEFAULT_MIN_SIZE_FRACTION: f64 = 0.2;
    /// Default contrast gain.
    pub const DEFAULT_CONTRAST: f32 = 1.3;
    /// Default brightness lift.
    pub const DEFAULT_BRIGHTNESS: i16 = 10;
    /// Default JPEG quality.
    pub const DEFAULT_JPEG_QUALITY: u8 = 85;

    /// Check that every parameter is finite and in range.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), ScanError> {
        let invalid = |msg: &str| Err(ScanError::InvalidConfig(msg.to_string()));

        if !self.canny_low.is_finite() || !self.canny_high.is_finite() {
            return invalid("canny thresholds must be finite");
        }
        if self.canny_low < 0.0 || self.canny_low > self.canny_high {
            return invalid("canny_low must be in [0, canny_high]");
        }
        if self.min_contour_len < 3 {
            return invalid("min_contour_len must be at least 3");
        }
        for (name, value) in [
            ("candidate_separation", self.candidate_separation),
            ("min_corner_separation", self.min_corner_separation),
            ("min_area_fraction", self.min_area_fraction),
            ("min_size_fraction", self.min_size_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScanError::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if !self.contrast.is_finite() || self.contrast < 0.0 {
            return invalid("contrast must be finite and non-negative");
        }
        if !(-255..=255).contains(&self.brightness) {
            return invalid("brightness must be in [-255, 255]");
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return invalid("jpeg_quality must be in [1, 100]");
        }
        Ok(())
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            canny_low: Self::DEFAULT_CANNY_LOW,
            canny_high: Self::DEFAULT_CANNY_HIGH,
            min_contour_len: Self::DEFAULT_MIN_CONTOUR_LEN,
            quad_estimator: QuadEstimatorKind::default(),
            candidate_separation: Self::DEFAULT_CANDIDATE_SEPARATION,
            min_corner_separation: Self::DEFAULT_MIN_CORNER_SEPARATION,
            min_area_fraction: Self::DEFAULT_MIN_AREA_FRACTION,
            min_size_fraction: Self::DEFAULT_MIN_SIZE_FRACTION,
            warp: WarpKind::default(),
            contrast: Self::DEFAULT_CONTRAST,
            brightness: Self::DEFAULT_BRIGHTNESS,
            jpeg_quality: Self::DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Result of scanning one page.
///
/// `image` is the enhanced rectified page when `rectified` is `true`,
/// otherwise an unmodified copy of the input.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// The output bitmap.
    pub image: RgbaImage,
    /// The corners that were used for rectification.
    pub corners: CornerSet,
    /// Every degradation that occurred, in pipeline order.
    pub fallbacks: Vec<Fallback>,
    /// Whether a warp was applied (`false` means pass-through).
    pub rectified: bool,
}

/// Result of running the pipeline with all intermediate stage outputs
/// preserved, for diagnostics and debug overlays.
///
/// Stages skipped by the manual-corner path hold empty images and an
/// empty contour list.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Stage 0: source RGBA image.
    pub original: RgbaImage,
    /// Stage 1: luminance image.
    pub grayscale: GrayImage,
    /// Stage 2: 3×3 smoothed luminance.
    pub blurred: GrayImage,
    /// Stage 3: binary edge map (0 / 255).
    pub edges: GrayImage,
    /// Stage 4: traced contours, in discovery order.
    pub contours: Vec<Contour>,
    /// Stage 5: raw corner candidate from the estimator.
    pub candidate: Option<[Point; 4]>,
    /// Stages 6/7: accepted (validated or manual) corners.
    pub corners: CornerSet,
    /// Stage 8: rectified image, `None` on pass-through.
    pub rectified: Option<RgbaImage>,
    /// Stage 9: final output (enhanced rectified image, or the original).
    pub output: RgbaImage,
    /// Every degradation that occurred, in pipeline order.
    pub fallbacks: Vec<Fallback>,
    /// Source image dimensions in pixels.
    pub dimensions: Dimensions,
}

impl StagedResult {
    /// Collapse the staged result into the compact [`ScanOutcome`].
    #[must_use]
    pub fn into_outcome(self) -> ScanOutcome {
        ScanOutcome {
            rectified: self.rectified.is_some(),
            image: self.output,
            corners: self.corners,
            fallbacks: self.fallbacks,
        }
    }
}

/// Errors from the pipeline's outer surfaces: decoding, encoding,
/// configuration, and page bookkeeping.
///
/// The scanning stages themselves never fail; they report degradations
/// as [`Fallback`] values instead.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Scan configuration is invalid.
    #[error("invalid scan configuration: {0}")]
    InvalidConfig(String),

    /// A page was asked to do something its current status forbids.
    #[error("cannot {action} a page in status {from:?}")]
    InvalidTransition {
        /// Status the page was in.
        from: crate::page::PageStatus,
        /// The rejected action.
        action: &'static str,
    },

    /// A session page index was out of range.
    #[error("no page at index {0}")]
    PageIndex(usize),

    /// Encoding the output image failed.
    #[error("failed to encode image: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Point tests ---

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_finiteness() {
        assert!(Point::new(1.0, 2.0).is_finite());
        assert!(!Point::new(f64::NAN, 2.0).is_finite());
        assert!(!Point::new(1.0, f64::INFINITY).is_finite());
    }

    // --- Contour tests ---

    #[test]
    fn contour_arc_length_includes_closing_segment() {
        let square = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]);
        assert!((square.arc_length() - 40.0).abs() < 1e-10);
    }

    #[test]
    fn contour_centroid() {
        let c = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 2.0),
            Point::new(0.0, 2.0),
        ]);
        assert_eq!(c.centroid(), Some(Point::new(2.0, 1.0)));
        assert_eq!(Contour::new(vec![]).centroid(), None);
    }

    // --- Dimensions tests ---

    #[test]
    fn dimensions_contains_closed_range() {
        let d = Dimensions::new(100, 50);
        assert!(d.contains(Point::new(0.0, 0.0)));
        assert!(d.contains(Point::new(100.0, 50.0)));
        assert!(!d.contains(Point::new(100.1, 50.0)));
        assert!(!d.contains(Point::new(-0.1, 10.0)));
        assert!(!d.contains(Point::new(f64::NAN, 10.0)));
    }

    #[test]
    fn dimensions_shorter_and_empty() {
        assert!((Dimensions::new(640, 480).shorter_dim() - 480.0).abs() < f64::EPSILON);
        assert!(Dimensions::new(0, 10).is_empty());
        assert!(!Dimensions::new(1, 1).is_empty());
    }

    // --- ScanConfig tests ---

    #[test]
    fn config_defaults() {
        let config = ScanConfig::default();
        assert!((config.canny_high - 30.0).abs() < f32::EPSILON);
        assert!((config.canny_low - 10.0).abs() < f32::EPSILON);
        assert_eq!(config.min_contour_len, 10);
        assert_eq!(config.quad_estimator, QuadEstimatorKind::PolygonApprox);
        assert_eq!(config.warp, WarpKind::Perspective);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_inverted_thresholds() {
        let config = ScanConfig {
            canny_low: 50.0,
            canny_high: 20.0,
            ..ScanConfig::default()
        };
        assert!(matches!(config.validate(), Err(ScanError::InvalidConfig(_))));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn config_rejects_fraction_out_of_range() {
        let config = ScanConfig {
            min_size_fraction: 1.5,
            ..ScanConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_size_fraction"));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn config_rejects_negative_area_fraction() {
        let config = ScanConfig {
            min_area_fraction: -0.1,
            ..ScanConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_area_fraction"));
    }

    #[test]
    fn config_rejects_zero_quality() {
        let config = ScanConfig {
            jpeg_quality: 0,
            ..ScanConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn config_serde_round_trip() {
        let config = ScanConfig {
            canny_low: 5.0,
            canny_high: 60.0,
            quad_estimator: QuadEstimatorKind::FarthestPoint,
            warp: WarpKind::BoundingBox,
            ..ScanConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: ScanConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn config_partial_json_uses_defaults() {
        let config: ScanConfig = serde_json::from_str(r#"{"canny_high": 45.0}"#).unwrap();
        assert!((config.canny_high - 45.0).abs() < f32::EPSILON);
        assert_eq!(config.min_contour_len, ScanConfig::DEFAULT_MIN_CONTOUR_LEN);
    }

    // --- Error tests ---

    #[test]
    fn error_display() {
        assert_eq!(ScanError::EmptyInput.to_string(), "input image data is empty");
        assert_eq!(
            ScanError::InvalidConfig("bad".to_string()).to_string(),
            "invalid scan configuration: bad",
        );
        assert_eq!(ScanError::PageIndex(3).to_string(), "no page at index 3");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn fallback_serde_round_trip() {
        let json = serde_json::to_string(&Fallback::RectificationUnstable).unwrap();
        let back: Fallback = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Fallback::RectificationUnstable);
    }
}
