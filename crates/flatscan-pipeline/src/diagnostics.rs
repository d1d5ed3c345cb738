//! Scan diagnostics: per-stage timing, counts, and decisions.
//!
//! Used for threshold tuning. [`scan_with_diagnostics`] drives the
//! incremental [`Pipeline`](crate::Pipeline) stage by stage, timing each
//! step with a caller-supplied [`Clock`] and recording the metrics each
//! stage reports through [`PipelineStage::metrics`].
//!
//! Durations are serialized as fractional seconds (`f64`) because
//! `std::time::Duration` has no serde representation of its own.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::corners::CornerOrigin;
use crate::edge::EDGE_STRONG;
use crate::pipeline::{Pipeline, PipelineStage};
use crate::quad::QuadEstimatorKind;
use crate::rectify::WarpKind;
use crate::types::{Contour, Fallback, GrayImage, RgbaImage, ScanConfig, ScanError, StagedResult};

/// Source of timestamps for stage timing.
///
/// Abstracted so the pipeline crate stays free of platform timing
/// assumptions; [`WebClock`] covers both native and wasm targets.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by `web-time`: `performance.now()` in the browser,
/// `std::time::Instant` elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebClock;

impl Clock for WebClock {
    type Instant = web_time::Instant;

    fn now(&self) -> Self::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &Self::Instant) -> Duration {
        since.elapsed()
    }
}

mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|_| serde::de::Error::custom("duration must be finite and non-negative seconds"))
    }
}

/// Diagnostics collected from a single scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanDiagnostics {
    /// Stage 1: luminance conversion.
    pub grayscale: StageDiagnostics,
    /// Stage 2: 3×3 smoothing.
    pub blur: StageDiagnostics,
    /// Stage 3: edge detection.
    pub edge_detection: StageDiagnostics,
    /// Stage 4: contour tracing.
    pub contour_tracing: StageDiagnostics,
    /// Stage 5: corner estimation.
    pub corner_estimation: StageDiagnostics,
    /// Stage 6: corner validation.
    pub validation: StageDiagnostics,
    /// Stage 7: rectification.
    pub rectification: StageDiagnostics,
    /// Stage 8: enhancement.
    pub enhancement: StageDiagnostics,
    /// Wall-clock duration of the whole scan (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: ScanSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics, `None` when the stage reported none.
    pub metrics: Option<StageMetrics>,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Luminance conversion.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Smoothing.
    Blur {
        /// Mean luminance after smoothing.
        mean_intensity: f64,
    },
    /// Edge detection.
    EdgeDetection {
        /// Low threshold (after clamping).
        low_threshold: f32,
        /// High threshold (after clamping).
        high_threshold: f32,
        /// Number of edge pixels in the output.
        edge_pixel_count: u64,
        /// Total pixel count, for edge density.
        total_pixel_count: u64,
    },
    /// Contour tracing.
    ContourTracing {
        /// Number of contours kept.
        contour_count: usize,
        /// Points across all kept contours.
        total_point_count: usize,
        /// Points in the longest contour.
        longest_contour_points: usize,
        /// Perimeter of the longest contour in pixels.
        longest_contour_perimeter: f64,
    },
    /// Corner estimation.
    CornerEstimation {
        /// Strategy used by config (an injected estimator is not named).
        estimator: QuadEstimatorKind,
        /// Whether a four-corner candidate was produced.
        found: bool,
    },
    /// Corner validation.
    Validation {
        /// Where the accepted corners came from.
        origin: CornerOrigin,
        /// Rejection reason, if the candidate was rejected.
        fallback: Option<Fallback>,
        /// Smallest distance between two accepted corners.
        min_corner_distance: f64,
    },
    /// Rectification.
    Rectification {
        /// Warp used, or `None` on pass-through.
        warp: Option<WarpKind>,
        /// Rectified width (0 on pass-through).
        width: u32,
        /// Rectified height (0 on pass-through).
        height: u32,
    },
    /// Enhancement.
    Enhancement {
        /// Whether enhancement ran (only on rectified output).
        applied: bool,
        /// Contrast gain.
        contrast: f32,
        /// Brightness lift.
        brightness: i16,
    },
}

/// High-level summary of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Number of contours kept.
    pub contour_count: usize,
    /// Whether a warp was applied.
    pub rectified: bool,
    /// Output width in pixels.
    pub output_width: u32,
    /// Output height in pixels.
    pub output_height: u32,
    /// Every degradation that occurred.
    pub fallbacks: Vec<Fallback>,
}

/// Run the automatic scan, timing every stage.
///
/// # Errors
///
/// Returns [`ScanError::EmptyInput`] for a zero-sized image; there is
/// nothing to measure.
pub fn scan_with_diagnostics<C: Clock>(
    image: RgbaImage,
    config: &ScanConfig,
    clock: &C,
) -> Result<(StagedResult, ScanDiagnostics), ScanError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ScanError::EmptyInput);
    }

    let total_start = clock.now();
    let pending = Pipeline::new(image, config.clone());

    let start = clock.now();
    let grayscaled = pending.grayscale();
    let grayscale = measure(clock, &start, &grayscaled);

    let start = clock.now();
    let blurred = grayscaled.blur();
    let blur = measure(clock, &start, &blurred);

    let start = clock.now();
    let edges = blurred.detect_edges();
    let edge_detection = measure(clock, &start, &edges);

    let start = clock.now();
    let traced = edges.trace_contours();
    let contour_tracing = measure(clock, &start, &traced);

    let start = clock.now();
    let estimated = traced.estimate_corners();
    let corner_estimation = measure(clock, &start, &estimated);

    let start = clock.now();
    let validated = estimated.validate();
    let validation = measure(clock, &start, &validated);

    let start = clock.now();
    let rectified = validated.rectify();
    let rectification = measure(clock, &start, &rectified);

    let start = clock.now();
    let enhanced = rectified.enhance();
    let enhancement = measure(clock, &start, &enhanced);

    let staged = enhanced.into_result();
    let total_duration = clock.elapsed(&total_start);

    let summary = ScanSummary {
        image_width: staged.dimensions.width,
        image_height: staged.dimensions.height,
        contour_count: staged.contours.len(),
        rectified: staged.rectified.is_some(),
        output_width: staged.output.width(),
        output_height: staged.output.height(),
        fallbacks: staged.fallbacks.clone(),
    };

    let diagnostics = ScanDiagnostics {
        grayscale,
        blur,
        edge_detection,
        contour_tracing,
        corner_estimation,
        validation,
        rectification,
        enhancement,
        total_duration,
        summary,
    };
    Ok((staged, diagnostics))
}

fn measure<C: Clock, S: PipelineStage>(clock: &C, start: &C::Instant, stage: &S) -> StageDiagnostics {
    StageDiagnostics {
        duration: clock.elapsed(start),
        metrics: stage.metrics(),
    }
}

impl ScanDiagnostics {
    /// Stages in pipeline order, with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 8] {
        [
            ("Grayscale", &self.grayscale),
            ("Blur", &self.blur),
            ("Edge Detection", &self.edge_detection),
            ("Contour Tracing", &self.contour_tracing),
            ("Corner Estimation", &self.corner_estimation),
            ("Validation", &self.validation),
            ("Rectification", &self.rectification),
            ("Enhancement", &self.enhancement),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Scan Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{}",
            self.summary.image_width, self.summary.image_height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration)
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = diag.metrics.as_ref().map_or_else(|| "-".to_string(), format_metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        let fallbacks = if self.summary.fallbacks.is_empty() {
            "none".to_string()
        } else {
            self.summary
                .fallbacks
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        };
        lines.push(format!(
            "Output: {}x{} ({})  |  Fallbacks: {fallbacks}",
            self.summary.output_width,
            self.summary.output_height,
            if self.summary.rectified {
                "rectified"
            } else {
                "pass-through"
            },
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds.
pub(crate) fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Grayscale { width, height } => format!("{width}x{height}"),
        StageMetrics::Blur { mean_intensity } => format!("mean={mean_intensity:.1}"),
        StageMetrics::EdgeDetection {
            low_threshold,
            high_threshold,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "low={low_threshold:.1} high={high_threshold:.1} edges={edge_pixel_count} ({density:.1}%)",
            )
        }
        StageMetrics::ContourTracing {
            contour_count,
            total_point_count,
            longest_contour_points,
            longest_contour_perimeter,
        } => format!(
            "{contour_count} contours, {total_point_count} pts (longest={longest_contour_points} pts, {longest_contour_perimeter:.1}px)",
        ),
        StageMetrics::CornerEstimation { estimator, found } => {
            format!("{estimator:?} {}", if *found { "found" } else { "none" })
        }
        StageMetrics::Validation {
            origin,
            fallback,
            min_corner_distance,
        } => match fallback {
            Some(reason) => format!("{origin:?} ({reason})"),
            None => format!("{origin:?} min_dist={min_corner_distance:.1}px"),
        },
        StageMetrics::Rectification {
            warp,
            width,
            height,
        } => match warp {
            Some(warp) => format!("{warp:?} {width}x{height}"),
            None => "pass-through".to_string(),
        },
        StageMetrics::Enhancement {
            applied,
            contrast,
            brightness,
        } => {
            if *applied {
                format!("contrast={contrast:.2} brightness={brightness:+}")
            } else {
                "skipped".to_string()
            }
        }
    }
}

/// Count edge pixels in a binary edge map.
pub(crate) fn count_edge_pixels(image: &GrayImage) -> u64 {
    image
        .pixels()
        .map(|p| u64::from(u8::from(p.0[0] == EDGE_STRONG)))
        .sum()
}

/// Mean sample value, or 0 for an empty image.
pub(crate) fn mean_intensity(image: &GrayImage) -> f64 {
    let count = image.as_raw().len();
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = image.as_raw().iter().map(|&v| u64::from(v)).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = sum as f64 / count as f64;
    mean
}

/// Statistics for a set of contours.
pub(crate) struct ContourStats {
    /// Points across all contours.
    pub total: usize,
    /// Points in the longest contour.
    pub max: usize,
    /// Perimeter of the longest contour.
    pub longest_perimeter: f64,
}

pub(crate) fn contour_stats(contours: &[Contour]) -> ContourStats {
    let longest = crate::contour::longest(contours);
    ContourStats {
        total: contours.iter().map(Contour::len).sum(),
        max: longest.map_or(0, Contour::len),
        longest_perimeter: longest.map_or(0.0, Contour::arc_length),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{Luma, Rgba};

    use super::*;
    use crate::types::Point;

    /// Clock that advances one millisecond per reading.
    struct TickClock(std::cell::Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.0.get() - since)
        }
    }

    fn document() -> RgbaImage {
        RgbaImage::from_fn(120, 90, |x, y| {
            if (20..100).contains(&x) && (15..75).contains(&y) {
                Rgba([230, 230, 230, 255])
            } else {
                Rgba([20, 20, 20, 255])
            }
        })
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn count_edge_pixels_works() {
        let mut img = GrayImage::new(10, 10);
        for i in 0..5 {
            img.put_pixel(i, 0, Luma([EDGE_STRONG]));
        }
        img.put_pixel(9, 9, Luma([128]));
        assert_eq!(count_edge_pixels(&img), 5);
    }

    #[test]
    fn mean_intensity_of_empty_and_uniform() {
        assert!(mean_intensity(&GrayImage::new(0, 0)).abs() < f64::EPSILON);
        let img = GrayImage::from_pixel(4, 4, Luma([100]));
        assert!((mean_intensity(&img) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn contour_stats_computes() {
        let contours = vec![
            Contour::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]),
            Contour::new(vec![
                Point::new(0.0, 0.0),
                Point::new(3.0, 0.0),
                Point::new(3.0, 4.0),
            ]),
        ];
        let stats = contour_stats(&contours);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.max, 3);
        assert!((stats.longest_perimeter - 12.0).abs() < 1e-10);
    }

    #[test]
    fn diagnostics_cover_every_stage() {
        let clock = TickClock(std::cell::Cell::new(0));
        let (staged, diag) = scan_with_diagnostics(document(), &ScanConfig::default(), &clock).unwrap();

        assert!(staged.rectified.is_some());
        assert!(diag.summary.rectified);
        assert!(diag.summary.fallbacks.is_empty());
        assert_eq!(diag.summary.image_width, 120);
        assert!(diag.total_duration >= diag.grayscale.duration);
        assert!(matches!(
            diag.corner_estimation.metrics,
            Some(StageMetrics::CornerEstimation { found: true, .. })
        ));
        assert!(matches!(
            diag.validation.metrics,
            Some(StageMetrics::Validation {
                origin: CornerOrigin::Detected,
                fallback: None,
                ..
            })
        ));
        assert!(matches!(
            diag.rectification.metrics,
            Some(StageMetrics::Rectification {
                warp: Some(WarpKind::Perspective),
                ..
            })
        ));
        assert!(diag.stages().iter().all(|(_, stage)| stage.metrics.is_some()));
    }

    #[test]
    fn stage_without_metrics_records_none() {
        let clock = TickClock(std::cell::Cell::new(0));
        let start = clock.now();
        let pending = Pipeline::new(document(), ScanConfig::default());
        let diag = measure(&clock, &start, &pending);
        assert_eq!(diag.metrics, None);
        assert_eq!(diag.duration, Duration::from_millis(1));

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"metrics\":null"), "{json}");
    }

    #[test]
    fn report_mentions_every_stage() {
        let (_, diag) = scan_with_diagnostics(document(), &ScanConfig::default(), &WebClock).unwrap();
        let report = diag.report();
        for (name, _) in diag.stages() {
            assert!(report.contains(name), "missing {name}");
        }
        assert!(report.contains("Fallbacks: none"));
    }

    #[test]
    fn uniform_image_reports_fallback() {
        let img = RgbaImage::from_pixel(50, 50, Rgba([128, 128, 128, 255]));
        let (_, diag) = scan_with_diagnostics(img, &ScanConfig::default(), &WebClock).unwrap();
        assert_eq!(diag.summary.fallbacks, vec![Fallback::DetectionFailure]);
        assert!(diag.report().contains("no document boundary detected"));
    }

    #[test]
    fn empty_image_is_rejected() {
        let result = scan_with_diagnostics(RgbaImage::new(0, 4), &ScanConfig::default(), &WebClock);
        assert!(matches!(result, Err(ScanError::EmptyInput)));
    }

    #[test]
    fn diagnostics_serialize_to_json() {
        let (_, diag) = scan_with_diagnostics(document(), &ScanConfig::default(), &WebClock).unwrap();
        let json = serde_json::to_string(&diag).unwrap();
        let back: ScanDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary.image_height, 90);
        assert_eq!(back.edge_detection.metrics, diag.edge_detection.metrics);
    }
}
