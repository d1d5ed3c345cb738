//! flatscan-bench: CLI tool for scan threshold tuning and diagnostics.
//!
//! Runs the scanning pipeline on a given image file with configurable
//! parameters, printing detailed per-stage diagnostics. Useful for:
//!
//! - Comparing corner estimators (`polygon` vs `farthest`)
//! - Tuning Canny thresholds and separation fractions
//! - Measuring per-stage durations to identify bottlenecks
//! - Seeing which fallback fired and why (`RUST_LOG=flatscan_pipeline=debug`)
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin flatscan-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use flatscan_pipeline::diagnostics::{Clock, ScanDiagnostics};
use flatscan_pipeline::{QuadEstimatorKind, ScanConfig, StagedResult, WarpKind};
use tracing_subscriber::EnvFilter;

/// Scan parameter experimentation and diagnostics for flatscan.
///
/// Runs the scanning pipeline on a given image with configurable
/// parameters and prints detailed per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "flatscan-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Canny low threshold.
    #[arg(long, default_value_t = ScanConfig::DEFAULT_CANNY_LOW)]
    canny_low: f32,

    /// Canny high threshold.
    #[arg(long, default_value_t = ScanConfig::DEFAULT_CANNY_HIGH)]
    canny_high: f32,

    /// Minimum contour length in points.
    #[arg(long, default_value_t = ScanConfig::DEFAULT_MIN_CONTOUR_LEN)]
    min_contour_len: usize,

    /// Corner estimation strategy.
    #[arg(long, value_enum, default_value_t = Estimator::Polygon)]
    estimator: Estimator,

    /// Farthest-point candidate spacing, fraction of the shorter side.
    #[arg(long, default_value_t = ScanConfig::DEFAULT_CANDIDATE_SEPARATION)]
    candidate_separation: f64,

    /// Minimum accepted corner spacing, fraction of the shorter side.
    #[arg(long, default_value_t = ScanConfig::DEFAULT_MIN_CORNER_SEPARATION)]
    min_corner_separation: f64,

    /// Minimum enclosed corner area, fraction of the image area.
    #[arg(long, default_value_t = ScanConfig::DEFAULT_MIN_AREA_FRACTION)]
    min_area_fraction: f64,

    /// Minimum rectified size, fraction of the source size.
    #[arg(long, default_value_t = ScanConfig::DEFAULT_MIN_SIZE_FRACTION)]
    min_size_fraction: f64,

    /// Warp used for rectification.
    #[arg(long, value_enum, default_value_t = Warp::Perspective)]
    warp: Warp,

    /// Contrast gain applied to the rectified page.
    #[arg(long, default_value_t = ScanConfig::DEFAULT_CONTRAST)]
    contrast: f32,

    /// Brightness lift applied to the rectified page.
    #[arg(long, default_value_t = ScanConfig::DEFAULT_BRIGHTNESS, allow_negative_numbers = true)]
    brightness: i16,

    /// JPEG quality for `--output`.
    #[arg(long, default_value_t = ScanConfig::DEFAULT_JPEG_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Write the scanned page as JPEG.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the debug overlay as PNG.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full scan config as a JSON string.
    ///
    /// When provided, all other scan parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Corner estimator selection.
#[derive(Clone, Copy, ValueEnum)]
enum Estimator {
    /// Four mutually separated points farthest from the centroid.
    Farthest,
    /// Closed polygon simplification at increasing tolerances.
    Polygon,
}

/// Warp selection.
#[derive(Clone, Copy, ValueEnum)]
enum Warp {
    /// Full homography.
    Perspective,
    /// Axis-aligned crop and scale.
    BoundingBox,
}

/// Build a [`ScanConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Either way the result is
/// range-checked.
fn config_from_cli(cli: &Cli) -> Result<ScanConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        ScanConfig {
            canny_low: cli.canny_low,
            canny_high: cli.canny_high,
            min_contour_len: cli.min_contour_len,
            quad_estimator: match cli.estimator {
                Estimator::Farthest => QuadEstimatorKind::FarthestPoint,
                Estimator::Polygon => QuadEstimatorKind::PolygonApprox,
            },
            candidate_separation: cli.candidate_separation,
            min_corner_separation: cli.min_corner_separation,
            min_area_fraction: cli.min_area_fraction,
            min_size_fraction: cli.min_size_fraction,
            warp: match cli.warp {
                Warp::Perspective => WarpKind::Perspective,
                Warp::BoundingBox => WarpKind::BoundingBox,
            },
            contrast: cli.contrast,
            brightness: cli.brightness,
            jpeg_quality: cli.quality,
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image = match std::fs::read(&cli.image_path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| flatscan_pipeline::grayscale::decode(&bytes).map_err(|e| e.to_string()))
    {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({}x{})",
        cli.image_path.display(),
        image.width(),
        image.height(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match flatscan_pipeline::diagnostics::scan_with_diagnostics(image.clone(), &config, &StdClock) {
            Ok((staged, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write images on the first run only.
                if run == 0 {
                    write_images(&cli, &config, &staged);
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Scan error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

fn write_images(cli: &Cli, config: &ScanConfig, staged: &StagedResult) {
    if let Some(ref path) = cli.output {
        write_encoded(
            path,
            "Page",
            flatscan_pipeline::encode::encode_jpeg(&staged.output, config.jpeg_quality),
        );
    }
    if let Some(ref path) = cli.overlay {
        let overlay = flatscan_pipeline::overlay::overlay(staged);
        write_encoded(
            path,
            "Overlay",
            flatscan_pipeline::encode::encode_png(&overlay),
        );
    }
}

fn write_encoded(path: &Path, what: &str, bytes: Result<Vec<u8>, flatscan_pipeline::ScanError>) {
    let bytes = match bytes {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error encoding {what}: {e}");
            return;
        }
    };
    match std::fs::write(path, &bytes) {
        Ok(()) => eprintln!("{what} written to {} ({} bytes)", path.display(), bytes.len()),
        Err(e) => eprintln!("Error writing {what} to {}: {e}", path.display()),
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[ScanDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let Some(first) = all_diagnostics.first() else {
        println!("Warning: no diagnostics to summarize");
        return;
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for (index, (name, _)) in first.stages().into_iter().enumerate() {
        let total: f64 = all_diagnostics
            .iter()
            .map(|d| d.stages()[index].1.duration.as_secs_f64() * 1000.0)
            .sum();
        let stage_mean = total / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
