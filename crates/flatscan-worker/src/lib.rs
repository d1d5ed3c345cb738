//! Web worker entry point for flatscan page processing.
//!
//! This crate compiles to a standalone WASM module that runs inside a
//! `Worker`. It receives one captured bitmap as raw RGBA pixels (plus an
//! optional `ScanConfig` and optional manual corners) via `postMessage`,
//! scans it with `flatscan_pipeline`, and posts the encoded page back.
//!
//! Pixels travel as `Uint8Array` buffers in both directions; the small
//! structured part of the result (corners, fallbacks, sizes) is sent as a
//! JSON string.
//!
//! Running the scan in a worker keeps the capture UI responsive: the
//! camera preview and corner handles never wait on image processing.

use flatscan_pipeline::encode::{encode_jpeg, encode_png};
use flatscan_pipeline::overlay::overlay;
use flatscan_pipeline::{
    CornerSet, Fallback, Point, RgbaImage, ScanConfig, StagedResult, scan_staged,
    scan_staged_with_corners,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// The structured (non-raster) part of a scan, serialized as JSON.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    /// Corners used for rectification, TL, TR, BR, BL.
    pub corners: CornerSet,
    /// Every degradation that occurred.
    pub fallbacks: Vec<Fallback>,
    /// Whether a warp was applied.
    pub rectified: bool,
    /// Encoded page width.
    pub width: u32,
    /// Encoded page height.
    pub height: u32,
}

/// Encoded payloads for one response.
struct EncodedScan {
    summary_json: String,
    /// `None` when the page has no pixels (zero-sized input).
    jpeg: Option<Vec<u8>>,
    overlay_png: Option<Vec<u8>>,
}

/// One decoded request.
struct Request {
    generation: f64,
    image: RgbaImage,
    config: ScanConfig,
    corners: Option<[Point; 4]>,
    debug: bool,
}

/// Message protocol: the main thread sends a JS object with:
/// - `rgbaPixels`: `Uint8Array` of `width × height × 4` bytes
/// - `width`, `height`: `f64` bitmap size
/// - `configJson`: optional `String`, JSON-serialized `ScanConfig`
///   (missing fields take their defaults)
/// - `cornersJson`: optional `String`, JSON array of four `{x, y}`
///   points in TL, TR, BR, BL order; skips detection when present
/// - `debug`: optional `bool`, also render the debug overlay
/// - `generation`: `f64` generation counter (passed through to response)
///
/// On success the worker responds with a JS object containing:
/// - `generation`: `f64` matching the request generation
/// - `ok`: `true`
/// - `summaryJson`: `String`, JSON-serialized [`ScanSummary`]
/// - `jpegBytes`: `Uint8Array`, the page as JPEG; absent when the input
///   bitmap was zero-sized (the summary then reports `StageInputInvalid`)
/// - `overlayPng`: `Uint8Array`, only when `debug` was set and the page
///   has pixels
///
/// On error the worker responds with:
/// - `generation`: `f64`
/// - `ok`: `false`
/// - `error`: `String`, human-readable message
///
/// # Worker entry point
///
/// Called automatically when the WASM module is instantiated in the
/// worker context.
#[wasm_bindgen(start)]
pub fn worker_main() {
    console_error_panic_hook::set_once();

    let global: web_sys::DedicatedWorkerGlobalScope = js_sys::global()
        .dyn_into()
        .expect_throw("not running in a DedicatedWorkerGlobalScope");

    let onmessage =
        Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |event: web_sys::MessageEvent| {
            handle_message(&event);
        });
    global.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget(); // leak — lives for the worker lifetime
}

/// Handle an incoming message from the main thread.
fn handle_message(event: &web_sys::MessageEvent) {
    let data = event.data();
    let generation = get(&data, "generation")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);

    let request = match parse_request(&data, generation) {
        Ok(request) => request,
        Err(message) => {
            post_error(generation, &message);
            return;
        }
    };

    // Synchronous: blocks this worker thread only.
    let staged = match request.corners {
        Some(points) => {
            scan_staged_with_corners(&request.image, CornerSet::manual(points), &request.config)
        }
        None => scan_staged(&request.image, &request.config),
    };

    if let Err(message) = post_success(&request, &staged) {
        post_error(generation, &message);
    }
}

fn get(data: &JsValue, key: &str) -> Option<JsValue> {
    js_sys::Reflect::get(data, &JsValue::from_str(key))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_request(data: &JsValue, generation: f64) -> Result<Request, String> {
    let pixels: js_sys::Uint8Array = get(data, "rgbaPixels")
        .ok_or("missing rgbaPixels field")?
        .dyn_into()
        .map_err(|_| "rgbaPixels is not a Uint8Array")?;
    let dimension = |key: &str| -> Result<u32, String> {
        let value = get(data, key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| format!("{key} is not a number"))?;
        if (0.0..=f64::from(u32::MAX)).contains(&value) {
            Ok(value as u32)
        } else {
            Err(format!("{key} out of range: {value}"))
        }
    };
    let width = dimension("width")?;
    let height = dimension("height")?;
    let image = RgbaImage::from_raw(width, height, pixels.to_vec())
        .ok_or_else(|| format!("rgbaPixels too short for {width}x{height}"))?;

    let config: ScanConfig = match get(data, "configJson").and_then(|v| v.as_string()) {
        Some(json) => {
            serde_json::from_str(&json).map_err(|e| format!("failed to parse config: {e}"))?
        }
        None => ScanConfig::default(),
    };
    config.validate().map_err(|e| e.to_string())?;

    let corners = get(data, "cornersJson")
        .and_then(|v| v.as_string())
        .map(|json| serde_json::from_str::<[Point; 4]>(&json))
        .transpose()
        .map_err(|e| format!("failed to parse corners: {e}"))?;

    let debug = get(data, "debug").and_then(|v| v.as_bool()).unwrap_or(false);

    Ok(Request {
        generation,
        image,
        config,
        corners,
        debug,
    })
}

/// Encode the page, summary, and optional overlay.
fn encode_scan(staged: &StagedResult, quality: u8, debug: bool) -> Result<EncodedScan, String> {
    let summary = ScanSummary {
        corners: staged.corners,
        fallbacks: staged.fallbacks.clone(),
        rectified: staged.rectified.is_some(),
        width: staged.output.width(),
        height: staged.output.height(),
    };
    let summary_json =
        serde_json::to_string(&summary).map_err(|e| format!("failed to serialize summary: {e}"))?;

    // Neither encoder accepts an empty raster.
    if staged.output.width() == 0 || staged.output.height() == 0 {
        return Ok(EncodedScan {
            summary_json,
            jpeg: None,
            overlay_png: None,
        });
    }

    let jpeg = encode_jpeg(&staged.output, quality).map_err(|e| e.to_string())?;
    let overlay_png = if debug {
        Some(encode_png(&overlay(staged)).map_err(|e| e.to_string())?)
    } else {
        None
    };
    Ok(EncodedScan {
        summary_json,
        jpeg: Some(jpeg),
        overlay_png,
    })
}

/// Post a successful scan back to the main thread.
fn post_success(request: &Request, staged: &StagedResult) -> Result<(), String> {
    let encoded = encode_scan(staged, request.config.jpeg_quality, request.debug)?;

    let response = js_sys::Object::new();
    let set = |key: &str, val: &JsValue| -> Result<(), String> {
        js_sys::Reflect::set(&response, &JsValue::from_str(key), val)
            .map(|_| ())
            .map_err(|_| format!("failed to set response field {key}"))
    };

    set("generation", &JsValue::from_f64(request.generation))?;
    set("ok", &JsValue::from_bool(true))?;
    set("summaryJson", &JsValue::from_str(&encoded.summary_json))?;
    if let Some(jpeg) = &encoded.jpeg {
        set("jpegBytes", &js_sys::Uint8Array::from(jpeg.as_slice()))?;
    }
    if let Some(png) = &encoded.overlay_png {
        set("overlayPng", &js_sys::Uint8Array::from(png.as_slice()))?;
    }

    post(&response)
}

/// Post an error response back to the main thread.
fn post_error(generation: f64, message: &str) {
    let response = js_sys::Object::new();
    let _ = js_sys::Reflect::set(
        &response,
        &JsValue::from_str("generation"),
        &JsValue::from_f64(generation),
    );
    let _ = js_sys::Reflect::set(&response, &JsValue::from_str("ok"), &JsValue::from_bool(false));
    let _ = js_sys::Reflect::set(
        &response,
        &JsValue::from_str("error"),
        &JsValue::from_str(message),
    );
    let _ = post(&response);
}

fn post(message: &JsValue) -> Result<(), String> {
    let global: web_sys::DedicatedWorkerGlobalScope = js_sys::global()
        .dyn_into()
        .map_err(|_| "not in worker scope".to_string())?;
    global
        .post_message(message)
        .map_err(|_| "failed to postMessage".to_string())
}
