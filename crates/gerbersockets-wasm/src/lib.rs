#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::indexing_slicing)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `GerberSockets` WASM module: socket name encoding, socket layer
//! decoding, and grid checks.

pub mod config;
pub mod error;
pub mod gerber;
pub mod socket;

use std::cell::RefCell;

use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::config::{DecodeConfig, GridConfig};
use crate::gerber::{LayerInput, PlacedSocket};
use crate::socket::{
    Circle, DecodeMode, DecodeReport, Diagnostic, GridCheck, GridValidator, LengthUnit,
    SocketRecord,
};

thread_local! {
    static LAST_REPORT: RefCell<Option<DecodeReport>> = const { RefCell::new(None) };
}

fn store_report(report: DecodeReport) {
    LAST_REPORT.with(|r| {
        *r.borrow_mut() = Some(report);
    });
}

fn saturate_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Decode pass summary handed to JavaScript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeMeta {
    /// Decoded sockets in reading order.
    pub sockets: Vec<SocketRecord>,
    /// The single diagnostic to display, if any.
    pub status: Option<Diagnostic>,
    /// Every diagnostic raised by the pass.
    pub diagnostics: Vec<Diagnostic>,
    /// Interpretation chosen for the layer.
    pub mode: DecodeMode,
    /// Names of the layers that were read.
    pub layers: Vec<String>,
    /// Number of tokenizer warnings.
    pub warning_count: u32,
    /// Tokenizer warnings.
    pub warnings: Vec<String>,
    /// Declared coordinate unit, absent when no layer declares one.
    pub units: Option<LengthUnit>,
}

impl From<&DecodeReport> for DecodeMeta {
    fn from(report: &DecodeReport) -> Self {
        Self {
            sockets: report.sockets.clone(),
            status: report.status().cloned(),
            diagnostics: report.diagnostics.clone(),
            mode: report.mode,
            layers: report.layers.clone(),
            warning_count: saturate_u32(report.warnings.len()),
            warnings: report.warnings.clone(),
            units: report.units,
        }
    }
}

/// Grid check summary handed to JavaScript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridMeta {
    /// True when every socket is on the grid.
    pub all_aligned: bool,
    /// Per-socket results in input order.
    pub checks: Vec<GridCheck>,
    /// Misaligned sockets only.
    pub off_grid: Vec<GridCheck>,
    /// Summary diagnostic, absent for an empty list.
    pub status: Option<Diagnostic>,
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn optional_from_js<T: DeserializeOwned + Default>(value: JsValue) -> Result<T, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    serde_wasm_bindgen::from_value(value).map_err(js_error)
}

/// Initialize the WASM module. Sets up the panic hook for debugging.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Encode a net name into its socket circles.
///
/// Returns `[{index, label, diameter}]` as a `JsValue`.
///
/// # Errors
///
/// Returns the validation message for empty, overlong, or non-ASCII names.
#[wasm_bindgen]
pub fn encode_socket(name: &str) -> Result<JsValue, JsValue> {
    let circles = encode_socket_internal(name).map_err(|e| JsValue::from_str(&e))?;
    serde_wasm_bindgen::to_value(&circles).map_err(js_error)
}

/// Internal encode logic shared between the wasm export and native tests.
#[doc(hidden)]
pub fn encode_socket_internal(name: &str) -> Result<Vec<Circle>, String> {
    socket::encode(name).map_err(|err| err.to_string())
}

/// Decode the sockets of an uploaded board.
///
/// `layers` is an array of `{filename, content?, graphicObjects?}`;
/// `config` is an optional decode configuration object.
/// Returns [`DecodeMeta`] as a `JsValue`. Socket positions of the pass are
/// stored internally; retrieve them with [`get_socket_positions`].
///
/// # Errors
///
/// Returns an error string if the arguments cannot be deserialized.
#[wasm_bindgen]
pub fn decode_sockets(layers: JsValue, config: JsValue) -> Result<JsValue, JsValue> {
    let layers: Vec<LayerInput> = serde_wasm_bindgen::from_value(layers).map_err(js_error)?;
    let config: DecodeConfig = optional_from_js(config)?;
    let meta = decode_sockets_internal(&layers, &config);
    serde_wasm_bindgen::to_value(&meta).map_err(js_error)
}

/// Internal decode logic shared between the wasm export and native tests.
#[doc(hidden)]
pub fn decode_sockets_internal(layers: &[LayerInput], config: &DecodeConfig) -> DecodeMeta {
    let report = socket::decode_layers(layers, config);
    let meta = DecodeMeta::from(&report);
    store_report(report);
    meta
}

/// Check sockets against the placement grid.
///
/// `sockets` is an array of socket records; `config` is an optional
/// `{spacing, tolerance}` object. Returns [`GridMeta`] as a `JsValue`.
///
/// # Errors
///
/// Returns an error string if the arguments cannot be deserialized.
#[wasm_bindgen]
pub fn check_grid(sockets: JsValue, config: JsValue) -> Result<JsValue, JsValue> {
    let sockets: Vec<SocketRecord> = serde_wasm_bindgen::from_value(sockets).map_err(js_error)?;
    let config: GridConfig = optional_from_js(config)?;
    let meta = check_grid_internal(&sockets, config);
    serde_wasm_bindgen::to_value(&meta).map_err(js_error)
}

/// Internal grid logic shared between the wasm export and native tests.
#[doc(hidden)]
pub fn check_grid_internal(sockets: &[SocketRecord], config: GridConfig) -> GridMeta {
    let report = GridValidator::from(config).validate(sockets);
    let status = report.diagnostic();
    GridMeta {
        all_aligned: report.all_aligned,
        checks: report.checks,
        off_grid: report.off_grid,
        status,
    }
}

/// Generate a socket layer from `[{name, x, y}]` placements.
///
/// Returns the RS-274X text of the layer.
///
/// # Errors
///
/// Returns the validation message of the first name that cannot be encoded.
#[wasm_bindgen]
pub fn generate_socket_layer(placements: JsValue) -> Result<String, JsValue> {
    let placements: Vec<PlacedSocket> =
        serde_wasm_bindgen::from_value(placements).map_err(js_error)?;
    generate_socket_layer_internal(&placements).map_err(|e| JsValue::from_str(&e))
}

/// Internal generation logic shared between the wasm export and native tests.
#[doc(hidden)]
pub fn generate_socket_layer_internal(placements: &[PlacedSocket]) -> Result<String, String> {
    gerber::write_socket_layer(placements).map_err(|err| err.to_string())
}

/// Retrieve the socket positions of the last decode pass.
///
/// Returns interleaved `[x0, y0, x1, y1, ...]` in reading order, or an
/// empty array if nothing has been decoded yet.
#[wasm_bindgen]
pub fn get_socket_positions() -> Vec<f64> {
    LAST_REPORT.with(|r| {
        r.borrow().as_ref().map_or_else(Vec::new, |report| {
            let mut flat = Vec::with_capacity(report.sockets.len() * 2);
            for socket in &report.sockets {
                flat.push(socket.x);
                flat.push(socket.y);
            }
            flat
        })
    })
}
