//! Socket layer generation.
//!
//! [`SocketLayerBuilder`] places encoded socket names on a layer as
//! zero-length draws and serialises the result as RS-274X. Each event's
//! line number matches the line it is written on, so lexing the output
//! reproduces the builder's events exactly.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use gerber_types::Unit;
use serde::Deserialize;

use crate::error::SocketError;
use crate::socket::encode::encode;
use crate::socket::wire::WireDiameter;

use super::lexer::FIRST_APERTURE_CODE;
use super::types::{ApertureTool, DrawEvent, DrawOp, Point};

/// Fixed-point units per coordinate unit in the written `4.6` format.
const COORDINATE_SCALE: f64 = 1_000_000.0;
/// Smallest scaled magnitude that needs a fifth integer digit.
const COORDINATE_LIMIT: f64 = 10_000.0 * COORDINATE_SCALE;
/// Lines written before the first event.
const HEADER_LINES: usize = 4;

/// A socket name and where to put it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlacedSocket {
    /// Net name to encode.
    pub name: String,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

/// Accumulates socket circles for one layer.
#[derive(Debug)]
pub struct SocketLayerBuilder {
    units: Unit,
    codes: BTreeMap<WireDiameter, u32>,
    next_code: u32,
    events: Vec<DrawEvent>,
}

impl SocketLayerBuilder {
    /// Creates an empty millimetre layer.
    pub const fn new() -> Self {
        Self::with_units(Unit::Millimeters)
    }

    /// Creates an empty layer in the given unit.
    pub const fn with_units(units: Unit) -> Self {
        Self {
            units,
            codes: BTreeMap::new(),
            next_code: FIRST_APERTURE_CODE,
            events: Vec::new(),
        }
    }

    /// Encodes `name` and draws its circles at `(x, y)`.
    ///
    /// Coordinates are snapped to the written precision of six decimals.
    ///
    /// # Errors
    ///
    /// Returns the encoder's validation error, or [`SocketError::CoordinateError`]
    /// when a coordinate is not finite or its magnitude reaches 10000. The
    /// layer is left unchanged.
    pub fn place(&mut self, name: &str, x: f64, y: f64) -> Result<(), SocketError> {
        let circles = encode(name)?;
        let position = Point::new(snap('X', x)?, snap('Y', y)?);
        for circle in circles {
            let code = self.code_for(circle.diameter);
            self.push(DrawOp::ToolSelect { code });
            self.push(DrawOp::Move(position));
            self.push(DrawOp::Draw(position));
        }
        Ok(())
    }

    /// Events placed so far.
    pub fn events(&self) -> &[DrawEvent] {
        &self.events
    }

    /// Consumes the builder, returning its events.
    pub fn finish(self) -> Vec<DrawEvent> {
        self.events
    }

    /// Serialises the layer as RS-274X text.
    pub fn to_gerber(&self) -> String {
        let unit = match self.units {
            Unit::Millimeters => "MM",
            Unit::Inches => "IN",
        };
        let mut out = String::new();
        out.push_str("G04 GerberSockets layer*\n");
        out.push_str("%FSLAX46Y46*%\n");
        let _ = writeln!(out, "%MO{unit}*%");
        out.push_str("%LPD*%\n");
        for event in &self.events {
            write_op(&mut out, &event.op);
        }
        out.push_str("M02*\n");
        out
    }

    fn code_for(&mut self, diameter: WireDiameter) -> u32 {
        if let Some(code) = self.codes.get(&diameter) {
            return *code;
        }
        let code = self.next_code;
        self.next_code += 1;
        self.codes.insert(diameter, code);
        self.push(DrawOp::ToolDefine {
            code,
            tool: ApertureTool::circle(diameter.to_f64()),
        });
        code
    }

    fn push(&mut self, op: DrawOp) {
        let line = HEADER_LINES + self.events.len() + 1;
        self.events.push(DrawEvent::new(line, op));
    }
}

impl Default for SocketLayerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes every placement to a new millimetre layer.
///
/// # Errors
///
/// Returns the first encoding failure; no text is produced in that case.
pub fn write_socket_layer(placements: &[PlacedSocket]) -> Result<String, SocketError> {
    let mut builder = SocketLayerBuilder::new();
    for placement in placements {
        builder.place(&placement.name, placement.x, placement.y)?;
    }
    Ok(builder.to_gerber())
}

fn write_op(out: &mut String, op: &DrawOp) {
    let _ = match op {
        DrawOp::ToolDefine { code, tool } => {
            let params: Vec<String> = tool.params.iter().map(f64::to_string).collect();
            if params.is_empty() {
                writeln!(out, "%ADD{code}{}*%", tool.shape.template())
            } else {
                writeln!(
                    out,
                    "%ADD{code}{},{}*%",
                    tool.shape.template(),
                    params.join("X")
                )
            }
        }
        DrawOp::ToolSelect { code } => writeln!(out, "D{code}*"),
        DrawOp::Move(point) => writeln!(out, "X{}Y{}D02*", fixed(point.x), fixed(point.y)),
        DrawOp::Draw(point) => writeln!(out, "X{}Y{}D01*", fixed(point.x), fixed(point.y)),
    };
}

#[allow(clippy::cast_possible_truncation)]
fn fixed(value: f64) -> i64 {
    (value * COORDINATE_SCALE).round() as i64
}

fn snap(axis: char, value: f64) -> Result<f64, SocketError> {
    let scaled = (value * COORDINATE_SCALE).round();
    if scaled.is_finite() && scaled.abs() < COORDINATE_LIMIT {
        Ok(scaled / COORDINATE_SCALE)
    } else {
        Err(SocketError::CoordinateError { axis, value })
    }
}
