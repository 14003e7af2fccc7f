//! Records emitted by the browser-side Gerber tokenizer.
//!
//! The tokenizer streams plain objects such as
//! `{"type":"tool","line":14,"code":"12","tool":{"shape":"circle","params":[0.01083]}}`,
//! `{"type":"set","line":102,"prop":"tool","value":"12"}` and
//! `{"type":"op","line":104,"op":"int","coord":{"x":-6.5,"y":8.25}}`.
//! This module maps them onto [`DrawEvent`]s; record types the detector has
//! no use for are dropped.

use gerber_types::Unit;
use serde::de::IgnoredAny;
use serde::Deserialize;
use tracing::debug;

use super::lexer::lex_str;
use super::types::{ApertureShape, ApertureTool, DrawEvent, DrawOp, LayerEvents, Point};

/// One tokenizer record.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TokenRecord {
    /// Tool (aperture) definition.
    Tool {
        /// Source line.
        #[serde(default)]
        line: usize,
        /// D-code as text, e.g. `"12"`.
        code: String,
        /// Tool description.
        tool: TokenTool,
    },
    /// Modal property change (`tool`, `mode`, `units`, …).
    Set {
        /// Source line.
        #[serde(default)]
        line: usize,
        /// Property name.
        prop: String,
        /// New value.
        #[serde(default)]
        value: TokenValue,
    },
    /// Graphics operation.
    Op {
        /// Source line.
        #[serde(default)]
        line: usize,
        /// `move`, `int`, `flash` or `last`.
        op: String,
        /// Target coordinate; missing axes keep their previous value.
        #[serde(default)]
        coord: TokenCoord,
    },
    /// Any other record type.
    #[serde(other)]
    Other,
}

/// Tool description inside a `tool` record.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenTool {
    /// Shape tag (`circle`, `rect`, `obround`, `poly`, or a macro name).
    pub shape: String,
    /// Ordered numeric parameters.
    #[serde(default)]
    pub params: Vec<f64>,
}

/// Value of a `set` record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TokenValue {
    /// Textual value.
    Text(String),
    /// Numeric value.
    Number(f64),
    /// Anything else.
    Other(IgnoredAny),
}

impl Default for TokenValue {
    fn default() -> Self {
        Self::Other(IgnoredAny)
    }
}

impl TokenValue {
    fn code(&self) -> Option<u32> {
        match self {
            Self::Text(text) => parse_code(text),
            Self::Number(number) => float_code(*number),
            Self::Other(_) => None,
        }
    }

    fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Number(_) | Self::Other(_) => None,
        }
    }
}

/// Coordinate of an `op` record.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TokenCoord {
    /// X coordinate.
    pub x: Option<f64>,
    /// Y coordinate.
    pub y: Option<f64>,
}

/// One uploaded layer file, raw or pre-tokenized.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerInput {
    /// File name, used for layer selection.
    pub filename: String,
    /// Raw Gerber text.
    #[serde(default)]
    pub content: Option<String>,
    /// Tokenizer output; preferred over `content` when present.
    #[serde(default, rename = "graphicObjects")]
    pub graphic_objects: Option<Vec<TokenRecord>>,
}

impl LayerInput {
    /// A layer carrying raw Gerber text.
    pub fn from_text(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: Some(content.into()),
            graphic_objects: None,
        }
    }

    /// Drawing events of the layer, from whichever source it carries.
    pub fn events(&self) -> LayerEvents {
        if let Some(records) = &self.graphic_objects {
            return events_from_tokens(records);
        }
        self.content.as_deref().map_or_else(
            || LayerEvents {
                events: Vec::new(),
                units: None,
                warnings: vec![format!("layer `{}` has no content", self.filename)],
            },
            lex_str,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Interpolate,
    Move,
    Flash,
}

#[derive(Debug)]
struct TokenState {
    position: Point,
    circular: bool,
    last_operation: Option<Operation>,
    units: Option<Unit>,
    events: Vec<DrawEvent>,
    warnings: Vec<String>,
}

/// Converts tokenizer records into drawing events.
pub fn events_from_tokens(records: &[TokenRecord]) -> LayerEvents {
    let mut state = TokenState {
        position: Point::new(0.0, 0.0),
        circular: false,
        last_operation: None,
        units: None,
        events: Vec::new(),
        warnings: Vec::new(),
    };

    for record in records {
        match record {
            TokenRecord::Tool { line, code, tool } => state.define(*line, code, tool),
            TokenRecord::Set { line, prop, value } => state.set(*line, prop, value),
            TokenRecord::Op { line, op, coord } => state.operate(*line, op, *coord),
            TokenRecord::Other => {}
        }
    }

    LayerEvents {
        events: state.events,
        units: state.units,
        warnings: state.warnings,
    }
}

impl TokenState {
    fn warn(&mut self, line: usize, msg: &str) {
        self.warnings.push(format!("line {line}: {msg}"));
    }

    fn define(&mut self, line: usize, code: &str, tool: &TokenTool) {
        let Some(code) = parse_code(code) else {
            self.warn(line, &format!("invalid tool code `{code}`"));
            return;
        };
        self.events.push(DrawEvent::new(
            line,
            DrawOp::ToolDefine {
                code,
                tool: ApertureTool {
                    shape: ApertureShape::from_tag(&tool.shape),
                    params: tool.params.clone(),
                },
            },
        ));
    }

    fn set(&mut self, line: usize, prop: &str, value: &TokenValue) {
        match prop {
            "tool" => {
                let Some(code) = value.code() else {
                    self.warn(line, &format!("invalid tool selection `{value:?}`"));
                    return;
                };
                self.events
                    .push(DrawEvent::new(line, DrawOp::ToolSelect { code }));
            }
            "mode" => self.circular = matches!(value.text(), Some("cw" | "ccw")),
            "units" => match value.text() {
                Some("mm") => self.units = Some(Unit::Millimeters),
                Some("in") => self.units = Some(Unit::Inches),
                _ => self.warn(line, &format!("unknown units `{value:?}`")),
            },
            other => debug!(line, prop = other, "set record ignored"),
        }
    }

    fn operate(&mut self, line: usize, op: &str, coord: TokenCoord) {
        let operation = match op {
            "int" => Operation::Interpolate,
            "move" => Operation::Move,
            "flash" => Operation::Flash,
            "last" => {
                let Some(previous) = self.last_operation else {
                    self.warn(line, "repeated operation without a previous one");
                    return;
                };
                previous
            }
            other => {
                self.warn(line, &format!("unknown operation `{other}`"));
                return;
            }
        };

        let target = Point::new(
            coord.x.unwrap_or(self.position.x),
            coord.y.unwrap_or(self.position.y),
        );
        let draw = match operation {
            Operation::Interpolate if !self.circular => DrawOp::Draw(target),
            Operation::Interpolate | Operation::Move | Operation::Flash => DrawOp::Move(target),
        };
        self.events.push(DrawEvent::new(line, draw));
        self.position = target;
        self.last_operation = Some(operation);
    }
}

fn parse_code(raw: &str) -> Option<u32> {
    raw.trim().trim_start_matches('D').parse::<u32>().ok()
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]
fn float_code(value: f64) -> Option<u32> {
    let in_range = value.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&value);
    in_range.then_some(value as u32)
}
