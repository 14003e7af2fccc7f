//! Drawing-command types shared by the tokenizers, the writer, and the detector.

use gerber_types::Unit;

/// 2D point in board coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Creates a point from its coordinates.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Aperture template named in an aperture definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApertureShape {
    /// Standard circle template (`C`).
    Circle,
    /// Standard rectangle template (`R`).
    Rectangle,
    /// Standard obround template (`O`).
    Obround,
    /// Standard regular polygon template (`P`).
    Polygon,
    /// Aperture macro referenced by name.
    Macro(String),
}

impl ApertureShape {
    /// Resolves a template name as written in an aperture definition.
    pub fn from_template(name: &str) -> Self {
        match name {
            "C" => Self::Circle,
            "R" => Self::Rectangle,
            "O" => Self::Obround,
            "P" => Self::Polygon,
            other => Self::Macro(other.to_string()),
        }
    }

    /// Resolves a lowercase shape tag as emitted by the browser tokenizer.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "circle" => Self::Circle,
            "rect" | "rectangle" => Self::Rectangle,
            "obround" => Self::Obround,
            "poly" | "polygon" => Self::Polygon,
            other => Self::Macro(other.to_string()),
        }
    }

    /// Template name used when writing an aperture definition.
    pub fn template(&self) -> &str {
        match self {
            Self::Circle => "C",
            Self::Rectangle => "R",
            Self::Obround => "O",
            Self::Polygon => "P",
            Self::Macro(name) => name,
        }
    }
}

/// An aperture ("tool"): shape tag plus its ordered numeric parameters.
///
/// `params[0]` is the draw diameter for circular apertures.
#[derive(Debug, Clone, PartialEq)]
pub struct ApertureTool {
    /// Template the aperture was defined from.
    pub shape: ApertureShape,
    /// Ordered template parameters.
    pub params: Vec<f64>,
}

impl ApertureTool {
    /// Creates a circular aperture of the given diameter.
    pub fn circle(diameter: f64) -> Self {
        Self {
            shape: ApertureShape::Circle,
            params: vec![diameter],
        }
    }

    /// Draw diameter of the tool, `0` when it has no parameters.
    pub fn diameter(&self) -> f64 {
        self.params.first().copied().unwrap_or(0.0)
    }
}

/// One drawing command of a layer.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Defines (or redefines) the tool under a D-code.
    ToolDefine {
        /// D-code being defined.
        code: u32,
        /// Tool bound to the code.
        tool: ApertureTool,
    },
    /// Selects the tool under a D-code for subsequent draws.
    ToolSelect {
        /// D-code being selected.
        code: u32,
    },
    /// Moves to a position without drawing.
    Move(Point),
    /// Draws a straight line from the current position.
    Draw(Point),
}

/// A drawing command tagged with the source line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawEvent {
    /// 1-based source line number.
    pub line: usize,
    /// The command itself.
    pub op: DrawOp,
}

impl DrawEvent {
    /// Creates an event at the given source line.
    pub const fn new(line: usize, op: DrawOp) -> Self {
        Self { line, op }
    }
}

/// Drawing events of one layer plus what the tokenizer learned on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEvents {
    /// Ordered drawing events.
    pub events: Vec<DrawEvent>,
    /// Declared unit, if any.
    pub units: Option<Unit>,
    /// Skipped or suspicious input.
    pub warnings: Vec<String>,
}
