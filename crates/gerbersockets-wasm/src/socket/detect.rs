//! Zero-length draw detection.
//!
//! Walks one layer's drawing commands and collects, per canonical position,
//! the diameter of the selected tool at every draw that ends where it
//! started. The scan is a fold over an explicit [`DetectorState`], so each
//! layer is processed independently.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::gerber::types::{ApertureTool, DrawEvent, DrawOp, Point};

/// Fixed-point units per coordinate unit (five decimal digits).
const POSITION_SCALE: f64 = 100_000.0;

/// A position quantized to five decimal digits.
///
/// Ordering is by `x`, then `y`; it only serves to keep map iteration stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalPosition {
    x: i64,
    y: i64,
}

impl CanonicalPosition {
    /// Quantizes a point, collapsing float jitter below `5e-6`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_point(point: Point) -> Self {
        Self {
            x: (point.x * POSITION_SCALE).round() as i64,
            y: (point.y * POSITION_SCALE).round() as i64,
        }
    }

    /// X coordinate.
    #[allow(clippy::cast_precision_loss)]
    pub fn x(self) -> f64 {
        self.x as f64 / POSITION_SCALE
    }

    /// Y coordinate.
    #[allow(clippy::cast_precision_loss)]
    pub fn y(self) -> f64 {
        self.y as f64 / POSITION_SCALE
    }

    /// Board reading order: higher `y` first, then lower `x`.
    pub fn reading_order(self, other: Self) -> std::cmp::Ordering {
        other.y.cmp(&self.y).then(self.x.cmp(&other.x))
    }
}

/// Diameters observed at one canonical position, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub struct CircleRecord {
    /// Grouping key.
    pub position: CanonicalPosition,
    /// Diameters of every zero-length draw at the position.
    pub diameters: Vec<f64>,
}

/// Canonical position to circle record map for one decode pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CircleMap {
    records: BTreeMap<CanonicalPosition, CircleRecord>,
}

impl CircleMap {
    /// Creates an empty map.
    pub const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Appends a diameter at a position.
    pub fn push(&mut self, position: CanonicalPosition, diameter: f64) {
        self.records
            .entry(position)
            .or_insert_with(|| CircleRecord {
                position,
                diameters: Vec::new(),
            })
            .diameters
            .push(diameter);
    }

    /// Folds another layer's circles into this map, keeping layer order.
    pub fn merge(&mut self, other: Self) {
        for (position, record) in other.records {
            match self.records.entry(position) {
                Entry::Occupied(mut existing) => {
                    existing.get_mut().diameters.extend(record.diameters);
                }
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }
    }

    /// Record at a position, if any.
    pub fn get(&self, position: CanonicalPosition) -> Option<&CircleRecord> {
        self.records.get(&position)
    }

    /// Iterates records in key order.
    pub fn iter(&self) -> impl Iterator<Item = &CircleRecord> {
        self.records.values()
    }

    /// Number of distinct positions.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no circle was found.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Scanner state threaded through one layer's events.
#[derive(Debug, Default)]
pub struct DetectorState {
    /// Tools defined so far, by D-code.
    tools: HashMap<u32, ApertureTool>,
    /// Diameter of the selected tool, if the selection resolved.
    current_diameter: Option<f64>,
    /// End point of the last move or draw.
    last_position: Option<(Point, usize)>,
    circles: CircleMap,
}

impl DetectorState {
    /// Creates a fresh accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event.
    #[must_use]
    pub fn apply(mut self, event: &DrawEvent) -> Self {
        match &event.op {
            DrawOp::ToolDefine { code, tool } => {
                self.tools.insert(*code, tool.clone());
            }
            DrawOp::ToolSelect { code } => {
                self.current_diameter = self.tools.get(code).map(ApertureTool::diameter);
                if self.current_diameter.is_none() {
                    debug!(line = event.line, code, "selected tool is not defined");
                }
            }
            DrawOp::Move(point) => {
                self.last_position = Some((*point, event.line));
            }
            DrawOp::Draw(point) => {
                self.record_draw(*point, event.line);
                self.last_position = Some((*point, event.line));
            }
        }
        self
    }

    #[allow(clippy::float_cmp)]
    fn record_draw(&mut self, point: Point, line: usize) {
        let Some((last, last_line)) = self.last_position else {
            return;
        };
        if last.x != point.x || last.y != point.y {
            return;
        }
        let Some(diameter) = self.current_diameter else {
            return;
        };
        debug!(
            x = point.x,
            y = point.y,
            diameter,
            from_line = last_line,
            line,
            "zero-length draw"
        );
        self.circles
            .push(CanonicalPosition::from_point(point), diameter);
    }

    /// Consumes the state, returning the circles found.
    pub fn finish(self) -> CircleMap {
        self.circles
    }
}

/// Collects zero-length draws from one layer's event stream.
pub fn detect_circles(events: &[DrawEvent]) -> CircleMap {
    events
        .iter()
        .fold(DetectorState::new(), DetectorState::apply)
        .finish()
}
