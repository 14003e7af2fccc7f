//! Decoded socket records and decode-pass diagnostics.

use gerber_types::Unit;
use serde::{Deserialize, Serialize};

/// A socket recovered from a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketRecord {
    /// Decoded name; empty for legacy sockets and undecodable positions.
    pub ascii: String,
    /// X coordinate of the socket.
    pub x: f64,
    /// Y coordinate of the socket.
    pub y: f64,
    /// Raw diameters seen at the position, set only in legacy mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diameters: Option<Vec<f64>>,
}

/// Presentation severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    Info,
    /// Operation succeeded.
    Success,
    /// Non-fatal problem.
    Warning,
    /// Fatal problem; no results.
    Error,
}

/// Which condition a diagnostic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// No layer matched the layer selector.
    LayerNotFound,
    /// Positions carried the identifier but no decodable character.
    MissingAscii,
    /// Positions carried colliding identifier or character circles.
    Overlap,
    /// The whole pass fell back to legacy sockets.
    LegacyFallback,
    /// Every socket sits on the grid.
    GridAligned,
    /// Some sockets are off the grid.
    OffGrid,
}

/// One aggregated message for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Reported condition.
    pub kind: DiagnosticKind,
    /// Presentation severity.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
    /// Number of affected positions, where that applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl Diagnostic {
    /// Expected layer absent.
    pub fn layer_not_found() -> Self {
        Self {
            kind: DiagnosticKind::LayerNotFound,
            severity: Severity::Error,
            message: "No GerberSockets layer found in the uploaded gerber files".to_string(),
            count: None,
        }
    }

    /// `count` identified positions decoded to no characters.
    pub fn missing_ascii(count: usize) -> Self {
        Self {
            kind: DiagnosticKind::MissingAscii,
            severity: Severity::Warning,
            message: format!("{count} ASCII GerberSocket(s) failed to have their ASCII decoded"),
            count: Some(count),
        }
    }

    /// `count` positions had colliding circles.
    pub fn overlap(count: usize) -> Self {
        Self {
            kind: DiagnosticKind::Overlap,
            severity: Severity::Warning,
            message: format!(
                "{count} GerberSocket position(s) had overlapping circles; later circles took precedence"
            ),
            count: Some(count),
        }
    }

    /// No identifier anywhere; legacy sockets shown.
    pub fn legacy_fallback() -> Self {
        Self {
            kind: DiagnosticKind::LegacyFallback,
            severity: Severity::Warning,
            message: "No ASCII GerberSocket identifiers were found, showing legacy sockets instead"
                .to_string(),
            count: None,
        }
    }

    /// All `count` sockets are on a grid of `spacing`.
    pub fn grid_aligned(count: usize, spacing: f64) -> Self {
        Self {
            kind: DiagnosticKind::GridAligned,
            severity: Severity::Success,
            message: format!("All {count} socket(s) are aligned to the {spacing} mm grid"),
            count: Some(count),
        }
    }

    /// `count` sockets are off a grid of `spacing`.
    pub fn off_grid(count: usize, spacing: f64) -> Self {
        Self {
            kind: DiagnosticKind::OffGrid,
            severity: Severity::Warning,
            message: format!("{count} socket(s) are not aligned to the {spacing} mm grid"),
            count: Some(count),
        }
    }
}

/// How a decode pass interpreted its layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Identifier-marked positions decoded to names.
    Ascii,
    /// No identifier anywhere; raw diameters surfaced.
    Legacy,
}

/// Coordinate unit declared by the decoded layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    /// Millimetres (`%MOMM*%`).
    Mm,
    /// Inches (`%MOIN*%`).
    In,
}

impl From<Unit> for LengthUnit {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::Millimeters => Self::Mm,
            Unit::Inches => Self::In,
        }
    }
}

/// Result of one decode pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeReport {
    /// Sockets, top row first, left to right.
    pub sockets: Vec<SocketRecord>,
    /// Interpretation chosen for the pass.
    pub mode: DecodeMode,
    /// Aggregated diagnostics, in the order they were raised.
    pub diagnostics: Vec<Diagnostic>,
    /// Names of the layers that fed the pass.
    pub layers: Vec<String>,
    /// Tokenizer warnings from those layers.
    pub warnings: Vec<String>,
    /// Unit declared by the first layer that declares one.
    pub units: Option<LengthUnit>,
}

impl DecodeReport {
    /// An empty report carrying a single error diagnostic.
    pub fn failed(diagnostic: Diagnostic) -> Self {
        Self {
            sockets: Vec::new(),
            mode: DecodeMode::Ascii,
            diagnostics: vec![diagnostic],
            layers: Vec::new(),
            warnings: Vec::new(),
            units: None,
        }
    }

    /// The one diagnostic to show: most severe, latest among equals.
    pub fn status(&self) -> Option<&Diagnostic> {
        self.diagnostics
            .iter()
            .enumerate()
            .max_by_key(|(order, diagnostic)| (diagnostic.severity, *order))
            .map(|(_, diagnostic)| diagnostic)
    }

    /// Whether the pass ended in a fatal condition.
    pub fn is_fatal(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ut_unit_001_declared_units_map_to_lowercase_names() {
        assert_eq!(LengthUnit::from(Unit::Millimeters), LengthUnit::Mm);
        assert_eq!(LengthUnit::from(Unit::Inches), LengthUnit::In);
    }

    #[test]
    fn ut_diag_001_status_prefers_latest_warning() {
        let mut report = DecodeReport::failed(Diagnostic::missing_ascii(2));
        report.diagnostics.push(Diagnostic::overlap(1));
        let status = report.status();
        assert_eq!(status.map(|d| d.kind), Some(DiagnosticKind::Overlap));
        assert!(!report.is_fatal());
    }

    #[test]
    fn ut_diag_002_error_outranks_later_warning() {
        let mut report = DecodeReport::failed(Diagnostic::layer_not_found());
        report.diagnostics.push(Diagnostic::legacy_fallback());
        assert_eq!(report.status().map(|d| d.severity), Some(Severity::Error));
        assert!(report.units.is_none());
        assert!(report.is_fatal());
    }

    #[test]
    fn ut_diag_003_messages_carry_counts() {
        assert_eq!(
            Diagnostic::missing_ascii(3).message,
            "3 ASCII GerberSocket(s) failed to have their ASCII decoded"
        );
        assert_eq!(
            Diagnostic::grid_aligned(4, 0.25).message,
            "All 4 socket(s) are aligned to the 0.25 mm grid"
        );
    }
}
