//! Grid alignment checks for decoded sockets.

use serde::Serialize;

use crate::config::{GridConfig, DEFAULT_GRID_SPACING, DEFAULT_GRID_TOLERANCE};

use super::types::{Diagnostic, SocketRecord};

/// Whether `value` lies on a multiple of `spacing` within the default tolerance.
pub fn is_on_grid(value: f64, spacing: f64) -> bool {
    is_on_grid_within(value, spacing, DEFAULT_GRID_TOLERANCE)
}

/// Whether `value` lies within `tolerance` of a multiple of `spacing`.
///
/// The sign of `spacing` is ignored. A zero or non-finite spacing only
/// accepts values within tolerance of zero.
pub fn is_on_grid_within(value: f64, spacing: f64, tolerance: f64) -> bool {
    let spacing = spacing.abs();
    if spacing <= 0.0 || !spacing.is_finite() {
        return value.abs() < tolerance;
    }
    let remainder = (value % spacing).abs();
    remainder < tolerance || (remainder - spacing).abs() < tolerance
}

/// Alignment of one socket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCheck {
    /// Position in the checked list.
    pub index: usize,
    /// Decoded name, empty for legacy sockets.
    pub ascii: String,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Whether both coordinates are on the grid.
    pub aligned: bool,
}

/// Result of checking a socket list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridReport {
    /// Spacing the sockets were checked against.
    pub spacing: f64,
    /// One entry per socket, in input order.
    pub checks: Vec<GridCheck>,
    /// True when every socket is aligned, including for an empty list.
    pub all_aligned: bool,
    /// The misaligned subset of `checks`.
    pub off_grid: Vec<GridCheck>,
}

impl GridReport {
    /// Summary diagnostic, `None` when nothing was checked.
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        if self.checks.is_empty() {
            return None;
        }
        Some(if self.all_aligned {
            Diagnostic::grid_aligned(self.checks.len(), self.spacing)
        } else {
            Diagnostic::off_grid(self.off_grid.len(), self.spacing)
        })
    }
}

/// Checks socket positions against a square grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridValidator {
    spacing: f64,
    tolerance: f64,
}

impl GridValidator {
    /// Validator for `spacing` with the default tolerance.
    pub const fn new(spacing: f64) -> Self {
        Self {
            spacing,
            tolerance: DEFAULT_GRID_TOLERANCE,
        }
    }

    /// Replaces the tolerance.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Whether a single point is aligned.
    pub fn is_aligned(&self, x: f64, y: f64) -> bool {
        is_on_grid_within(x, self.spacing, self.tolerance)
            && is_on_grid_within(y, self.spacing, self.tolerance)
    }

    /// Checks every socket.
    pub fn validate(&self, sockets: &[SocketRecord]) -> GridReport {
        let checks: Vec<GridCheck> = sockets
            .iter()
            .enumerate()
            .map(|(index, socket)| GridCheck {
                index,
                ascii: socket.ascii.clone(),
                x: socket.x,
                y: socket.y,
                aligned: self.is_aligned(socket.x, socket.y),
            })
            .collect();
        let off_grid: Vec<GridCheck> = checks.iter().filter(|c| !c.aligned).cloned().collect();
        GridReport {
            spacing: self.spacing,
            all_aligned: off_grid.is_empty(),
            checks,
            off_grid,
        }
    }
}

impl Default for GridValidator {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SPACING)
    }
}

impl From<GridConfig> for GridValidator {
    fn from(config: GridConfig) -> Self {
        Self::new(config.spacing).with_tolerance(config.tolerance)
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::socket::types::{DiagnosticKind, Severity};

    fn socket(ascii: &str, x: f64, y: f64) -> SocketRecord {
        SocketRecord {
            ascii: ascii.to_string(),
            x,
            y,
            diameters: None,
        }
    }

    #[test]
    fn ut_grid_001_reference_values() {
        assert!(is_on_grid(0.25, 0.25));
        assert!(!is_on_grid(0.26, 0.25));
        assert!(is_on_grid(0.0, 0.25));
        assert!(is_on_grid(-0.25, 0.25));
    }

    #[test]
    fn ut_grid_002_float_noise_near_multiples_is_tolerated() {
        assert!(is_on_grid(0.1 + 0.2 + 0.45, 0.25));
        assert!(is_on_grid(2.749_95, 0.25));
        assert!(!is_on_grid(2.7498, 0.25));
        assert!(is_on_grid(-12.500_01, 0.25));
    }

    #[test]
    fn ut_grid_003_validate_reports_each_socket_and_off_grid_subset() {
        let sockets = vec![
            socket("GND", 0.25, 1.0),
            socket("VCC", 0.26, 1.0),
            socket("SDA", -0.5, 0.3),
        ];
        let report = GridValidator::default().validate(&sockets);
        assert!(!report.all_aligned);
        assert_eq!(report.checks.len(), 3);
        assert!(report.checks[0].aligned);
        let off: Vec<&str> = report.off_grid.iter().map(|c| c.ascii.as_str()).collect();
        assert_eq!(off, vec!["VCC", "SDA"]);
        assert_eq!(report.off_grid[1].index, 2);
        let diagnostic = report.diagnostic();
        assert_eq!(
            diagnostic.as_ref().map(|d| (d.kind, d.severity, d.count)),
            Some((DiagnosticKind::OffGrid, Severity::Warning, Some(2)))
        );
    }

    #[test]
    fn ut_grid_004_aligned_list_reports_success() {
        let sockets = vec![socket("A", 0.0, 0.0), socket("B", 1.25, -3.5)];
        let report = GridValidator::default().validate(&sockets);
        assert!(report.all_aligned);
        assert!(report.off_grid.is_empty());
        assert_eq!(
            report.diagnostic().map(|d| d.message),
            Some("All 2 socket(s) are aligned to the 0.25 mm grid".to_string())
        );
    }

    #[test]
    fn ut_grid_005_config_sets_spacing_and_tolerance() {
        let validator = GridValidator::from(GridConfig {
            spacing: 0.1,
            tolerance: 0.01,
        });
        assert!(validator.is_aligned(0.305, 0.995));
        assert!(!validator.is_aligned(0.35, 0.0));
    }

    #[test]
    fn bc_grid_001_empty_input_is_vacuously_aligned() {
        let report = GridValidator::default().validate(&[]);
        assert!(report.all_aligned);
        assert!(report.checks.is_empty());
        assert!(report.diagnostic().is_none());
    }

    #[test]
    fn bc_grid_002_zero_spacing_only_accepts_origin() {
        assert!(is_on_grid(0.0, 0.0));
        assert!(!is_on_grid(0.25, 0.0));
        assert!(!is_on_grid(0.25, f64::NAN));
    }

    #[test]
    fn bc_grid_003_negative_spacing_uses_its_magnitude() {
        assert!(is_on_grid(0.5, -0.25));
        assert!(is_on_grid(-0.75, -0.25));
        assert!(!is_on_grid(0.3, -0.25));
        assert!(GridValidator::new(-0.25).is_aligned(1.0, -0.5));
    }
}
