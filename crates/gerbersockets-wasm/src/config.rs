//! Decode-pass configuration.
//!
//! Every field has a default, so an empty object (or no object at all)
//! from JavaScript yields the stock behavior.

use serde::Deserialize;

/// Default grid spacing in board units.
pub const DEFAULT_GRID_SPACING: f64 = 0.25;
/// Default absolute grid tolerance.
pub const DEFAULT_GRID_TOLERANCE: f64 = 1e-4;

/// Chooses which uploaded layers feed the decoder.
pub trait LayerSelector {
    /// Whether the layer with this file name is a socket layer.
    fn matches(&self, filename: &str) -> bool;
}

impl<F: Fn(&str) -> bool> LayerSelector for F {
    fn matches(&self, filename: &str) -> bool {
        self(filename)
    }
}

/// Selects layers by file extension plus a marker token in the name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MarkerLayerSelector {
    /// Accepted extensions, compared case-insensitively.
    pub extensions: Vec<String>,
    /// Token the file name must contain (case-sensitive).
    pub marker: String,
}

impl Default for MarkerLayerSelector {
    fn default() -> Self {
        Self {
            extensions: vec![".gbr".to_string()],
            marker: "GerberSockets".to_string(),
        }
    }
}

impl LayerSelector for MarkerLayerSelector {
    fn matches(&self, filename: &str) -> bool {
        let lower = filename.to_ascii_lowercase();
        let known_extension = self
            .extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_ascii_lowercase()));
        known_extension && filename.contains(&self.marker)
    }
}

/// How many matching layers a pass reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerPolicy {
    /// Only the first matching layer.
    #[default]
    FirstMatch,
    /// Every matching layer, circles merged by position.
    AllMatching,
}

/// Grid validation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Expected socket spacing.
    pub spacing: f64,
    /// Absolute tolerance on each coordinate.
    pub tolerance: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            spacing: DEFAULT_GRID_SPACING,
            tolerance: DEFAULT_GRID_TOLERANCE,
        }
    }
}

/// Full configuration of a decode pass.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Socket layer selection.
    pub layer: MarkerLayerSelector,
    /// Single-layer or merged decoding.
    pub policy: LayerPolicy,
    /// Grid validation parameters.
    pub grid: GridConfig,
}
