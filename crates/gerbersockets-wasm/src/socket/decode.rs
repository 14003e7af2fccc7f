//! Socket decoding.
//!
//! Decoding runs in two passes over the circle map. The first decides, for
//! the whole map, whether any identifier circle exists; the second applies
//! that decision uniformly: identifier-marked positions are decoded to
//! names, or, when no identifier exists anywhere, every position is
//! reported as a legacy socket with its raw diameters.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::config::{DecodeConfig, LayerPolicy, LayerSelector};
use crate::error::SocketError;
use crate::gerber::tokens::LayerInput;

use super::detect::{detect_circles, CanonicalPosition, CircleMap, CircleRecord};
use super::types::{DecodeMode, DecodeReport, Diagnostic, LengthUnit, SocketRecord};
use super::wire::{WireDiameter, WireSymbol};

/// Sockets and diagnostics decoded from one circle map.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutcome {
    /// Sockets in board reading order.
    pub sockets: Vec<SocketRecord>,
    /// Interpretation chosen for the map.
    pub mode: DecodeMode,
    /// Aggregated non-fatal diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of decoding a single position in ASCII mode.
#[derive(Debug, Default)]
struct PositionDecode {
    identifiers: usize,
    slots: BTreeMap<u8, char>,
    overlap: bool,
}

impl PositionDecode {
    fn from_record(record: &CircleRecord) -> Self {
        let mut decoded = Self::default();
        for symbol in record
            .diameters
            .iter()
            .filter_map(|diameter| WireDiameter::from_f64(*diameter))
            .map(WireDiameter::symbol)
        {
            match symbol {
                WireSymbol::Identifier => {
                    decoded.identifiers += 1;
                    if decoded.identifiers > 1 {
                        decoded.overlap = true;
                    }
                }
                WireSymbol::Character { slot, ch } => {
                    if decoded.slots.insert(slot, ch).is_some() {
                        decoded.overlap = true;
                    }
                }
                WireSymbol::Ignored => {}
            }
        }
        decoded
    }

    const fn has_identifier(&self) -> bool {
        self.identifiers > 0
    }

    fn ascii(&self) -> String {
        self.slots.values().collect()
    }
}

/// Decides the interpretation of the whole map.
pub fn decode_mode(circles: &CircleMap) -> DecodeMode {
    let has_identifier = circles.iter().any(|record| {
        record
            .diameters
            .iter()
            .any(|d| WireDiameter::from_f64(*d) == Some(WireDiameter::identifier()))
    });
    let has_circles = circles.iter().any(|record| !record.diameters.is_empty());
    if !has_identifier && has_circles {
        DecodeMode::Legacy
    } else {
        DecodeMode::Ascii
    }
}

/// Decodes every socket in a circle map.
pub fn decode_sockets(circles: &CircleMap) -> DecodeOutcome {
    let mode = decode_mode(circles);
    info!(positions = circles.len(), ?mode, "decoding sockets");

    let (mut sockets, diagnostics) = match mode {
        DecodeMode::Legacy => decode_legacy(circles),
        DecodeMode::Ascii => decode_ascii(circles),
    };

    sockets.sort_by(|a, b| a.0.reading_order(b.0));

    DecodeOutcome {
        sockets: sockets.into_iter().map(|(_, socket)| socket).collect(),
        mode,
        diagnostics,
    }
}

type Keyed = Vec<(CanonicalPosition, SocketRecord)>;

fn decode_legacy(circles: &CircleMap) -> (Keyed, Vec<Diagnostic>) {
    let sockets = circles
        .iter()
        .filter(|record| !record.diameters.is_empty())
        .map(|record| {
            (
                record.position,
                SocketRecord {
                    ascii: String::new(),
                    x: record.position.x(),
                    y: record.position.y(),
                    diameters: Some(record.diameters.clone()),
                },
            )
        })
        .collect();

    let diagnostic = Diagnostic::legacy_fallback();
    warn!("{}", diagnostic.message);
    (sockets, vec![diagnostic])
}

fn decode_ascii(circles: &CircleMap) -> (Keyed, Vec<Diagnostic>) {
    let mut sockets = Vec::new();
    let mut missing = 0;
    let mut overlaps = 0;

    for record in circles.iter() {
        let decoded = PositionDecode::from_record(record);
        if !decoded.has_identifier() {
            continue;
        }
        if decoded.overlap {
            overlaps += 1;
        }
        let ascii = decoded.ascii();
        if ascii.is_empty() {
            missing += 1;
            warn!(
                x = record.position.x(),
                y = record.position.y(),
                "identifier without decodable characters"
            );
        }
        sockets.push((
            record.position,
            SocketRecord {
                ascii,
                x: record.position.x(),
                y: record.position.y(),
                diameters: None,
            },
        ));
    }

    let mut diagnostics = Vec::new();
    if missing > 0 {
        diagnostics.push(Diagnostic::missing_ascii(missing));
    }
    if overlaps > 0 {
        diagnostics.push(Diagnostic::overlap(overlaps));
    }
    for diagnostic in &diagnostics {
        warn!("{}", diagnostic.message);
    }
    (sockets, diagnostics)
}

/// Picks the layers a pass reads.
///
/// # Errors
///
/// Returns [`SocketError::LayerNotFound`] when no layer matches.
pub fn select_layers<'a, S: LayerSelector + ?Sized>(
    layers: &'a [LayerInput],
    selector: &S,
    policy: LayerPolicy,
) -> Result<Vec<&'a LayerInput>, SocketError> {
    let mut matching = layers
        .iter()
        .filter(|layer| selector.matches(&layer.filename));
    let selected: Vec<&LayerInput> = match policy {
        LayerPolicy::FirstMatch => matching.next().into_iter().collect(),
        LayerPolicy::AllMatching => matching.collect(),
    };
    if selected.is_empty() {
        return Err(SocketError::LayerNotFound);
    }
    Ok(selected)
}

/// Runs a full decode pass over uploaded layers.
///
/// A missing socket layer yields an empty report with one error diagnostic.
pub fn decode_layers(layers: &[LayerInput], config: &DecodeConfig) -> DecodeReport {
    let selected = match select_layers(layers, &config.layer, config.policy) {
        Ok(selected) => selected,
        Err(err) => {
            warn!(layers = layers.len(), "{err}");
            return DecodeReport::failed(Diagnostic::layer_not_found());
        }
    };

    let mut circles = CircleMap::new();
    let mut warnings = Vec::new();
    let mut names = Vec::with_capacity(selected.len());
    let mut units: Option<LengthUnit> = None;
    for layer in selected {
        let events = layer.events();
        if let Some(declared) = events.units.map(LengthUnit::from) {
            let first = *units.get_or_insert(declared);
            if first != declared {
                let name = &layer.filename;
                warnings.push(format!("{name}: units {declared:?} differ from {first:?}"));
            }
        }
        warnings.extend(
            events
                .warnings
                .into_iter()
                .map(|msg| format!("{}: {msg}", layer.filename)),
        );
        circles.merge(detect_circles(&events.events));
        names.push(layer.filename.clone());
    }

    let outcome = decode_sockets(&circles);
    DecodeReport {
        sockets: outcome.sockets,
        mode: outcome.mode,
        diagnostics: outcome.diagnostics,
        layers: names,
        warnings,
        units,
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::gerber::types::Point;
    use crate::socket::types::{DiagnosticKind, Severity};

    fn at(x: f64, y: f64) -> CanonicalPosition {
        CanonicalPosition::from_point(Point::new(x, y))
    }

    fn map(entries: &[((f64, f64), &[f64])]) -> CircleMap {
        let mut circles = CircleMap::new();
        for ((x, y), diameters) in entries {
            for d in *diameters {
                circles.push(at(*x, *y), *d);
            }
        }
        circles
    }

    #[test]
    fn ut_dec_001_identifier_position_decodes_name() {
        let circles = map(&[((1.0, 2.0), &[0.00999, 0.01071, 0.02078, 0.03068])]);
        let outcome = decode_sockets(&circles);
        assert_eq!(outcome.mode, DecodeMode::Ascii);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(
            outcome.sockets,
            vec![SocketRecord {
                ascii: "GND".to_string(),
                x: 1.0,
                y: 2.0,
                diameters: None
            }]
        );
    }

    #[test]
    fn ut_dec_002_slot_order_beats_stream_order() {
        let circles = map(&[((0.0, 0.0), &[0.03068, 0.00999, 0.02078, 0.01071])]);
        let outcome = decode_sockets(&circles);
        assert_eq!(outcome.sockets[0].ascii, "GND");
    }

    #[test]
    fn ut_dec_003_gaps_contribute_nothing() {
        let circles = map(&[((0.0, 0.0), &[0.00999, 0.01065, 0.03067])]);
        let outcome = decode_sockets(&circles);
        assert_eq!(outcome.sockets[0].ascii, "AC");
    }

    #[test]
    fn ut_dec_004_position_without_identifier_is_excluded() {
        let circles = map(&[((0.0, 0.0), &[0.00999, 0.01065]), ((5.0, 5.0), &[0.01066])]);
        let outcome = decode_sockets(&circles);
        assert_eq!(outcome.mode, DecodeMode::Ascii);
        assert_eq!(outcome.sockets.len(), 1);
        assert_eq!(outcome.sockets[0].ascii, "A");
    }

    #[test]
    fn ut_dec_005_duplicate_identifier_counts_one_overlap() {
        let circles = map(&[((0.0, 0.0), &[0.00999, 0.00999, 0.01065])]);
        let outcome = decode_sockets(&circles);
        assert_eq!(outcome.sockets[0].ascii, "A");
        assert_eq!(outcome.diagnostics, vec![Diagnostic::overlap(1)]);
    }

    #[test]
    fn ut_dec_006_slot_collision_later_write_wins() {
        let circles = map(&[((0.0, 0.0), &[0.00999, 0.01065, 0.01066])]);
        let outcome = decode_sockets(&circles);
        assert_eq!(outcome.sockets[0].ascii, "B");
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::Overlap);
        assert_eq!(outcome.diagnostics[0].count, Some(1));
    }

    #[test]
    fn ut_dec_007_identifier_without_characters_is_reported_once() {
        let circles = map(&[
            ((0.0, 0.0), &[0.00999]),
            ((1.0, 0.0), &[0.00999, 0.01010]),
            ((2.0, 0.0), &[0.00999, 0.01065]),
        ]);
        let outcome = decode_sockets(&circles);
        assert_eq!(outcome.sockets.len(), 3);
        assert_eq!(outcome.sockets[0].ascii, "");
        assert_eq!(outcome.sockets[1].ascii, "");
        assert_eq!(outcome.sockets[2].ascii, "A");
        assert_eq!(outcome.diagnostics, vec![Diagnostic::missing_ascii(2)]);
    }

    #[test]
    fn ut_dec_008_no_identifier_anywhere_falls_back_to_legacy() {
        let circles = map(&[((0.0, 0.0), &[0.5, 0.01065]), ((1.0, 1.0), &[0.3])]);
        let outcome = decode_sockets(&circles);
        assert_eq!(outcome.mode, DecodeMode::Legacy);
        assert_eq!(outcome.diagnostics, vec![Diagnostic::legacy_fallback()]);
        assert_eq!(outcome.sockets.len(), 2);
        assert!(outcome.sockets.iter().all(|s| s.ascii.is_empty()));
        assert_eq!(outcome.sockets[0].diameters, Some(vec![0.3]));
        assert_eq!(outcome.sockets[1].diameters, Some(vec![0.5, 0.01065]));
    }

    #[test]
    fn ut_dec_009_one_identifier_anywhere_disables_legacy() {
        let circles = map(&[((0.0, 0.0), &[0.00999, 0.01065]), ((1.0, 1.0), &[0.3])]);
        let outcome = decode_sockets(&circles);
        assert_eq!(outcome.mode, DecodeMode::Ascii);
        assert!(outcome.sockets.iter().all(|s| s.diameters.is_none()));
    }

    #[test]
    fn ut_dec_010_sorted_top_row_first_then_left_to_right() {
        let circles = map(&[
            ((1.0, 0.0), &[0.00999, 0.01066]),
            ((0.0, 1.0), &[0.00999, 0.01065]),
            ((-1.0, 0.0), &[0.00999, 0.01067]),
        ]);
        let outcome = decode_sockets(&circles);
        let names: Vec<&str> = outcome.sockets.iter().map(|s| s.ascii.as_str()).collect();
        assert_eq!(names, vec!["A", "C", "B"]);
    }

    #[test]
    fn ut_dec_011_decoding_is_idempotent() {
        let circles = map(&[
            ((0.0, 0.0), &[0.00999, 0.01065]),
            ((0.0, 0.0), &[0.00999]),
            ((3.0, -1.0), &[0.00999, 0.01090]),
        ]);
        assert_eq!(decode_sockets(&circles), decode_sockets(&circles));
    }

    #[test]
    fn bc_dec_001_empty_map_is_ascii_without_diagnostics() {
        let outcome = decode_sockets(&CircleMap::new());
        assert_eq!(outcome.mode, DecodeMode::Ascii);
        assert!(outcome.sockets.is_empty());
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn bc_dec_002_unformatted_diameters_are_ignored() {
        let circles = map(&[((0.0, 0.0), &[0.00999, 1.5, -0.01065, 0.01065])]);
        let outcome = decode_sockets(&circles);
        assert_eq!(outcome.sockets[0].ascii, "A");
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn bc_dec_003_missing_layer_is_fatal_and_empty() {
        let layers = vec![LayerInput::from_text("board-F_Cu.gbr", "M02*")];
        let report = decode_layers(&layers, &DecodeConfig::default());
        assert!(report.sockets.is_empty());
        assert!(report.is_fatal());
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(
            report.status().map(|d| (d.kind, d.severity)),
            Some((DiagnosticKind::LayerNotFound, Severity::Error))
        );
    }

    #[test]
    fn ut_dec_012_select_layers_policies() {
        let layers = vec![
            LayerInput::from_text("a-GerberSockets.gbr", ""),
            LayerInput::from_text("b-F_Cu.gbr", ""),
            LayerInput::from_text("c-GerberSockets.gbr", ""),
        ];
        let selector = crate::config::MarkerLayerSelector::default();
        let first = select_layers(&layers, &selector, LayerPolicy::FirstMatch);
        let first_names: Option<Vec<&str>> = first
            .ok()
            .map(|l| l.into_iter().map(|l| l.filename.as_str()).collect());
        assert_eq!(first_names, Some(vec!["a-GerberSockets.gbr"]));
        let all = select_layers(&layers, &selector, LayerPolicy::AllMatching);
        assert!(all.is_ok_and(|l| l.len() == 2));
        let none = select_layers(&layers, &|_: &str| false, LayerPolicy::AllMatching);
        assert_eq!(none.map(|l| l.len()), Err(SocketError::LayerNotFound));
    }
}
