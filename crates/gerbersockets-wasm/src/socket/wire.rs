//! Fixed-point codec for the `0.iippp` diameter wire format.
//!
//! A socket diameter carries five fractional digits: a two-digit slot index
//! `ii` followed by a three-digit character code `ppp`. Decoding rounds the
//! floating-point diameter to the nearest `1e-5` and works on the resulting
//! integer, so no text formatting is involved on the read path.

use std::fmt;

use serde::{Serialize, Serializer};

/// Number of fixed-point units per diameter unit.
const SCALE: f64 = 100_000.0;
/// Largest fixed-point value with a `0.` integer part.
const MAX_UNITS: f64 = 99_999.0;

/// Slot index reserved for the identifier circle.
pub const IDENTIFIER_SLOT: u8 = 0;
/// Character code carried by the identifier circle.
pub const IDENTIFIER_CODE: u16 = 999;
/// Highest character slot index.
pub const MAX_SLOT: u8 = 99;

/// Printable character codes that populate a decoded slot.
const PRINTABLE: std::ops::RangeInclusive<u16> = 32..=126;

/// A diameter in `0.iippp` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WireDiameter {
    slot: u8,
    code: u16,
}

/// Meaning of a diameter read from a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireSymbol {
    /// The identifier marker `0.00999`.
    Identifier,
    /// A printable character for a 1-based slot.
    Character {
        /// 1-based character position.
        slot: u8,
        /// The decoded character.
        ch: char,
    },
    /// Well-formed but carries nothing decodable.
    Ignored,
}

impl WireDiameter {
    /// The identifier marker diameter.
    pub const fn identifier() -> Self {
        Self {
            slot: IDENTIFIER_SLOT,
            code: IDENTIFIER_CODE,
        }
    }

    /// Diameter for character `code` at 1-based `slot`.
    ///
    /// Returns `None` when `slot` is outside `1..=99` or `code` above 127.
    pub const fn character(slot: u8, code: u8) -> Option<Self> {
        if slot == IDENTIFIER_SLOT || slot > MAX_SLOT || code > 127 {
            return None;
        }
        Some(Self {
            slot,
            code: code as u16,
        })
    }

    /// Reads a raw diameter.
    ///
    /// Returns `None` unless the value rounds to `0.00000..=0.99999`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_f64(diameter: f64) -> Option<Self> {
        let units = (diameter * SCALE).round();
        if !(0.0..=MAX_UNITS).contains(&units) {
            return None;
        }
        let units = units as u32;
        let slot = u8::try_from(units / 1000).ok()?;
        let code = u16::try_from(units % 1000).ok()?;
        Some(Self { slot, code })
    }

    /// Slot index (`ii`).
    pub const fn slot(self) -> u8 {
        self.slot
    }

    /// Character code (`ppp`).
    pub const fn code(self) -> u16 {
        self.code
    }

    /// Numeric value of the diameter.
    pub fn to_f64(self) -> f64 {
        f64::from(self.slot).mul_add(1000.0, f64::from(self.code)) / SCALE
    }

    /// Classifies the diameter for decoding.
    pub fn symbol(self) -> WireSymbol {
        if self == Self::identifier() {
            return WireSymbol::Identifier;
        }
        if self.slot == IDENTIFIER_SLOT || !PRINTABLE.contains(&self.code) {
            return WireSymbol::Ignored;
        }
        u8::try_from(self.code)
            .ok()
            .map_or(WireSymbol::Ignored, |code| WireSymbol::Character {
                slot: self.slot,
                ch: char::from(code),
            })
    }
}

impl fmt::Display for WireDiameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0.{:02}{:03}", self.slot, self.code)
    }
}

impl Serialize for WireDiameter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ut_wire_001_identifier_text() {
        assert_eq!(WireDiameter::identifier().to_string(), "0.00999");
    }

    #[test]
    fn ut_wire_002_character_text_is_zero_padded() {
        let d = WireDiameter::character(1, b'G');
        assert_eq!(d.map(|d| d.to_string()), Some("0.01071".to_string()));
        let d = WireDiameter::character(42, 7);
        assert_eq!(d.map(|d| d.to_string()), Some("0.42007".to_string()));
    }

    #[test]
    fn ut_wire_003_float_jitter_rounds_to_same_value() {
        assert_eq!(
            WireDiameter::from_f64(0.010_709_999_9),
            WireDiameter::character(1, b'G')
        );
        assert_eq!(
            WireDiameter::from_f64(0.010_710_000_2),
            WireDiameter::character(1, b'G')
        );
    }

    #[test]
    fn ut_wire_004_symbols() {
        assert_eq!(WireDiameter::identifier().symbol(), WireSymbol::Identifier);
        assert_eq!(
            WireDiameter::from_f64(0.02078).map(WireDiameter::symbol),
            Some(WireSymbol::Character { slot: 2, ch: 'N' })
        );
        // control character and DEL are well-formed but not decoded
        assert_eq!(
            WireDiameter::from_f64(0.01010).map(WireDiameter::symbol),
            Some(WireSymbol::Ignored)
        );
        assert_eq!(
            WireDiameter::from_f64(0.01127).map(WireDiameter::symbol),
            Some(WireSymbol::Ignored)
        );
        // slot 00 only carries the identifier
        assert_eq!(
            WireDiameter::from_f64(0.00065).map(WireDiameter::symbol),
            Some(WireSymbol::Ignored)
        );
    }

    #[test]
    fn bc_wire_001_out_of_range_diameters_are_rejected() {
        assert_eq!(WireDiameter::from_f64(-0.01071), None);
        assert_eq!(WireDiameter::from_f64(1.0), None);
        assert_eq!(WireDiameter::from_f64(0.999_996), None);
        assert_eq!(WireDiameter::from_f64(f64::NAN), None);
        assert!(WireDiameter::from_f64(0.999_99).is_some());
    }

    #[test]
    fn bc_wire_002_character_constructor_bounds() {
        assert_eq!(WireDiameter::character(0, b'A'), None);
        assert_eq!(WireDiameter::character(100, b'A'), None);
        assert_eq!(WireDiameter::character(1, 128), None);
        assert!(WireDiameter::character(99, 127).is_some());
    }

    #[test]
    fn ut_wire_005_to_f64_reads_back() {
        let d = WireDiameter::character(12, b'z');
        assert!(d.is_some());
        if let Some(d) = d {
            assert!((d.to_f64() - 0.12122).abs() < 1e-12);
            assert_eq!(WireDiameter::from_f64(d.to_f64()), Some(d));
        }
    }
}
