//! Socket name encoder.
//!
//! A name of `n` ASCII characters becomes `n + 1` circles: the identifier
//! circle followed by one circle per character, each carrying its 1-based
//! slot and character code in the diameter.

use serde::{Serialize, Serializer};

use crate::error::SocketError;

use super::wire::{WireDiameter, MAX_SLOT};

/// What a circle stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircleLabel {
    /// The identifier marker circle.
    Identifier,
    /// A character of the name.
    Char(char),
}

impl Serialize for CircleLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Identifier => serializer.serialize_str("identifier"),
            Self::Char(ch) => serializer.collect_str(ch),
        }
    }
}

/// One encoded circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Circle {
    /// `0` for the identifier, `1..=99` for characters.
    pub index: u8,
    /// What the circle stands for.
    pub label: CircleLabel,
    /// Diameter carrying the encoded value.
    pub diameter: WireDiameter,
}

/// Encodes a socket name into its ordered circle list.
///
/// # Errors
///
/// Returns [`SocketError::LengthError`] if the name is empty or longer than
/// 99 characters, and [`SocketError::EncodingError`] if any character is
/// outside `0..=127`. No partial output is produced on failure.
pub fn encode(name: &str) -> Result<Vec<Circle>, SocketError> {
    let len = name.chars().count();
    if len < 1 || len > usize::from(MAX_SLOT) {
        return Err(SocketError::LengthError(len));
    }

    let mut circles = Vec::with_capacity(len + 1);
    circles.push(Circle {
        index: 0,
        label: CircleLabel::Identifier,
        diameter: WireDiameter::identifier(),
    });

    for (slot, ch) in (1..=MAX_SLOT).zip(name.chars()) {
        let position = usize::from(slot);
        let invalid = || SocketError::EncodingError {
            code: u32::from(ch),
            position,
        };
        let code = u8::try_from(u32::from(ch))
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(invalid)?;
        let diameter = WireDiameter::character(slot, code).ok_or_else(invalid)?;
        circles.push(Circle {
            index: slot,
            label: CircleLabel::Char(ch),
            diameter,
        });
    }

    Ok(circles)
}

/// Encodes a batch of names, failing on the first invalid one.
///
/// # Errors
///
/// Propagates the first [`encode`] failure.
pub fn encode_all<S: AsRef<str>>(names: &[S]) -> Result<Vec<Vec<Circle>>, SocketError> {
    names.iter().map(|name| encode(name.as_ref())).collect()
}
