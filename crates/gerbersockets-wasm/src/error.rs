//! Error types for the socket encode/decode pipeline.

use thiserror::Error;

/// Errors that can occur while encoding, tokenizing, or decoding sockets.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SocketError {
    /// A socket name is empty or longer than the 99 available slots.
    #[error("name length must be between 1 and 99 characters, got {0}")]
    LengthError(usize),

    /// A socket name contains a character outside the 7-bit ASCII range.
    #[error("non-ASCII (0..127) code {code} at position {position}")]
    EncodingError {
        /// Offending character code.
        code: u32,
        /// 1-based character position within the name.
        position: usize,
    },

    /// A placement coordinate is not finite or needs more than four integer digits.
    #[error("coordinate {axis}={value} does not fit the 4.6 layer format")]
    CoordinateError {
        /// `'X'` or `'Y'`.
        axis: char,
        /// Rejected value.
        value: f64,
    },

    /// No layer matched the configured layer selector.
    #[error("No GerberSockets layer found in the uploaded gerber files")]
    LayerNotFound,

    /// Tokenizer input could not be read.
    #[error("parse error: {0}")]
    ParseError(String),
}

impl SocketError {
    /// Returns `true` for input validation failures raised while encoding or placing sockets.
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::LengthError(_) | Self::EncodingError { .. } | Self::CoordinateError { .. }
        )
    }
}
