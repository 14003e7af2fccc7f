//! `GerberSockets` encoding, circle detection, decoding, and grid checks.

pub mod decode;
pub mod detect;
pub mod encode;
pub mod grid;
pub mod types;
pub mod wire;

pub use decode::*;
pub use detect::*;
pub use encode::*;
pub use grid::*;
pub use types::*;
pub use wire::*;
