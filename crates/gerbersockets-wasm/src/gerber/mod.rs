//! Drawing-command streams: tokenizers that produce them and the socket layer writer.

pub mod lexer;
pub mod tokens;
pub mod types;
pub mod writer;

pub use lexer::*;
pub use tokens::*;
pub use types::*;
pub use writer::*;
