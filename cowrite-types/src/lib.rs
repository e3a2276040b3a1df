//! Core type definitions for cowrite.
//!
//! This crate defines the fundamental, transport-agnostic types used
//! throughout the editing core:
//! - User and document identifiers (protocol-assigned integers)
//! - Document references (owner + id, the global document key)
//! - User colours with the proximity predicate used at login
//!
//! Everything that knows about text, operations or the wire protocol
//! belongs in `cowrite-ot` and `cowrite-session`, not here.

mod colour;
mod ids;

pub use colour::Colour;
pub use ids::{DocRef, DocumentId, UserId, SERVER_OWNER};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when parsing identifier or colour values.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("invalid colour: {0}")]
    InvalidColour(String),
}
