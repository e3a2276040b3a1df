//! Error types for the transformation core.

use thiserror::Error;

/// Errors raised by [`crate::Text`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextError {
    /// A position or range reaches past the end of the text.
    #[error("range {pos}+{len} exceeds text length {text_len}")]
    OutOfRange {
        pos: usize,
        len: usize,
        text_len: usize,
    },

    /// A byte offset falls inside a multi-byte character.
    #[error("position {pos} is not a character boundary")]
    NotCharBoundary { pos: usize },
}

/// Errors raised by the Jupiter engines.
///
/// `Protocol` means the peer violated the transformation preconditions;
/// the pair is unusable afterwards and the link must be torn down.
/// `Logic` is a caller bug and is never sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JupiterError {
    /// A remote record failed the transformation preconditions.
    #[error("jupiter protocol violation: {0}")]
    Protocol(String),

    /// Programmer-facing misuse of an engine.
    #[error("jupiter logic error: {0}")]
    Logic(String),
}

/// Errors raised while decoding operations or records from wire
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A parameter was missing from the list.
    #[error("missing parameter at index {0}")]
    MissingParam(usize),

    /// A parameter could not be interpreted as the expected type.
    #[error("bad parameter at index {index}: {reason}")]
    BadParam { index: usize, reason: String },

    /// The operation tag is not one of the known variants.
    #[error("unknown operation tag: {0}")]
    UnknownTag(String),
}

/// Umbrella error for the crate's fallible entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtError {
    #[error(transparent)]
    Text(#[from] TextError),

    #[error(transparent)]
    Jupiter(#[from] JupiterError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
