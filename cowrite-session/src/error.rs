//! Error types for the session layer.

use cowrite_ot::{DecodeError, JupiterError, OtError, TextError};
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Login failures, each a distinct recoverable or fatal condition.
///
/// Name, colour and password failures are recoverable: the client may
/// re-prompt and retry on the same connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("name is already in use")]
    NameInUse,

    #[error("colour is already in use")]
    ColourInUse,

    #[error("wrong session password")]
    WrongGlobalPassword,

    #[error("wrong user password")]
    WrongUserPassword,

    #[error("protocol version mismatch")]
    ProtocolVersionMismatch,

    #[error("connection is not encrypted")]
    NotEncrypted,
}

impl LoginError {
    /// The numeric code carried by the `login_failed` packet.
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            LoginError::NameInUse => 1,
            LoginError::ColourInUse => 2,
            LoginError::WrongGlobalPassword => 3,
            LoginError::WrongUserPassword => 4,
            LoginError::ProtocolVersionMismatch => 5,
            LoginError::NotEncrypted => 6,
        }
    }

    /// Decodes a `login_failed` code.
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(LoginError::NameInUse),
            2 => Some(LoginError::ColourInUse),
            3 => Some(LoginError::WrongGlobalPassword),
            4 => Some(LoginError::WrongUserPassword),
            5 => Some(LoginError::ProtocolVersionMismatch),
            6 => Some(LoginError::NotEncrypted),
            _ => None,
        }
    }

    /// Whether the client can retry with different credentials on the
    /// same connection.
    #[must_use]
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            LoginError::NameInUse
                | LoginError::ColourInUse
                | LoginError::WrongGlobalPassword
                | LoginError::WrongUserPassword
        )
    }
}

/// Errors raised while parsing the persisted session format.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The input could not be parsed; `line` is 1-based.
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        ArchiveError::Parse {
            line,
            reason: reason.into(),
        }
    }
}

/// Errors raised by the session controller and packet dispatch.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A packet's command is unknown in the current state. The
    /// offending connection is dropped.
    #[error("unexpected command: {0}")]
    UnexpectedCommand(String),

    /// A packet parameter could not be decoded or references a
    /// nonexistent entity. The offending connection is dropped.
    #[error("bad value: {0}")]
    BadValue(String),

    /// Programmer-facing misuse; never sent on the wire.
    #[error("logic error: {0}")]
    Logic(String),

    /// A login step failed.
    #[error(transparent)]
    Login(#[from] LoginError),

    /// The Jupiter preconditions failed; fatal for the link.
    #[error(transparent)]
    Jupiter(#[from] JupiterError),

    /// A text operation was out of range for the document.
    #[error(transparent)]
    Text(#[from] TextError),

    /// Session archive read/write failure.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DecodeError> for SessionError {
    fn from(err: DecodeError) -> Self {
        SessionError::BadValue(err.to_string())
    }
}

impl From<OtError> for SessionError {
    fn from(err: OtError) -> Self {
        match err {
            OtError::Text(e) => SessionError::Text(e),
            OtError::Jupiter(e) => SessionError::Jupiter(e),
            OtError::Decode(e) => e.into(),
        }
    }
}

impl From<cowrite_types::Error> for SessionError {
    fn from(err: cowrite_types::Error) -> Self {
        SessionError::BadValue(err.to_string())
    }
}
