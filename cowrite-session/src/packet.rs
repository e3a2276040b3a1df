//! The session packet: a command name with a typed parameter list.
//!
//! Parameters travel as escaped ASCII text joined by `:`; the reader
//! interprets them on access. Numeric parameters are decimal, entity
//! references (users, documents) hex. A parameter that fails to decode
//! is a [`SessionError::BadValue`], which drops the connection.

use cowrite_types::{Colour, DocRef, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{SessionError, SessionResult};

/// Protocol version announced in the `welcome` packet; peers with a
/// different version fail the login.
pub const PROTOCOL_VERSION: u32 = 1;

/// A wire packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    command: String,
    params: Vec<String>,
}

impl Packet {
    /// Creates a packet with no parameters.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: Vec::new(),
        }
    }

    /// Creates a packet with the given parameters.
    #[must_use]
    pub fn with_params(command: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            command: command.into(),
            params,
        }
    }

    /// Appends a parameter (builder style).
    #[must_use]
    pub fn arg(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Appends a parameter.
    pub fn push(&mut self, param: impl Into<String>) {
        self.params.push(param.into());
    }

    /// The command name.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// All parameters.
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Number of parameters.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    // ── Typed parameter access ───────────────────────────────────

    /// The string parameter at `index`.
    pub fn param(&self, index: usize) -> SessionResult<&str> {
        self.params
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| SessionError::BadValue(format!("missing parameter {index}")))
    }

    /// The parameter at `index` as a `u32`.
    pub fn param_u32(&self, index: usize) -> SessionResult<u32> {
        let raw = self.param(index)?;
        raw.parse()
            .map_err(|_| SessionError::BadValue(format!("parameter {index} is not a u32: {raw}")))
    }

    /// The parameter at `index` as an `i32`.
    pub fn param_i32(&self, index: usize) -> SessionResult<i32> {
        let raw = self.param(index)?;
        raw.parse()
            .map_err(|_| SessionError::BadValue(format!("parameter {index} is not an i32: {raw}")))
    }

    /// The parameter at `index` as a colour.
    pub fn param_colour(&self, index: usize) -> SessionResult<Colour> {
        let raw = self.param(index)?;
        Colour::from_wire(raw)
            .map_err(|_| SessionError::BadValue(format!("parameter {index} is not a colour: {raw}")))
    }

    /// The parameter at `index` as a hex user reference.
    pub fn param_user_ref(&self, index: usize) -> SessionResult<UserId> {
        let raw = self.param(index)?;
        UserId::from_hex(raw).map_err(|_| {
            SessionError::BadValue(format!("parameter {index} is not a user ref: {raw}"))
        })
    }

    /// The parameter at `index` as a hex document reference.
    pub fn param_doc_ref(&self, index: usize) -> SessionResult<DocRef> {
        let raw = self.param(index)?;
        DocRef::from_wire(raw).map_err(|_| {
            SessionError::BadValue(format!("parameter {index} is not a document ref: {raw}"))
        })
    }

    // ── Payload encoding ─────────────────────────────────────────

    /// Encodes the packet as its escaped, `:`-joined payload.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = escape(&self.command);
        for param in &self.params {
            out.push(':');
            out.push_str(&escape(param));
        }
        out
    }

    /// Decodes a payload produced by [`Packet::encode`].
    pub fn decode(payload: &str) -> SessionResult<Packet> {
        let mut parts = split_unescaped(payload)?;
        if parts.is_empty() {
            return Err(SessionError::BadValue("empty packet".to_string()));
        }
        let command = parts.remove(0);
        Ok(Packet {
            command,
            params: parts,
        })
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for param in &self.params {
            write!(f, ":{param}")?;
        }
        Ok(())
    }
}

/// Escapes `\`, `:` and newlines in a payload part.
fn escape(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ':' => out.push_str("\\:"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Splits a payload on unescaped `:` and unescapes each part.
fn split_unescaped(payload: &str) -> SessionResult<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = payload.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\\') => current.push('\\'),
                Some(':') => current.push(':'),
                Some('n') => current.push('\n'),
                other => {
                    return Err(SessionError::BadValue(format!(
                        "bad escape sequence: \\{}",
                        other.map(String::from).unwrap_or_default()
                    )))
                }
            },
            ':' => parts.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    parts.push(current);
    Ok(parts)
}
