//! Identifier types used throughout the cowrite core.
//!
//! Ids are small integers assigned by the server at login (users) or by
//! the creating site (documents). They are rendered in hex on the wire,
//! matching the reference encoding of the session protocol.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Owner value used for documents created by the server itself.
pub const SERVER_OWNER: UserId = UserId(0);

/// Unique identifier for a user within a session.
///
/// Real users have ids starting at 1; id 0 is the server/none sentinel
/// used in wire references.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl UserId {
    /// Creates a user id from its raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns true for the server/none sentinel.
    #[must_use]
    pub const fn is_server(self) -> bool {
        self.0 == 0
    }

    /// Renders the id in the hex form used by wire references.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("{:x}", self.0)
    }

    /// Parses an id from its hex wire form.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        u32::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| Error::InvalidId(s.to_string()))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        s.parse::<u32>()
            .map(Self)
            .map_err(|_| Error::InvalidId(s.to_string()))
    }
}

/// Unique identifier for a document *within its owner's namespace*.
///
/// Two different users may both own a document 1; the global key is the
/// `(owner, id)` pair, see [`DocRef`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct DocumentId(pub u32);

impl DocumentId {
    /// Creates a document id from its raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Renders the id in the hex form used by wire references.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("{:x}", self.0)
    }

    /// Parses an id from its hex wire form.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        u32::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| Error::InvalidId(s.to_string()))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        s.parse::<u32>()
            .map(Self)
            .map_err(|_| Error::InvalidId(s.to_string()))
    }
}

/// Global reference to a document: the owning user plus the per-owner id.
///
/// Documents created by the server carry [`SERVER_OWNER`] as owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocRef {
    /// The user that created the document, or [`SERVER_OWNER`].
    pub owner: UserId,
    /// The id within the owner's namespace.
    pub id: DocumentId,
}

impl DocRef {
    /// Creates a document reference.
    #[must_use]
    pub const fn new(owner: UserId, id: DocumentId) -> Self {
        Self { owner, id }
    }

    /// Creates a reference to a server-owned document.
    #[must_use]
    pub const fn server(id: DocumentId) -> Self {
        Self {
            owner: SERVER_OWNER,
            id,
        }
    }

    /// Renders the reference in its hex wire form: `"<owner> <id>"`.
    #[must_use]
    pub fn to_wire(self) -> String {
        format!("{} {}", self.owner.to_hex(), self.id.to_hex())
    }

    /// Parses a reference from its hex wire form.
    pub fn from_wire(s: &str) -> crate::Result<Self> {
        let mut parts = s.split(' ');
        let owner = parts.next().ok_or_else(|| Error::InvalidId(s.to_string()))?;
        let id = parts.next().ok_or_else(|| Error::InvalidId(s.to_string()))?;
        if parts.next().is_some() {
            return Err(Error::InvalidId(s.to_string()));
        }
        Ok(Self {
            owner: UserId::from_hex(owner)?,
            id: DocumentId::from_hex(id)?,
        })
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.id)
    }
}
