//! User colours.
//!
//! Each participant picks a colour at login; the server rejects colours
//! too close to one already in use so per-author highlighting stays
//! readable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Per-component distance below which two colours count as similar.
const SIMILARITY_THRESHOLD: u16 = 32;

/// An RGB user colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Colour {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Colour {
    /// Creates a colour from its components.
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Returns true if `other` is close enough to this colour that the
    /// two would be hard to tell apart.
    ///
    /// Compares the summed per-component distance against a fixed
    /// threshold; used by the server to reject a login colour.
    #[must_use]
    pub fn similar_to(&self, other: &Colour) -> bool {
        let dist = |a: u8, b: u8| (i32::from(a) - i32::from(b)).unsigned_abs() as u16;
        let total = dist(self.red, other.red)
            + dist(self.green, other.green)
            + dist(self.blue, other.blue);
        total < SIMILARITY_THRESHOLD * 3
    }

    /// Renders the colour in its 6-digit hex wire form, e.g. `ff8800`.
    #[must_use]
    pub fn to_wire(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }

    /// Parses a colour from its 6-digit hex wire form.
    pub fn from_wire(s: &str) -> crate::Result<Self> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidColour(s.to_string()));
        }
        let component = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&s[range], 16).map_err(|_| Error::InvalidColour(s.to_string()))
        };
        Ok(Self {
            red: component(0..2)?,
            green: component(2..4)?,
            blue: component(4..6)?,
        })
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_wire())
    }
}

impl FromStr for Colour {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::from_wire(s.strip_prefix('#').unwrap_or(s))
    }
}
