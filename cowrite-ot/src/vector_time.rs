//! Two-counter vector time for the Jupiter pair.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Vector time counting both local and remote operation counts on one
/// pair link.
///
/// `local` counts operations this site has generated on the pair,
/// `remote` counts operations applied from the peer. Both counters are
/// monotonically non-decreasing; equality compares both components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VectorTime {
    pub local: u32,
    pub remote: u32,
}

impl VectorTime {
    /// Creates a vector time from its components.
    #[must_use]
    pub const fn new(local: u32, remote: u32) -> Self {
        Self { local, remote }
    }

    /// Increments the local operation count.
    pub fn inc_local(&mut self) {
        self.local += 1;
    }

    /// Increments the remote operation count.
    pub fn inc_remote(&mut self) {
        self.remote += 1;
    }
}

impl fmt::Display for VectorTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.local, self.remote)
    }
}
