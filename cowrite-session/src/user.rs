//! A participant in the session.

use cowrite_types::{Colour, UserId};
use serde::{Deserialize, Serialize};

/// One user known to the session.
///
/// Identity persists across connects: when a user disconnects only the
/// `connected` flag flips; their id, name and authored text stay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    name: String,
    colour: Colour,
    connected: bool,
    password: Option<String>,
}

impl User {
    /// Creates a connected user.
    #[must_use]
    pub fn new(id: UserId, name: impl Into<String>, colour: Colour) -> Self {
        Self {
            id,
            name: name.into(),
            colour,
            connected: true,
            password: None,
        }
    }

    /// Creates a user that is currently not connected (synced from the
    /// server's persisted state).
    #[must_use]
    pub fn offline(id: UserId, name: impl Into<String>, colour: Colour) -> Self {
        Self {
            connected: false,
            ..Self::new(id, name, colour)
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn colour(&self) -> Colour {
        self.colour
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The user's session password, if one has been set.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn set_colour(&mut self, colour: Colour) {
        self.colour = colour;
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn set_password(&mut self, password: Option<String>) {
        self.password = password;
    }
}
