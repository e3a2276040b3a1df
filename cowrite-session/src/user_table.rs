//! The session's user table.
//!
//! Owned by the session controller; documents refer to users by id
//! only. The server's table is authoritative, a client's is a mirror
//! built from the login sync stream and join/part broadcasts.

use cowrite_types::{Colour, UserId};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{SessionError, SessionResult};
use crate::user::User;

/// Id-keyed user collection with unique-id allocation.
#[derive(Debug, Default)]
pub struct UserTable {
    users: BTreeMap<UserId, User>,
}

impl UserTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known users, connected or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Looks up a user by id.
    #[must_use]
    pub fn get(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    /// Looks up a user by id, as a `BadValue` error when missing.
    pub fn require(&self, id: UserId) -> SessionResult<&User> {
        self.get(id)
            .ok_or_else(|| SessionError::BadValue(format!("unknown user: {id}")))
    }

    pub(crate) fn get_mut(&mut self, id: UserId) -> Option<&mut User> {
        self.users.get_mut(&id)
    }

    /// Looks up a user by name, matching case-insensitively.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.name().eq_ignore_ascii_case(name))
    }

    /// All users in id order.
    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Connected users in id order.
    pub fn connected(&self) -> impl Iterator<Item = &User> {
        self.users.values().filter(|u| u.is_connected())
    }

    /// Users currently not connected, in id order.
    pub fn offline(&self) -> impl Iterator<Item = &User> {
        self.users.values().filter(|u| !u.is_connected())
    }

    /// True if a *connected* user other than `exclude` already uses
    /// the name.
    #[must_use]
    pub fn name_in_use(&self, name: &str, exclude: Option<UserId>) -> bool {
        self.connected()
            .any(|u| Some(u.id()) != exclude && u.name().eq_ignore_ascii_case(name))
    }

    /// True if a *connected* user other than `exclude` has a colour
    /// similar to the given one.
    #[must_use]
    pub fn colour_in_use(&self, colour: Colour, exclude: Option<UserId>) -> bool {
        self.connected()
            .any(|u| Some(u.id()) != exclude && u.colour().similar_to(&colour))
    }

    /// Smallest unused id ≥ 1.
    #[must_use]
    pub fn find_free_id(&self) -> UserId {
        let mut candidate = 1;
        for id in self.users.keys() {
            if id.get() == candidate {
                candidate += 1;
            } else if id.get() > candidate {
                break;
            }
        }
        UserId::new(candidate)
    }

    /// Connects a user under `name`: reuses the identity of a
    /// non-connected user with the same name, otherwise allocates a
    /// fresh id. Returns the connected user's id.
    pub fn connect(&mut self, name: &str, colour: Colour) -> UserId {
        let found_id = self
            .offline()
            .find(|u| u.name().eq_ignore_ascii_case(name))
            .map(User::id);
        if let Some(id) = found_id {
            let user = self.users.get_mut(&id).expect("just found");
            user.set_connected(true);
            user.set_colour(colour);
            debug!(%id, name, "user reconnected");
            return id;
        }

        let id = self.find_free_id();
        self.users.insert(id, User::new(id, name, colour));
        debug!(%id, name, "user connected");
        id
    }

    /// Installs a user with a known id (sync stream, join broadcast).
    /// An existing entry is reconnected and updated in place.
    pub fn install(&mut self, id: UserId, name: &str, colour: Colour, connected: bool) {
        match self.users.get_mut(&id) {
            Some(user) => {
                user.set_colour(colour);
                user.set_connected(connected);
            }
            None => {
                let user = if connected {
                    User::new(id, name, colour)
                } else {
                    User::offline(id, name, colour)
                };
                self.users.insert(id, user);
            }
        }
    }

    /// Flips a user to disconnected, keeping the identity.
    pub fn disconnect(&mut self, id: UserId) -> SessionResult<()> {
        let user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| SessionError::Logic(format!("disconnect of unknown user {id}")))?;
        user.set_connected(false);
        debug!(%id, "user disconnected");
        Ok(())
    }

    /// Removes a user outright, returning the entry.
    ///
    /// Callers that notify observers must do so *before* calling this,
    /// while the user can still be looked up.
    pub fn remove(&mut self, id: UserId) -> SessionResult<User> {
        self.users
            .remove(&id)
            .ok_or_else(|| SessionError::Logic(format!("removal of unknown user {id}")))
    }

    /// Drops every user.
    pub fn clear(&mut self) {
        self.users.clear();
    }
}
