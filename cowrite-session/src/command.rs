//! Server-side command execution for `command_query` packets.

use std::collections::BTreeMap;

/// Result kind carried in a `command_result` packet.
pub const RESULT_OK: &str = "ok";
/// Result kind for a command the server does not know.
pub const RESULT_UNKNOWN: &str = "unknown";

/// The commands a server answers, with their help descriptions.
///
/// Execution of the built-ins lives in the session controller because
/// they need session state (`emote` rebroadcasts as a chat message);
/// this map is the registry the `help` reply is generated from.
#[derive(Debug)]
pub struct CommandMap {
    commands: BTreeMap<String, String>,
}

impl CommandMap {
    /// The built-in command set.
    #[must_use]
    pub fn builtin() -> Self {
        let mut map = Self {
            commands: BTreeMap::new(),
        };
        map.register("emote", "Sends an action message to the chat");
        map.register("help", "Shows all available commands");
        map
    }

    /// Registers a command so it appears in `help` output.
    pub fn register(&mut self, name: impl Into<String>, description: impl Into<String>) {
        self.commands.insert(name.into(), description.into());
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// The reply text for `help`: one `name - description` line per
    /// command, in name order.
    #[must_use]
    pub fn help_text(&self) -> String {
        let mut lines: Vec<String> = Vec::with_capacity(self.commands.len());
        for (name, description) in &self.commands {
            lines.push(format!("{name} - {description}"));
        }
        lines.join("\n")
    }
}

impl Default for CommandMap {
    fn default() -> Self {
        Self::builtin()
    }
}
