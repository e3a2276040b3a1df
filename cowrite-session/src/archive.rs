//! Persisted session format.
//!
//! A saved session is a line-oriented hierarchical text document:
//!
//! ```text
//! !cowrite
//! session version="1"
//!  user_table
//!   user id="1" name="alice" colour="ff0000"
//!  chat
//!   message kind="user" from="1" text="hello"
//!  document owner="1" id="1" title="notes" encoding="UTF-8"
//!   chunk content="hello " author="1"
//!   chunk content="world" author="2"
//! ```
//!
//! Each line is an object: its depth is the number of leading spaces
//! (one per level), followed by the object name and `key="value"`
//! attributes. Strings escape `\n`, `\t`, `\\` and `\"`. Parse errors
//! carry the offending 1-based line number.

use cowrite_ot::Text;
use cowrite_types::{Colour, DocRef, DocumentId, UserId};
use std::fmt::Write as _;

use crate::chat::ChatMessage;
use crate::error::ArchiveError;

/// Magic header line of the persisted format.
pub const ARCHIVE_HEADER: &str = "!cowrite";

/// Format version written into the `session` object.
pub const ARCHIVE_VERSION: u32 = 1;

/// A user entry persisted with the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedUser {
    pub id: UserId,
    pub name: String,
    pub colour: Colour,
}

/// A document persisted with the session, content and authorship
/// included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedDocument {
    pub doc_ref: DocRef,
    pub title: String,
    pub encoding: String,
    pub text: Text,
}

/// A complete persisted session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionArchive {
    pub users: Vec<ArchivedUser>,
    pub chat: Vec<ChatMessage>,
    pub documents: Vec<ArchivedDocument>,
}

impl SessionArchive {
    /// Renders the archive in the persisted text format.
    #[must_use]
    pub fn serialise(&self) -> String {
        let mut out = String::new();
        out.push_str(ARCHIVE_HEADER);
        out.push('\n');

        let mut session = Object::new("session");
        session.attr("version", ARCHIVE_VERSION.to_string());

        let user_table = session.child("user_table");
        for user in &self.users {
            let entry = user_table.child("user");
            entry.attr("id", user.id.to_string());
            entry.attr("name", user.name.clone());
            entry.attr("colour", user.colour.to_wire());
        }

        let chat = session.child("chat");
        for message in &self.chat {
            let entry = chat.child("message");
            match message {
                ChatMessage::User { from, text } => {
                    entry.attr("kind", "user");
                    entry.attr("from", from.to_string());
                    entry.attr("text", text.clone());
                }
                ChatMessage::Server { text } => {
                    entry.attr("kind", "server");
                    entry.attr("text", text.clone());
                }
                ChatMessage::Emote { from, text } => {
                    entry.attr("kind", "emote");
                    entry.attr("from", from.to_string());
                    entry.attr("text", text.clone());
                }
            }
        }

        for document in &self.documents {
            let entry = session.child("document");
            entry.attr("owner", document.doc_ref.owner.to_string());
            entry.attr("id", document.doc_ref.id.to_string());
            entry.attr("title", document.title.clone());
            entry.attr("encoding", document.encoding.clone());
            for chunk in document.text.chunks() {
                let chunk_entry = entry.child("chunk");
                chunk_entry.attr("content", chunk.text().to_string());
                chunk_entry.attr(
                    "author",
                    chunk
                        .author()
                        .unwrap_or(cowrite_types::SERVER_OWNER)
                        .to_string(),
                );
            }
        }

        session.render(&mut out, 0);
        out
    }

    /// Parses an archive from the persisted text format.
    pub fn deserialise(input: &str) -> Result<Self, ArchiveError> {
        let mut lines = input.lines().enumerate();
        let (_, header) = lines
            .next()
            .ok_or_else(|| ArchiveError::parse(1, "empty input"))?;
        if header.trim_end() != ARCHIVE_HEADER {
            return Err(ArchiveError::parse(1, format!("bad header: {header}")));
        }

        let root = parse_tree(lines)?;
        let session = root
            .iter()
            .find(|node| node.name == "session")
            .ok_or_else(|| ArchiveError::parse(2, "missing session object"))?;
        if root.len() != 1 {
            return Err(ArchiveError::parse(
                root.last().map_or(2, |n| n.line),
                "multiple root objects",
            ));
        }
        session.require_attr("version")?;

        let mut archive = SessionArchive::default();
        for node in &session.children {
            match node.name.as_str() {
                "user_table" => {
                    for entry in &node.children {
                        if entry.name != "user" {
                            return Err(entry.unexpected());
                        }
                        archive.users.push(ArchivedUser {
                            id: entry.attr_user_id("id")?,
                            name: entry.require_attr("name")?.to_string(),
                            colour: entry.attr_colour("colour")?,
                        });
                    }
                }
                "chat" => {
                    for entry in &node.children {
                        if entry.name != "message" {
                            return Err(entry.unexpected());
                        }
                        archive.chat.push(entry.parse_message()?);
                    }
                }
                "document" => {
                    let owner = entry_owner(node)?;
                    let id = node.attr_u32("id")?;
                    let mut text = Text::new();
                    for chunk in &node.children {
                        if chunk.name != "chunk" {
                            return Err(chunk.unexpected());
                        }
                        let author = chunk.attr_user_id("author")?;
                        let author = if author.is_server() {
                            None
                        } else {
                            Some(author)
                        };
                        text.append_str(chunk.require_attr("content")?, author);
                    }
                    archive.documents.push(ArchivedDocument {
                        doc_ref: DocRef::new(owner, DocumentId::new(id)),
                        title: node.require_attr("title")?.to_string(),
                        encoding: node.require_attr("encoding")?.to_string(),
                        text,
                    });
                }
                _ => return Err(node.unexpected()),
            }
        }
        Ok(archive)
    }
}

fn entry_owner(node: &Node) -> Result<UserId, ArchiveError> {
    node.attr_user_id("owner")
}

// ── Object tree ──────────────────────────────────────────────────

/// Writer-side object: name, attributes, children.
struct Object {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Object>,
}

impl Object {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    fn attr(&mut self, key: &str, value: impl Into<String>) {
        self.attrs.push((key.to_string(), value.into()));
    }

    fn child(&mut self, name: &str) -> &mut Object {
        self.children.push(Object::new(name));
        self.children.last_mut().expect("just pushed")
    }

    fn render(&self, out: &mut String, depth: usize) {
        for _ in 0..depth {
            out.push(' ');
        }
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            let _ = write!(out, " {key}=\"{}\"", escape(value));
        }
        out.push('\n');
        for child in &self.children {
            child.render(out, depth + 1);
        }
    }
}

/// Parser-side node with its source line.
struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
    line: usize,
}

impl Node {
    fn attr_raw(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn require_attr(&self, key: &str) -> Result<&str, ArchiveError> {
        self.attr_raw(key)
            .ok_or_else(|| ArchiveError::parse(self.line, format!("missing attribute: {key}")))
    }

    fn attr_u32(&self, key: &str) -> Result<u32, ArchiveError> {
        let raw = self.require_attr(key)?;
        raw.parse()
            .map_err(|_| ArchiveError::parse(self.line, format!("bad number in {key}: {raw}")))
    }

    fn attr_user_id(&self, key: &str) -> Result<UserId, ArchiveError> {
        Ok(UserId::new(self.attr_u32(key)?))
    }

    fn attr_colour(&self, key: &str) -> Result<Colour, ArchiveError> {
        let raw = self.require_attr(key)?;
        Colour::from_wire(raw)
            .map_err(|_| ArchiveError::parse(self.line, format!("bad colour: {raw}")))
    }

    fn parse_message(&self) -> Result<ChatMessage, ArchiveError> {
        let text = self.require_attr("text")?.to_string();
        match self.require_attr("kind")? {
            "user" => Ok(ChatMessage::User {
                from: self.attr_user_id("from")?,
                text,
            }),
            "server" => Ok(ChatMessage::Server { text }),
            "emote" => Ok(ChatMessage::Emote {
                from: self.attr_user_id("from")?,
                text,
            }),
            other => Err(ArchiveError::parse(
                self.line,
                format!("unknown message kind: {other}"),
            )),
        }
    }

    fn unexpected(&self) -> ArchiveError {
        ArchiveError::parse(self.line, format!("unexpected object: {}", self.name))
    }
}

/// Parses the indented lines following the header into a node forest.
fn parse_tree<'a>(
    lines: impl Iterator<Item = (usize, &'a str)>,
) -> Result<Vec<Node>, ArchiveError> {
    let mut roots: Vec<Node> = Vec::new();
    // Child index of the currently open node at each depth.
    let mut path: Vec<usize> = Vec::new();

    for (index, raw) in lines {
        let line_no = index + 1;
        if raw.trim().is_empty() {
            continue;
        }
        let depth = raw.len() - raw.trim_start_matches(' ').len();
        let node = parse_line(raw.trim_start_matches(' '), line_no)?;

        if depth > path.len() {
            return Err(ArchiveError::parse(line_no, "indentation jumps a level"));
        }
        path.truncate(depth);

        let mut slot = &mut roots;
        for &i in &path {
            slot = &mut slot[i].children;
        }
        slot.push(node);
        path.push(slot.len() - 1);
    }
    Ok(roots)
}

/// Parses `name key="value" ...`.
fn parse_line(content: &str, line_no: usize) -> Result<Node, ArchiveError> {
    let name_end = content.find(' ').unwrap_or(content.len());
    let name = &content[..name_end];
    if name.is_empty() {
        return Err(ArchiveError::parse(line_no, "missing object name"));
    }

    let mut node = Node {
        name: name.to_string(),
        attrs: Vec::new(),
        children: Vec::new(),
        line: line_no,
    };

    let mut rest = content[name_end..].trim_start();
    while !rest.is_empty() {
        let eq = rest
            .find('=')
            .ok_or_else(|| ArchiveError::parse(line_no, format!("bad attribute: {rest}")))?;
        let key = rest[..eq].to_string();
        let after = &rest[eq + 1..];
        if !after.starts_with('"') {
            return Err(ArchiveError::parse(line_no, "attribute value not quoted"));
        }
        let (value, consumed) = unescape_quoted(&after[1..], line_no)?;
        node.attrs.push((key, value));
        rest = after[1 + consumed..].trim_start();
    }
    Ok(node)
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Reads an escaped string up to the closing quote, returning the
/// value and the number of bytes consumed including the quote.
fn unescape_quoted(input: &str, line_no: usize) -> Result<(String, usize), ArchiveError> {
    let mut out = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, i + 1)),
            '\\' => match chars.next() {
                Some((_, '\\')) => out.push('\\'),
                Some((_, '"')) => out.push('"'),
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                other => {
                    return Err(ArchiveError::parse(
                        line_no,
                        format!(
                            "bad escape: \\{}",
                            other.map(|(_, c)| String::from(c)).unwrap_or_default()
                        ),
                    ))
                }
            },
            other => out.push(other),
        }
    }
    Err(ArchiveError::parse(line_no, "unterminated string"))
}
