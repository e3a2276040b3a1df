//! Document text with per-character authorship.
//!
//! A [`Text`] is an ordered sequence of chunks, each a run of bytes
//! written by one author. Concatenating the chunks in order yields the
//! document content. Adjacent chunks from the same author are merged
//! opportunistically on the insert and erase paths; the representation
//! is not kept canonically minimal, it only trends toward coalescence.
//!
//! Positions are byte offsets and ranges are half-open. All entry
//! points validate that the touched offsets fall on UTF-8 character
//! boundaries before mutating anything.

use cowrite_types::UserId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{DecodeError, TextError};

/// A run of text written by a single author.
///
/// `author` is `None` for text that predates the session (loaded
/// content, server-seeded documents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    text: String,
    author: Option<UserId>,
}

impl Chunk {
    /// Creates a chunk.
    #[must_use]
    pub fn new(text: impl Into<String>, author: Option<UserId>) -> Self {
        Self {
            text: text.into(),
            author,
        }
    }

    /// The chunk's content.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The chunk's author.
    #[must_use]
    pub fn author(&self) -> Option<UserId> {
        self.author
    }

    /// The chunk length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Returns true if the chunk holds no text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Authored document content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Text {
    chunks: Vec<Chunk>,
    max_chunk: usize,
}

impl Text {
    /// Creates an empty text without a chunk size cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_chunk(usize::MAX)
    }

    /// Creates an empty text with a soft cap on chunk size.
    ///
    /// The cap is advisory: a cap smaller than one UTF-8 scalar is
    /// exceeded rather than splitting a character.
    #[must_use]
    pub fn with_max_chunk(max_chunk: usize) -> Self {
        Self {
            chunks: Vec::new(),
            max_chunk,
        }
    }

    /// Creates a text holding `content` attributed to `author`.
    #[must_use]
    pub fn authored(content: impl Into<String>, author: Option<UserId>) -> Self {
        let mut text = Self::new();
        let content = content.into();
        if !content.is_empty() {
            text.chunks.push(Chunk::new(content, author));
        }
        text
    }

    /// Total length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }

    /// Returns true if the text holds no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Removes all content.
    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Iterates over the chunks in document order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// The configured soft chunk-size cap.
    #[must_use]
    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Extracts `[pos, pos + len)` as a new text, preserving authorship.
    pub fn substr(&self, pos: usize, len: usize) -> Result<Text, TextError> {
        self.check_range(pos, len)?;
        let mut out = Text::with_max_chunk(self.max_chunk);
        if len == 0 {
            return Ok(out);
        }
        let (mut i, mut off) = self.locate(pos).expect("range checked");
        if off == self.chunks[i].len() {
            i += 1;
            off = 0;
        }
        let mut remaining = len;
        while remaining > 0 {
            let chunk = &self.chunks[i];
            let take = (chunk.len() - off).min(remaining);
            out.append_str(&chunk.text[off..off + take], chunk.author);
            remaining -= take;
            off = 0;
            i += 1;
        }
        Ok(out)
    }

    /// Compares content only, ignoring authorship.
    #[must_use]
    pub fn content_cmp(&self, other: &Text) -> Ordering {
        self.bytes().cmp(other.bytes())
    }

    /// Returns true if both texts hold the same content, ignoring
    /// authorship.
    #[must_use]
    pub fn content_eq(&self, other: &Text) -> bool {
        self.content_cmp(other) == Ordering::Equal
    }

    /// Returns true if both texts hold the same content *and* every
    /// byte is attributed to the same author.
    #[must_use]
    pub fn eq_with_authors(&self, other: &Text) -> bool {
        self.content_eq(other) && self.author_runs() == other.author_runs()
    }

    // ── Mutation ─────────────────────────────────────────────────

    /// Inserts `s` at byte offset `pos`, attributed to `author`.
    ///
    /// `pos == len()` appends. The insertion point must fall on a
    /// character boundary.
    pub fn insert_str(
        &mut self,
        pos: usize,
        s: &str,
        author: Option<UserId>,
    ) -> Result<(), TextError> {
        self.check_range(pos, 0)?;
        if s.is_empty() {
            return Ok(());
        }
        match self.locate(pos) {
            None => self.splice_new(0, s, author),
            Some((i, off)) => self.insert_at(i, off, s, author),
        }
        Ok(())
    }

    /// Inserts another text at `pos`, preserving the authorship of the
    /// inserted chunks.
    pub fn insert(&mut self, pos: usize, other: &Text) -> Result<(), TextError> {
        self.check_range(pos, 0)?;
        let mut p = pos;
        for chunk in &other.chunks {
            self.insert_str(p, &chunk.text, chunk.author)?;
            p += chunk.len();
        }
        Ok(())
    }

    /// Erases `[pos, pos + len)`.
    ///
    /// Zero-length erases are no-ops; a range past the end is an error.
    pub fn erase(&mut self, pos: usize, len: usize) -> Result<(), TextError> {
        self.check_range(pos, len)?;
        if len == 0 {
            return Ok(());
        }
        let (mut i, mut off) = self.locate(pos).expect("range checked");
        if off == self.chunks[i].len() {
            i += 1;
            off = 0;
        }
        let mut remaining = len;
        if off > 0 {
            let chunk = &mut self.chunks[i];
            let take = (chunk.len() - off).min(remaining);
            chunk.text.replace_range(off..off + take, "");
            remaining -= take;
            i += 1;
        }
        while remaining > 0 {
            let chunk_len = self.chunks[i].len();
            if remaining >= chunk_len {
                self.chunks.remove(i);
                remaining -= chunk_len;
            } else {
                self.chunks[i].text.replace_range(..remaining, "");
                remaining = 0;
            }
        }
        self.coalesce_at(i);
        Ok(())
    }

    /// Appends `s` without a chunk lookup.
    pub fn append_str(&mut self, s: &str, author: Option<UserId>) {
        if s.is_empty() {
            return;
        }
        if let Some(last) = self.chunks.last_mut() {
            if last.author == author && last.len() + s.len() <= self.max_chunk {
                last.text.push_str(s);
                return;
            }
        }
        let at = self.chunks.len();
        self.splice_new(at, s, author);
    }

    /// Appends another text, preserving chunk authorship.
    pub fn append(&mut self, other: &Text) {
        for chunk in &other.chunks {
            self.append_str(&chunk.text, chunk.author);
        }
    }

    /// Prepends `s` without a chunk lookup.
    pub fn prepend_str(&mut self, s: &str, author: Option<UserId>) {
        if s.is_empty() {
            return;
        }
        if let Some(first) = self.chunks.first_mut() {
            if first.author == author && first.len() + s.len() <= self.max_chunk {
                first.text.insert_str(0, s);
                return;
            }
        }
        self.splice_new(0, s, author);
    }

    /// Prepends another text, preserving chunk authorship.
    pub fn prepend(&mut self, other: &Text) {
        for chunk in other.chunks.iter().rev() {
            self.prepend_str(&chunk.text, chunk.author);
        }
    }

    // ── Wire encoding ────────────────────────────────────────────

    /// Appends the text's wire parameters: a chunk count followed by
    /// `(content, author)` pairs, the author as a hex user ref (0 for
    /// unattributed text).
    pub fn push_params(&self, params: &mut Vec<String>) {
        params.push(self.chunks.len().to_string());
        for chunk in &self.chunks {
            params.push(chunk.text.clone());
            params.push(author_wire(chunk.author));
        }
    }

    /// Reads a text from wire parameters starting at `*index`,
    /// advancing it past the consumed parameters.
    pub fn parse_params(params: &[String], index: &mut usize) -> Result<Text, DecodeError> {
        let count = take_param(params, index)?;
        let count: usize = count.parse().map_err(|_| DecodeError::BadParam {
            index: *index - 1,
            reason: format!("bad chunk count: {count}"),
        })?;
        let mut text = Text::new();
        for _ in 0..count {
            let content = take_param(params, index)?.clone();
            let author = take_param(params, index)?;
            let author = parse_author_wire(author, *index - 1)?;
            text.append_str(&content, author);
        }
        Ok(text)
    }

    // ── Internals ────────────────────────────────────────────────

    /// Finds the chunk containing byte `pos`, returning the chunk index
    /// and the offset within it. A position on a chunk boundary
    /// resolves to the end of the earlier chunk. `None` when the text
    /// is empty.
    fn locate(&self, mut pos: usize) -> Option<(usize, usize)> {
        for (i, chunk) in self.chunks.iter().enumerate() {
            if pos <= chunk.len() {
                return Some((i, pos));
            }
            pos -= chunk.len();
        }
        None
    }

    /// Validates that `[pos, pos + len)` lies within the text and that
    /// both endpoints fall on character boundaries.
    fn check_range(&self, pos: usize, len: usize) -> Result<(), TextError> {
        let total = self.len();
        if pos + len > total {
            return Err(TextError::OutOfRange {
                pos,
                len,
                text_len: total,
            });
        }
        self.check_boundary(pos)?;
        if len > 0 {
            self.check_boundary(pos + len)?;
        }
        Ok(())
    }

    fn check_boundary(&self, pos: usize) -> Result<(), TextError> {
        match self.locate(pos) {
            None => Ok(()),
            Some((i, off)) => {
                if self.chunks[i].text.is_char_boundary(off) {
                    Ok(())
                } else {
                    Err(TextError::NotCharBoundary { pos })
                }
            }
        }
    }

    fn insert_at(&mut self, i: usize, off: usize, s: &str, author: Option<UserId>) {
        let cur = &mut self.chunks[i];
        if cur.author == author && cur.len() + s.len() <= self.max_chunk {
            cur.text.insert_str(off, s);
            return;
        }
        if off == cur.len() {
            if let Some(next) = self.chunks.get_mut(i + 1) {
                if next.author == author && next.len() + s.len() <= self.max_chunk {
                    next.text.insert_str(0, s);
                    return;
                }
            }
            self.splice_new(i + 1, s, author);
        } else if off == 0 {
            if i > 0 {
                let prev = &mut self.chunks[i - 1];
                if prev.author == author && prev.len() + s.len() <= self.max_chunk {
                    prev.text.push_str(s);
                    return;
                }
            }
            self.splice_new(i, s, author);
        } else {
            // Split the containing chunk; the halves may now be small
            // enough to take the new text themselves.
            let tail = self.chunks[i].text.split_off(off);
            let tail_author = self.chunks[i].author;
            self.chunks.insert(i + 1, Chunk::new(tail, tail_author));
            if author == tail_author {
                if self.chunks[i].len() + s.len() <= self.max_chunk {
                    self.chunks[i].text.push_str(s);
                    return;
                }
                if self.chunks[i + 1].len() + s.len() <= self.max_chunk {
                    self.chunks[i + 1].text.insert_str(0, s);
                    return;
                }
            }
            self.splice_new(i + 1, s, author);
        }
    }

    /// Inserts `s` as one or more fresh chunks at chunk index `at`,
    /// splitting runs longer than the cap on character boundaries.
    fn splice_new(&mut self, mut at: usize, s: &str, author: Option<UserId>) {
        let mut rest = s;
        while !rest.is_empty() {
            let take = split_point(rest, self.max_chunk);
            self.chunks.insert(at, Chunk::new(&rest[..take], author));
            at += 1;
            rest = &rest[take..];
        }
    }

    /// Merges the chunks either side of chunk boundary `i` when they
    /// share an author and fit the cap.
    fn coalesce_at(&mut self, i: usize) {
        if i == 0 || i >= self.chunks.len() {
            return;
        }
        let (left, right) = (&self.chunks[i - 1], &self.chunks[i]);
        if left.author == right.author && left.len() + right.len() <= self.max_chunk {
            let right = self.chunks.remove(i);
            self.chunks[i - 1].text.push_str(&right.text);
        }
    }

    fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.chunks.iter().flat_map(|c| c.text.bytes())
    }

    /// Byte lengths per author with adjacent equal authors merged;
    /// chunking differences do not affect the result.
    fn author_runs(&self) -> Vec<(Option<UserId>, usize)> {
        let mut runs: Vec<(Option<UserId>, usize)> = Vec::new();
        for chunk in &self.chunks {
            match runs.last_mut() {
                Some((author, len)) if *author == chunk.author => *len += chunk.len(),
                _ => runs.push((chunk.author, chunk.len())),
            }
        }
        runs
    }
}

impl Default for Text {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in &self.chunks {
            f.write_str(&chunk.text)?;
        }
        Ok(())
    }
}

/// Strict equality: content and per-byte authorship.
impl PartialEq for Text {
    fn eq(&self, other: &Self) -> bool {
        self.eq_with_authors(other)
    }
}

impl Eq for Text {}

impl PartialEq<str> for Text {
    fn eq(&self, other: &str) -> bool {
        self.bytes().eq(other.bytes())
    }
}

impl PartialEq<&str> for Text {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

/// Largest prefix of `s` no longer than `max` that ends on a character
/// boundary; always makes progress even when `max` is smaller than the
/// first scalar (the cap is soft).
fn split_point(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut i = max;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    if i == 0 {
        s.char_indices().nth(1).map_or(s.len(), |(n, _)| n)
    } else {
        i
    }
}

fn author_wire(author: Option<UserId>) -> String {
    author.unwrap_or(cowrite_types::SERVER_OWNER).to_hex()
}

fn parse_author_wire(s: &str, index: usize) -> Result<Option<UserId>, DecodeError> {
    let id = UserId::from_hex(s).map_err(|_| DecodeError::BadParam {
        index,
        reason: format!("bad author ref: {s}"),
    })?;
    Ok(if id.is_server() { None } else { Some(id) })
}

pub(crate) fn take_param<'a>(
    params: &'a [String],
    index: &mut usize,
) -> Result<&'a String, DecodeError> {
    let param = params
        .get(*index)
        .ok_or(DecodeError::MissingParam(*index))?;
    *index += 1;
    Ok(param)
}
