//! The edit operation algebra.
//!
//! Operations are plain values; transforms never mutate their inputs.
//! `transform` is the central primitive: `a.transform(&b)` produces the
//! form of `b` that takes effect after `a` has already been applied, so
//! that both application orders of two concurrent operations reach the
//! same text. Dispatch runs through [`Operation::transform_insert`] and
//! [`Operation::transform_delete`], which describe how the receiver
//! changes when the given insertion or deletion is forced in first.

use cowrite_types::UserId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{DecodeError, TextError};
use crate::text::{take_param, Text};

/// A change to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Inserts `text` at byte offset `pos`.
    Insert { pos: usize, text: String },

    /// Deletes `len` bytes starting at `pos`.
    Delete { pos: usize, len: usize },

    /// Two operations fused into one; produced when a deletion is
    /// transformed against an insertion landing inside its range. Both
    /// halves are expressed against the same base document.
    Split {
        first: Box<Operation>,
        second: Box<Operation>,
    },

    /// Does nothing; produced when a deletion is fully covered by a
    /// concurrent deletion.
    Noop,

    /// Re-inserts previously deleted text together with its original
    /// authorship; produced by [`Operation::reverse`] on a deletion.
    ReversibleInsert { pos: usize, text: Text },
}

impl Operation {
    /// Convenience constructor for an insertion.
    #[must_use]
    pub fn insert(pos: usize, text: impl Into<String>) -> Self {
        Self::Insert {
            pos,
            text: text.into(),
        }
    }

    /// Convenience constructor for a deletion.
    #[must_use]
    pub const fn delete(pos: usize, len: usize) -> Self {
        Self::Delete { pos, len }
    }

    /// Convenience constructor for a split.
    #[must_use]
    pub fn split(first: Operation, second: Operation) -> Self {
        Self::Split {
            first: Box::new(first),
            second: Box::new(second),
        }
    }

    /// Applies the operation to `doc`.
    ///
    /// For insertions the `author` hint becomes the authorship of the
    /// inserted bytes; deletions and noops ignore it; a reversible
    /// insert carries its own authorship and ignores the hint too.
    pub fn apply(&self, doc: &mut Text, author: Option<UserId>) -> Result<(), TextError> {
        match self {
            Operation::Insert { pos, text } => doc.insert_str(*pos, text, author),
            Operation::Delete { pos, len } => doc.erase(*pos, *len),
            Operation::Split { first, second } => {
                first.apply(doc, author)?;
                // The second half still assumes the pre-first document;
                // retarget it before applying.
                first.transform(second).apply(doc, author)
            }
            Operation::Noop => Ok(()),
            Operation::ReversibleInsert { pos, text } => doc.insert(*pos, text),
        }
    }

    /// Builds the inverse operation relative to the current content of
    /// `doc` (which the operation has not yet been applied to).
    pub fn reverse(&self, doc: &Text) -> Result<Operation, TextError> {
        match self {
            Operation::Insert { pos, text } => Ok(Operation::delete(*pos, text.len())),
            Operation::Delete { pos, len } => Ok(Operation::ReversibleInsert {
                pos: *pos,
                text: doc.substr(*pos, *len)?,
            }),
            Operation::Split { first, second } => Ok(Operation::split(
                first.reverse(doc)?,
                second.reverse(doc)?,
            )),
            Operation::Noop => Ok(Operation::Noop),
            Operation::ReversibleInsert { pos, text } => Ok(Operation::delete(*pos, text.len())),
        }
    }

    /// Transforms `base` against this operation: the result is the form
    /// of `base` that applies after `self` has taken effect.
    #[must_use]
    pub fn transform(&self, base: &Operation) -> Operation {
        match self {
            Operation::Insert { pos, text } => base.transform_insert(*pos, text),
            Operation::Delete { pos, len } => base.transform_delete(*pos, *len),
            Operation::Split { first, second } => first.transform(&second.transform(base)),
            Operation::Noop => base.clone(),
            Operation::ReversibleInsert { pos, text } => {
                base.transform_insert(*pos, &text.to_string())
            }
        }
    }

    /// Includes the effect of an insertion of `t` at `q` into this
    /// operation.
    #[must_use]
    pub fn transform_insert(&self, q: usize, t: &str) -> Operation {
        match self {
            Operation::Insert { pos, text } => {
                Self::shifted_insert(*pos, q, t, text.as_str(), |p| Operation::Insert {
                    pos: p,
                    text: text.clone(),
                })
            }
            Operation::ReversibleInsert { pos, text } => {
                let content = text.to_string();
                Self::shifted_insert(*pos, q, t, &content, |p| Operation::ReversibleInsert {
                    pos: p,
                    text: text.clone(),
                })
            }
            Operation::Delete { pos, len } => {
                let (p, n) = (*pos, *len);
                if q >= p + n {
                    // Insertion at or past the end of the range.
                    self.clone()
                } else if q <= p {
                    Operation::delete(p + t.len(), n)
                } else {
                    // Insertion inside the range: delete around it.
                    Operation::split(
                        Operation::delete(p, q - p),
                        Operation::delete(q + t.len(), n - (q - p)),
                    )
                }
            }
            Operation::Split { first, second } => Operation::split(
                first.transform_insert(q, t),
                second.transform_insert(q, t),
            ),
            Operation::Noop => Operation::Noop,
        }
    }

    /// Includes the effect of a deletion of `m` bytes at `q` into this
    /// operation.
    #[must_use]
    pub fn transform_delete(&self, q: usize, m: usize) -> Operation {
        match self {
            Operation::Insert { pos, .. } | Operation::ReversibleInsert { pos, .. } => {
                let p = *pos;
                if p <= q {
                    self.clone()
                } else if p > q + m {
                    self.with_pos(p - m)
                } else {
                    // Insertion point was deleted; collapse to the start
                    // of the erased range.
                    self.with_pos(q)
                }
            }
            Operation::Delete { pos, len } => {
                let (p, n) = (*pos, *len);
                if q + m <= p {
                    Operation::delete(p - m, n)
                } else if p + n <= q {
                    self.clone()
                } else if q <= p && q + m >= p + n {
                    // Fully covered by the other deletion.
                    Operation::Noop
                } else if q > p && q + m >= p + n {
                    // Other deletion covers our tail.
                    Operation::delete(p, q - p)
                } else if q <= p {
                    // Other deletion covers our head.
                    Operation::delete(q, n - (q + m - p))
                } else {
                    // Other deletion strictly inside our range.
                    Operation::delete(p, n - m)
                }
            }
            Operation::Split { first, second } => Operation::split(
                first.transform_delete(q, m),
                second.transform_delete(q, m),
            ),
            Operation::Noop => Operation::Noop,
        }
    }

    // ── Wire encoding ────────────────────────────────────────────

    /// Appends the operation's wire parameters, starting with its tag.
    pub fn push_params(&self, params: &mut Vec<String>) {
        match self {
            Operation::Insert { pos, text } => {
                params.push("ins".to_string());
                params.push(pos.to_string());
                params.push(text.clone());
            }
            Operation::Delete { pos, len } => {
                params.push("del".to_string());
                params.push(pos.to_string());
                params.push(len.to_string());
            }
            Operation::Split { first, second } => {
                params.push("split".to_string());
                first.push_params(params);
                second.push_params(params);
            }
            Operation::Noop => params.push("noop".to_string()),
            Operation::ReversibleInsert { pos, text } => {
                params.push("revins".to_string());
                params.push(pos.to_string());
                text.push_params(params);
            }
        }
    }

    /// Reads an operation from wire parameters starting at `*index`,
    /// advancing it past the consumed parameters.
    pub fn parse_params(params: &[String], index: &mut usize) -> Result<Operation, DecodeError> {
        let tag = take_param(params, index)?;
        match tag.as_str() {
            "ins" => {
                let pos = parse_usize(params, index)?;
                let text = take_param(params, index)?.clone();
                Ok(Operation::Insert { pos, text })
            }
            "del" => {
                let pos = parse_usize(params, index)?;
                let len = parse_usize(params, index)?;
                Ok(Operation::Delete { pos, len })
            }
            "split" => {
                let first = Operation::parse_params(params, index)?;
                let second = Operation::parse_params(params, index)?;
                Ok(Operation::split(first, second))
            }
            "noop" => Ok(Operation::Noop),
            "revins" => {
                let pos = parse_usize(params, index)?;
                let text = Text::parse_params(params, index)?;
                Ok(Operation::ReversibleInsert { pos, text })
            }
            other => Err(DecodeError::UnknownTag(other.to_string())),
        }
    }

    // ── Internals ────────────────────────────────────────────────

    /// Shared insert-vs-insert rule. At equal positions the tie-break
    /// is total and symmetric on the inserted text: the op whose text
    /// is lexicographically smaller shifts right, so the smaller text
    /// ends up earlier in the converged document.
    fn shifted_insert(
        p: usize,
        q: usize,
        t: &str,
        own_text: &str,
        rebuild: impl Fn(usize) -> Operation,
    ) -> Operation {
        match p.cmp(&q) {
            Ordering::Less => rebuild(p),
            Ordering::Greater => rebuild(p + t.len()),
            Ordering::Equal => {
                if own_text > t {
                    rebuild(p)
                } else {
                    rebuild(p + t.len())
                }
            }
        }
    }

    /// Clones an insert-like operation at a new position.
    fn with_pos(&self, pos: usize) -> Operation {
        match self {
            Operation::Insert { text, .. } => Operation::Insert {
                pos,
                text: text.clone(),
            },
            Operation::ReversibleInsert { text, .. } => Operation::ReversibleInsert {
                pos,
                text: text.clone(),
            },
            _ => unreachable!("with_pos is only used for insert-like operations"),
        }
    }
}

fn parse_usize(params: &[String], index: &mut usize) -> Result<usize, DecodeError> {
    let raw = take_param(params, index)?;
    raw.parse().map_err(|_| DecodeError::BadParam {
        index: *index - 1,
        reason: format!("bad offset: {raw}"),
    })
}
