//! Document metadata shared by the client and server session objects.

use cowrite_types::{DocRef, UserId};
use std::collections::BTreeSet;

/// Metadata for one shared document. The content itself lives in the
/// role-specific engine and only exists at sites that can assign it
/// (the server, and subscribed clients).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    doc_ref: DocRef,
    title: String,
    suffix: u32,
    encoding: String,
    subscribers: BTreeSet<UserId>,
}

impl Document {
    /// Creates a document entry.
    #[must_use]
    pub fn new(doc_ref: DocRef, title: impl Into<String>, encoding: impl Into<String>) -> Self {
        Self {
            doc_ref,
            title: title.into(),
            suffix: 1,
            encoding: encoding.into(),
            subscribers: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn doc_ref(&self) -> DocRef {
        self.doc_ref
    }

    /// The user that created the document; the server for owner 0.
    #[must_use]
    pub fn owner(&self) -> Option<UserId> {
        if self.doc_ref.owner.is_server() {
            None
        } else {
            Some(self.doc_ref.owner)
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Display disambiguator among documents sharing a title; 1 when
    /// the title is unique.
    #[must_use]
    pub fn suffix(&self) -> u32 {
        self.suffix
    }

    pub fn set_suffix(&mut self, suffix: u32) {
        self.suffix = suffix;
    }

    #[must_use]
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Users currently subscribed, in id order.
    pub fn subscribers(&self) -> impl Iterator<Item = UserId> + '_ {
        self.subscribers.iter().copied()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn is_subscribed(&self, user: UserId) -> bool {
        self.subscribers.contains(&user)
    }

    /// Adds a subscriber; returns false if already present.
    pub fn subscribe(&mut self, user: UserId) -> bool {
        self.subscribers.insert(user)
    }

    /// Removes a subscriber; returns false if not present.
    pub fn unsubscribe(&mut self, user: UserId) -> bool {
        self.subscribers.remove(&user)
    }
}

/// Smallest suffix `n >= 1` such that no other document (excluding
/// `ignore`) shares both `title` and `n`.
#[must_use]
pub fn find_free_suffix<'a>(
    title: &str,
    documents: impl Iterator<Item = &'a Document>,
    ignore: Option<DocRef>,
) -> u32 {
    let taken: BTreeSet<u32> = documents
        .filter(|d| Some(d.doc_ref()) != ignore && d.title() == title)
        .map(Document::suffix)
        .collect();
    let mut candidate = 1;
    while taken.contains(&candidate) {
        candidate += 1;
    }
    candidate
}
