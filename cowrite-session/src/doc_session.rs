//! Per-document session state.
//!
//! All messages for one document travel inside a `document` envelope
//! packet whose first parameter is the document reference and second
//! the inner command. The server object owns the authoritative engine
//! and the subscription bookkeeping; the client object tracks the
//! local subscription state machine and installs its engine only once
//! the initial content push has completed.

use cowrite_ot::{JupiterClient, JupiterServer, Operation, Record, RecordDispatch, Text};
use cowrite_types::{DocRef, UserId, SERVER_OWNER};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{SessionError, SessionResult};
use crate::packet::Packet;

/// Subscription states as seen from a client.
///
/// The intermediate states exist only on clients, which wait for the
/// server's chunked content push (subscribe) or membership broadcast
/// (unsubscribe). Server transitions are atomic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribing,
    Subscribed,
    Unsubscribing,
}

/// Builds a `document` envelope packet for the given inner command.
#[must_use]
pub fn doc_packet(doc_ref: DocRef, inner: &str) -> Packet {
    Packet::new("document").arg(doc_ref.to_wire()).arg(inner)
}

/// Builds a `record` envelope packet.
#[must_use]
pub fn record_packet(doc_ref: DocRef, author: Option<UserId>, record: &Record) -> Packet {
    let mut packet = doc_packet(doc_ref, "record").arg(author.unwrap_or(SERVER_OWNER).to_hex());
    let mut params = Vec::new();
    record.push_params(&mut params);
    for param in params {
        packet.push(param);
    }
    packet
}

// ── Server side ──────────────────────────────────────────────────

/// Server-side state for one document.
#[derive(Debug)]
pub struct ServerDocSession {
    document: Document,
    engine: JupiterServer,
    /// Record packets held back per subscriber while their initial
    /// content push is still in flight.
    frozen: BTreeMap<UserId, Vec<Packet>>,
}

impl ServerDocSession {
    /// Creates the authoritative session for a server-seeded document.
    #[must_use]
    pub fn new(document: Document, content: Text) -> Self {
        Self {
            document,
            engine: JupiterServer::new(content),
            frozen: BTreeMap::new(),
        }
    }

    /// Creates the session for a document a client just created. The
    /// creator already holds the content, so they get a pair but no
    /// content push.
    pub fn created_by(document: Document, content: Text, creator: UserId) -> SessionResult<Self> {
        let mut session = Self::new(document, content);
        session.document.subscribe(creator);
        session.engine.client_add(creator)?;
        Ok(session)
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// The authoritative text.
    #[must_use]
    pub fn text(&self) -> &Text {
        self.engine.document()
    }

    /// Subscribes a remote `user` and returns the initial content push
    /// for them: `sync_init`, one `sync_chunk` per chunk, `sync_final`.
    ///
    /// Until [`ServerDocSession::finish_sync`] is called, records for
    /// this user are queued instead of emitted so their fresh pair
    /// never sees an operation from before the push.
    pub fn subscribe(&mut self, user: UserId) -> SessionResult<Vec<Packet>> {
        if self.document.is_subscribed(user) {
            return Err(SessionError::BadValue(format!(
                "user {user} is already subscribed to {}",
                self.document.doc_ref()
            )));
        }
        self.document.subscribe(user);
        self.engine.client_add(user)?;
        self.frozen.insert(user, Vec::new());
        debug!(%user, doc = %self.document.doc_ref(), "subscriber added");

        let doc_ref = self.document.doc_ref();
        let text = self.engine.document();
        let mut packets = vec![doc_packet(doc_ref, "sync_init").arg(text.len().to_string())];
        for chunk in text.chunks() {
            packets.push(
                doc_packet(doc_ref, "sync_chunk")
                    .arg(chunk.text())
                    .arg(chunk.author().unwrap_or(SERVER_OWNER).to_hex()),
            );
        }
        packets.push(doc_packet(doc_ref, "sync_final"));
        Ok(packets)
    }

    /// Subscribes the host's own user: membership only, no pair and no
    /// content push — the host reads the authoritative text directly.
    pub fn subscribe_local(&mut self, user: UserId) -> SessionResult<()> {
        if !self.document.subscribe(user) {
            return Err(SessionError::Logic(format!(
                "local user {user} is already subscribed"
            )));
        }
        Ok(())
    }

    /// Marks the initial push for `user` as delivered and returns any
    /// records queued while it was in flight, in generation order.
    pub fn finish_sync(&mut self, user: UserId) -> Vec<Packet> {
        self.frozen.remove(&user).unwrap_or_default()
    }

    /// Removes `user` from the document, dropping their pair if they
    /// had one.
    pub fn unsubscribe(&mut self, user: UserId) -> SessionResult<()> {
        if !self.document.unsubscribe(user) {
            return Err(SessionError::BadValue(format!(
                "user {user} is not subscribed to {}",
                self.document.doc_ref()
            )));
        }
        if self.engine.has_client(user) {
            self.engine.client_remove(user)?;
        }
        self.frozen.remove(&user);
        debug!(%user, doc = %self.document.doc_ref(), "subscriber removed");
        Ok(())
    }

    /// Processes a record received from `from` and returns the packets
    /// to relay, addressed per target user.
    pub fn remote_record(
        &mut self,
        from: UserId,
        record: &Record,
    ) -> SessionResult<Vec<(UserId, Packet)>> {
        if !self.document.is_subscribed(from) {
            return Err(SessionError::BadValue(format!(
                "record from non-subscriber {from}"
            )));
        }
        let dispatches = self.engine.remote_op(record, from)?;
        Ok(self.route(dispatches))
    }

    /// Performs an edit at the server site (the host's own typing, or a
    /// server-side change) and returns the packets to relay.
    pub fn local_edit(
        &mut self,
        op: &Operation,
        author: Option<UserId>,
    ) -> SessionResult<Vec<(UserId, Packet)>> {
        let dispatches = self.engine.local_op(op, author)?;
        Ok(self.route(dispatches))
    }

    fn route(&mut self, dispatches: Vec<RecordDispatch>) -> Vec<(UserId, Packet)> {
        let doc_ref = self.document.doc_ref();
        let mut out = Vec::new();
        for dispatch in dispatches {
            let packet = record_packet(doc_ref, dispatch.originator, &dispatch.record);
            if let Some(queue) = self.frozen.get_mut(&dispatch.target) {
                queue.push(packet);
            } else {
                out.push((dispatch.target, packet));
            }
        }
        out
    }
}

// ── Client side ──────────────────────────────────────────────────

/// Client-side state for one document.
///
/// The local user id is passed into the calls that need it rather than
/// stored: the document list is mirrored from the login sync stream,
/// which arrives before the server announces the client's own id.
#[derive(Debug)]
pub struct ClientDocSession {
    document: Document,
    state: SubscriptionState,
    /// Content accumulating during the initial push.
    incoming: Option<Text>,
    engine: Option<JupiterClient>,
}

impl ClientDocSession {
    /// Creates the local view of a document the user is not subscribed
    /// to.
    #[must_use]
    pub fn new(document: Document) -> Self {
        Self {
            document,
            state: SubscriptionState::Unsubscribed,
            incoming: None,
            engine: None,
        }
    }

    /// Creates the local view of a freshly created own document; the
    /// creator is subscribed from the start with the given content.
    #[must_use]
    pub fn created(document: Document, self_user: UserId, content: Text) -> Self {
        let mut session = Self::new(document);
        session.document.subscribe(self_user);
        session.state = SubscriptionState::Subscribed;
        session.engine = Some(JupiterClient::new(content));
        session
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// The local content; present only while subscribed.
    #[must_use]
    pub fn text(&self) -> Option<&Text> {
        self.engine.as_ref().map(JupiterClient::document)
    }

    // ── Requests (local user intent) ─────────────────────────────

    /// Starts subscribing; returns the request packet.
    pub fn request_subscribe(&mut self, self_user: UserId) -> SessionResult<Packet> {
        if self.state != SubscriptionState::Unsubscribed {
            return Err(SessionError::Logic(format!(
                "subscribe request in state {:?}",
                self.state
            )));
        }
        self.state = SubscriptionState::Subscribing;
        Ok(doc_packet(self.document.doc_ref(), "subscribe").arg(self_user.to_hex()))
    }

    /// Starts unsubscribing; returns the request packet.
    pub fn request_unsubscribe(&mut self, self_user: UserId) -> SessionResult<Packet> {
        if self.state != SubscriptionState::Subscribed {
            return Err(SessionError::Logic(format!(
                "unsubscribe request in state {:?}",
                self.state
            )));
        }
        self.state = SubscriptionState::Unsubscribing;
        Ok(doc_packet(self.document.doc_ref(), "unsubscribe").arg(self_user.to_hex()))
    }

    /// Applies a local edit and returns the record packet for the
    /// server. Edits are only legal while fully subscribed.
    pub fn local_edit(&mut self, op: &Operation, self_user: UserId) -> SessionResult<Packet> {
        if self.state != SubscriptionState::Subscribed {
            return Err(SessionError::Logic(format!(
                "local edit in state {:?}",
                self.state
            )));
        }
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| SessionError::Logic("subscribed without an engine".to_string()))?;
        let record = engine.local_op(op, Some(self_user))?;
        Ok(record_packet(
            self.document.doc_ref(),
            Some(self_user),
            &record,
        ))
    }

    // ── Incoming document messages ───────────────────────────────

    /// Start of the initial content push.
    pub fn handle_sync_init(&mut self, size_hint: usize) -> SessionResult<()> {
        if self.state != SubscriptionState::Subscribing {
            return Err(SessionError::UnexpectedCommand(format!(
                "sync_init in state {:?}",
                self.state
            )));
        }
        let _ = size_hint;
        self.incoming = Some(Text::new());
        Ok(())
    }

    /// One chunk of the initial content push.
    pub fn handle_sync_chunk(&mut self, text: &str, author: Option<UserId>) -> SessionResult<()> {
        let incoming = self.incoming.as_mut().ok_or_else(|| {
            SessionError::UnexpectedCommand("sync_chunk outside a sync stream".to_string())
        })?;
        incoming.append_str(text, author);
        Ok(())
    }

    /// End of the initial content push: install a fresh pair over the
    /// received content and become subscribed.
    pub fn handle_sync_final(&mut self, self_user: UserId) -> SessionResult<()> {
        let content = self.incoming.take().ok_or_else(|| {
            SessionError::UnexpectedCommand("sync_final outside a sync stream".to_string())
        })?;
        self.engine = Some(JupiterClient::new(content));
        self.state = SubscriptionState::Subscribed;
        self.document.subscribe(self_user);
        debug!(doc = %self.document.doc_ref(), "subscription complete");
        Ok(())
    }

    /// A record relayed by the server, originated by `author`.
    ///
    /// Receiving one before the subscription completed means the server
    /// violated the sync ordering guarantee.
    pub fn handle_record(&mut self, author: Option<UserId>, record: &Record) -> SessionResult<()> {
        let engine = self.engine.as_mut().ok_or_else(|| {
            SessionError::UnexpectedCommand("record for unsubscribed document".to_string())
        })?;
        engine.remote_op(record, author)?;
        Ok(())
    }

    /// A membership broadcast: someone subscribed.
    pub fn handle_subscribe(&mut self, user: UserId) {
        self.document.subscribe(user);
    }

    /// A membership broadcast: someone unsubscribed. For ourselves this
    /// completes the unsubscribe and drops the engine.
    pub fn handle_unsubscribe(&mut self, user: UserId, self_user: Option<UserId>) {
        self.document.unsubscribe(user);
        if Some(user) == self_user {
            if self.state != SubscriptionState::Unsubscribing {
                warn!(doc = %self.document.doc_ref(), "server revoked our subscription");
            }
            self.engine = None;
            self.incoming = None;
            self.state = SubscriptionState::Unsubscribed;
        }
    }

    /// The authoritative rename broadcast.
    pub fn handle_rename(&mut self, title: &str) {
        self.document.set_title(title);
    }
}
