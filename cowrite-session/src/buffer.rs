//! The session controller.
//!
//! One [`Buffer`] owns the user table, the document collection and the
//! dispatch of top-level packets for its role. The three roles share
//! the same packet table; dispatch is a `match` over the parsed
//! command. The controller never performs I/O: every entry point
//! returns the [`Outbound`] actions for the transport loop, and
//! everything observable is queued as a [`SessionEvent`] the embedder
//! pulls with [`Buffer::poll_event`].
//!
//! Error policy: a `SessionResult` error from [`Buffer::handle_packet`]
//! means the *offending connection* must be dropped. Per-user errors
//! never reach other users; the server keeps serving everyone else.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use cowrite_ot::{Operation, Record, Text};
use cowrite_types::{Colour, DocRef, DocumentId, UserId, SERVER_OWNER};
use rand::{distributions::Alphanumeric, Rng};
use sha1::{Digest, Sha1};
use tracing::{debug, info, warn};

use crate::archive::{ArchivedDocument, ArchivedUser, SessionArchive};
use crate::chat::{Chat, ChatMessage};
use crate::command::{CommandMap, RESULT_OK, RESULT_UNKNOWN};
use crate::doc_session::{
    doc_packet, ClientDocSession, ServerDocSession, SubscriptionState,
};
use crate::document::{find_free_suffix, Document};
use crate::error::{LoginError, SessionError, SessionResult};
use crate::packet::{Packet, PROTOCOL_VERSION};
use crate::user_table::UserTable;

/// Connection identifier assigned by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The single server link on a client buffer.
pub const CLIENT_CONN: ConnId = ConnId(0);

/// An action for the transport loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send a packet on a connection.
    Send(ConnId, Packet),
    /// Close a connection.
    Close(ConnId),
}

/// Observable session happenings, pulled by the embedder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn(UserId),
    LoginFailed(LoginError),
    SyncComplete,
    UserJoined(UserId),
    UserParted(UserId),
    ColourChanged(UserId),
    ColourFailed,
    DocumentCreated(DocRef),
    DocumentRemoved(DocRef),
    DocumentRenamed(DocRef),
    Subscribed(DocRef, UserId),
    Unsubscribed(DocRef, UserId),
    TextChanged(DocRef),
    Chat(ChatMessage),
    CommandResult {
        command: String,
        kind: String,
        reply: String,
    },
}

/// Server-side settings.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Password every participant must present at login.
    pub global_password: Option<String>,
    /// Public key material announced in `welcome` (`n`, `k`); the
    /// transport seam handles the actual encryption.
    pub public_key: Option<(String, String)>,
}

/// `SHA1(token ‖ password)` in lowercase hex, as carried by the login
/// and password packets.
#[must_use]
pub fn token_hash(token: &str, password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(token.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect()
}

/// Optional trailing packet parameter; absent or empty means none.
fn optional_param(packet: &Packet, index: usize) -> Option<String> {
    packet
        .params()
        .get(index)
        .filter(|s| !s.is_empty())
        .cloned()
}

fn author_param(id: UserId) -> Option<UserId> {
    if id.is_server() {
        None
    } else {
        Some(id)
    }
}

// ── Server state ─────────────────────────────────────────────────

#[derive(Debug)]
struct Connection {
    token: String,
    user: Option<UserId>,
}

/// Authoritative session state (server and host roles).
#[derive(Debug)]
pub struct ServerState {
    users: UserTable,
    chat: Chat,
    conns: BTreeMap<ConnId, Connection>,
    documents: BTreeMap<DocRef, ServerDocSession>,
    doc_counter: u32,
    config: ServerConfig,
    commands: CommandMap,
    /// The host's own user, when this state backs a host buffer.
    local_user: Option<UserId>,
    events: VecDeque<SessionEvent>,
}

impl ServerState {
    fn new(config: ServerConfig) -> Self {
        Self {
            users: UserTable::new(),
            chat: Chat::new(),
            conns: BTreeMap::new(),
            documents: BTreeMap::new(),
            doc_counter: 0,
            config,
            commands: CommandMap::builtin(),
            local_user: None,
            events: VecDeque::new(),
        }
    }

    fn conn_of(&self, user: UserId) -> Option<ConnId> {
        self.conns
            .iter()
            .find(|(_, c)| c.user == Some(user))
            .map(|(id, _)| *id)
    }

    fn user_of(&self, conn: ConnId) -> Option<UserId> {
        self.conns.get(&conn).and_then(|c| c.user)
    }

    fn broadcast(&self, packet: &Packet) -> Vec<Outbound> {
        self.conns
            .iter()
            .filter(|(_, c)| c.user.is_some())
            .map(|(id, _)| Outbound::Send(*id, packet.clone()))
            .collect()
    }

    fn broadcast_except(&self, skip: UserId, packet: &Packet) -> Vec<Outbound> {
        self.conns
            .iter()
            .filter(|(_, c)| c.user.is_some() && c.user != Some(skip))
            .map(|(id, _)| Outbound::Send(*id, packet.clone()))
            .collect()
    }

    fn route_to_conns(&self, routed: Vec<(UserId, Packet)>) -> Vec<Outbound> {
        routed
            .into_iter()
            .filter_map(|(user, packet)| self.conn_of(user).map(|c| Outbound::Send(c, packet)))
            .collect()
    }

    fn require_document(&self, doc_ref: DocRef) -> SessionResult<()> {
        if self.documents.contains_key(&doc_ref) {
            Ok(())
        } else {
            Err(SessionError::BadValue(format!(
                "unknown document: {doc_ref}"
            )))
        }
    }

    // ── Connection lifecycle ─────────────────────────────────────

    fn accept_connection(&mut self, conn: ConnId) -> Vec<Outbound> {
        let token = generate_token();
        let (key_n, key_k) = self.config.public_key.clone().unwrap_or_default();
        let welcome = Packet::new("welcome")
            .arg(PROTOCOL_VERSION.to_string())
            .arg(token.as_str())
            .arg(key_n)
            .arg(key_k);
        self.conns.insert(conn, Connection { token, user: None });
        info!(%conn, "connection accepted");
        vec![Outbound::Send(conn, welcome)]
    }

    fn connection_lost(&mut self, conn: ConnId) -> Vec<Outbound> {
        let Some(connection) = self.conns.remove(&conn) else {
            return Vec::new();
        };
        let Some(user) = connection.user else {
            return Vec::new();
        };
        info!(%conn, %user, "connection lost");

        let mut outs = Vec::new();
        let refs: Vec<DocRef> = self.documents.keys().copied().collect();
        for doc_ref in refs {
            let session = self.documents.get_mut(&doc_ref).expect("listed");
            if session.document().is_subscribed(user) {
                if let Err(e) = session.unsubscribe(user) {
                    warn!(%user, %doc_ref, error = %e, "teardown unsubscribe failed");
                }
                self.events
                    .push_back(SessionEvent::Unsubscribed(doc_ref, user));
                let packet = doc_packet(doc_ref, "unsubscribe").arg(user.to_hex());
                outs.extend(self.broadcast(&packet));
            }
        }

        if let Err(e) = self.users.disconnect(user) {
            warn!(%user, error = %e, "teardown disconnect failed");
        }
        self.events.push_back(SessionEvent::UserParted(user));
        let part = Packet::new("part").arg(conn.0.to_string());
        outs.extend(self.broadcast(&part));
        outs
    }

    // ── Packet dispatch ──────────────────────────────────────────

    fn handle_packet(&mut self, conn: ConnId, packet: &Packet) -> SessionResult<Vec<Outbound>> {
        if !self.conns.contains_key(&conn) {
            return Err(SessionError::Logic(format!(
                "packet from unknown connection {conn}"
            )));
        }
        let user = self.user_of(conn);
        debug!(%conn, command = packet.command(), "dispatching");

        match (packet.command(), user) {
            ("login", _) => self.handle_login(conn, packet),
            ("pong", _) => Ok(Vec::new()),
            (command, None) => Err(SessionError::UnexpectedCommand(format!(
                "{command} before login"
            ))),
            ("document_create", Some(from)) => self.handle_document_create(from, packet),
            ("document_remove", Some(from)) => self.handle_document_remove(from, packet),
            ("document", Some(from)) => self.handle_document(from, packet),
            ("message", Some(from)) => self.handle_message(from, packet),
            ("emote_message", Some(from)) => self.handle_emote(from, packet),
            ("user_colour", Some(from)) => self.handle_user_colour(conn, from, packet),
            ("user_password", Some(from)) => self.handle_user_password(from, packet),
            ("command_query", Some(from)) => self.handle_command_query(conn, from, packet),
            (command, Some(_)) => Err(SessionError::UnexpectedCommand(command.to_string())),
        }
    }

    fn handle_login(&mut self, conn: ConnId, packet: &Packet) -> SessionResult<Vec<Outbound>> {
        if self.user_of(conn).is_some() {
            return Err(SessionError::UnexpectedCommand(
                "login while logged in".to_string(),
            ));
        }
        let name = packet.param(0)?.to_string();
        let colour = packet.param_colour(1)?;
        let global_hash = optional_param(packet, 2);
        let user_hash = optional_param(packet, 3);
        let token = self.conns[&conn].token.clone();

        let failure = self.validate_login(&name, colour, &token, global_hash, user_hash);
        if let Some(error) = failure {
            info!(%conn, %name, %error, "login rejected");
            self.events.push_back(SessionEvent::LoginFailed(error));
            let failed = Packet::new("login_failed").arg(error.code().to_string());
            return Ok(vec![Outbound::Send(conn, failed)]);
        }

        let user_id = self.users.connect(&name, colour);
        self.conns
            .get_mut(&conn)
            .expect("checked above")
            .user = Some(user_id);
        info!(%conn, %user_id, %name, "login accepted");

        let mut outs = Vec::new();

        // Initial state push: the users not currently connected plus
        // the document list.
        let offline: Vec<&crate::user::User> = self.users.offline().collect();
        let count = offline.len() + self.documents.len();
        outs.push(Outbound::Send(
            conn,
            Packet::new("sync_init").arg(count.to_string()),
        ));
        for user in &offline {
            outs.push(Outbound::Send(
                conn,
                Packet::new("sync_usertable_user")
                    .arg(user.id().to_hex())
                    .arg(user.name())
                    .arg(user.colour().to_wire()),
            ));
        }
        for session in self.documents.values() {
            let document = session.document();
            let mut sync = Packet::new("sync_doclist_document")
                .arg(document.doc_ref().to_wire())
                .arg(document.title())
                .arg(document.suffix().to_string())
                .arg(document.encoding());
            for subscriber in document.subscribers() {
                sync.push(subscriber.to_hex());
            }
            outs.push(Outbound::Send(conn, sync));
        }
        outs.push(Outbound::Send(conn, Packet::new("sync_final")));

        // Replay the already-connected peers to the new client; their
        // own join is broadcast below and arrives last. The host's
        // local user has no connection and rides with net id 0.
        for user in self.users.connected() {
            if user.id() == user_id {
                continue;
            }
            let net_id = self.conn_of(user.id()).map_or(0, |c| c.0);
            outs.push(Outbound::Send(
                conn,
                Packet::new("join")
                    .arg(net_id.to_string())
                    .arg(user.name())
                    .arg(user.id().to_hex())
                    .arg(user.colour().to_wire()),
            ));
        }

        // Announce the new user to everyone, the new client included;
        // the client recognises itself by the pending login name.
        let join = Packet::new("join")
            .arg(conn.0.to_string())
            .arg(name.as_str())
            .arg(user_id.to_hex())
            .arg(colour.to_wire());
        outs.extend(self.broadcast(&join));
        self.events.push_back(SessionEvent::UserJoined(user_id));
        Ok(outs)
    }

    fn validate_login(
        &self,
        name: &str,
        colour: Colour,
        token: &str,
        global_hash: Option<String>,
        user_hash: Option<String>,
    ) -> Option<LoginError> {
        if name.is_empty() || self.users.name_in_use(name, None) {
            return Some(LoginError::NameInUse);
        }
        if self.users.colour_in_use(colour, None) {
            return Some(LoginError::ColourInUse);
        }
        if let Some(global) = &self.config.global_password {
            if global_hash.as_deref() != Some(token_hash(token, global).as_str()) {
                return Some(LoginError::WrongGlobalPassword);
            }
        }
        if let Some(existing) = self.users.find_by_name(name) {
            if let Some(password) = existing.password() {
                if user_hash.as_deref() != Some(token_hash(token, password).as_str()) {
                    return Some(LoginError::WrongUserPassword);
                }
            }
        }
        None
    }

    // ── Documents ────────────────────────────────────────────────

    fn handle_document_create(
        &mut self,
        from: UserId,
        packet: &Packet,
    ) -> SessionResult<Vec<Outbound>> {
        let owner = packet.param_user_ref(0)?;
        if owner != from {
            return Err(SessionError::BadValue(format!(
                "document owner {owner} is not the sender {from}"
            )));
        }
        let id = packet.param_u32(1)?;
        if id == 0 {
            return Err(SessionError::BadValue("document id 0".to_string()));
        }
        let doc_ref = DocRef::new(owner, DocumentId::new(id));
        if self.documents.contains_key(&doc_ref) {
            return Err(SessionError::BadValue(format!(
                "duplicate document: {doc_ref}"
            )));
        }
        let title = packet.param(2)?.to_string();
        let encoding = packet.param(3)?.to_string();
        let content = packet.param(4)?.to_string();

        let mut document = Document::new(doc_ref, title.as_str(), encoding.as_str());
        document.set_suffix(find_free_suffix(
            &title,
            self.documents.values().map(ServerDocSession::document),
            None,
        ));
        let session = ServerDocSession::created_by(
            document,
            Text::authored(content, Some(owner)),
            owner,
        )?;
        self.documents.insert(doc_ref, session);
        info!(%doc_ref, %title, "document created");
        self.events.push_back(SessionEvent::DocumentCreated(doc_ref));

        let announce = Packet::new("document_create")
            .arg(owner.to_hex())
            .arg(id.to_string())
            .arg(title.as_str())
            .arg(encoding.as_str());
        Ok(self.broadcast_except(from, &announce))
    }

    /// Creates a document at the server site itself (server-owned when
    /// `owner` is `None`, the host's user otherwise).
    fn create_local_document(
        &mut self,
        owner: Option<UserId>,
        title: &str,
        encoding: &str,
        content: &str,
    ) -> SessionResult<Vec<Outbound>> {
        self.doc_counter += 1;
        let owner_id = owner.unwrap_or(SERVER_OWNER);
        let doc_ref = DocRef::new(owner_id, DocumentId::new(self.doc_counter));
        if self.documents.contains_key(&doc_ref) {
            return Err(SessionError::Logic(format!(
                "duplicate local document: {doc_ref}"
            )));
        }
        let mut document = Document::new(doc_ref, title, encoding);
        document.set_suffix(find_free_suffix(
            title,
            self.documents.values().map(ServerDocSession::document),
            None,
        ));
        let mut session = ServerDocSession::new(document, Text::authored(content, owner));
        if let Some(local) = owner {
            session.subscribe_local(local)?;
        }
        self.documents.insert(doc_ref, session);
        self.events.push_back(SessionEvent::DocumentCreated(doc_ref));

        let announce = Packet::new("document_create")
            .arg(owner_id.to_hex())
            .arg(doc_ref.id.to_string())
            .arg(title)
            .arg(encoding);
        Ok(self.broadcast(&announce))
    }

    fn handle_document_remove(
        &mut self,
        from: UserId,
        packet: &Packet,
    ) -> SessionResult<Vec<Outbound>> {
        let doc_ref = packet.param_doc_ref(0)?;
        self.require_document(doc_ref)?;
        if doc_ref.owner != from {
            return Err(SessionError::BadValue(format!(
                "user {from} does not own {doc_ref}"
            )));
        }
        Ok(self.remove_document(doc_ref))
    }

    fn remove_document(&mut self, doc_ref: DocRef) -> Vec<Outbound> {
        self.documents.remove(&doc_ref);
        info!(%doc_ref, "document removed");
        self.events.push_back(SessionEvent::DocumentRemoved(doc_ref));
        let announce = Packet::new("document_remove").arg(doc_ref.to_wire());
        self.broadcast(&announce)
    }

    fn handle_document(&mut self, from: UserId, packet: &Packet) -> SessionResult<Vec<Outbound>> {
        let doc_ref = packet.param_doc_ref(0)?;
        self.require_document(doc_ref)?;
        let inner = packet.param(1)?.to_string();

        match inner.as_str() {
            "record" => {
                let author = packet.param_user_ref(2)?;
                if author != from {
                    return Err(SessionError::BadValue(format!(
                        "record author {author} is not the sender {from}"
                    )));
                }
                let mut index = 3;
                let record = Record::parse_params(packet.params(), &mut index)?;
                if index != packet.param_count() {
                    return Err(SessionError::BadValue(
                        "trailing record parameters".to_string(),
                    ));
                }
                let routed = self
                    .documents
                    .get_mut(&doc_ref)
                    .expect("checked")
                    .remote_record(from, &record)?;
                self.events.push_back(SessionEvent::TextChanged(doc_ref));
                Ok(self.route_to_conns(routed))
            }
            "subscribe" => {
                let user = packet.param_user_ref(2)?;
                if user != from {
                    return Err(SessionError::BadValue(format!(
                        "subscribe for {user} requested by {from}"
                    )));
                }
                let session = self.documents.get_mut(&doc_ref).expect("checked");
                let sync = session.subscribe(user)?;
                let queued = session.finish_sync(user);
                let conn = self
                    .conn_of(user)
                    .ok_or_else(|| SessionError::Logic(format!("no connection for {user}")))?;
                let mut outs: Vec<Outbound> = sync
                    .into_iter()
                    .chain(queued)
                    .map(|p| Outbound::Send(conn, p))
                    .collect();
                let announce = doc_packet(doc_ref, "subscribe").arg(user.to_hex());
                outs.extend(self.broadcast_except(user, &announce));
                self.events
                    .push_back(SessionEvent::Subscribed(doc_ref, user));
                Ok(outs)
            }
            "unsubscribe" => {
                let user = packet.param_user_ref(2)?;
                if user != from {
                    return Err(SessionError::BadValue(format!(
                        "unsubscribe for {user} requested by {from}"
                    )));
                }
                self.documents
                    .get_mut(&doc_ref)
                    .expect("checked")
                    .unsubscribe(user)?;
                self.events
                    .push_back(SessionEvent::Unsubscribed(doc_ref, user));
                let announce = doc_packet(doc_ref, "unsubscribe").arg(user.to_hex());
                Ok(self.broadcast(&announce))
            }
            "rename" => {
                let title = packet.param(2)?.to_string();
                Ok(self.rename_document(doc_ref, &title))
            }
            other => Err(SessionError::UnexpectedCommand(format!(
                "document {other}"
            ))),
        }
    }

    fn rename_document(&mut self, doc_ref: DocRef, title: &str) -> Vec<Outbound> {
        let suffix = find_free_suffix(
            title,
            self.documents.values().map(ServerDocSession::document),
            Some(doc_ref),
        );
        let document = self
            .documents
            .get_mut(&doc_ref)
            .expect("caller checked")
            .document_mut();
        document.set_title(title);
        document.set_suffix(suffix);
        self.events.push_back(SessionEvent::DocumentRenamed(doc_ref));
        let announce = doc_packet(doc_ref, "rename").arg(title);
        self.broadcast(&announce)
    }

    /// A host-site edit: applied to the authoritative copy and fanned
    /// out to all subscribed clients.
    fn local_edit(&mut self, doc_ref: DocRef, op: &Operation) -> SessionResult<Vec<Outbound>> {
        let author = self.local_user;
        let session = self
            .documents
            .get_mut(&doc_ref)
            .ok_or_else(|| SessionError::BadValue(format!("unknown document: {doc_ref}")))?;
        let routed = session.local_edit(op, author)?;
        self.events.push_back(SessionEvent::TextChanged(doc_ref));
        Ok(self.route_to_conns(routed))
    }

    fn subscribe_local(&mut self, doc_ref: DocRef) -> SessionResult<Vec<Outbound>> {
        let user = self
            .local_user
            .ok_or_else(|| SessionError::Logic("no local user".to_string()))?;
        self.require_document(doc_ref)?;
        self.documents
            .get_mut(&doc_ref)
            .expect("checked")
            .subscribe_local(user)?;
        self.events.push_back(SessionEvent::Subscribed(doc_ref, user));
        let announce = doc_packet(doc_ref, "subscribe").arg(user.to_hex());
        Ok(self.broadcast(&announce))
    }

    fn unsubscribe_local(&mut self, doc_ref: DocRef) -> SessionResult<Vec<Outbound>> {
        let user = self
            .local_user
            .ok_or_else(|| SessionError::Logic("no local user".to_string()))?;
        self.require_document(doc_ref)?;
        self.documents
            .get_mut(&doc_ref)
            .expect("checked")
            .unsubscribe(user)?;
        self.events
            .push_back(SessionEvent::Unsubscribed(doc_ref, user));
        let announce = doc_packet(doc_ref, "unsubscribe").arg(user.to_hex());
        Ok(self.broadcast(&announce))
    }

    // ── Chat, colour, password, commands ─────────────────────────

    fn handle_message(&mut self, from: UserId, packet: &Packet) -> SessionResult<Vec<Outbound>> {
        let text = packet.param(0)?.to_string();
        self.push_chat(ChatMessage::User {
            from,
            text: text.clone(),
        });
        let announce = Packet::new("message").arg(from.to_hex()).arg(text.as_str());
        Ok(self.broadcast(&announce))
    }

    fn handle_emote(&mut self, from: UserId, packet: &Packet) -> SessionResult<Vec<Outbound>> {
        let text = packet.param(0)?.to_string();
        self.push_chat(ChatMessage::Emote {
            from,
            text: text.clone(),
        });
        let announce = Packet::new("emote_message")
            .arg(from.to_hex())
            .arg(text.as_str());
        Ok(self.broadcast(&announce))
    }

    fn send_chat_local(&mut self, text: &str) -> Vec<Outbound> {
        let message = match self.local_user {
            Some(from) => ChatMessage::User {
                from,
                text: text.to_string(),
            },
            None => ChatMessage::Server {
                text: text.to_string(),
            },
        };
        self.push_chat(message);
        let from = self.local_user.unwrap_or(SERVER_OWNER);
        let announce = Packet::new("message").arg(from.to_hex()).arg(text);
        self.broadcast(&announce)
    }

    fn push_chat(&mut self, message: ChatMessage) {
        self.chat.add(message.clone());
        self.events.push_back(SessionEvent::Chat(message));
    }

    fn handle_user_colour(
        &mut self,
        conn: ConnId,
        from: UserId,
        packet: &Packet,
    ) -> SessionResult<Vec<Outbound>> {
        let colour = packet.param_colour(0)?;
        if self.users.colour_in_use(colour, Some(from)) {
            return Ok(vec![Outbound::Send(
                conn,
                Packet::new("user_colour_failed"),
            )]);
        }
        self.users
            .get_mut(from)
            .ok_or_else(|| SessionError::Logic(format!("connection user {from} missing")))?
            .set_colour(colour);
        self.events.push_back(SessionEvent::ColourChanged(from));
        let announce = Packet::new("user_colour")
            .arg(from.to_hex())
            .arg(colour.to_wire());
        Ok(self.broadcast(&announce))
    }

    /// Stores the user's session password. The payload arrives as the
    /// transport delivered it; deployments that RSA-encrypt it decrypt
    /// at the transport seam before dispatch.
    fn handle_user_password(
        &mut self,
        from: UserId,
        packet: &Packet,
    ) -> SessionResult<Vec<Outbound>> {
        let password = packet.param(0)?.to_string();
        self.users
            .get_mut(from)
            .ok_or_else(|| SessionError::Logic(format!("connection user {from} missing")))?
            .set_password(Some(password));
        debug!(%from, "user password updated");
        Ok(Vec::new())
    }

    fn handle_command_query(
        &mut self,
        conn: ConnId,
        from: UserId,
        packet: &Packet,
    ) -> SessionResult<Vec<Outbound>> {
        let command = packet.param(0)?.to_string();
        let args: Vec<String> = packet.params()[1..].to_vec();

        let result = |kind: &str, reply: &str| {
            Outbound::Send(
                conn,
                Packet::new("command_result")
                    .arg(command.as_str())
                    .arg(kind)
                    .arg(reply),
            )
        };

        match command.as_str() {
            "help" => Ok(vec![result(RESULT_OK, &self.commands.help_text())]),
            "emote" => {
                let text = args.join(" ");
                self.push_chat(ChatMessage::Emote {
                    from,
                    text: text.clone(),
                });
                let announce = Packet::new("emote_message")
                    .arg(from.to_hex())
                    .arg(text.as_str());
                let mut outs = self.broadcast(&announce);
                outs.push(result(RESULT_OK, ""));
                Ok(outs)
            }
            _ => Ok(vec![result(RESULT_UNKNOWN, "")]),
        }
    }
}

// ── Client state ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct LoginRequest {
    name: String,
    colour: Colour,
    global_password: Option<String>,
    user_password: Option<String>,
}

/// Mirrored session state (client role).
#[derive(Debug)]
pub struct ClientState {
    users: UserTable,
    chat: Chat,
    documents: BTreeMap<DocRef, ClientDocSession>,
    doc_counter: u32,
    self_user: Option<UserId>,
    token: Option<String>,
    server_key: Option<(String, String)>,
    pending_login: Option<LoginRequest>,
    logged_in: bool,
    /// Transport peer id → user, learned from `join` broadcasts.
    net_users: BTreeMap<u64, UserId>,
    events: VecDeque<SessionEvent>,
}

impl ClientState {
    fn new() -> Self {
        Self {
            users: UserTable::new(),
            chat: Chat::new(),
            documents: BTreeMap::new(),
            doc_counter: 0,
            self_user: None,
            token: None,
            server_key: None,
            pending_login: None,
            logged_in: false,
            net_users: BTreeMap::new(),
            events: VecDeque::new(),
        }
    }

    fn require_self(&self) -> SessionResult<UserId> {
        self.self_user
            .filter(|_| self.logged_in)
            .ok_or_else(|| SessionError::Logic("not logged in".to_string()))
    }

    fn session_mut(&mut self, doc_ref: DocRef) -> SessionResult<&mut ClientDocSession> {
        self.documents
            .get_mut(&doc_ref)
            .ok_or_else(|| SessionError::BadValue(format!("unknown document: {doc_ref}")))
    }

    fn send(packet: Packet) -> Vec<Outbound> {
        vec![Outbound::Send(CLIENT_CONN, packet)]
    }

    // ── Local user actions ───────────────────────────────────────

    fn login(
        &mut self,
        name: &str,
        colour: Colour,
        global_password: Option<String>,
        user_password: Option<String>,
    ) -> SessionResult<Vec<Outbound>> {
        if self.logged_in {
            return Err(SessionError::Logic("already logged in".to_string()));
        }
        let request = LoginRequest {
            name: name.to_string(),
            colour,
            global_password,
            user_password,
        };
        let outs = match &self.token {
            Some(token) => Self::send(Self::login_packet(&request, token)),
            // The welcome packet has not arrived yet; sent on arrival.
            None => Vec::new(),
        };
        self.pending_login = Some(request);
        Ok(outs)
    }

    fn login_packet(request: &LoginRequest, token: &str) -> Packet {
        let hash = |password: &Option<String>| {
            password
                .as_deref()
                .map(|p| token_hash(token, p))
                .unwrap_or_default()
        };
        Packet::new("login")
            .arg(request.name.as_str())
            .arg(request.colour.to_wire())
            .arg(hash(&request.global_password))
            .arg(hash(&request.user_password))
    }

    fn create_document(
        &mut self,
        title: &str,
        encoding: &str,
        content: &str,
    ) -> SessionResult<Vec<Outbound>> {
        let self_user = self.require_self()?;
        self.doc_counter += 1;
        let doc_ref = DocRef::new(self_user, DocumentId::new(self.doc_counter));

        let mut document = Document::new(doc_ref, title, encoding);
        document.set_suffix(find_free_suffix(
            title,
            self.documents.values().map(ClientDocSession::document),
            None,
        ));
        // Optimistic: installed locally before the server confirms.
        let session = ClientDocSession::created(
            document,
            self_user,
            Text::authored(content, Some(self_user)),
        );
        self.documents.insert(doc_ref, session);
        self.events.push_back(SessionEvent::DocumentCreated(doc_ref));

        let request = Packet::new("document_create")
            .arg(self_user.to_hex())
            .arg(doc_ref.id.to_string())
            .arg(title)
            .arg(encoding)
            .arg(content);
        Ok(Self::send(request))
    }

    fn remove_document(&mut self, doc_ref: DocRef) -> SessionResult<Vec<Outbound>> {
        self.require_self()?;
        if !self.documents.contains_key(&doc_ref) {
            return Err(SessionError::BadValue(format!(
                "unknown document: {doc_ref}"
            )));
        }
        // The server's broadcast performs the local removal.
        Ok(Self::send(
            Packet::new("document_remove").arg(doc_ref.to_wire()),
        ))
    }

    fn subscribe(&mut self, doc_ref: DocRef) -> SessionResult<Vec<Outbound>> {
        let self_user = self.require_self()?;
        let packet = self.session_mut(doc_ref)?.request_subscribe(self_user)?;
        Ok(Self::send(packet))
    }

    fn unsubscribe(&mut self, doc_ref: DocRef) -> SessionResult<Vec<Outbound>> {
        let self_user = self.require_self()?;
        let packet = self.session_mut(doc_ref)?.request_unsubscribe(self_user)?;
        Ok(Self::send(packet))
    }

    fn local_edit(&mut self, doc_ref: DocRef, op: &Operation) -> SessionResult<Vec<Outbound>> {
        let self_user = self.require_self()?;
        let packet = self.session_mut(doc_ref)?.local_edit(op, self_user)?;
        self.events.push_back(SessionEvent::TextChanged(doc_ref));
        Ok(Self::send(packet))
    }

    fn rename_document(&mut self, doc_ref: DocRef, title: &str) -> SessionResult<Vec<Outbound>> {
        self.require_self()?;
        if !self.documents.contains_key(&doc_ref) {
            return Err(SessionError::BadValue(format!(
                "unknown document: {doc_ref}"
            )));
        }
        Ok(Self::send(doc_packet(doc_ref, "rename").arg(title)))
    }

    fn send_chat(&mut self, text: &str) -> SessionResult<Vec<Outbound>> {
        self.require_self()?;
        Ok(Self::send(Packet::new("message").arg(text)))
    }

    fn set_colour(&mut self, colour: Colour) -> SessionResult<Vec<Outbound>> {
        self.require_self()?;
        Ok(Self::send(
            Packet::new("user_colour").arg(colour.to_wire()),
        ))
    }

    fn set_password(&mut self, payload: &str) -> SessionResult<Vec<Outbound>> {
        self.require_self()?;
        Ok(Self::send(Packet::new("user_password").arg(payload)))
    }

    fn query_command(&mut self, command: &str, args: &[String]) -> SessionResult<Vec<Outbound>> {
        self.require_self()?;
        let mut packet = Packet::new("command_query").arg(command);
        for arg in args {
            packet.push(arg.as_str());
        }
        Ok(Self::send(packet))
    }

    // ── Packet dispatch ──────────────────────────────────────────

    fn handle_packet(&mut self, packet: &Packet) -> SessionResult<Vec<Outbound>> {
        debug!(command = packet.command(), "dispatching");
        match packet.command() {
            "welcome" => self.handle_welcome(packet),
            "login_failed" => {
                let code = packet.param_u32(0)?;
                let error = LoginError::from_code(code).ok_or_else(|| {
                    SessionError::BadValue(format!("unknown login failure code {code}"))
                })?;
                self.pending_login = None;
                self.events.push_back(SessionEvent::LoginFailed(error));
                Ok(Vec::new())
            }
            "join" => self.handle_join(packet),
            "part" => self.handle_part(packet),
            "sync_init" => {
                packet.param_u32(0)?;
                Ok(Vec::new())
            }
            "sync_usertable_user" => {
                let id = packet.param_user_ref(0)?;
                let name = packet.param(1)?;
                let colour = packet.param_colour(2)?;
                self.users.install(id, name, colour, false);
                Ok(Vec::new())
            }
            "sync_doclist_document" => self.handle_doclist_document(packet),
            "sync_final" => {
                self.events.push_back(SessionEvent::SyncComplete);
                Ok(Vec::new())
            }
            "document_create" => self.handle_document_create(packet),
            "document_remove" => {
                let doc_ref = packet.param_doc_ref(0)?;
                if self.documents.remove(&doc_ref).is_none() {
                    return Err(SessionError::BadValue(format!(
                        "removal of unknown document {doc_ref}"
                    )));
                }
                self.events.push_back(SessionEvent::DocumentRemoved(doc_ref));
                Ok(Vec::new())
            }
            "message" => {
                let from = packet.param_user_ref(0)?;
                let text = packet.param(1)?.to_string();
                let message = match author_param(from) {
                    Some(from) => ChatMessage::User { from, text },
                    None => ChatMessage::Server { text },
                };
                self.chat.add(message.clone());
                self.events.push_back(SessionEvent::Chat(message));
                Ok(Vec::new())
            }
            "emote_message" => {
                let from = packet.param_user_ref(0)?;
                let text = packet.param(1)?.to_string();
                let message = ChatMessage::Emote { from, text };
                self.chat.add(message.clone());
                self.events.push_back(SessionEvent::Chat(message));
                Ok(Vec::new())
            }
            "user_colour" => {
                let user = packet.param_user_ref(0)?;
                let colour = packet.param_colour(1)?;
                self.users
                    .get_mut(user)
                    .ok_or_else(|| SessionError::BadValue(format!("unknown user: {user}")))?
                    .set_colour(colour);
                self.events.push_back(SessionEvent::ColourChanged(user));
                Ok(Vec::new())
            }
            "user_colour_failed" => {
                self.events.push_back(SessionEvent::ColourFailed);
                Ok(Vec::new())
            }
            "command_result" => {
                self.events.push_back(SessionEvent::CommandResult {
                    command: packet.param(0)?.to_string(),
                    kind: packet.param(1)?.to_string(),
                    reply: packet.param(2)?.to_string(),
                });
                Ok(Vec::new())
            }
            "document" => self.handle_document(packet),
            "ping" => Ok(Self::send(Packet::new("pong"))),
            other => Err(SessionError::UnexpectedCommand(other.to_string())),
        }
    }

    fn handle_welcome(&mut self, packet: &Packet) -> SessionResult<Vec<Outbound>> {
        let version = packet.param_u32(0)?;
        if version != PROTOCOL_VERSION {
            self.events
                .push_back(SessionEvent::LoginFailed(LoginError::ProtocolVersionMismatch));
            return Err(SessionError::Login(LoginError::ProtocolVersionMismatch));
        }
        let token = packet.param(1)?.to_string();
        let key_n = packet.param(2)?.to_string();
        let key_k = packet.param(3)?.to_string();
        if !key_n.is_empty() {
            self.server_key = Some((key_n, key_k));
        }
        let outs = match &self.pending_login {
            Some(request) => Self::send(Self::login_packet(request, &token)),
            None => Vec::new(),
        };
        self.token = Some(token);
        Ok(outs)
    }

    fn handle_join(&mut self, packet: &Packet) -> SessionResult<Vec<Outbound>> {
        let net_id = packet.param_u32(0)? as u64;
        let name = packet.param(1)?.to_string();
        let user_id = packet.param_user_ref(2)?;
        let colour = packet.param_colour(3)?;

        self.users.install(user_id, &name, colour, true);
        self.net_users.insert(net_id, user_id);

        let is_self = !self.logged_in
            && self
                .pending_login
                .as_ref()
                .is_some_and(|r| r.name.eq_ignore_ascii_case(&name));
        if is_self {
            self.self_user = Some(user_id);
            self.logged_in = true;
            self.pending_login = None;
            info!(%user_id, "logged in");
            self.events.push_back(SessionEvent::LoggedIn(user_id));
        } else {
            self.events.push_back(SessionEvent::UserJoined(user_id));
        }
        Ok(Vec::new())
    }

    fn handle_part(&mut self, packet: &Packet) -> SessionResult<Vec<Outbound>> {
        let net_id = packet.param_u32(0)? as u64;
        let user = self.net_users.remove(&net_id).ok_or_else(|| {
            SessionError::BadValue(format!("part for unknown peer {net_id}"))
        })?;
        self.users.disconnect(user)?;
        self.events.push_back(SessionEvent::UserParted(user));
        Ok(Vec::new())
    }

    fn handle_doclist_document(&mut self, packet: &Packet) -> SessionResult<Vec<Outbound>> {
        let doc_ref = packet.param_doc_ref(0)?;
        let title = packet.param(1)?;
        let suffix = packet.param_u32(2)?;
        let encoding = packet.param(3)?;

        let mut document = Document::new(doc_ref, title, encoding);
        document.set_suffix(suffix);
        for index in 4..packet.param_count() {
            document.subscribe(packet.param_user_ref(index)?);
        }
        self.documents
            .insert(doc_ref, ClientDocSession::new(document));
        Ok(Vec::new())
    }

    fn handle_document_create(&mut self, packet: &Packet) -> SessionResult<Vec<Outbound>> {
        let owner = packet.param_user_ref(0)?;
        let id = packet.param_u32(1)?;
        let doc_ref = DocRef::new(owner, DocumentId::new(id));
        let title = packet.param(2)?.to_string();
        let encoding = packet.param(3)?;

        if self.documents.contains_key(&doc_ref) {
            return Err(SessionError::BadValue(format!(
                "duplicate document: {doc_ref}"
            )));
        }
        let mut document = Document::new(doc_ref, title.as_str(), encoding);
        document.set_suffix(find_free_suffix(
            &title,
            self.documents.values().map(ClientDocSession::document),
            None,
        ));
        if let Some(owner) = author_param(owner) {
            document.subscribe(owner);
        }
        self.documents
            .insert(doc_ref, ClientDocSession::new(document));
        self.events.push_back(SessionEvent::DocumentCreated(doc_ref));
        Ok(Vec::new())
    }

    fn handle_document(&mut self, packet: &Packet) -> SessionResult<Vec<Outbound>> {
        let doc_ref = packet.param_doc_ref(0)?;
        let inner = packet.param(1)?.to_string();
        let self_user = self.self_user;
        let session = self.session_mut(doc_ref)?;

        match inner.as_str() {
            "record" => {
                let author = author_param(packet.param_user_ref(2)?);
                let mut index = 3;
                let record = Record::parse_params(packet.params(), &mut index)?;
                if index != packet.param_count() {
                    return Err(SessionError::BadValue(
                        "trailing record parameters".to_string(),
                    ));
                }
                session.handle_record(author, &record)?;
                self.events.push_back(SessionEvent::TextChanged(doc_ref));
            }
            "sync_init" => {
                let size = packet.param_u32(2)? as usize;
                session.handle_sync_init(size)?;
            }
            "sync_chunk" => {
                let text = packet.param(2)?.to_string();
                let author = author_param(packet.param_user_ref(3)?);
                session.handle_sync_chunk(&text, author)?;
            }
            "sync_final" => {
                let self_user = self_user
                    .ok_or_else(|| SessionError::Logic("sync_final before login".to_string()))?;
                session.handle_sync_final(self_user)?;
                self.events
                    .push_back(SessionEvent::Subscribed(doc_ref, self_user));
            }
            "subscribe" => {
                let user = packet.param_user_ref(2)?;
                session.handle_subscribe(user);
                self.events.push_back(SessionEvent::Subscribed(doc_ref, user));
            }
            "unsubscribe" => {
                let user = packet.param_user_ref(2)?;
                session.handle_unsubscribe(user, self_user);
                self.events
                    .push_back(SessionEvent::Unsubscribed(doc_ref, user));
            }
            "rename" => {
                let title = packet.param(2)?.to_string();
                session.handle_rename(&title);
                let suffix = find_free_suffix(
                    &title,
                    self.documents.values().map(ClientDocSession::document),
                    Some(doc_ref),
                );
                self.documents
                    .get_mut(&doc_ref)
                    .expect("checked")
                    .document_mut()
                    .set_suffix(suffix);
                self.events.push_back(SessionEvent::DocumentRenamed(doc_ref));
            }
            other => {
                return Err(SessionError::UnexpectedCommand(format!(
                    "document {other}"
                )))
            }
        }
        Ok(Vec::new())
    }
}

// ── The buffer ───────────────────────────────────────────────────

/// The session role a buffer plays.
#[derive(Debug)]
pub enum Role {
    /// Mirrors a remote server's session.
    Client(ClientState),
    /// Hosts the authoritative session, with no local participant.
    Server(ServerState),
    /// Hosts the authoritative session and participates locally.
    Host(ServerState),
}

/// The session controller; see the module docs.
#[derive(Debug)]
pub struct Buffer {
    role: Role,
}

impl Buffer {
    /// Creates a client buffer.
    #[must_use]
    pub fn client() -> Self {
        Self {
            role: Role::Client(ClientState::new()),
        }
    }

    /// Creates a dedicated-server buffer.
    #[must_use]
    pub fn server(config: ServerConfig) -> Self {
        Self {
            role: Role::Server(ServerState::new(config)),
        }
    }

    /// Creates a host buffer: a server with a local participant.
    #[must_use]
    pub fn host(config: ServerConfig, name: &str, colour: Colour) -> Self {
        let mut state = ServerState::new(config);
        let user = state.users.connect(name, colour);
        state.local_user = Some(user);
        Self {
            role: Role::Host(state),
        }
    }

    fn server_state(&mut self) -> SessionResult<&mut ServerState> {
        match &mut self.role {
            Role::Server(state) | Role::Host(state) => Ok(state),
            Role::Client(_) => Err(SessionError::Logic(
                "server operation on a client buffer".to_string(),
            )),
        }
    }

    fn client_state(&mut self) -> SessionResult<&mut ClientState> {
        match &mut self.role {
            Role::Client(state) => Ok(state),
            _ => Err(SessionError::Logic(
                "client operation on a server buffer".to_string(),
            )),
        }
    }

    // ── Introspection ────────────────────────────────────────────

    /// The user table for this site.
    #[must_use]
    pub fn users(&self) -> &UserTable {
        match &self.role {
            Role::Client(state) => &state.users,
            Role::Server(state) | Role::Host(state) => &state.users,
        }
    }

    /// The chat log for this site.
    #[must_use]
    pub fn chat(&self) -> &Chat {
        match &self.role {
            Role::Client(state) => &state.chat,
            Role::Server(state) | Role::Host(state) => &state.chat,
        }
    }

    /// Pulls the next queued session event.
    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        match &mut self.role {
            Role::Client(state) => state.events.pop_front(),
            Role::Server(state) | Role::Host(state) => state.events.pop_front(),
        }
    }

    /// The local participant, if any.
    #[must_use]
    pub fn self_user(&self) -> Option<UserId> {
        match &self.role {
            Role::Client(state) => state.self_user,
            Role::Server(state) | Role::Host(state) => state.local_user,
        }
    }

    /// Whether edits are currently possible from this site.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        match &self.role {
            Role::Client(state) => state.logged_in,
            Role::Server(_) | Role::Host(_) => true,
        }
    }

    /// All known document references, in order.
    #[must_use]
    pub fn document_refs(&self) -> Vec<DocRef> {
        match &self.role {
            Role::Client(state) => state.documents.keys().copied().collect(),
            Role::Server(state) | Role::Host(state) => state.documents.keys().copied().collect(),
        }
    }

    /// A document's metadata, if known.
    #[must_use]
    pub fn document(&self, doc_ref: DocRef) -> Option<&Document> {
        match &self.role {
            Role::Client(state) => state.documents.get(&doc_ref).map(ClientDocSession::document),
            Role::Server(state) | Role::Host(state) => {
                state.documents.get(&doc_ref).map(ServerDocSession::document)
            }
        }
    }

    /// A document's content, where this site can assign it: always on
    /// the server/host, only while subscribed on a client.
    #[must_use]
    pub fn document_text(&self, doc_ref: DocRef) -> Option<&Text> {
        match &self.role {
            Role::Client(state) => state.documents.get(&doc_ref).and_then(ClientDocSession::text),
            Role::Server(state) | Role::Host(state) => {
                state.documents.get(&doc_ref).map(ServerDocSession::text)
            }
        }
    }

    /// The client-side subscription state of a document.
    #[must_use]
    pub fn subscription_state(&self, doc_ref: DocRef) -> Option<SubscriptionState> {
        match &self.role {
            Role::Client(state) => state.documents.get(&doc_ref).map(ClientDocSession::state),
            Role::Server(_) | Role::Host(_) => None,
        }
    }

    // ── Transport-driven entry points ────────────────────────────

    /// A new transport connection (server/host roles): greets it with
    /// `welcome`.
    pub fn accept_connection(&mut self, conn: ConnId) -> SessionResult<Vec<Outbound>> {
        Ok(self.server_state()?.accept_connection(conn))
    }

    /// A transport connection went away. On a server this tears down
    /// the user's pairs and broadcasts their departure; on a client it
    /// blocks further edits while keeping the last-known state visible.
    pub fn connection_lost(&mut self, conn: ConnId) -> Vec<Outbound> {
        match &mut self.role {
            Role::Server(state) | Role::Host(state) => state.connection_lost(conn),
            Role::Client(state) => {
                state.logged_in = false;
                state.token = None;
                Vec::new()
            }
        }
    }

    /// Dispatches one received packet. An error means the connection
    /// it arrived on must be dropped; other connections are unaffected.
    pub fn handle_packet(&mut self, conn: ConnId, packet: &Packet) -> SessionResult<Vec<Outbound>> {
        match &mut self.role {
            Role::Client(state) => state.handle_packet(packet),
            Role::Server(state) | Role::Host(state) => state.handle_packet(conn, packet),
        }
    }

    // ── Local user actions ───────────────────────────────────────

    /// Requests a login (client role). If the server's `welcome` has
    /// not arrived yet the request is sent as soon as it does.
    pub fn login(
        &mut self,
        name: &str,
        colour: Colour,
        global_password: Option<String>,
        user_password: Option<String>,
    ) -> SessionResult<Vec<Outbound>> {
        self.client_state()?
            .login(name, colour, global_password, user_password)
    }

    /// Creates a document. Clients allocate an id in their own
    /// namespace and install optimistically; servers and hosts create
    /// authoritatively and broadcast.
    pub fn create_document(
        &mut self,
        title: &str,
        encoding: &str,
        content: &str,
    ) -> SessionResult<Vec<Outbound>> {
        match &mut self.role {
            Role::Client(state) => state.create_document(title, encoding, content),
            Role::Server(state) => state.create_local_document(None, title, encoding, content),
            Role::Host(state) => {
                let owner = state.local_user;
                state.create_local_document(owner, title, encoding, content)
            }
        }
    }

    /// Removes a document.
    pub fn remove_document(&mut self, doc_ref: DocRef) -> SessionResult<Vec<Outbound>> {
        match &mut self.role {
            Role::Client(state) => state.remove_document(doc_ref),
            Role::Server(state) | Role::Host(state) => {
                state.require_document(doc_ref)?;
                Ok(state.remove_document(doc_ref))
            }
        }
    }

    /// Subscribes the local user to a document.
    pub fn subscribe(&mut self, doc_ref: DocRef) -> SessionResult<Vec<Outbound>> {
        match &mut self.role {
            Role::Client(state) => state.subscribe(doc_ref),
            Role::Server(_) => Err(SessionError::Logic("no local user".to_string())),
            Role::Host(state) => state.subscribe_local(doc_ref),
        }
    }

    /// Unsubscribes the local user from a document.
    pub fn unsubscribe(&mut self, doc_ref: DocRef) -> SessionResult<Vec<Outbound>> {
        match &mut self.role {
            Role::Client(state) => state.unsubscribe(doc_ref),
            Role::Server(_) => Err(SessionError::Logic("no local user".to_string())),
            Role::Host(state) => state.unsubscribe_local(doc_ref),
        }
    }

    /// Applies a local edit to a document.
    pub fn local_edit(&mut self, doc_ref: DocRef, op: &Operation) -> SessionResult<Vec<Outbound>> {
        match &mut self.role {
            Role::Client(state) => state.local_edit(doc_ref, op),
            Role::Server(state) | Role::Host(state) => state.local_edit(doc_ref, op),
        }
    }

    /// Renames a document: a request on clients, authoritative on the
    /// server and host.
    pub fn rename_document(&mut self, doc_ref: DocRef, title: &str) -> SessionResult<Vec<Outbound>> {
        match &mut self.role {
            Role::Client(state) => state.rename_document(doc_ref, title),
            Role::Server(state) | Role::Host(state) => {
                state.require_document(doc_ref)?;
                Ok(state.rename_document(doc_ref, title))
            }
        }
    }

    /// Sends a chat message.
    pub fn send_chat(&mut self, text: &str) -> SessionResult<Vec<Outbound>> {
        match &mut self.role {
            Role::Client(state) => state.send_chat(text),
            Role::Server(state) | Role::Host(state) => Ok(state.send_chat_local(text)),
        }
    }

    /// Requests a colour change (client role).
    pub fn set_colour(&mut self, colour: Colour) -> SessionResult<Vec<Outbound>> {
        self.client_state()?.set_colour(colour)
    }

    /// Sends a session password change. The payload is opaque to this
    /// layer; see the server-side note on `user_password`.
    pub fn set_password(&mut self, payload: &str) -> SessionResult<Vec<Outbound>> {
        self.client_state()?.set_password(payload)
    }

    /// Sends a server command query (client role).
    pub fn query_command(&mut self, command: &str, args: &[String]) -> SessionResult<Vec<Outbound>> {
        self.client_state()?.query_command(command, args)
    }

    // ── Session persistence (server/host roles) ──────────────────

    /// Snapshots the session for saving: users, chat and every
    /// document with its authored content.
    pub fn to_archive(&self) -> SessionResult<SessionArchive> {
        let state = match &self.role {
            Role::Server(state) | Role::Host(state) => state,
            Role::Client(_) => {
                return Err(SessionError::Logic(
                    "archive of a client buffer".to_string(),
                ))
            }
        };
        Ok(SessionArchive {
            users: state
                .users
                .iter()
                .map(|u| ArchivedUser {
                    id: u.id(),
                    name: u.name().to_string(),
                    colour: u.colour(),
                })
                .collect(),
            chat: state.chat.iter().cloned().collect(),
            documents: state
                .documents
                .values()
                .map(|s| ArchivedDocument {
                    doc_ref: s.document().doc_ref(),
                    title: s.document().title().to_string(),
                    encoding: s.document().encoding().to_string(),
                    text: s.text().clone(),
                })
                .collect(),
        })
    }

    /// Builds a server buffer from a saved session. The archived users
    /// come back offline, keeping their ids so stored authorship stays
    /// attributed; documents come back with no subscribers.
    #[must_use]
    pub fn server_from_archive(config: ServerConfig, archive: &SessionArchive) -> Self {
        let mut state = ServerState::new(config);
        for user in &archive.users {
            state.users.install(user.id, &user.name, user.colour, false);
        }
        for message in &archive.chat {
            state.chat.add(message.clone());
        }
        for doc in &archive.documents {
            let mut document = Document::new(doc.doc_ref, doc.title.as_str(), doc.encoding.as_str());
            document.set_suffix(find_free_suffix(
                &doc.title,
                state.documents.values().map(ServerDocSession::document),
                None,
            ));
            state.doc_counter = state.doc_counter.max(doc.doc_ref.id.get());
            state
                .documents
                .insert(doc.doc_ref, ServerDocSession::new(document, doc.text.clone()));
        }
        Self {
            role: Role::Server(state),
        }
    }
}
