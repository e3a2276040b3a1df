//! Session layer for cowrite.
//!
//! Everything above the transformation core: the wire packet format
//! and framing, the user table, the document collection with its
//! subscription state machines, the three-role session controller
//! ([`Buffer`]), chat, server commands, the persisted session format,
//! and the endpoint event loops.
//!
//! The controller is I/O-free: the [`net`] loops (or any embedder)
//! feed it packets and carry out the [`Outbound`] actions it returns.

mod archive;
mod buffer;
mod chat;
mod codec;
mod command;
mod doc_session;
mod document;
mod error;
mod packet;
mod transport;
mod user;
mod user_table;

pub mod net;

pub use archive::{
    ArchivedDocument, ArchivedUser, SessionArchive, ARCHIVE_HEADER, ARCHIVE_VERSION,
};
pub use buffer::{
    token_hash, Buffer, ClientState, ConnId, Outbound, Role, ServerConfig, ServerState,
    SessionEvent, CLIENT_CONN,
};
pub use chat::{Chat, ChatMessage};
pub use command::{CommandMap, RESULT_OK, RESULT_UNKNOWN};
pub use doc_session::{
    doc_packet, record_packet, ClientDocSession, ServerDocSession, SubscriptionState,
};
pub use document::{find_free_suffix, Document};
pub use error::{ArchiveError, LoginError, SessionError, SessionResult};
pub use packet::{Packet, PROTOCOL_VERSION};
pub use transport::{PacketTransport, TcpPacketTransport};
pub use user::User;
pub use user_table::UserTable;

pub use codec::{read_packet, write_packet, MAX_FRAME_SIZE};
