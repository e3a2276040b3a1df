//! Server-side document engine: one Jupiter pair per subscribed client.
//!
//! The server owns the authoritative document copy and transforms on
//! behalf of every absent peer: an operation received from one client
//! is transformed into the server frame, applied, and then pushed
//! through every *other* client's pair, producing one outbound record
//! per target. The order in which the server processes incoming
//! records is the global serialisation order for the document.

use std::collections::BTreeMap;

use cowrite_types::UserId;
use tracing::debug;

use crate::algorithm::Jupiter;
use crate::error::JupiterError;
use crate::operation::Operation;
use crate::record::Record;
use crate::text::Text;
use crate::undo::JupiterUndo;
use crate::Result;

/// An outbound record produced by the server engine, addressed to one
/// subscribed client. `originator` names the user whose edit the record
/// carries so the receiver attributes inserted text correctly; it is
/// `None` for server-authored edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDispatch {
    pub target: UserId,
    pub originator: Option<UserId>,
    pub record: Record,
}

/// Jupiter server engine.
#[derive(Debug)]
pub struct JupiterServer {
    // BTreeMap keeps the fan-out order deterministic.
    clients: BTreeMap<UserId, Jupiter>,
    undo: JupiterUndo,
    document: Text,
}

impl JupiterServer {
    /// Creates a server engine over the given document content.
    #[must_use]
    pub fn new(document: Text) -> Self {
        Self {
            clients: BTreeMap::new(),
            undo: JupiterUndo::new(),
            document,
        }
    }

    /// The authoritative copy of the document.
    #[must_use]
    pub fn document(&self) -> &Text {
        &self.document
    }

    /// Returns true if `client` has a pair on this engine.
    #[must_use]
    pub fn has_client(&self, client: UserId) -> bool {
        self.clients.contains_key(&client)
    }

    /// The clients currently tracked, in id order.
    pub fn clients(&self) -> impl Iterator<Item = UserId> + '_ {
        self.clients.keys().copied()
    }

    /// Adds a fresh pair for a newly subscribed client.
    pub fn client_add(&mut self, client: UserId) -> Result<()> {
        if self.clients.contains_key(&client) {
            return Err(JupiterError::Logic(format!(
                "client {client} has already been added"
            ))
            .into());
        }
        self.clients.insert(client, Jupiter::new());
        Ok(())
    }

    /// Drops the pair of a departing client.
    pub fn client_remove(&mut self, client: UserId) -> Result<()> {
        if self.clients.remove(&client).is_none() {
            return Err(JupiterError::Logic(format!(
                "client {client} has not been added"
            ))
            .into());
        }
        Ok(())
    }

    /// Performs an operation local to the server site (authored by
    /// `from`, or by the server itself when `None`). Returns one record
    /// per tracked client.
    pub fn local_op(
        &mut self,
        op: &Operation,
        from: Option<UserId>,
    ) -> Result<Vec<RecordDispatch>> {
        op.apply(&mut self.document, from)?;
        self.undo.local_op(op, from);
        Ok(self.fan_out(op, from, None))
    }

    /// Processes a record received from client `from`: transforms it
    /// through that client's pair, applies it to the authoritative
    /// copy, and returns a record for every *other* client.
    pub fn remote_op(&mut self, rec: &Record, from: UserId) -> Result<Vec<RecordDispatch>> {
        let pair = self.clients.get_mut(&from).ok_or_else(|| {
            JupiterError::Logic(format!("client {from} has not been added"))
        })?;

        let op = pair.remote_op(rec)?;
        op.apply(&mut self.document, Some(from))?;
        self.undo.remote_op(&op, Some(from));
        debug!(%from, "serialised remote record");

        Ok(self.fan_out(&op, Some(from), Some(from)))
    }

    /// Runs `op` through every tracked pair except `skip`, collecting
    /// the outbound records.
    fn fan_out(
        &mut self,
        op: &Operation,
        originator: Option<UserId>,
        skip: Option<UserId>,
    ) -> Vec<RecordDispatch> {
        self.clients
            .iter_mut()
            .filter(|(id, _)| Some(**id) != skip)
            .map(|(id, pair)| RecordDispatch {
                target: *id,
                originator,
                record: pair.local_op(op),
            })
            .collect()
    }
}
