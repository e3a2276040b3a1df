//! Client-side document engine: one Jupiter pair toward the server.

use cowrite_types::UserId;
use tracing::debug;

use crate::algorithm::Jupiter;
use crate::operation::Operation;
use crate::record::Record;
use crate::text::Text;
use crate::undo::JupiterUndo;
use crate::Result;

/// Wraps a document and the pair link to the server. Local edits are
/// applied immediately and turned into outbound records; incoming
/// records are transformed and applied with the originating author as
/// the attribution hint.
#[derive(Debug)]
pub struct JupiterClient {
    algorithm: Jupiter,
    undo: JupiterUndo,
    document: Text,
}

impl JupiterClient {
    /// Creates a client engine over the given document content. The
    /// pair starts at time (0, 0).
    #[must_use]
    pub fn new(document: Text) -> Self {
        Self {
            algorithm: Jupiter::new(),
            undo: JupiterUndo::new(),
            document,
        }
    }

    /// The local copy of the document.
    #[must_use]
    pub fn document(&self) -> &Text {
        &self.document
    }

    /// The pair's current vector time.
    #[must_use]
    pub fn time(&self) -> crate::VectorTime {
        self.algorithm.time()
    }

    /// Performs a local operation by `author`: applies it to the local
    /// document and returns the record to transmit to the server.
    pub fn local_op(&mut self, op: &Operation, author: Option<UserId>) -> Result<Record> {
        op.apply(&mut self.document, author)?;
        self.undo.local_op(op, author);
        let rec = self.algorithm.local_op(op);
        debug!(time = %rec.time, "generated local record");
        Ok(rec)
    }

    /// Processes a record relayed by the server, originated by `author`.
    pub fn remote_op(&mut self, rec: &Record, author: Option<UserId>) -> Result<()> {
        let op = self.algorithm.remote_op(rec)?;
        op.apply(&mut self.document, author)?;
        self.undo.remote_op(&op, author);
        Ok(())
    }

    /// Undoes the last local operation.
    pub fn undo_op(&mut self, author: Option<UserId>) -> Result<Record> {
        let op = self.undo.undo()?;
        op.apply(&mut self.document, author)?;
        Ok(self.algorithm.local_op(&op))
    }

    /// Consumes the engine, returning the document.
    #[must_use]
    pub fn into_document(self) -> Text {
        self.document
    }
}

impl From<JupiterClient> for Text {
    fn from(client: JupiterClient) -> Self {
        client.into_document()
    }
}
