//! The per-link transformation state.
//!
//! One [`Jupiter`] instance sits at each end of a two-party link. Each
//! side keeps the operations it has generated but the peer has not yet
//! acknowledged; an incoming record is transformed against that list so
//! it applies cleanly to the local document, and the list entries are
//! re-transformed in turn so later incoming records keep lining up.

use std::collections::VecDeque;

use crate::error::JupiterError;
use crate::operation::Operation;
use crate::record::Record;
use crate::vector_time::VectorTime;

/// A locally generated operation awaiting acknowledgement, tagged with
/// the local operation count at which it was generated.
#[derive(Debug, Clone)]
struct AckEntry {
    count: u32,
    op: Operation,
}

/// Jupiter pair engine.
#[derive(Debug, Default)]
pub struct Jupiter {
    time: VectorTime,
    ack: VecDeque<AckEntry>,
}

impl Jupiter {
    /// Creates a fresh pair at time (0, 0).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The pair's current vector time.
    #[must_use]
    pub fn time(&self) -> VectorTime {
        self.time
    }

    /// Number of local operations not yet acknowledged by the peer.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.ack.len()
    }

    /// Registers a locally generated operation and returns the record
    /// to transmit to the peer.
    pub fn local_op(&mut self, op: &Operation) -> Record {
        let rec = Record::new(self.time, op.clone());
        self.ack.push_back(AckEntry {
            count: self.time.local,
            op: op.clone(),
        });
        self.time.inc_local();
        rec
    }

    /// Processes a record received from the peer, returning the
    /// operation transformed into the local document's frame.
    ///
    /// A precondition violation means the peer reordered or fabricated
    /// records; the pair is unusable afterwards.
    pub fn remote_op(&mut self, rec: &Record) -> Result<Operation, JupiterError> {
        self.check_preconditions(rec)?;
        self.discard_acknowledged(rec);

        let mut transformed = rec.op.clone();
        for entry in &mut self.ack {
            let new_transformed = entry.op.transform(&transformed);
            let new_entry = transformed.transform(&entry.op);
            entry.op = new_entry;
            transformed = new_transformed;
        }

        self.time.inc_remote();
        Ok(transformed)
    }

    /// Drops entries the peer has acknowledged: everything generated
    /// before the record's remote count.
    fn discard_acknowledged(&mut self, rec: &Record) {
        while let Some(front) = self.ack.front() {
            if front.count < rec.time.remote {
                self.ack.pop_front();
            } else {
                break;
            }
        }
        debug_assert_eq!(
            rec.time.local, self.time.remote,
            "sequence order verified by check_preconditions"
        );
    }

    fn check_preconditions(&self, rec: &Record) -> Result<(), JupiterError> {
        if let Some(front) = self.ack.front() {
            if rec.time.remote < front.count {
                return Err(JupiterError::Protocol(
                    "incoming remote time is lower than the oldest unacknowledged operation"
                        .to_string(),
                ));
            }
        }

        if rec.time.remote > self.time.local {
            return Err(JupiterError::Protocol(
                "incoming remote time is greater than own local time".to_string(),
            ));
        }

        if rec.time.local != self.time.remote {
            return Err(JupiterError::Protocol(
                "incoming local time does not match own remote time".to_string(),
            ));
        }

        Ok(())
    }
}
