//! The wire unit: a vector time attached to an operation.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::operation::Operation;
use crate::text::take_param;
use crate::vector_time::VectorTime;

/// A timestamped operation as exchanged between pair peers. The
/// receiving [`crate::Jupiter`] engine uses the time to transform the
/// operation against local operations the sender had not yet seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub time: VectorTime,
    pub op: Operation,
}

impl Record {
    /// Creates a record.
    #[must_use]
    pub const fn new(time: VectorTime, op: Operation) -> Self {
        Self { time, op }
    }

    /// Appends the record's wire parameters: the two time counters
    /// followed by the operation.
    pub fn push_params(&self, params: &mut Vec<String>) {
        params.push(self.time.local.to_string());
        params.push(self.time.remote.to_string());
        self.op.push_params(params);
    }

    /// Reads a record from wire parameters starting at `*index`,
    /// advancing it past the consumed parameters.
    pub fn parse_params(params: &[String], index: &mut usize) -> Result<Record, DecodeError> {
        let local = parse_counter(params, index)?;
        let remote = parse_counter(params, index)?;
        let op = Operation::parse_params(params, index)?;
        Ok(Record::new(VectorTime::new(local, remote), op))
    }
}

fn parse_counter(params: &[String], index: &mut usize) -> Result<u32, DecodeError> {
    let raw = take_param(params, index)?;
    raw.parse().map_err(|_| DecodeError::BadParam {
        index: *index - 1,
        reason: format!("bad time counter: {raw}"),
    })
}
