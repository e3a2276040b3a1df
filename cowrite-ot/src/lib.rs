//! Operational-transformation core for cowrite.
//!
//! Implements the Jupiter convergence scheme over authored text:
//!
//! - [`Text`] — document content as a sequence of per-author chunks
//! - [`Operation`] — the edit algebra (insert/delete and the forms
//!   produced by transformation) with the pairwise transform rules
//! - [`Record`] — a [`VectorTime`]-stamped operation, the wire unit
//! - [`Jupiter`] — the per-link transformation state
//! - [`JupiterClient`] / [`JupiterServer`] — the site engines; the
//!   server transforms on behalf of every absent peer and fans records
//!   out to all other subscribers
//!
//! The engines are pure state machines: they never perform I/O, and the
//! server returns [`RecordDispatch`] lists for the session layer to put
//! on the wire.

mod algorithm;
mod client;
mod error;
mod operation;
mod record;
mod server;
mod text;
mod undo;
mod vector_time;

pub use algorithm::Jupiter;
pub use client::JupiterClient;
pub use error::{DecodeError, JupiterError, OtError, TextError};
pub use operation::Operation;
pub use record::Record;
pub use server::{JupiterServer, RecordDispatch};
pub use text::{Chunk, Text};
pub use undo::JupiterUndo;
pub use vector_time::VectorTime;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, OtError>;
