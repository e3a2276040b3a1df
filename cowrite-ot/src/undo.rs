//! Undo manager for the Jupiter engines.
//!
//! Local-only undo is not implemented; the manager records nothing and
//! [`JupiterUndo::undo`] always fails. The hooks exist so the engines
//! already feed it, ready for a real implementation.

use cowrite_types::UserId;

use crate::error::JupiterError;
use crate::operation::Operation;

/// Placeholder undo manager.
#[derive(Debug, Default)]
pub struct JupiterUndo {}

impl JupiterUndo {
    /// Creates an undo manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a locally performed operation.
    pub fn local_op(&mut self, _op: &Operation, _from: Option<UserId>) {}

    /// Records a remotely performed operation.
    pub fn remote_op(&mut self, _op: &Operation, _from: Option<UserId>) {}

    /// Returns true if the last local operation can be undone.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        false
    }

    /// Builds an operation undoing the last local operation.
    pub fn undo(&mut self) -> Result<Operation, JupiterError> {
        Err(JupiterError::Logic("undo is not implemented".to_string()))
    }
}
