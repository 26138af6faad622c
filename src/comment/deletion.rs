//! Two-phase delete: confirm, then execute.
//!
//! `Idle` is represented by the controller not holding a [`DeletionFlow`] at
//! all; a flow is always either confirming or in flight.

use tracing::debug;

use crate::comment::{
    model::{CommentId, CommentView},
    mutation::{MutationError, MutationResult},
};

pub const DELETE_COMMENT_TITLE: &str = "Delete this comment?";
pub const DELETE_CONVERSATION_TITLE: &str = "Delete this conversation?";
pub const CASCADE_WARNING: &str = "The message and all its replies will be permanently deleted.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletionPhase {
    #[default]
    Idle,
    Confirming,
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    Removed,
    /// The comment was already gone on the backend.
    Gone,
    /// Back to confirming with an error attached.
    Confirming,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletionFlow {
    phase: DeletionPhase,
    cascade_warning: bool,
    preview: CommentView,
    error: Option<String>,
}

impl DeletionFlow {
    pub fn confirming(view: &CommentView, is_conversation_root: bool) -> Self {
        Self {
            phase: DeletionPhase::Confirming,
            cascade_warning: is_conversation_root,
            preview: view.preview(),
            error: None,
        }
    }

    pub fn phase(&self) -> DeletionPhase {
        self.phase
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase == DeletionPhase::InFlight
    }

    pub fn cascade_warning(&self) -> bool {
        self.cascade_warning
    }

    pub fn title(&self) -> &'static str {
        if self.cascade_warning {
            DELETE_CONVERSATION_TITLE
        } else {
            DELETE_COMMENT_TITLE
        }
    }

    pub fn warning(&self) -> Option<&'static str> {
        self.cascade_warning.then_some(CASCADE_WARNING)
    }

    pub fn preview(&self) -> &CommentView {
        &self.preview
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Moves from confirming to in flight. Returns `false` if a delete is
    /// already running.
    pub fn execute(&mut self) -> bool {
        if self.phase != DeletionPhase::Confirming {
            return false;
        }
        self.phase = DeletionPhase::InFlight;
        self.error = None;
        true
    }

    pub fn resolve(&mut self, result: &MutationResult<CommentId>) -> DeletionOutcome {
        match result {
            Ok(id) => {
                debug!(%id, "comment deleted");
                DeletionOutcome::Removed
            }
            Err(MutationError::NotFound) => DeletionOutcome::Gone,
            Err(err) => {
                debug!(%err, "delete failed");
                self.phase = DeletionPhase::Confirming;
                self.error = Some(err.to_string());
                DeletionOutcome::Confirming
            }
        }
    }
}
