use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::comment::model::{ActorId, CommentId, Emoji};

/// Why a mutation against the backend failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("network error: {0}")]
    Network(String),
    #[error("{0}")]
    Validation(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("this comment no longer exists")]
    NotFound,
}

pub type MutationResult<T> = Result<T, MutationError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReaction {
    pub comment_id: CommentId,
    pub emoji: Emoji,
    pub actor_id: ActorId,
}

/// Backend identifier of one stored reaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactionId(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEdit {
    pub id: CommentId,
    pub new_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditedComment {
    pub id: CommentId,
    pub content: String,
}

/// The write side of the backend. Implementations perform one request per
/// call and never retry.
#[async_trait]
pub trait CommentMutations: Send + Sync {
    async fn create_reaction(&self, reaction: NewReaction) -> MutationResult<ReactionId>;
    async fn edit_comment(&self, edit: CommentEdit) -> MutationResult<EditedComment>;
    async fn delete_comment(&self, id: CommentId) -> MutationResult<CommentId>;
}

/// The outcome of a mutation, routed back to the controller that issued it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub comment_id: CommentId,
    pub resolution: Resolution,
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Reaction {
        emoji: Emoji,
        result: MutationResult<ReactionId>,
    },
    Edit(MutationResult<EditedComment>),
    Delete(MutationResult<CommentId>),
}
