//! A conversation served from a JSON file and mutated in memory.
//!
//! ```json
//! {
//!   "title": "Budget for Q3",
//!   "viewer": "collective-1",
//!   "comments": [
//!     {
//!       "id": "1",
//!       "body": "Should we move the meetup?",
//!       "author": { "id": "collective-1", "name": "Open Source Collective" },
//!       "created_at": "2024-03-02T10:00:00Z",
//!       "reactions": { "+1": 2 },
//!       "is_conversation_root": true,
//!       "can_edit": true,
//!       "can_delete": true
//!     }
//!   ]
//! }
//! ```

use std::{
    path::Path,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::{
    comment::{
        ActorId, Capabilities, Comment, CommentId, CommentMutations, MutationError,
        edit::EMPTY_BODY,
        mutation::{CommentEdit, EditedComment, MutationResult, NewReaction, ReactionId},
    },
    errors::AppError,
    thread::{LoadedThread, ThreadEntry, ThreadSource},
};

#[derive(Debug, Deserialize)]
struct FixtureFile {
    title: String,
    viewer: ActorId,
    comments: Vec<FixtureComment>,
}

#[derive(Debug, Clone, Deserialize)]
struct FixtureComment {
    #[serde(flatten)]
    comment: Comment,
    #[serde(flatten)]
    capabilities: Capabilities,
}

#[derive(Debug)]
struct Store {
    title: String,
    viewer: ActorId,
    comments: Vec<FixtureComment>,
    next_reaction: u64,
}

impl Store {
    fn find_mut(&mut self, id: &CommentId) -> MutationResult<&mut FixtureComment> {
        self.comments
            .iter_mut()
            .find(|entry| &entry.comment.id == id)
            .ok_or(MutationError::NotFound)
    }
}

pub struct FixtureBackend {
    store: Mutex<Store>,
    latency: Duration,
}

impl FixtureBackend {
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let file: FixtureFile = serde_json::from_str(json)?;
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = file.comments.iter().find(|c| !seen.insert(&c.comment.id)) {
            return Err(AppError::Fixture(format!(
                "duplicate comment id {}",
                dup.comment.id
            )));
        }
        Ok(Self {
            store: Mutex::new(Store {
                title: file.title,
                viewer: file.viewer,
                comments: file.comments,
                next_reaction: 1,
            }),
            latency: Duration::ZERO,
        })
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await?;
        let backend = Self::from_json(&json)?;
        info!(path = %path.display(), "loaded thread fixture");
        Ok(backend)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut store)
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl ThreadSource for FixtureBackend {
    async fn load_thread(&self) -> Result<LoadedThread, AppError> {
        Ok(self.with_store(|store| LoadedThread {
            title: store.title.clone(),
            viewer: store.viewer.clone(),
            entries: store
                .comments
                .iter()
                .map(|entry| ThreadEntry {
                    comment: entry.comment.clone(),
                    capabilities: entry.capabilities,
                    reactions_loaded: true,
                })
                .collect(),
        }))
    }
}

#[async_trait]
impl CommentMutations for FixtureBackend {
    #[instrument(skip(self))]
    async fn create_reaction(&self, request: NewReaction) -> MutationResult<ReactionId> {
        self.delay().await;
        self.with_store(|store| {
            let id = ReactionId(format!("reaction-{}", store.next_reaction));
            let entry = store.find_mut(&request.comment_id)?;
            *entry.comment.reactions.entry(request.emoji).or_insert(0) += 1;
            entry.comment.reaction_ids.insert(id.clone());
            store.next_reaction += 1;
            Ok(id)
        })
    }

    #[instrument(skip(self, request), fields(comment = %request.id))]
    async fn edit_comment(&self, request: CommentEdit) -> MutationResult<EditedComment> {
        self.delay().await;
        if request.new_content.trim().is_empty() {
            return Err(MutationError::Validation(EMPTY_BODY.to_string()));
        }
        self.with_store(|store| {
            let entry = store.find_mut(&request.id)?;
            if !entry.capabilities.can_edit {
                return Err(MutationError::Permission(
                    "you cannot edit this comment".to_string(),
                ));
            }
            entry.comment.body = request.new_content;
            Ok(EditedComment {
                id: request.id,
                content: entry.comment.body.clone(),
            })
        })
    }

    #[instrument(skip(self))]
    async fn delete_comment(&self, id: CommentId) -> MutationResult<CommentId> {
        self.delay().await;
        self.with_store(|store| {
            let entry = store.find_mut(&id)?;
            if !entry.capabilities.can_delete {
                return Err(MutationError::Permission(
                    "you cannot delete this comment".to_string(),
                ));
            }
            if entry.comment.is_conversation_root {
                debug!(count = store.comments.len(), "deleting conversation");
                store.comments.clear();
            } else {
                store.comments.retain(|entry| entry.comment.id != id);
            }
            Ok(id)
        })
    }
}
