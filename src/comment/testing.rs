//! Scripted backend for controller tests.
//!
//! Every mutation call is handed to the test as a [`Call`] carrying a
//! oneshot reply, so the test decides when and in which order calls finish.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use crate::comment::{
    controller::{Collaborators, CommentController},
    model::{ActorId, Author, Capabilities, Comment, CommentId, Emoji},
    mutation::{
        CommentEdit, CommentMutations, EditedComment, MutationError, MutationResult, NewReaction,
        ReactionId, Resolved,
    },
    pointer::PointerListeners,
};

#[derive(Debug)]
pub(crate) enum Call {
    React {
        request: NewReaction,
        reply: oneshot::Sender<MutationResult<ReactionId>>,
    },
    Edit {
        request: CommentEdit,
        reply: oneshot::Sender<MutationResult<EditedComment>>,
    },
    Delete {
        id: CommentId,
        reply: oneshot::Sender<MutationResult<CommentId>>,
    },
}

pub(crate) struct ScriptedMutations {
    calls: mpsc::UnboundedSender<Call>,
}

impl ScriptedMutations {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Call>) {
        let (calls, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { calls }), rx)
    }

    async fn exchange<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<MutationResult<T>>) -> Call,
    ) -> MutationResult<T> {
        let (reply, answer) = oneshot::channel();
        self.calls
            .send(make(reply))
            .map_err(|_| MutationError::Network("script closed".to_string()))?;
        answer
            .await
            .unwrap_or_else(|_| Err(MutationError::Network("no reply scripted".to_string())))
    }
}

#[async_trait]
impl CommentMutations for ScriptedMutations {
    async fn create_reaction(&self, request: NewReaction) -> MutationResult<ReactionId> {
        self.exchange(|reply| Call::React { request, reply }).await
    }

    async fn edit_comment(&self, request: CommentEdit) -> MutationResult<EditedComment> {
        self.exchange(|reply| Call::Edit { request, reply }).await
    }

    async fn delete_comment(&self, id: CommentId) -> MutationResult<CommentId> {
        self.exchange(|reply| Call::Delete { id, reply }).await
    }
}

pub(crate) fn sample_comment(id: &str, is_conversation_root: bool) -> Comment {
    Comment {
        id: CommentId::from(id),
        body: format!("body of {id}"),
        author: Author {
            id: ActorId::new("collective-1"),
            name: "Open Source Collective".to_string(),
        },
        created_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
        reactions: HashMap::from([(Emoji::ThumbsUp, 2), (Emoji::Heart, 1)]),
        reaction_ids: HashSet::from([
            ReactionId(format!("{id}-seed-1")),
            ReactionId(format!("{id}-seed-2")),
            ReactionId(format!("{id}-seed-3")),
        ]),
        is_conversation_root,
    }
}

pub(crate) struct Harness {
    pub controller: CommentController,
    pub calls: mpsc::UnboundedReceiver<Call>,
    pub resolved: mpsc::Receiver<Resolved>,
    pub listeners: PointerListeners,
    removed: Arc<Mutex<Vec<CommentId>>>,
}

impl Harness {
    pub(crate) fn new(comment: Comment, capabilities: Capabilities) -> Self {
        Self::with_controller(comment, capabilities, |controller| controller)
    }

    pub(crate) fn with_controller(
        comment: Comment,
        capabilities: Capabilities,
        configure: impl FnOnce(CommentController) -> CommentController,
    ) -> Self {
        let (mutations, calls) = ScriptedMutations::new();
        let (resolved_tx, resolved) = mpsc::channel(100);
        let listeners = PointerListeners::new();
        let collaborators = Collaborators {
            actor: ActorId::new("viewer-1"),
            mutations,
            resolved_tx,
            listeners: listeners.clone(),
        };
        let removed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&removed);
        let controller = CommentController::new(comment, capabilities, &collaborators).on_removed(
            move |id: &CommentId| {
                sink.lock().expect("removed lock").push(id.clone());
            },
        );
        Self {
            controller: configure(controller),
            calls,
            resolved,
            listeners,
            removed,
        }
    }

    /// Waits for the next mutation the controller sent.
    pub(crate) async fn next_call(&mut self) -> Call {
        self.calls.recv().await.expect("a mutation call")
    }

    /// Waits for the next resolution and applies it.
    pub(crate) async fn settle(&mut self) {
        let resolved = self.resolved.recv().await.expect("a resolution");
        self.controller.apply(resolved);
    }

    pub(crate) fn removed(&self) -> Vec<CommentId> {
        self.removed.lock().expect("removed lock").clone()
    }
}
