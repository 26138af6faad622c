//! The list that owns the comment controllers of one conversation.
//!
//! Controllers only announce that they were removed; excising them happens
//! here. A thread holds exactly one conversation, so when its root goes
//! every other comment is a reply to it and leaves as well.

use std::{
    collections::{HashMap, HashSet},
    sync::mpsc,
};

use async_trait::async_trait;
use ratatui::layout::Position;
use tracing::{debug, info, warn};

use crate::{
    comment::{
        ActorId, Capabilities, Collaborators, Comment, CommentAction, CommentController,
        CommentId, Emoji, Resolved, Transition, mutation::ReactionId,
    },
    errors::AppError,
};

#[derive(Debug, Clone)]
pub struct ThreadEntry {
    pub comment: Comment,
    pub capabilities: Capabilities,
    /// `false` when the reactions could not be fetched; the comment's
    /// reaction fields are then empty and must not replace known counts.
    pub reactions_loaded: bool,
}

#[derive(Debug, Clone)]
pub struct LoadedThread {
    pub title: String,
    pub viewer: ActorId,
    pub entries: Vec<ThreadEntry>,
}

/// The read side of the backend.
#[async_trait]
pub trait ThreadSource: Send + Sync {
    async fn load_thread(&self) -> Result<LoadedThread, AppError>;
}

pub struct Thread {
    title: String,
    collaborators: Collaborators,
    controllers: Vec<CommentController>,
    removals_tx: mpsc::Sender<CommentId>,
    removals: mpsc::Receiver<CommentId>,
}

impl Thread {
    pub fn new(loaded: LoadedThread, collaborators: Collaborators) -> Self {
        let (removals_tx, removals) = mpsc::channel();
        let mut thread = Self {
            title: loaded.title,
            collaborators,
            controllers: Vec::with_capacity(loaded.entries.len()),
            removals_tx,
            removals,
        };
        for entry in loaded.entries {
            let controller = thread.controller_for(entry);
            thread.controllers.push(controller);
        }
        thread
    }

    fn controller_for(&self, entry: ThreadEntry) -> CommentController {
        let removals = self.removals_tx.clone();
        CommentController::new(entry.comment, entry.capabilities, &self.collaborators).on_removed(
            move |id: &CommentId| {
                if removals.send(id.clone()).is_err() {
                    warn!(comment = %id, "removal dropped, thread is gone");
                }
            },
        )
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn controllers(&self) -> &[CommentController] {
        &self.controllers
    }

    pub fn controllers_mut(&mut self) -> &mut [CommentController] {
        &mut self.controllers
    }

    pub fn position(&self, id: &CommentId) -> Option<usize> {
        self.controllers.iter().position(|c| c.id() == id)
    }

    pub fn get(&self, id: &CommentId) -> Option<&CommentController> {
        self.controllers.iter().find(|c| c.id() == id)
    }

    pub fn get_mut(&mut self, id: &CommentId) -> Option<&mut CommentController> {
        self.controllers.iter_mut().find(|c| c.id() == id)
    }

    pub fn dispatch(&mut self, id: &CommentId, action: CommentAction) -> Option<Transition> {
        self.get_mut(id).map(|controller| controller.dispatch(action))
    }

    /// Applies a mutation result and returns the ids of every comment that
    /// left the thread because of it.
    pub fn apply(&mut self, resolved: Resolved) -> Vec<CommentId> {
        match self.get_mut(&resolved.comment_id) {
            Some(controller) => controller.apply(resolved),
            None => debug!(comment = %resolved.comment_id, "resolution for excised comment"),
        }
        self.excise_removed()
    }

    /// Every open popup sees the click independently.
    pub fn handle_outside_click(&mut self, at: Position) -> usize {
        self.controllers
            .iter_mut()
            .map(|controller| controller.handle_outside_click(at))
            .filter(|closed| *closed)
            .count()
    }

    /// Forwards a fresh reaction snapshot. Returns `false` for unknown ids.
    pub fn reconcile_reactions(
        &mut self,
        id: &CommentId,
        counts: HashMap<Emoji, u64>,
        ids: HashSet<ReactionId>,
    ) -> bool {
        match self.get_mut(id) {
            Some(controller) => {
                controller.reconcile_reactions(counts, ids);
                true
            }
            None => false,
        }
    }

    /// Merges a fresh load: known comments are refreshed, new ones appended.
    pub fn reload(&mut self, loaded: LoadedThread) {
        self.title = loaded.title;
        for entry in loaded.entries {
            if let Some(controller) = self.get_mut(&entry.comment.id) {
                if entry.reactions_loaded {
                    controller.refresh(entry.comment);
                } else {
                    debug!(comment = %entry.comment.id, "reactions missing from reload");
                    controller.refresh_content(entry.comment);
                }
            } else {
                let controller = self.controller_for(entry);
                self.controllers.push(controller);
            }
        }
    }

    fn excise_removed(&mut self) -> Vec<CommentId> {
        let removed: Vec<CommentId> = self.removals.try_iter().collect();
        let mut excised = Vec::new();
        for id in removed {
            let Some(index) = self.position(&id) else {
                continue;
            };
            let controller = self.controllers.remove(index);
            if controller.comment().is_conversation_root {
                info!(root = %id, replies = self.controllers.len(), "conversation removed");
                excised.extend(self.controllers.drain(..).map(|c| c.id().clone()));
            }
            excised.push(id);
        }
        excised
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc as tokio_mpsc;

    use super::*;
    use crate::comment::{
        CommentAction, PointerListeners,
        mutation::{MutationError, ReactionId},
        testing::{Call, ScriptedMutations, sample_comment},
    };

    fn owner() -> Capabilities {
        Capabilities {
            can_edit: true,
            can_delete: true,
        }
    }

    struct Fixture {
        thread: Thread,
        calls: tokio_mpsc::UnboundedReceiver<Call>,
        resolved: tokio_mpsc::Receiver<Resolved>,
        listeners: PointerListeners,
    }

    fn fixture(root_first: bool) -> Fixture {
        let (mutations, calls) = ScriptedMutations::new();
        let (resolved_tx, resolved) = tokio_mpsc::channel(16);
        let listeners = PointerListeners::new();
        let collaborators = Collaborators {
            actor: ActorId::new("viewer"),
            mutations: mutations as Arc<dyn crate::comment::CommentMutations>,
            resolved_tx,
            listeners: listeners.clone(),
        };
        let loaded = LoadedThread {
            title: "Budget discussion".to_string(),
            viewer: ActorId::new("viewer"),
            entries: vec![
                ThreadEntry {
                    comment: sample_comment("root", root_first),
                    capabilities: owner(),
                    reactions_loaded: true,
                },
                ThreadEntry {
                    comment: sample_comment("reply-1", false),
                    capabilities: owner(),
                    reactions_loaded: true,
                },
                ThreadEntry {
                    comment: sample_comment("reply-2", false),
                    capabilities: Capabilities::NONE,
                    reactions_loaded: true,
                },
            ],
        };
        Fixture {
            thread: Thread::new(loaded, collaborators),
            calls,
            resolved,
            listeners,
        }
    }

    async fn delete(f: &mut Fixture, id: &str, answer: Result<(), MutationError>) -> Vec<CommentId> {
        let id = CommentId::from(id);
        f.thread.dispatch(&id, CommentAction::RequestDelete);
        f.thread.dispatch(&id, CommentAction::ConfirmDelete);
        let Some(Call::Delete { id, reply }) = f.calls.recv().await else {
            panic!("expected a delete call");
        };
        reply.send(answer.map(|()| id)).expect("reply");
        let resolved = f.resolved.recv().await.expect("resolution");
        f.thread.apply(resolved)
    }

    #[tokio::test]
    async fn removing_a_reply_excises_only_it() {
        let mut f = fixture(true);
        let excised = delete(&mut f, "reply-1", Ok(())).await;
        assert_eq!(excised, vec![CommentId::from("reply-1")]);
        assert_eq!(f.thread.len(), 2);
        assert!(f.thread.get(&CommentId::from("reply-1")).is_none());
    }

    #[tokio::test]
    async fn removing_the_root_cascades_to_replies() {
        let mut f = fixture(true);
        f.thread
            .dispatch(&CommentId::from("reply-1"), CommentAction::OpenPopup);
        assert_eq!(f.listeners.active(), 1);

        let excised = delete(&mut f, "root", Ok(())).await;
        assert_eq!(excised.len(), 3);
        assert!(f.thread.is_empty());
        assert_eq!(f.listeners.active(), 0);
    }

    #[tokio::test]
    async fn vanished_comment_is_excised_too() {
        let mut f = fixture(false);
        let excised = delete(&mut f, "root", Err(MutationError::NotFound)).await;
        assert_eq!(excised, vec![CommentId::from("root")]);
        assert_eq!(f.thread.len(), 2);
    }

    #[tokio::test]
    async fn failed_delete_keeps_comment() {
        let mut f = fixture(false);
        let excised = delete(&mut f, "root", Err(MutationError::Network("down".into()))).await;
        assert!(excised.is_empty());
        assert_eq!(f.thread.len(), 3);
    }

    #[tokio::test]
    async fn outside_click_reaches_every_open_popup() {
        let mut f = fixture(false);
        for id in ["root", "reply-1"] {
            let id = CommentId::from(id);
            f.thread.dispatch(&id, CommentAction::OpenPopup);
            f.thread
                .get_mut(&id)
                .expect("controller")
                .set_trigger_area(Some(ratatui::layout::Rect::new(70, 0, 3, 1)));
        }
        assert_eq!(f.listeners.active(), 2);
        assert_eq!(f.thread.handle_outside_click(Position::new(1, 1)), 2);
        assert_eq!(f.listeners.active(), 0);
    }

    #[tokio::test]
    async fn reconcile_reactions_replaces_counts() {
        let mut f = fixture(false);
        let id = CommentId::from("reply-2");
        assert!(
            f.thread.reconcile_reactions(
                &id,
                HashMap::from([(Emoji::Rocket, 4)]),
                HashSet::new()
            )
        );
        let counts = f.thread.get(&id).expect("reply").reactions().counts();
        assert_eq!(counts, vec![(Emoji::Rocket, 4)]);
        assert!(
            !f.thread.reconcile_reactions(
                &CommentId::from("missing"),
                HashMap::new(),
                HashSet::new()
            )
        );
    }

    #[tokio::test]
    async fn reload_refreshes_and_appends() {
        let mut f = fixture(false);
        let mut root = sample_comment("root", false);
        root.body = "edited elsewhere".to_string();
        f.thread.reload(LoadedThread {
            title: "Renamed".to_string(),
            viewer: ActorId::new("viewer"),
            entries: vec![
                ThreadEntry {
                    comment: root,
                    capabilities: owner(),
                    reactions_loaded: true,
                },
                ThreadEntry {
                    comment: sample_comment("reply-3", false),
                    capabilities: owner(),
                    reactions_loaded: true,
                },
            ],
        });
        assert_eq!(f.thread.title(), "Renamed");
        assert_eq!(f.thread.len(), 4);
        assert_eq!(
            f.thread
                .get(&CommentId::from("root"))
                .expect("root")
                .comment()
                .body,
            "edited elsewhere"
        );
    }

    fn reload_of(comment: Comment, reactions_loaded: bool) -> LoadedThread {
        LoadedThread {
            title: "Budget discussion".to_string(),
            viewer: ActorId::new("viewer"),
            entries: vec![ThreadEntry {
                comment,
                capabilities: Capabilities::NONE,
                reactions_loaded,
            }],
        }
    }

    async fn send_heart(
        f: &mut Fixture,
        id: &CommentId,
    ) -> tokio::sync::oneshot::Sender<Result<ReactionId, MutationError>> {
        f.thread.dispatch(id, CommentAction::React(Emoji::Heart));
        let Some(Call::React { reply, .. }) = f.calls.recv().await else {
            panic!("expected a reaction call");
        };
        reply
    }

    fn heart_count(f: &Fixture, id: &CommentId) -> u64 {
        f.thread
            .get(id)
            .expect("comment")
            .reactions()
            .count(Emoji::Heart)
    }

    #[tokio::test]
    async fn reload_that_already_counts_the_reaction_is_not_doubled() {
        let mut f = fixture(false);
        let id = CommentId::from("reply-2");
        let reply = send_heart(&mut f, &id).await;

        let mut fresh = sample_comment("reply-2", false);
        fresh.reactions.insert(Emoji::Heart, 2);
        fresh.reaction_ids.insert(ReactionId("heart-new".into()));
        f.thread.reload(reload_of(fresh, true));
        assert_eq!(heart_count(&f, &id), 2);

        reply.send(Ok(ReactionId("heart-new".into()))).expect("reply");
        let resolved = f.resolved.recv().await.expect("resolution");
        f.thread.apply(resolved);
        assert_eq!(heart_count(&f, &id), 2);
    }

    #[tokio::test]
    async fn stale_reload_keeps_a_confirmed_reaction() {
        let mut f = fixture(false);
        let id = CommentId::from("reply-2");
        let reply = send_heart(&mut f, &id).await;
        reply.send(Ok(ReactionId("heart-new".into()))).expect("reply");
        let resolved = f.resolved.recv().await.expect("resolution");
        f.thread.apply(resolved);
        assert_eq!(heart_count(&f, &id), 2);

        f.thread.reload(reload_of(sample_comment("reply-2", false), true));
        assert_eq!(heart_count(&f, &id), 2);
    }

    #[tokio::test]
    async fn reload_without_reactions_keeps_counts() {
        let mut f = fixture(false);
        let id = CommentId::from("reply-2");
        let mut fresh = sample_comment("reply-2", false);
        fresh.body = "edited elsewhere".to_string();
        fresh.reactions.clear();
        fresh.reaction_ids.clear();
        f.thread.reload(reload_of(fresh, false));

        let controller = f.thread.get(&id).expect("reply");
        assert_eq!(controller.comment().body, "edited elsewhere");
        assert_eq!(controller.reactions().count(Emoji::ThumbsUp), 2);
        assert_eq!(controller.reactions().count(Emoji::Heart), 1);
    }
}
