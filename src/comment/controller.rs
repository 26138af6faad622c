//! Entity-level state machine for one displayed comment.
//!
//! The controller owns the mutually exclusive sub-states (viewing, editing,
//! deleting) as a single [`Mode`], an orthogonal action popup and the
//! reaction tally. All transitions happen synchronously in
//! [`CommentController::dispatch`]; mutations run as tokio tasks whose
//! results come back as [`Resolved`] messages and are fed to
//! [`CommentController::apply`] in completion order.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use ratatui::layout::{Position, Rect};
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};

use crate::comment::{
    deletion::{DeletionFlow, DeletionOutcome, DeletionPhase},
    edit::{CancelOutcome, EditSession},
    model::{ActorId, Capabilities, Comment, CommentId, CommentView, Emoji},
    mutation::{
        CommentEdit, CommentMutations, MutationError, NewReaction, ReactionId, Resolution,
        Resolved,
    },
    pointer::PointerListeners,
    popup::PopupController,
    reactions::ReactionTally,
};

/// Everything a user can ask a comment to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentAction {
    OpenPopup,
    ClosePopup,
    TogglePopup,
    BeginEdit,
    EditDraft(String),
    CommitEdit(String),
    CancelEdit,
    DiscardEdit,
    KeepEditing,
    RequestDelete,
    ConfirmDelete,
    CancelDelete,
    React(Emoji),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The comment has been removed or vanished.
    Inactive,
    DeleteInFlight,
    NotPermitted,
    Editing,
    Deleting,
    NotEditing,
    NotConfirming,
    Saving,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::Inactive => "comment is no longer available",
            Rejection::DeleteInFlight => "a delete is in progress",
            Rejection::NotPermitted => "not permitted",
            Rejection::Editing => "comment is being edited",
            Rejection::Deleting => "comment is being deleted",
            Rejection::NotEditing => "comment is not being edited",
            Rejection::NotConfirming => "no delete to confirm",
            Rejection::Saving => "edit is being saved",
        };
        f.write_str(reason)
    }
}

/// What a dispatch did. A rejected action leaves the state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// A mutation was sent; its result arrives later through `apply`.
    Spawned,
    NeedsDiscardConfirmation,
    Rejected(Rejection),
}

impl Transition {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Transition::Rejected(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lifecycle {
    #[default]
    Live,
    /// Deleted through this controller.
    Removed,
    /// Found missing on the backend while editing or deleting.
    Gone,
}

#[derive(Debug, Clone)]
enum Mode {
    Viewing,
    Editing(EditSession),
    Deleting(DeletionFlow),
    Removed,
    Gone,
}

/// Read-only snapshot handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionState {
    pub editing: bool,
    pub deletion: DeletionPhase,
    pub popup_open: bool,
    pub local_reaction_overlay: HashMap<Emoji, u64>,
    pub saving: bool,
    pub discard_prompt: bool,
    pub cascade_warning: bool,
    pub edit_error: Option<String>,
    pub delete_error: Option<String>,
    pub reaction_error: Option<String>,
    pub pending_reactions: usize,
    pub lifecycle: Lifecycle,
}

pub type RemovalCallback = Box<dyn FnMut(&CommentId) + Send>;

/// Shared wiring for every controller of one screen.
#[derive(Clone)]
pub struct Collaborators {
    pub actor: ActorId,
    pub mutations: Arc<dyn CommentMutations>,
    pub resolved_tx: Sender<Resolved>,
    pub listeners: PointerListeners,
}

pub struct CommentController {
    comment: Comment,
    capabilities: Capabilities,
    actions_enabled: bool,
    actor: ActorId,
    mode: Mode,
    popup: PopupController,
    reactions: ReactionTally,
    mutations: Arc<dyn CommentMutations>,
    resolved_tx: Sender<Resolved>,
    on_removed: Option<RemovalCallback>,
}

impl fmt::Debug for CommentController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommentController")
            .field("id", &self.comment.id)
            .field("mode", &self.mode)
            .field("popup_open", &self.popup.is_open())
            .finish_non_exhaustive()
    }
}

impl CommentController {
    pub fn new(comment: Comment, capabilities: Capabilities, collaborators: &Collaborators) -> Self {
        let reactions =
            ReactionTally::new(comment.reactions.clone(), comment.reaction_ids.clone());
        Self {
            comment,
            capabilities,
            actions_enabled: true,
            actor: collaborators.actor.clone(),
            mode: Mode::Viewing,
            popup: PopupController::new(collaborators.listeners.clone()),
            reactions,
            mutations: Arc::clone(&collaborators.mutations),
            resolved_tx: collaborators.resolved_tx.clone(),
            on_removed: None,
        }
    }

    /// Called once when the comment is deleted or found missing.
    pub fn on_removed(mut self, callback: impl FnMut(&CommentId) + Send + 'static) -> Self {
        self.on_removed = Some(Box::new(callback));
        self
    }

    pub fn without_actions(mut self) -> Self {
        self.actions_enabled = false;
        self
    }

    pub fn id(&self) -> &CommentId {
        &self.comment.id
    }

    pub fn comment(&self) -> &Comment {
        &self.comment
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn popup(&self) -> &PopupController {
        &self.popup
    }

    pub fn reactions(&self) -> &ReactionTally {
        &self.reactions
    }

    pub fn edit_session(&self) -> Option<&EditSession> {
        match &self.mode {
            Mode::Editing(session) => Some(session),
            _ => None,
        }
    }

    pub fn deletion(&self) -> Option<&DeletionFlow> {
        match &self.mode {
            Mode::Deleting(flow) => Some(flow),
            _ => None,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self.mode {
            Mode::Removed => Lifecycle::Removed,
            Mode::Gone => Lifecycle::Gone,
            _ => Lifecycle::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        self.lifecycle() == Lifecycle::Live
    }

    /// Whether the admin actions trigger is shown at all.
    pub fn has_actions(&self) -> bool {
        self.actions_enabled && matches!(self.mode, Mode::Viewing) && self.capabilities.any()
    }

    pub fn view(&self) -> CommentView {
        CommentView {
            id: self.comment.id.clone(),
            author: self.comment.author.clone(),
            created_at: self.comment.created_at,
            body: self.comment.body.clone(),
            reactions: self.reactions.counts(),
            capabilities: self.capabilities,
            actions_enabled: self.actions_enabled,
            max_height: None,
        }
    }

    pub fn state(&self) -> InteractionState {
        let session = self.edit_session();
        let flow = self.deletion();
        InteractionState {
            editing: session.is_some(),
            deletion: flow.map_or(DeletionPhase::Idle, DeletionFlow::phase),
            popup_open: self.popup.is_open(),
            local_reaction_overlay: self.reactions.overlay(),
            saving: session.is_some_and(EditSession::is_saving),
            discard_prompt: session.is_some_and(EditSession::discard_prompt),
            cascade_warning: flow.is_some_and(DeletionFlow::cascade_warning),
            edit_error: session.and_then(|s| s.error().map(str::to_string)),
            delete_error: flow.and_then(|f| f.error().map(str::to_string)),
            reaction_error: self.reactions.error().map(str::to_string),
            pending_reactions: self.reactions.pending_total(),
            lifecycle: self.lifecycle(),
        }
    }

    pub fn dispatch(&mut self, action: CommentAction) -> Transition {
        let transition = match self.guard() {
            Err(rejection) => Transition::Rejected(rejection),
            Ok(()) => self.transition(action.clone()),
        };
        match transition {
            Transition::Rejected(rejection) => {
                debug!(comment = %self.comment.id, ?action, %rejection, "action rejected");
            }
            _ => debug!(comment = %self.comment.id, ?action, ?transition, "action applied"),
        }
        transition
    }

    fn guard(&self) -> Result<(), Rejection> {
        match &self.mode {
            Mode::Removed | Mode::Gone => Err(Rejection::Inactive),
            Mode::Deleting(flow) if flow.is_in_flight() => Err(Rejection::DeleteInFlight),
            _ => Ok(()),
        }
    }

    fn transition(&mut self, action: CommentAction) -> Transition {
        match action {
            CommentAction::OpenPopup => {
                if !self.has_actions() {
                    return Transition::Rejected(Rejection::NotPermitted);
                }
                self.popup.open();
                Transition::Applied
            }
            CommentAction::ClosePopup => {
                self.popup.close();
                Transition::Applied
            }
            CommentAction::TogglePopup => {
                if !self.popup.is_open() && !self.has_actions() {
                    return Transition::Rejected(Rejection::NotPermitted);
                }
                self.popup.toggle();
                Transition::Applied
            }
            CommentAction::BeginEdit => match self.mode {
                Mode::Editing(_) => Transition::Rejected(Rejection::Editing),
                Mode::Deleting(_) => Transition::Rejected(Rejection::Deleting),
                _ if !self.actions_enabled || !self.capabilities.can_edit => {
                    Transition::Rejected(Rejection::NotPermitted)
                }
                _ => {
                    self.popup.close();
                    self.mode = Mode::Editing(EditSession::begin(&self.comment.body));
                    Transition::Applied
                }
            },
            CommentAction::EditDraft(value) => {
                let Mode::Editing(session) = &mut self.mode else {
                    return Transition::Rejected(Rejection::NotEditing);
                };
                if session.is_saving() {
                    return Transition::Rejected(Rejection::Saving);
                }
                session.set_draft(value);
                Transition::Applied
            }
            CommentAction::CommitEdit(value) => {
                let Mode::Editing(session) = &mut self.mode else {
                    return Transition::Rejected(Rejection::NotEditing);
                };
                if session.is_saving() {
                    return Transition::Rejected(Rejection::Saving);
                }
                match session.start_commit(value) {
                    Ok(new_content) => {
                        self.spawn_edit(new_content);
                        Transition::Spawned
                    }
                    Err(err) => {
                        debug!(comment = %self.comment.id, %err, "edit rejected before sending");
                        Transition::Applied
                    }
                }
            }
            CommentAction::CancelEdit => {
                let Mode::Editing(session) = &mut self.mode else {
                    return Transition::Rejected(Rejection::NotEditing);
                };
                if session.is_saving() {
                    return Transition::Rejected(Rejection::Saving);
                }
                match session.cancel() {
                    CancelOutcome::Reverted => {
                        self.mode = Mode::Viewing;
                        Transition::Applied
                    }
                    CancelOutcome::NeedsConfirmation => Transition::NeedsDiscardConfirmation,
                }
            }
            CommentAction::DiscardEdit => {
                let Mode::Editing(session) = &self.mode else {
                    return Transition::Rejected(Rejection::NotEditing);
                };
                if session.is_saving() {
                    return Transition::Rejected(Rejection::Saving);
                }
                self.mode = Mode::Viewing;
                Transition::Applied
            }
            CommentAction::KeepEditing => {
                let Mode::Editing(session) = &mut self.mode else {
                    return Transition::Rejected(Rejection::NotEditing);
                };
                session.keep_editing();
                Transition::Applied
            }
            CommentAction::RequestDelete => match self.mode {
                Mode::Editing(_) => Transition::Rejected(Rejection::Editing),
                Mode::Deleting(_) => Transition::Rejected(Rejection::Deleting),
                _ if !self.actions_enabled || !self.capabilities.can_delete => {
                    Transition::Rejected(Rejection::NotPermitted)
                }
                _ => {
                    self.popup.close();
                    let flow = DeletionFlow::confirming(&self.view(), self.comment.is_conversation_root);
                    self.mode = Mode::Deleting(flow);
                    Transition::Applied
                }
            },
            CommentAction::ConfirmDelete => {
                let Mode::Deleting(flow) = &mut self.mode else {
                    return Transition::Rejected(Rejection::NotConfirming);
                };
                if !flow.execute() {
                    return Transition::Rejected(Rejection::DeleteInFlight);
                }
                self.spawn_delete();
                Transition::Spawned
            }
            CommentAction::CancelDelete => {
                if !matches!(self.mode, Mode::Deleting(_)) {
                    return Transition::Rejected(Rejection::NotConfirming);
                }
                self.mode = Mode::Viewing;
                Transition::Applied
            }
            CommentAction::React(emoji) => {
                self.reactions.begin(emoji);
                self.spawn_reaction(emoji);
                Transition::Spawned
            }
        }
    }

    /// Applies a mutation result. Results for other comments are ignored.
    pub fn apply(&mut self, resolved: Resolved) {
        if resolved.comment_id != self.comment.id {
            warn!(
                comment = %self.comment.id,
                other = %resolved.comment_id,
                "resolution routed to the wrong comment"
            );
            return;
        }
        if !self.is_live() {
            debug!(comment = %self.comment.id, "resolution after removal ignored");
            return;
        }
        match resolved.resolution {
            Resolution::Reaction { emoji, result } => {
                if let Err(err) = self.reactions.resolve(emoji, result) {
                    warn!(comment = %self.comment.id, %emoji, %err, "reaction failed");
                }
            }
            Resolution::Edit(result) => {
                let Mode::Editing(session) = &mut self.mode else {
                    warn!(comment = %self.comment.id, "edit result without an edit session");
                    return;
                };
                match result {
                    Ok(edited) => {
                        info!(comment = %self.comment.id, "comment edited");
                        self.comment.body = edited.content;
                        self.mode = Mode::Viewing;
                    }
                    Err(MutationError::NotFound) => self.finish(Lifecycle::Gone),
                    Err(err) => {
                        warn!(comment = %self.comment.id, %err, "edit failed");
                        session.fail(&err);
                    }
                }
            }
            Resolution::Delete(result) => {
                let Mode::Deleting(flow) = &mut self.mode else {
                    warn!(comment = %self.comment.id, "delete result without a delete in flight");
                    return;
                };
                match flow.resolve(&result) {
                    DeletionOutcome::Removed => self.finish(Lifecycle::Removed),
                    DeletionOutcome::Gone => self.finish(Lifecycle::Gone),
                    DeletionOutcome::Confirming => {
                        warn!(comment = %self.comment.id, "delete failed");
                    }
                }
            }
        }
    }

    /// Routes a global pointer click to the popup's listener.
    pub fn handle_outside_click(&mut self, at: Position) -> bool {
        self.popup.handle_outside_click(at)
    }

    pub fn set_trigger_area(&mut self, area: Option<Rect>) {
        self.popup.set_trigger(area);
    }

    pub fn set_popup_area(&mut self, area: Option<Rect>) {
        self.popup.set_overlay(area);
    }

    /// Takes a fresh server copy of the comment, reactions included.
    pub fn refresh(&mut self, comment: Comment) {
        if comment.id != self.comment.id {
            return;
        }
        let counts = comment.reactions.clone();
        let ids = comment.reaction_ids.clone();
        self.refresh_content(comment);
        self.reconcile_reactions(counts, ids);
    }

    /// Takes the body and thread position of a fresh server copy and leaves
    /// reactions alone. The body is replaced unless an edit is open.
    pub fn refresh_content(&mut self, comment: Comment) {
        if comment.id != self.comment.id {
            return;
        }
        if !matches!(self.mode, Mode::Editing(_)) {
            self.comment.body = comment.body;
        }
        self.comment.is_conversation_root = comment.is_conversation_root;
    }

    /// Replaces the confirmed reaction counts with a server snapshot. `ids`
    /// lists every stored reaction the counts include.
    pub fn reconcile_reactions(&mut self, counts: HashMap<Emoji, u64>, ids: HashSet<ReactionId>) {
        self.reactions.reconcile(counts.clone(), ids.clone());
        self.comment.reactions = counts;
        self.comment.reaction_ids = ids;
    }

    fn finish(&mut self, lifecycle: Lifecycle) {
        self.popup.close();
        self.mode = match lifecycle {
            Lifecycle::Gone => Mode::Gone,
            _ => Mode::Removed,
        };
        info!(comment = %self.comment.id, ?lifecycle, "comment left the thread");
        if let Some(mut callback) = self.on_removed.take() {
            callback(&self.comment.id);
        }
    }

    fn spawn_reaction(&self, emoji: Emoji) {
        let reaction = NewReaction {
            comment_id: self.comment.id.clone(),
            emoji,
            actor_id: self.actor.clone(),
        };
        let mutations = Arc::clone(&self.mutations);
        let tx = self.resolved_tx.clone();
        tokio::spawn(async move {
            let comment_id = reaction.comment_id.clone();
            let result = mutations.create_reaction(reaction).await;
            send_resolution(&tx, comment_id, Resolution::Reaction { emoji, result }).await;
        });
    }

    fn spawn_edit(&self, new_content: String) {
        let edit = CommentEdit {
            id: self.comment.id.clone(),
            new_content,
        };
        let mutations = Arc::clone(&self.mutations);
        let tx = self.resolved_tx.clone();
        tokio::spawn(async move {
            let comment_id = edit.id.clone();
            let result = mutations.edit_comment(edit).await;
            send_resolution(&tx, comment_id, Resolution::Edit(result)).await;
        });
    }

    fn spawn_delete(&self) {
        let id = self.comment.id.clone();
        let mutations = Arc::clone(&self.mutations);
        let tx = self.resolved_tx.clone();
        tokio::spawn(async move {
            let result = mutations.delete_comment(id.clone()).await;
            send_resolution(&tx, id, Resolution::Delete(result)).await;
        });
    }
}

async fn send_resolution(tx: &Sender<Resolved>, comment_id: CommentId, resolution: Resolution) {
    let resolved = Resolved {
        comment_id,
        resolution,
    };
    if let Err(err) = tx.send(resolved).await {
        warn!(comment = %err.0.comment_id, "resolution dropped, receiver closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::testing::{Call, Harness, sample_comment};

    fn owner() -> Capabilities {
        Capabilities {
            can_edit: true,
            can_delete: true,
        }
    }

    #[tokio::test]
    async fn begin_edit_is_rejected_while_confirming_delete() {
        let mut h = Harness::new(sample_comment("c1", false), owner());
        assert_eq!(h.controller.dispatch(CommentAction::RequestDelete), Transition::Applied);
        let before = h.controller.state();

        let t = h.controller.dispatch(CommentAction::BeginEdit);
        assert_eq!(t, Transition::Rejected(Rejection::Deleting));
        assert_eq!(h.controller.state(), before);
    }

    #[tokio::test]
    async fn request_delete_is_rejected_while_editing() {
        let mut h = Harness::new(sample_comment("c1", false), owner());
        h.controller.dispatch(CommentAction::BeginEdit);
        h.controller.dispatch(CommentAction::EditDraft("draft".into()));
        let before = h.controller.state();

        let t = h.controller.dispatch(CommentAction::RequestDelete);
        assert_eq!(t, Transition::Rejected(Rejection::Editing));
        assert_eq!(h.controller.state(), before);
    }

    #[tokio::test]
    async fn entering_edit_closes_popup() {
        let mut h = Harness::new(sample_comment("c1", false), owner());
        h.controller.dispatch(CommentAction::OpenPopup);
        assert!(h.controller.state().popup_open);
        assert_eq!(h.listeners.active(), 1);

        h.controller.dispatch(CommentAction::BeginEdit);
        let state = h.controller.state();
        assert!(state.editing);
        assert!(!state.popup_open);
        assert_eq!(h.listeners.active(), 0);
        assert!(!h.controller.has_actions());
        assert_eq!(
            h.controller.dispatch(CommentAction::OpenPopup),
            Transition::Rejected(Rejection::NotPermitted)
        );
    }

    #[tokio::test]
    async fn capabilities_gate_actions() {
        let mut h = Harness::new(sample_comment("c1", false), Capabilities::NONE);
        assert!(!h.controller.has_actions());
        assert!(h.controller.dispatch(CommentAction::TogglePopup).is_rejected());
        assert!(h.controller.dispatch(CommentAction::BeginEdit).is_rejected());
        assert!(h.controller.dispatch(CommentAction::RequestDelete).is_rejected());

        let edit_only = Capabilities {
            can_edit: true,
            can_delete: false,
        };
        let mut h = Harness::new(sample_comment("c2", false), edit_only);
        assert_eq!(
            h.controller.dispatch(CommentAction::RequestDelete),
            Transition::Rejected(Rejection::NotPermitted)
        );
        assert_eq!(h.controller.dispatch(CommentAction::BeginEdit), Transition::Applied);
    }

    #[tokio::test]
    async fn without_actions_disables_everything_but_reactions() {
        let mut h = Harness::with_controller(sample_comment("c1", false), owner(), |c| {
            c.without_actions()
        });
        assert!(!h.controller.has_actions());
        assert!(h.controller.dispatch(CommentAction::BeginEdit).is_rejected());
        assert!(h.controller.dispatch(CommentAction::RequestDelete).is_rejected());
        assert_eq!(
            h.controller.dispatch(CommentAction::React(Emoji::Eyes)),
            Transition::Spawned
        );
    }

    #[tokio::test]
    async fn dirty_cancel_needs_confirmation() {
        let mut h = Harness::new(sample_comment("c1", false), owner());
        h.controller.dispatch(CommentAction::BeginEdit);
        assert_eq!(h.controller.dispatch(CommentAction::CancelEdit), Transition::Applied);
        assert!(!h.controller.state().editing);

        h.controller.dispatch(CommentAction::BeginEdit);
        h.controller.dispatch(CommentAction::EditDraft("changed".into()));
        assert_eq!(
            h.controller.dispatch(CommentAction::CancelEdit),
            Transition::NeedsDiscardConfirmation
        );
        let state = h.controller.state();
        assert!(state.editing);
        assert!(state.discard_prompt);

        h.controller.dispatch(CommentAction::KeepEditing);
        assert!(!h.controller.state().discard_prompt);

        h.controller.dispatch(CommentAction::CancelEdit);
        assert_eq!(h.controller.dispatch(CommentAction::DiscardEdit), Transition::Applied);
        assert!(!h.controller.state().editing);
        assert_eq!(h.controller.comment().body, sample_comment("c1", false).body);
    }

    #[tokio::test]
    async fn successful_edit_replaces_body() {
        let mut h = Harness::new(sample_comment("c1", false), owner());
        h.controller.dispatch(CommentAction::BeginEdit);
        assert_eq!(
            h.controller.dispatch(CommentAction::CommitEdit("fresh".into())),
            Transition::Spawned
        );
        assert!(h.controller.state().saving);
        assert_eq!(
            h.controller.dispatch(CommentAction::CommitEdit("again".into())),
            Transition::Rejected(Rejection::Saving)
        );
        assert!(h.controller.dispatch(CommentAction::CancelEdit).is_rejected());

        let Call::Edit { request, reply } = h.next_call().await else {
            panic!("expected an edit call");
        };
        assert_eq!(request.new_content, "fresh");
        reply
            .send(Ok(crate::comment::mutation::EditedComment {
                id: request.id,
                content: "fresh".into(),
            }))
            .expect("reply");
        h.settle().await;

        let state = h.controller.state();
        assert!(!state.editing);
        assert_eq!(h.controller.comment().body, "fresh");
        assert!(h.controller.has_actions());
    }

    #[tokio::test]
    async fn blank_commit_is_not_sent() {
        let mut h = Harness::new(sample_comment("c1", false), owner());
        h.controller.dispatch(CommentAction::BeginEdit);
        assert_eq!(
            h.controller.dispatch(CommentAction::CommitEdit("  ".into())),
            Transition::Applied
        );
        let state = h.controller.state();
        assert!(state.editing);
        assert!(!state.saving);
        assert_eq!(state.edit_error.as_deref(), Some(crate::comment::edit::EMPTY_BODY));
        assert!(h.calls.try_recv().is_err());
    }

    #[tokio::test]
    async fn delete_in_flight_blocks_everything() {
        let mut h = Harness::new(sample_comment("c1", false), owner());
        h.controller.dispatch(CommentAction::RequestDelete);
        assert_eq!(h.controller.dispatch(CommentAction::ConfirmDelete), Transition::Spawned);
        assert_eq!(h.controller.state().deletion, DeletionPhase::InFlight);

        for action in [
            CommentAction::CancelDelete,
            CommentAction::ConfirmDelete,
            CommentAction::BeginEdit,
            CommentAction::OpenPopup,
            CommentAction::React(Emoji::Heart),
        ] {
            assert_eq!(
                h.controller.dispatch(action),
                Transition::Rejected(Rejection::DeleteInFlight)
            );
        }

        let Call::Delete { id, reply } = h.next_call().await else {
            panic!("expected a delete call");
        };
        reply
            .send(Err(MutationError::Network("502".into())))
            .expect("reply");
        h.settle().await;

        let state = h.controller.state();
        assert_eq!(state.deletion, DeletionPhase::Confirming);
        assert_eq!(state.delete_error.as_deref(), Some("network error: 502"));
        assert_eq!(id, CommentId::from("c1"));
        assert!(h.removed().is_empty());

        assert_eq!(h.controller.dispatch(CommentAction::CancelDelete), Transition::Applied);
        assert_eq!(h.controller.state().deletion, DeletionPhase::Idle);
    }

    #[tokio::test]
    async fn edit_not_found_is_terminal() {
        let mut h = Harness::new(sample_comment("c1", false), owner());
        h.controller.dispatch(CommentAction::BeginEdit);
        h.controller.dispatch(CommentAction::CommitEdit("late".into()));
        let Call::Edit { reply, .. } = h.next_call().await else {
            panic!("expected an edit call");
        };
        reply.send(Err(MutationError::NotFound)).expect("reply");
        h.settle().await;

        let state = h.controller.state();
        assert_eq!(state.lifecycle, Lifecycle::Gone);
        assert!(!state.editing);
        assert_eq!(h.removed(), vec![CommentId::from("c1")]);
        assert_eq!(
            h.controller.dispatch(CommentAction::BeginEdit),
            Transition::Rejected(Rejection::Inactive)
        );
    }

    #[tokio::test]
    async fn dropping_controller_releases_popup_listener() {
        let mut h = Harness::new(sample_comment("c1", false), owner());
        h.controller.dispatch(CommentAction::TogglePopup);
        assert_eq!(h.listeners.active(), 1);
        let listeners = h.listeners.clone();
        drop(h);
        assert_eq!(listeners.active(), 0);
    }

    #[tokio::test]
    async fn refresh_reconciles_reactions_and_body() {
        let mut h = Harness::new(sample_comment("c1", false), owner());
        h.controller.dispatch(CommentAction::React(Emoji::Rocket));
        let Call::React { reply, .. } = h.next_call().await else {
            panic!("expected a reaction call");
        };
        reply
            .send(Ok(crate::comment::mutation::ReactionId("r1".into())))
            .expect("reply");
        h.settle().await;
        assert_eq!(h.controller.reactions().count(Emoji::Rocket), 1);

        let mut fresh = sample_comment("c1", false);
        fresh.body = "server body".into();
        fresh.reactions.insert(Emoji::Rocket, 1);
        fresh
            .reaction_ids
            .insert(crate::comment::mutation::ReactionId("r1".into()));
        h.controller.refresh(fresh);
        assert_eq!(h.controller.reactions().count(Emoji::Rocket), 1);
        assert!(h.controller.state().local_reaction_overlay.is_empty());
        assert_eq!(h.controller.comment().body, "server body");
    }

    #[tokio::test]
    async fn refresh_content_leaves_reactions() {
        let mut h = Harness::new(sample_comment("c1", false), owner());
        let mut fresh = sample_comment("c1", true);
        fresh.body = "server body".into();
        fresh.reactions.clear();
        h.controller.refresh_content(fresh);
        assert_eq!(h.controller.comment().body, "server body");
        assert!(h.controller.comment().is_conversation_root);
        assert_eq!(h.controller.reactions().count(Emoji::ThumbsUp), 2);
    }
}
