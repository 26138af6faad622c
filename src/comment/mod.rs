//! The interactive comment: reactions, action popup, inline edit and
//! two-phase delete, arbitrated by [`CommentController`].

pub mod controller;
pub mod deletion;
pub mod edit;
pub mod model;
pub mod mutation;
pub mod pointer;
pub mod popup;
pub mod reactions;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{
    Collaborators, CommentAction, CommentController, InteractionState, Lifecycle, Rejection,
    Transition,
};
pub use deletion::{DeletionFlow, DeletionPhase};
pub use edit::EditSession;
pub use model::{ActorId, Author, Capabilities, Comment, CommentId, CommentView, Emoji};
pub use mutation::{CommentMutations, MutationError, Resolution, Resolved};
pub use pointer::PointerListeners;
pub use popup::PopupController;
pub use reactions::ReactionTally;
