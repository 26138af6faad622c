use async_trait::async_trait;
use ratatui::buffer::Buffer;

use crate::errors::AppError;
use crate::ui::{Action, layout::Layout};

pub mod comment_card;
pub mod help;
pub mod status_bar;
pub mod thread_view;

/// A widget that only reacts to actions and never takes input.
#[async_trait(?Send)]
pub trait DumbComponent {
    fn render(&mut self, area: Layout, buf: &mut Buffer);
    async fn handle_event(&mut self, event: Action) -> Result<(), AppError> {
        let _ = event;
        Ok(())
    }
}

#[async_trait(?Send)]
pub trait Component {
    fn render(&mut self, area: Layout, buf: &mut Buffer);
    fn register_action_tx(&mut self, action_tx: tokio::sync::mpsc::Sender<Action>) {
        let _ = action_tx;
    }
    async fn handle_event(&mut self, event: Action) -> Result<(), AppError> {
        let _ = event;
        Ok(())
    }
    fn cursor(&self) -> Option<(u16, u16)> {
        None
    }
    fn is_animating(&self) -> bool {
        false
    }
    /// While `true` global shortcuts such as `q` are typed into the
    /// component instead.
    fn captures_input(&self) -> bool {
        false
    }
    fn set_global_help(&self) {}
}
