use async_trait::async_trait;
use rat_widget::statusline_stacked::StatusLineStacked;
use ratatui::buffer::Buffer;
use ratatui::style::{Style, Stylize};
use ratatui::widgets::Widget;
use ratatui_macros::span;

use crate::errors::AppError;
use crate::ui::components::DumbComponent;
use crate::ui::{Action, layout::Layout};

pub struct StatusBar {
    viewer_label: String,
    source_label: String,
    message: Option<String>,
    comment_count: usize,
}

impl StatusBar {
    pub fn new(viewer: &str, source: &str) -> Self {
        Self {
            viewer_label: format!(" Reacting as {viewer} "),
            source_label: format!(" {source} "),
            message: None,
            comment_count: 0,
        }
    }

    pub fn render(&mut self, area: Layout, buf: &mut Buffer) {
        let count_text = format!(" Comments: {} ", self.comment_count);
        let mut line = StatusLineStacked::new()
            .start(
                span!(self.viewer_label.as_str()).style(Style::new().black().on_green()),
                " ",
            )
            .start(span!(self.source_label.as_str()), " ");
        if let Some(message) = &self.message {
            line = line.start(span!(message.as_str()).style(Style::new().yellow()), " ");
        }
        line.end(span!(count_text).style(Style::new().black().on_blue()), " ")
            .render(area.status_bar, buf);
    }
}

#[async_trait(?Send)]
impl DumbComponent for StatusBar {
    fn render(&mut self, area: Layout, buf: &mut Buffer) {
        self.render(area, buf);
    }

    async fn handle_event(&mut self, event: Action) -> Result<(), AppError> {
        match event {
            Action::Status(message) => self.message = Some(message),
            Action::CommentCount(count) => self.comment_count = count,
            Action::ReloadFailed(message) => self.message = Some(message),
            _ => {}
        }
        Ok(())
    }
}
