//! One comment drawn as a bordered card: author and date in the title,
//! the actions trigger on the top border, wrapped body, reaction chips.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, BorderType, Padding, Paragraph, Widget},
};
use textwrap::core::display_width;

use crate::comment::{CommentView, DeletionPhase, InteractionState, Lifecycle};

pub const ACTIONS_TRIGGER: &str = "[⋯]";

/// Where the parts of a rendered card ended up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardAreas {
    pub trigger: Option<Rect>,
    pub body: Rect,
}

pub struct CommentCard<'a> {
    view: &'a CommentView,
    state: Option<&'a InteractionState>,
    selected: bool,
    is_viewer: bool,
    editor_rows: Option<u16>,
}

impl<'a> CommentCard<'a> {
    pub fn new(view: &'a CommentView) -> Self {
        Self {
            view,
            state: None,
            selected: false,
            is_viewer: false,
            editor_rows: None,
        }
    }

    pub fn state(self, state: &'a InteractionState) -> Self {
        Self {
            state: Some(state),
            ..self
        }
    }

    pub fn selected(self, selected: bool) -> Self {
        Self { selected, ..self }
    }

    pub fn is_viewer(self, is_viewer: bool) -> Self {
        Self { is_viewer, ..self }
    }

    /// Leaves `rows` blank body rows for an editor drawn on top.
    pub fn editor_rows(self, rows: u16) -> Self {
        Self {
            editor_rows: Some(rows),
            ..self
        }
    }

    fn shows_trigger(&self) -> bool {
        self.view.has_actions()
            && self
                .state
                .is_none_or(|s| !s.editing && s.deletion == DeletionPhase::Idle && s.lifecycle == Lifecycle::Live)
    }

    fn body_lines(&self, width: u16) -> Vec<Line<'static>> {
        if self.view.body.trim().is_empty() {
            return vec![Line::from("(empty)".dim())];
        }
        let mut lines: Vec<Line<'static>> = self
            .view
            .body
            .lines()
            .flat_map(|line| {
                let wrapped = textwrap::wrap(line, usize::from(width.max(1)));
                if wrapped.is_empty() {
                    vec![Line::default()]
                } else {
                    wrapped
                        .into_iter()
                        .map(|part| Line::from(part.into_owned()))
                        .collect()
                }
            })
            .collect();
        if let Some(max) = self.view.max_height.map(usize::from)
            && lines.len() > max
        {
            lines.truncate(max.max(1));
            if let Some(last) = lines.last_mut() {
                *last = Line::from("…".dim());
            }
        }
        lines
    }

    fn footer_lines(&self) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        let pending = self.state.map_or(0, |s| s.pending_reactions);
        if !self.view.reactions.is_empty() || pending > 0 {
            let mut spans = Vec::new();
            for (idx, (emoji, count)) in self.view.reactions.iter().enumerate() {
                if idx != 0 {
                    spans.push(Span::raw("  "));
                }
                spans.push(Span::styled(
                    format!("{emoji} {count}"),
                    Style::new().fg(Color::Yellow),
                ));
            }
            if pending > 0 {
                if !spans.is_empty() {
                    spans.push(Span::raw("  "));
                }
                spans.push(Span::styled("sending…", Style::new().dim()));
            }
            lines.push(Line::from(spans));
        }
        if let Some(status) = self.status_line() {
            lines.push(status);
        }
        lines
    }

    fn status_line(&self) -> Option<Line<'static>> {
        let state = self.state?;
        let error = Style::new().fg(Color::Red);
        if state.lifecycle == Lifecycle::Gone {
            return Some(Line::styled("This comment no longer exists.", error));
        }
        if state.deletion == DeletionPhase::InFlight {
            return Some(Line::styled("Deleting…", Style::new().dim()));
        }
        if state.saving {
            return Some(Line::styled("Saving…", Style::new().dim()));
        }
        if let Some(err) = &state.edit_error {
            return Some(Line::styled(err.clone(), error));
        }
        state
            .reaction_error
            .as_ref()
            .map(|err| Line::styled(format!("Reaction failed: {err}"), error))
    }

    fn inner_width(width: u16) -> u16 {
        width.saturating_sub(4)
    }

    pub fn height(&self, width: u16) -> u16 {
        let body = match self.editor_rows {
            Some(rows) => usize::from(rows),
            None => self.body_lines(Self::inner_width(width)).len(),
        };
        let rows = body + self.footer_lines().len() + 2;
        u16::try_from(rows).unwrap_or(u16::MAX)
    }

    pub fn render(self, area: Rect, buf: &mut Buffer) -> CardAreas {
        let author_style = if self.is_viewer {
            Style::new().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::new().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        };
        let border_style = if self.selected {
            Style::new().fg(Color::Cyan)
        } else {
            Style::new().fg(Color::DarkGray)
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .padding(Padding::horizontal(1))
            .title_top(Line::from(vec![
                Span::styled(self.view.author.name.clone(), author_style),
                Span::raw("  "),
                Span::styled(self.view.posted_on(), Style::new().dim()),
            ]));
        let inner = block.inner(area);
        block.render(area, buf);

        let footer = self.footer_lines();
        let footer_rows = u16::try_from(footer.len()).unwrap_or(0).min(inner.height);
        let body = Rect {
            height: inner.height.saturating_sub(footer_rows),
            ..inner
        };
        let footer_area = Rect {
            y: body.bottom(),
            height: footer_rows,
            ..inner
        };
        if self.editor_rows.is_none() {
            Paragraph::new(self.body_lines(inner.width)).render(body, buf);
        }
        Paragraph::new(footer).render(footer_area, buf);

        let trigger = if self.shows_trigger() {
            let width = u16::try_from(display_width(ACTIONS_TRIGGER)).unwrap_or(3);
            let x = area.right().saturating_sub(width + 2);
            (x > area.x && area.height > 0).then(|| {
                let trigger = Rect::new(x, area.y, width, 1);
                Line::styled(ACTIONS_TRIGGER, Style::new().bold()).render(trigger, buf);
                trigger
            })
        } else {
            None
        };

        if self.state.is_some_and(|s| s.deletion == DeletionPhase::InFlight) {
            buf.set_style(area, Style::new().add_modifier(Modifier::DIM));
        }
        CardAreas { trigger, body }
    }
}
