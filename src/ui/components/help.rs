use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BlockExt, BorderType, Clear, Widget},
};
use textwrap::core::display_width;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpElementKind {
    Keybind(&'static str, &'static str),
    Text(&'static str),
}

#[macro_export]
macro_rules! help_keybind {
    ($key:expr, $description:expr) => {
        $crate::ui::components::help::HelpElementKind::Keybind($key, $description)
    };
}

#[macro_export]
macro_rules! help_text {
    ($text:expr) => {
        $crate::ui::components::help::HelpElementKind::Text($text)
    };
}

/// Lays the elements out for `width` columns: keys left, descriptions
/// right-aligned, free text wrapped and centered.
pub fn help_elements_to_text(elements: &[HelpElementKind], width: u16) -> Text<'static> {
    let width = usize::from(width);
    let mut lines = Vec::with_capacity(elements.len());
    for element in elements {
        match element {
            HelpElementKind::Keybind(key, description) => {
                let used = display_width(key) + display_width(description);
                let padding = width.saturating_sub(used).max(1);
                lines.push(Line::from(vec![
                    Span::styled(
                        *key,
                        Style::new().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(" ".repeat(padding)),
                    Span::raw(*description),
                ]));
            }
            HelpElementKind::Text(text) => {
                lines.extend(
                    textwrap::wrap(text, width.max(1))
                        .into_iter()
                        .map(|line| Line::from(line.into_owned()).centered()),
                );
            }
        }
    }
    Text::from(lines)
}

/// Modal listing the keybindings of the current screen.
pub struct HelpComponent<'a> {
    content: &'a [HelpElementKind],
    width_percent: u16,
    block: Option<Block<'a>>,
}

impl<'a> HelpComponent<'a> {
    pub fn new(content: &'a [HelpElementKind]) -> Self {
        Self {
            content,
            width_percent: 50,
            block: Some(
                Block::bordered()
                    .title("Help")
                    .border_type(BorderType::Rounded),
            ),
        }
    }

    pub fn width_percent(self, width_percent: u16) -> Self {
        Self {
            width_percent: width_percent.clamp(10, 100),
            ..self
        }
    }

    pub fn block(self, block: Block<'a>) -> Self {
        Self {
            block: Some(block),
            ..self
        }
    }
}

impl Widget for HelpComponent<'_> {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        let outer_width = area.width * self.width_percent / 100;
        let inner_width = outer_width.saturating_sub(2);
        let text = help_elements_to_text(self.content, inner_width);
        let height = u16::try_from(text.height())
            .unwrap_or(u16::MAX)
            .saturating_add(2)
            .min(area.height);
        let modal = area.centered(Constraint::Length(outer_width), Constraint::Length(height));
        Clear.render(modal, buf);
        let inner = self.block.inner_if_some(modal);
        self.block.render(modal, buf);
        text.render(inner, buf);
    }
}
