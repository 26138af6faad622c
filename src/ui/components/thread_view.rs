use std::sync::Arc;

use async_trait::async_trait;
use crossterm::event::{self, MouseButton, MouseEvent, MouseEventKind};
use rat_cursor::HasScreenCursor;
use rat_widget::{
    event::{HandleEvent, Regular, TextOutcome, ct_event},
    textarea::{TextArea, TextAreaState, TextWrap},
};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Position, Rect, Size},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, BorderType, Clear, Paragraph, StatefulWidget, Widget, Wrap},
};
use throbber_widgets_tui::{BRAILLE_SIX_DOUBLE, Throbber, ThrobberState, WhichUse};
use tracing::{debug, info, instrument};

use crate::{
    comment::{
        ActorId, Capabilities, Collaborators, CommentAction, CommentId, CommentView, Emoji,
        InteractionState, Transition,
    },
    errors::AppError,
    help_keybind, help_text,
    thread::{LoadedThread, Thread, ThreadSource},
    ui::{
        Action,
        components::{
            Component,
            comment_card::{CardAreas, CommentCard},
            help::HelpElementKind,
        },
        layout::Layout,
    },
};

pub const HELP: &[HelpElementKind] = &[
    help_text!("Conversation"),
    help_keybind!("Up/Down, j/k", "select comment"),
    help_keybind!("Enter, click [⋯]", "comment actions"),
    help_keybind!("e", "edit comment"),
    help_keybind!("d", "delete comment"),
    help_keybind!("r", "react"),
    help_keybind!("Ctrl+S", "save edit"),
    help_keybind!("Esc", "cancel or close"),
    help_keybind!("R", "reload thread"),
    help_keybind!("q", "quit"),
];

pub const POPUP_TITLE: &str = "Comment Actions";
const POPUP_WIDTH: u16 = 22;
const PICKER_CELL: u16 = 5;
const DISCARD_PROMPT: &str = "Discard unsaved changes?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    Edit,
    Delete,
}

impl MenuItem {
    fn label(self) -> &'static str {
        match self {
            MenuItem::Edit => "Edit",
            MenuItem::Delete => "Delete",
        }
    }

    fn action(self) -> CommentAction {
        match self {
            MenuItem::Edit => CommentAction::BeginEdit,
            MenuItem::Delete => CommentAction::RequestDelete,
        }
    }
}

fn menu_items(capabilities: Capabilities) -> Vec<MenuItem> {
    let mut items = Vec::with_capacity(2);
    if capabilities.can_edit {
        items.push(MenuItem::Edit);
    }
    if capabilities.can_delete {
        items.push(MenuItem::Delete);
    }
    items
}

/// Reaction picker over one comment, two rows of four.
#[derive(Debug, Clone)]
struct Picker {
    comment: CommentId,
    row: usize,
    col: usize,
}

impl Picker {
    fn new(comment: CommentId) -> Self {
        Self {
            comment,
            row: 0,
            col: 0,
        }
    }

    fn row_of(row: usize) -> [Emoji; 4] {
        if row == 0 {
            Emoji::FIRST_ROW
        } else {
            Emoji::SECOND_ROW
        }
    }

    fn emoji(&self) -> Emoji {
        Self::row_of(self.row)[self.col.min(3)]
    }

    fn size() -> Size {
        Size::new(PICKER_CELL * 4 + 2, 4)
    }
}

/// Snapshot of one controller taken before drawing.
struct Entry {
    id: CommentId,
    view: CommentView,
    state: InteractionState,
    is_viewer: bool,
    editor_rows: Option<u16>,
}

impl Entry {
    fn card(&self, selected: bool) -> CommentCard<'_> {
        let card = CommentCard::new(&self.view)
            .state(&self.state)
            .selected(selected)
            .is_viewer(self.is_viewer);
        match self.editor_rows {
            Some(rows) => card.editor_rows(rows),
            None => card,
        }
    }
}

/// The conversation screen: every comment as a card, plus the overlays a
/// comment can open.
pub struct ThreadView {
    action_tx: Option<tokio::sync::mpsc::Sender<Action>>,
    source: Arc<dyn ThreadSource>,
    thread: Thread,
    viewer: ActorId,
    selected: usize,
    offset: usize,
    menu_selected: usize,
    picker: Option<Picker>,
    picker_area: Option<Rect>,
    editing: Option<CommentId>,
    editor: TextAreaState,
    card_areas: Vec<(CommentId, Rect)>,
    throbber_state: ThrobberState,
    reloading: bool,
}

impl ThreadView {
    pub fn new(
        loaded: LoadedThread,
        collaborators: Collaborators,
        source: Arc<dyn ThreadSource>,
    ) -> Self {
        let viewer = loaded.viewer.clone();
        Self {
            action_tx: None,
            source,
            thread: Thread::new(loaded, collaborators),
            viewer,
            selected: 0,
            offset: 0,
            menu_selected: 0,
            picker: None,
            picker_area: None,
            editing: None,
            editor: TextAreaState::new(),
            card_areas: Vec::new(),
            throbber_state: ThrobberState::default(),
            reloading: false,
        }
    }

    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    fn selected_id(&self) -> Option<CommentId> {
        self.thread
            .controllers()
            .get(self.selected)
            .map(|c| c.id().clone())
    }

    fn deleting_id(&self) -> Option<CommentId> {
        self.thread
            .controllers()
            .iter()
            .find(|c| c.deletion().is_some())
            .map(|c| c.id().clone())
    }

    fn popup_id(&self) -> Option<CommentId> {
        self.thread
            .controllers()
            .iter()
            .find(|c| c.popup().is_open())
            .map(|c| c.id().clone())
    }

    fn discard_prompt_open(&self) -> bool {
        self.editing
            .as_ref()
            .and_then(|id| self.thread.get(id))
            .and_then(|c| c.edit_session())
            .is_some_and(|session| session.discard_prompt())
    }

    async fn notify(&self, action: Action) {
        if let Some(tx) = &self.action_tx {
            let _ = tx.send(action).await;
        }
    }

    async fn dispatch(&mut self, id: &CommentId, action: CommentAction) -> Option<Transition> {
        let transition = self.thread.dispatch(id, action)?;
        if let Transition::Rejected(rejection) = transition {
            self.notify(Action::Status(rejection.to_string())).await;
        }
        self.sync_editor();
        Some(transition)
    }

    /// Keeps the text editor attached to whichever comment has an open
    /// edit session.
    fn sync_editor(&mut self) {
        if let Some(id) = &self.editing
            && self
                .thread
                .get(id)
                .is_none_or(|c| c.edit_session().is_none())
        {
            debug!(comment = %id, "editor detached");
            self.editing = None;
            self.editor.focus.set(false);
        }
        if self.editing.is_none()
            && let Some(controller) = self
                .thread
                .controllers()
                .iter()
                .find(|c| c.edit_session().is_some())
        {
            let draft = controller
                .edit_session()
                .map(|s| s.draft().to_string())
                .unwrap_or_default();
            self.editing = Some(controller.id().clone());
            self.editor.set_text(&draft);
            self.editor.focus.set(true);
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.thread.len();
        self.selected = self.selected.min(len.saturating_sub(1));
        self.offset = self.offset.min(self.selected);
    }

    fn move_selection(&mut self, down: bool) {
        let len = self.thread.len();
        if len == 0 {
            return;
        }
        self.selected = if down {
            (self.selected + 1).min(len - 1)
        } else {
            self.selected.saturating_sub(1)
        };
    }

    fn reload(&mut self) {
        if self.reloading {
            return;
        }
        let Some(action_tx) = self.action_tx.clone() else {
            return;
        };
        self.reloading = true;
        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            let action = match source.load_thread().await {
                Ok(loaded) => Action::ThreadReloaded(loaded),
                Err(err) => Action::ReloadFailed(err.to_string().replace('\n', " ")),
            };
            let _ = action_tx.send(action).await;
        });
    }

    async fn activate(&mut self, id: &CommentId, item: MenuItem) {
        self.menu_selected = 0;
        if self.dispatch(id, item.action()).await.is_some()
            && item == MenuItem::Edit
            && self.editing.is_some()
        {
            self.notify(Action::Status(
                "Editing: Ctrl+S to save, Esc to cancel".to_string(),
            ))
            .await;
        }
    }

    #[instrument(skip(self))]
    async fn handle_click(&mut self, at: Position) {
        if let Some(id) = self.popup_id()
            && let Some(controller) = self.thread.get(&id)
            && let Some(overlay) = controller.popup().overlay()
            && overlay.contains(at)
        {
            let items = menu_items(controller.capabilities());
            let row = usize::from(at.y.saturating_sub(overlay.y)).checked_sub(1);
            if let Some(item) = row.and_then(|row| items.get(row).copied()) {
                self.activate(&id, item).await;
            }
            return;
        }
        if let (Some(picker), Some(area)) = (self.picker.clone(), self.picker_area)
            && area.contains(at)
        {
            let col = usize::from(at.x.saturating_sub(area.x + 1) / PICKER_CELL);
            let row = usize::from(at.y.saturating_sub(area.y + 1));
            if row < 2 && col < 4 {
                self.picker = None;
                let emoji = Picker::row_of(row)[col];
                self.dispatch(&picker.comment, CommentAction::React(emoji))
                    .await;
            }
            return;
        }
        self.picker = None;
        let closed = self.thread.handle_outside_click(at);
        if closed > 0 {
            debug!(closed, "popups closed by outside click");
        }
        if self.deleting_id().is_some() || self.editing.is_some() {
            return;
        }
        let hit = self
            .thread
            .controllers()
            .iter()
            .position(|c| c.popup().trigger().is_some_and(|t| t.contains(at)));
        if let Some(index) = hit {
            self.selected = index;
            self.menu_selected = 0;
            if let Some(id) = self.selected_id() {
                self.dispatch(&id, CommentAction::TogglePopup).await;
            }
            return;
        }
        let card = self
            .card_areas
            .iter()
            .find(|(_, area)| area.contains(at))
            .and_then(|(id, _)| self.thread.position(id));
        if let Some(index) = card {
            self.selected = index;
        }
    }

    async fn handle_delete_modal(&mut self, id: &CommentId, event: &event::Event) {
        match event {
            ct_event!(keycode press Enter) | ct_event!(key press 'y') => {
                self.dispatch(id, CommentAction::ConfirmDelete).await;
            }
            ct_event!(keycode press Esc) | ct_event!(key press 'n') => {
                self.dispatch(id, CommentAction::CancelDelete).await;
            }
            _ => {}
        }
    }

    async fn handle_editor(&mut self, id: &CommentId, event: &event::Event) {
        if self.discard_prompt_open() {
            match event {
                ct_event!(key press 'y') => {
                    self.dispatch(id, CommentAction::DiscardEdit).await;
                }
                ct_event!(key press 'n') | ct_event!(keycode press Esc) => {
                    self.dispatch(id, CommentAction::KeepEditing).await;
                }
                _ => {}
            }
            return;
        }
        match event {
            ct_event!(keycode press Esc) => {
                self.dispatch(id, CommentAction::CancelEdit).await;
            }
            ct_event!(key press CONTROL-'s')
            | ct_event!(keycode press CONTROL-Enter)
            | ct_event!(keycode press ALT-Enter) => {
                let text = self.editor.text();
                self.dispatch(id, CommentAction::CommitEdit(text)).await;
            }
            event::Event::Key(_) => {
                if self.editor.handle(event, Regular) == TextOutcome::TextChanged {
                    let text = self.editor.text();
                    self.dispatch(id, CommentAction::EditDraft(text)).await;
                }
            }
            _ => {}
        }
    }

    async fn handle_picker(&mut self, event: &event::Event) {
        let Some(picker) = &mut self.picker else {
            return;
        };
        match event {
            ct_event!(keycode press Left) => picker.col = picker.col.saturating_sub(1),
            ct_event!(keycode press Right) => picker.col = (picker.col + 1).min(3),
            ct_event!(keycode press Up) => picker.row = 0,
            ct_event!(keycode press Down) => picker.row = 1,
            ct_event!(keycode press Esc) => self.picker = None,
            ct_event!(keycode press Enter) => {
                let emoji = picker.emoji();
                let id = picker.comment.clone();
                self.picker = None;
                self.dispatch(&id, CommentAction::React(emoji)).await;
            }
            _ => {}
        }
    }

    async fn handle_popup(&mut self, id: &CommentId, event: &event::Event) {
        let items = self
            .thread
            .get(id)
            .map(|c| menu_items(c.capabilities()))
            .unwrap_or_default();
        match event {
            ct_event!(keycode press Up) | ct_event!(key press 'k') => {
                self.menu_selected = self.menu_selected.saturating_sub(1);
            }
            ct_event!(keycode press Down) | ct_event!(key press 'j') => {
                self.menu_selected = (self.menu_selected + 1).min(items.len().saturating_sub(1));
            }
            ct_event!(keycode press Enter) => {
                if let Some(item) = items.get(self.menu_selected).copied() {
                    self.activate(id, item).await;
                }
            }
            ct_event!(keycode press Esc) => {
                self.dispatch(id, CommentAction::ClosePopup).await;
            }
            ct_event!(key press 'e') => self.activate(id, MenuItem::Edit).await,
            ct_event!(key press 'd') => self.activate(id, MenuItem::Delete).await,
            _ => {}
        }
    }

    async fn handle_key(&mut self, event: &event::Event) {
        let Some(id) = self.selected_id() else {
            if let event::Event::Key(key) = event
                && key.code == event::KeyCode::Char('R')
            {
                self.reload();
            }
            return;
        };
        match event {
            ct_event!(keycode press Up) | ct_event!(key press 'k') => self.move_selection(false),
            ct_event!(keycode press Down) | ct_event!(key press 'j') => self.move_selection(true),
            ct_event!(keycode press Enter) | ct_event!(key press 'a') => {
                self.menu_selected = 0;
                self.dispatch(&id, CommentAction::TogglePopup).await;
            }
            ct_event!(key press 'e') => self.activate(&id, MenuItem::Edit).await,
            ct_event!(key press 'd') => self.activate(&id, MenuItem::Delete).await,
            ct_event!(key press 'r') => {
                if self.thread.get(&id).is_some_and(|c| c.is_live()) {
                    self.picker = Some(Picker::new(id));
                }
            }
            event::Event::Key(key) if key.code == event::KeyCode::Char('R') => self.reload(),
            _ => {}
        }
    }

    async fn handle_app_event(&mut self, event: &event::Event) {
        if let event::Event::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            ..
        }) = event
        {
            self.handle_click(Position::new(*column, *row)).await;
            return;
        }
        if let Some(id) = self.deleting_id() {
            self.handle_delete_modal(&id, event).await;
        } else if let Some(id) = self.editing.clone() {
            self.handle_editor(&id, event).await;
        } else if self.picker.is_some() {
            self.handle_picker(event).await;
        } else if let Some(id) = self.popup_id() {
            self.handle_popup(&id, event).await;
        } else {
            self.handle_key(event).await;
        }
    }

    async fn apply_resolution(&mut self, resolved: crate::comment::Resolved) {
        let excised = self.thread.apply(resolved);
        self.sync_editor();
        if excised.is_empty() {
            return;
        }
        info!(count = excised.len(), "comments excised");
        if self
            .picker
            .as_ref()
            .is_some_and(|p| excised.contains(&p.comment))
        {
            self.picker = None;
        }
        self.clamp_selection();
        let message = if excised.len() == 1 {
            "Comment deleted".to_string()
        } else {
            format!("{} comments deleted", excised.len())
        };
        self.notify(Action::Status(message)).await;
        self.notify(Action::CommentCount(self.thread.len())).await;
    }

    fn render_title(&self, area: Rect, buf: &mut Buffer) {
        Line::from(vec![
            Span::styled(self.thread.title().to_string(), Style::new().bold()),
            Span::styled(format!("  ({} comments)", self.thread.len()), Style::new().dim()),
        ])
        .render(area, buf);
    }

    fn render_cards(&mut self, area: Rect, buf: &mut Buffer) {
        self.card_areas.clear();
        let entries: Vec<Entry> = self
            .thread
            .controllers()
            .iter()
            .map(|c| {
                let editor_rows = c.edit_session().map(|s| {
                    u16::try_from(s.draft().lines().count() + 1)
                        .unwrap_or(u16::MAX)
                        .clamp(3, 10)
                });
                Entry {
                    id: c.id().clone(),
                    view: c.view(),
                    state: c.state(),
                    is_viewer: c.comment().author.id == self.viewer,
                    editor_rows,
                }
            })
            .collect();

        let heights: Vec<u16> = entries
            .iter()
            .map(|e| e.card(false).height(area.width))
            .collect();

        self.offset = self.offset.min(self.selected);
        while self.offset < self.selected
            && heights[self.offset..=self.selected]
                .iter()
                .map(|h| u32::from(*h))
                .sum::<u32>()
                > u32::from(area.height)
        {
            self.offset += 1;
        }

        let mut triggers: Vec<Option<Rect>> = vec![None; entries.len()];
        let mut y = area.y;
        for (index, entry) in entries.iter().enumerate().skip(self.offset) {
            if y >= area.bottom() {
                break;
            }
            let height = heights[index].min(area.bottom() - y);
            let rect = Rect::new(area.x, y, area.width, height);
            let CardAreas { trigger, body } = entry.card(index == self.selected).render(rect, buf);
            triggers[index] = trigger;
            self.card_areas.push((entry.id.clone(), rect));
            if entry.editor_rows.is_some() && self.editing.as_ref() == Some(&entry.id) {
                TextArea::new()
                    .text_wrap(TextWrap::Word(4))
                    .style(Style::new().bg(Color::Black))
                    .render(body, buf, &mut self.editor);
            }
            y = y.saturating_add(height);
        }
        for (controller, trigger) in self.thread.controllers_mut().iter_mut().zip(triggers) {
            controller.set_trigger_area(trigger);
        }
    }

    fn render_popup(&mut self, bounds: Rect, buf: &mut Buffer) {
        let Some(id) = self.popup_id() else {
            return;
        };
        let Some(controller) = self.thread.get_mut(&id) else {
            return;
        };
        let items = menu_items(controller.capabilities());
        let size = Size::new(POPUP_WIDTH, u16::try_from(items.len()).unwrap_or(0) + 2);
        let Some(rect) = controller.popup().anchor(size, bounds) else {
            controller.set_popup_area(None);
            return;
        };
        controller.set_popup_area(Some(rect));
        let lines: Vec<Line> = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let style = if index == self.menu_selected {
                    Style::new().add_modifier(Modifier::REVERSED)
                } else if *item == MenuItem::Delete {
                    Style::new().fg(Color::Red)
                } else {
                    Style::new()
                };
                Line::styled(format!(" {}", item.label()), style)
            })
            .collect();
        Clear.render(rect, buf);
        Paragraph::new(lines)
            .block(
                Block::bordered()
                    .border_type(BorderType::Rounded)
                    .title(POPUP_TITLE),
            )
            .render(rect, buf);
    }

    fn render_picker(&mut self, bounds: Rect, buf: &mut Buffer) {
        self.picker_area = None;
        let Some(picker) = &self.picker else {
            return;
        };
        let Some((_, card)) = self.card_areas.iter().find(|(id, _)| *id == picker.comment) else {
            return;
        };
        let size = Picker::size();
        let x = card
            .x
            .saturating_add(2)
            .min(bounds.right().saturating_sub(size.width))
            .max(bounds.x);
        let y = card
            .y
            .saturating_add(1)
            .min(bounds.bottom().saturating_sub(size.height))
            .max(bounds.y);
        let rect = Rect::new(x, y, size.width, size.height).intersection(bounds);
        let lines: Vec<Line> = [Emoji::FIRST_ROW, Emoji::SECOND_ROW]
            .iter()
            .enumerate()
            .map(|(row, emojis)| {
                Line::from(
                    emojis
                        .iter()
                        .enumerate()
                        .map(|(col, emoji)| {
                            let style = if picker.row == row && picker.col == col {
                                Style::new().add_modifier(Modifier::REVERSED)
                            } else {
                                Style::new()
                            };
                            Span::styled(format!(" {emoji}  "), style)
                        })
                        .collect::<Vec<_>>(),
                )
            })
            .collect();
        Clear.render(rect, buf);
        Paragraph::new(lines)
            .block(
                Block::bordered()
                    .border_type(BorderType::Rounded)
                    .title(picker.emoji().label()),
            )
            .render(rect, buf);
        self.picker_area = Some(rect);
    }

    fn render_delete_modal(&mut self, bounds: Rect, buf: &mut Buffer) {
        let Some(flow) = self
            .thread
            .controllers()
            .iter()
            .find_map(|c| c.deletion())
        else {
            return;
        };
        let width = bounds.width.min(72);
        let inner_width = width.saturating_sub(4);
        let preview = CommentCard::new(flow.preview());
        let preview_height = preview.height(inner_width);
        let mut lines_above = 0;
        let mut text: Vec<Line> = Vec::new();
        if let Some(warning) = flow.warning() {
            text.push(Line::styled(
                warning,
                Style::new().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
            lines_above = 1;
        }
        let error = flow
            .error()
            .map(|err| Line::styled(err.to_string(), Style::new().fg(Color::Red)));
        let height = (lines_above + preview_height + u16::from(error.is_some()) + 1 + 2)
            .min(bounds.height);
        let modal = bounds.centered(Constraint::Length(width), Constraint::Length(height));
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(Style::new().fg(Color::Red))
            .padding(ratatui::widgets::Padding::horizontal(1))
            .title(flow.title());
        let inner = block.inner(modal);
        Clear.render(modal, buf);
        block.render(modal, buf);

        let mut y = inner.y;
        if lines_above > 0 {
            Paragraph::new(text)
                .wrap(Wrap { trim: true })
                .render(Rect::new(inner.x, y, inner.width, 1), buf);
            y += 1;
        }
        let preview_rect = Rect::new(
            inner.x,
            y,
            inner.width,
            preview_height.min(inner.bottom().saturating_sub(y)),
        );
        preview.render(preview_rect, buf);
        y = preview_rect.bottom();
        if let Some(error) = error
            && y < inner.bottom()
        {
            error.render(Rect::new(inner.x, y, inner.width, 1), buf);
            y += 1;
        }
        if y < inner.bottom() {
            let footer = Rect::new(inner.x, y, inner.width, 1);
            if flow.is_in_flight() {
                let throbber = Throbber::default()
                    .label("Deleting")
                    .style(Style::new().fg(Color::Cyan))
                    .throbber_set(BRAILLE_SIX_DOUBLE)
                    .use_type(WhichUse::Spin);
                StatefulWidget::render(throbber, footer, buf, &mut self.throbber_state);
            } else {
                Line::from(vec![
                    Span::styled("Enter", Style::new().fg(Color::Red).bold()),
                    Span::raw(": delete   "),
                    Span::styled("Esc", Style::new().bold()),
                    Span::raw(": cancel"),
                ])
                .render(footer, buf);
            }
        }
    }

    fn render_discard_prompt(&self, bounds: Rect, buf: &mut Buffer) {
        if !self.discard_prompt_open() {
            return;
        }
        let modal = bounds.centered(Constraint::Length(40), Constraint::Length(4));
        Clear.render(modal, buf);
        Paragraph::new(vec![
            Line::from(DISCARD_PROMPT).centered(),
            Line::from("y: discard   n: keep editing").dim().centered(),
        ])
        .block(
            Block::bordered()
                .border_type(BorderType::Rounded)
                .border_style(Style::new().fg(Color::Yellow)),
        )
        .render(modal, buf);
    }

    pub fn render(&mut self, area: Layout, buf: &mut Buffer) {
        self.render_title(area.title_bar, buf);
        let main = area.main_content;
        if self.thread.is_empty() {
            self.card_areas.clear();
            Paragraph::new("No comments in this conversation.".dim())
                .centered()
                .render(main, buf);
            return;
        }
        self.render_cards(main, buf);
        self.render_popup(main, buf);
        self.render_picker(main, buf);
        self.render_delete_modal(main, buf);
        self.render_discard_prompt(main, buf);
    }
}

#[async_trait(?Send)]
impl Component for ThreadView {
    fn render(&mut self, area: Layout, buf: &mut Buffer) {
        self.render(area, buf);
    }

    fn register_action_tx(&mut self, action_tx: tokio::sync::mpsc::Sender<Action>) {
        self.action_tx = Some(action_tx);
    }

    async fn handle_event(&mut self, event: Action) -> Result<(), AppError> {
        match event {
            Action::AppEvent(ref event) => self.handle_app_event(event).await,
            Action::Resolved(resolved) => self.apply_resolution(resolved).await,
            Action::ThreadReloaded(loaded) => {
                self.reloading = false;
                self.thread.reload(loaded);
                self.clamp_selection();
                self.notify(Action::Status("Thread reloaded".to_string()))
                    .await;
                self.notify(Action::CommentCount(self.thread.len())).await;
            }
            Action::ReloadFailed(_) => self.reloading = false,
            Action::Tick => {
                if self.is_animating() {
                    self.throbber_state.calc_next();
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn cursor(&self) -> Option<(u16, u16)> {
        self.editing.as_ref()?;
        self.editor.screen_cursor()
    }

    fn is_animating(&self) -> bool {
        self.reloading
            || self.thread.controllers().iter().any(|c| {
                c.deletion().is_some_and(|f| f.is_in_flight())
                    || c.edit_session().is_some_and(|s| s.is_saving())
                    || c.reactions().pending_total() > 0
            })
    }

    fn captures_input(&self) -> bool {
        self.editing.is_some() || self.deleting_id().is_some()
    }

    fn set_global_help(&self) {
        if let Some(action_tx) = &self.action_tx {
            let _ = action_tx.try_send(Action::SetHelp(HELP));
        }
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
    use ratatui::{Terminal, backend::TestBackend};
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        comment::{PointerListeners, mutation::MutationError, testing::ScriptedMutations},
        fixture::FixtureBackend,
    };

    const THREAD: &str = r#"{
        "title": "Meetup venue",
        "viewer": "collective-1",
        "comments": [
            {
                "id": "1",
                "body": "Should we move the meetup?",
                "author": { "id": "collective-1", "name": "Open Source Collective" },
                "created_at": "2024-03-02T10:00:00Z",
                "reactions": { "+1": 2 },
                "is_conversation_root": true,
                "can_edit": true,
                "can_delete": true
            },
            {
                "id": "2",
                "body": "Fine by me",
                "author": { "id": "someone", "name": "Someone" },
                "created_at": "2024-03-02T11:00:00Z"
            }
        ]
    }"#;

    struct Screen {
        view: ThreadView,
        resolved: mpsc::Receiver<crate::comment::Resolved>,
        calls: mpsc::UnboundedReceiver<crate::comment::testing::Call>,
        terminal: Terminal<TestBackend>,
    }

    async fn screen() -> Screen {
        let fixture = Arc::new(FixtureBackend::from_json(THREAD).expect("fixture"));
        let loaded = fixture.load_thread().await.expect("load");
        let (mutations, calls) = ScriptedMutations::new();
        let (resolved_tx, resolved) = mpsc::channel(16);
        let collaborators = Collaborators {
            actor: loaded.viewer.clone(),
            mutations,
            resolved_tx,
            listeners: PointerListeners::new(),
        };
        Screen {
            view: ThreadView::new(loaded, collaborators, fixture),
            resolved,
            calls,
            terminal: Terminal::new(TestBackend::new(80, 24)).expect("terminal"),
        }
    }

    impl Screen {
        fn draw(&mut self) -> String {
            let view = &mut self.view;
            self.terminal
                .draw(|f| view.render(Layout::new(f.area()), f.buffer_mut()))
                .expect("draw");
            let buffer = self.terminal.backend().buffer().clone();
            let area = buffer.area;
            (area.y..area.bottom())
                .map(|y| {
                    (area.x..area.right())
                        .map(|x| buffer[(x, y)].symbol())
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
                .join("\n")
        }

        async fn key(&mut self, code: KeyCode) {
            let event = Event::Key(KeyEvent::new(code, KeyModifiers::NONE));
            self.view
                .handle_event(Action::AppEvent(event))
                .await
                .expect("event");
        }

        async fn click(&mut self, at: Position) {
            let event = Event::Mouse(MouseEvent {
                kind: MouseEventKind::Down(MouseButton::Left),
                column: at.x,
                row: at.y,
                modifiers: KeyModifiers::NONE,
            });
            self.view
                .handle_event(Action::AppEvent(event))
                .await
                .expect("event");
        }
    }

    #[tokio::test]
    async fn renders_every_comment() {
        let mut screen = screen().await;
        let text = screen.draw();
        assert!(text.contains("Meetup venue"));
        assert!(text.contains("Should we move the meetup?"));
        assert!(text.contains("Fine by me"));
        assert!(text.contains("Posted on March 2, 2024"));
    }

    #[tokio::test]
    async fn clicking_the_trigger_opens_and_outside_closes() {
        let mut screen = screen().await;
        screen.draw();
        let first = CommentId::from("1");
        let trigger = screen
            .view
            .thread()
            .get(&first)
            .and_then(|c| c.popup().trigger())
            .expect("trigger drawn");
        assert!(
            screen
                .view
                .thread()
                .get(&CommentId::from("2"))
                .and_then(|c| c.popup().trigger())
                .is_none()
        );

        screen.click(trigger.as_position()).await;
        let text = screen.draw();
        assert!(text.contains(POPUP_TITLE));
        assert!(text.contains("Edit"));

        screen.click(Position::new(0, 20)).await;
        assert!(screen.view.popup_id().is_none());
        assert!(!screen.draw().contains(POPUP_TITLE));
    }

    #[tokio::test]
    async fn delete_modal_shows_cascade_warning() {
        let mut screen = screen().await;
        screen.draw();
        screen.key(KeyCode::Char('d')).await;
        let text = screen.draw();
        assert!(text.contains("Delete this conversation?"));
        assert!(text.contains("The message and all its replies"));

        screen.key(KeyCode::Esc).await;
        assert!(screen.view.deleting_id().is_none());
    }

    #[tokio::test]
    async fn confirmed_root_delete_clears_the_screen() {
        let mut screen = screen().await;
        screen.key(KeyCode::Char('d')).await;
        screen.key(KeyCode::Enter).await;
        let Some(crate::comment::testing::Call::Delete { id, reply }) = screen.calls.recv().await
        else {
            panic!("expected delete");
        };
        reply.send(Ok(id)).expect("reply");
        let resolved = screen.resolved.recv().await.expect("resolution");
        screen
            .view
            .handle_event(Action::Resolved(resolved))
            .await
            .expect("event");
        assert!(screen.view.thread().is_empty());
        assert!(screen.draw().contains("No comments in this conversation."));
    }

    #[tokio::test]
    async fn edit_round_trip_through_the_editor() {
        let mut screen = screen().await;
        screen.key(KeyCode::Char('e')).await;
        assert!(screen.view.editing.is_some());
        assert!(screen.view.captures_input());
        screen.draw();

        screen.key(KeyCode::Char('!')).await;
        let event = Event::Key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
        screen
            .view
            .handle_event(Action::AppEvent(event))
            .await
            .expect("event");
        let Some(crate::comment::testing::Call::Edit { request, reply }) =
            screen.calls.recv().await
        else {
            panic!("expected edit");
        };
        assert!(request.new_content.contains("Should we move the meetup?"));
        assert!(request.new_content.contains('!'));
        reply
            .send(Err(MutationError::Network("offline".to_string())))
            .expect("reply");
        let resolved = screen.resolved.recv().await.expect("resolution");
        screen
            .view
            .handle_event(Action::Resolved(resolved))
            .await
            .expect("event");
        assert!(screen.view.editing.is_some());
        assert!(screen.draw().contains("network error: offline"));
    }

    #[tokio::test]
    async fn picker_sends_the_chosen_reaction() {
        let mut screen = screen().await;
        screen.key(KeyCode::Down).await;
        screen.key(KeyCode::Char('r')).await;
        screen.key(KeyCode::Down).await;
        screen.key(KeyCode::Right).await;
        screen.key(KeyCode::Enter).await;
        let Some(crate::comment::testing::Call::React { request, .. }) = screen.calls.recv().await
        else {
            panic!("expected reaction");
        };
        assert_eq!(request.comment_id, CommentId::from("2"));
        assert_eq!(request.emoji, Emoji::Heart);
    }
}
