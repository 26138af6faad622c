pub mod components;
pub mod layout;

use std::{io::stdout, sync::Arc};

use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, EventStream, KeyEvent, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
};
use futures::{StreamExt, future::FutureExt};
use ratatui::prelude::*;
use tokio::{
    select,
    sync::mpsc::{Receiver, Sender},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{
    comment::{Collaborators, CommentMutations, PointerListeners, Resolved},
    errors::AppError,
    thread::{LoadedThread, ThreadSource},
    ui::components::{
        Component, DumbComponent,
        help::{HelpComponent, HelpElementKind},
        status_bar::StatusBar,
        thread_view::{self, ThreadView},
    },
};

const TICK_RATE: std::time::Duration = std::time::Duration::from_millis(100);

pub async fn run(
    source: Arc<dyn ThreadSource>,
    mutations: Arc<dyn CommentMutations>,
) -> Result<(), AppError> {
    let loaded = source.load_thread().await?;
    info!(title = %loaded.title, comments = loaded.entries.len(), "thread loaded");
    let (resolved_tx, resolved_rx) = tokio::sync::mpsc::channel(100);
    let collaborators = Collaborators {
        actor: loaded.viewer.clone(),
        mutations,
        resolved_tx,
        listeners: PointerListeners::new(),
    };
    let status_bar = StatusBar::new(loaded.viewer.as_str(), &loaded.title);
    let comment_count = loaded.entries.len();
    let thread_view = ThreadView::new(loaded, collaborators, source);

    let mut terminal = ratatui::init();
    let (action_tx, action_rx) = tokio::sync::mpsc::channel(100);
    let _ = action_tx.try_send(Action::CommentCount(comment_count));
    let mut app = App::new(action_tx, action_rx, thread_view, status_bar);
    let result = app.run(&mut terminal, resolved_rx).await;
    let _ = execute!(stdout(), DisableMouseCapture, PopKeyboardEnhancementFlags);
    ratatui::restore();
    result
}

struct App {
    action_tx: Sender<Action>,
    action_rx: Receiver<Action>,
    cancel_action: CancellationToken,
    components: Vec<Box<dyn Component>>,
    dumb_components: Vec<Box<dyn DumbComponent>>,
    help: &'static [HelpElementKind],
    in_help: bool,
}

impl App {
    fn new(
        action_tx: Sender<Action>,
        action_rx: Receiver<Action>,
        thread_view: ThreadView,
        status_bar: StatusBar,
    ) -> Self {
        Self {
            action_tx,
            action_rx,
            cancel_action: Default::default(),
            components: vec![Box::new(thread_view)],
            dumb_components: vec![Box::new(status_bar)],
            help: thread_view::HELP,
            in_help: false,
        }
    }

    async fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<impl std::io::Write>>,
        mut resolved_rx: Receiver<Resolved>,
    ) -> Result<(), AppError> {
        let ctok = self.cancel_action.clone();
        let action_tx = self.action_tx.clone();
        for component in self.components.iter_mut() {
            component.register_action_tx(action_tx.clone());
            component.set_global_help();
        }
        execute!(
            stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES),
            EnableMouseCapture
        )?;
        tokio::spawn(async move {
            let mut tick_interval = tokio::time::interval(TICK_RATE);
            let mut event_stream = EventStream::new();

            loop {
                let event = select! {
                    _ = ctok.cancelled() => break,
                    _ = tick_interval.tick() => Action::Tick,
                    resolved = resolved_rx.recv() => match resolved {
                        Some(resolved) => Action::Resolved(resolved),
                        None => Action::None,
                    },
                    kevent = event_stream.next().fuse() => {
                        match kevent {
                            Some(Ok(kevent)) => Action::AppEvent(kevent),
                            Some(Err(..)) => Action::None,
                            None => break,
                        }
                    }
                };
                if action_tx.send(event).await.is_err() {
                    break;
                }
            }
            Ok::<(), AppError>(())
        });

        self.draw(terminal)?;
        let ctok = self.cancel_action.clone();
        loop {
            let action = self.action_rx.recv().await;
            let consumed =
                matches!(&action, Some(Action::AppEvent(event)) if self.handle_event(event));
            if !consumed && let Some(ref action) = action {
                for component in self.components.iter_mut() {
                    component.handle_event(action.clone()).await?;
                }
                for component in self.dumb_components.iter_mut() {
                    component.handle_event(action.clone()).await?;
                }
            }
            let should_draw = match &action {
                Some(Action::Tick) => self.has_animated_components(),
                Some(Action::None) | None => false,
                _ => true,
            };
            match action {
                Some(Action::SetHelp(help)) => self.help = help,
                None => {
                    ctok.cancel();
                    break;
                }
                _ => {}
            }
            if should_draw {
                self.draw(terminal)?;
            }
            if self.cancel_action.is_cancelled() {
                break;
            }
        }

        Ok(())
    }

    /// Handles the global shortcuts. Returns `true` if the event was used.
    #[instrument(skip(self))]
    fn handle_event(&mut self, event: &crossterm::event::Event) -> bool {
        use rat_widget::event::ct_event;
        if matches!(
            event,
            ct_event!(key press CONTROL-'c') | ct_event!(key press CONTROL-'q')
        ) {
            self.cancel_action.cancel();
            return true;
        }
        if matches!(event, ct_event!(key press CONTROL-'h')) {
            self.in_help = !self.in_help;
            return true;
        }
        if self.in_help && matches!(event, ct_event!(keycode press Esc)) {
            self.in_help = false;
            return true;
        }
        let capturing = self.components.iter().any(|c| c.captures_input());
        if capturing {
            return false;
        }
        if let crossterm::event::Event::Key(key) = event {
            return self.handle_key(key);
        }
        false
    }

    fn handle_key(&mut self, key: &KeyEvent) -> bool {
        use crossterm::event::KeyCode::*;
        match key.code {
            Char('q') => {
                debug!("quit requested");
                self.cancel_action.cancel();
                true
            }
            Char('?') => {
                self.in_help = !self.in_help;
                true
            }
            _ => false,
        }
    }

    fn has_animated_components(&self) -> bool {
        self.components
            .iter()
            .any(|component| component.is_animating())
    }

    fn draw(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<impl std::io::Write>>,
    ) -> Result<(), AppError> {
        terminal.draw(|f| {
            let area = f.area();
            let layout = layout::Layout::new(area);
            for component in self.components.iter() {
                if let Some(p) = component.cursor() {
                    f.set_cursor_position(p);
                }
            }
            let buf = f.buffer_mut();
            for component in self.components.iter_mut() {
                component.render(layout, buf);
            }
            for component in self.dumb_components.iter_mut() {
                component.render(layout, buf);
            }
            if self.in_help {
                HelpComponent::new(self.help)
                    .width_percent(50)
                    .render(area, buf);
            }
        })?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Action {
    None,
    Tick,
    AppEvent(crossterm::event::Event),
    Resolved(Resolved),
    ThreadReloaded(LoadedThread),
    ReloadFailed(String),
    Status(String),
    CommentCount(usize),
    SetHelp(&'static [HelpElementKind]),
}
