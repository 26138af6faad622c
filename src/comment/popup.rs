//! Show/hide state for an overlay anchored to a trigger element.
//!
//! While open the popup holds a pointer listener from [`PointerListeners`];
//! any click outside both the trigger and the overlay closes it. Clicks on
//! the trigger itself are left to [`PopupController::toggle`].

use ratatui::layout::{Position, Rect, Size};
use tracing::debug;

use crate::comment::pointer::{ListenerGuard, PointerListeners};

#[derive(Debug)]
pub struct PopupController {
    listeners: PointerListeners,
    listener: Option<ListenerGuard>,
    trigger: Option<Rect>,
    overlay: Option<Rect>,
}

impl PopupController {
    pub fn new(listeners: PointerListeners) -> Self {
        Self {
            listeners,
            listener: None,
            trigger: None,
            overlay: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.listener.is_some()
    }

    pub fn open(&mut self) {
        if self.listener.is_none() {
            self.listener = Some(self.listeners.subscribe());
        }
    }

    pub fn close(&mut self) {
        // dropping the guard deregisters the listener
        self.listener = None;
        self.overlay = None;
    }

    pub fn toggle(&mut self) {
        if self.is_open() {
            self.close();
        } else {
            self.open();
        }
    }

    /// Records where the trigger was last drawn. `None` while it is not on
    /// screen.
    pub fn set_trigger(&mut self, area: Option<Rect>) {
        self.trigger = area;
    }

    pub fn trigger(&self) -> Option<Rect> {
        self.trigger
    }

    pub fn set_overlay(&mut self, area: Option<Rect>) {
        self.overlay = area;
    }

    pub fn overlay(&self) -> Option<Rect> {
        self.overlay
    }

    /// Feeds a global click to the popup. Returns `true` if it closed.
    pub fn handle_outside_click(&mut self, at: Position) -> bool {
        if self.listener.is_none() {
            return false;
        }
        let Some(trigger) = self.trigger else {
            return false;
        };
        if trigger.contains(at) || self.overlay.is_some_and(|overlay| overlay.contains(at)) {
            return false;
        }
        debug!(x = at.x, y = at.y, "click outside popup");
        self.close();
        true
    }

    /// Places an overlay of `size` below the trigger, aligned to its left
    /// edge and kept inside `bounds`. Flips above the trigger when the space
    /// below is too small.
    pub fn anchor(&self, size: Size, bounds: Rect) -> Option<Rect> {
        let trigger = self.trigger?;
        let width = size.width.min(bounds.width);
        let height = size.height.min(bounds.height);
        if width == 0 || height == 0 {
            return None;
        }
        let x = trigger
            .x
            .min(bounds.right().saturating_sub(width))
            .max(bounds.x);
        let below = trigger.bottom();
        let y = if below.saturating_add(height) <= bounds.bottom() {
            below
        } else if trigger.y >= bounds.y.saturating_add(height) {
            trigger.y - height
        } else {
            bounds.bottom().saturating_sub(height)
        };
        Some(Rect::new(x, y, width, height))
    }
}
