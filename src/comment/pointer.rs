//! Registry of global pointer-click listeners.
//!
//! A popup holds a [`ListenerGuard`] for exactly as long as it is open. The
//! guard deregisters itself when dropped, so every exit path (close, dismiss,
//! teardown of the owning controller) releases the listener.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError, Weak},
};

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ListenerId(u64);

#[derive(Debug, Default)]
struct Registry {
    next: u64,
    live: HashSet<ListenerId>,
}

#[derive(Debug, Clone, Default)]
pub struct PointerListeners {
    inner: Arc<Mutex<Registry>>,
}

impl PointerListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> ListenerGuard {
        let id = {
            let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            registry.next += 1;
            let id = ListenerId(registry.next);
            registry.live.insert(id);
            id
        };
        trace!(?id, "pointer listener registered");
        ListenerGuard {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Number of listeners currently registered.
    pub fn active(&self) -> usize {
        self.inner
            .lock()
            .map(|registry| registry.live.len())
            .unwrap_or_default()
    }
}

#[derive(Debug)]
pub struct ListenerGuard {
    id: ListenerId,
    registry: Weak<Mutex<Registry>>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if let Ok(mut registry) = registry.lock() {
            registry.live.remove(&self.id);
        }
        trace!(id = ?self.id, "pointer listener released");
    }
}
