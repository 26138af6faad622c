//! Per-emoji reaction counts for one comment.
//!
//! Counts only move after the backend has confirmed a reaction. A confirmed
//! add is kept in a local overlay, keyed by the id the backend returned, on
//! top of the last server snapshot. A snapshot that lists the id absorbs the
//! add and drops it from the overlay; one taken before the add leaves it in
//! place. There is no pre-confirmation increment and no way to take a
//! reaction back.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::comment::{
    model::Emoji,
    mutation::{MutationError, MutationResult, ReactionId},
};

#[derive(Debug, Clone, Default)]
pub struct ReactionTally {
    server: HashMap<Emoji, u64>,
    /// Ids the last snapshot already counted.
    seen: HashSet<ReactionId>,
    /// Confirmed adds no snapshot has counted yet.
    overlay: HashMap<ReactionId, Emoji>,
    pending: HashMap<Emoji, usize>,
    error: Option<String>,
}

impl ReactionTally {
    pub fn new(server: HashMap<Emoji, u64>, seen: HashSet<ReactionId>) -> Self {
        Self {
            server,
            seen,
            ..Self::default()
        }
    }

    pub fn count(&self, emoji: Emoji) -> u64 {
        let local = self.overlay.values().filter(|e| **e == emoji).count();
        self.server.get(&emoji).copied().unwrap_or(0) + local as u64
    }

    /// Non-zero counts in palette order.
    pub fn counts(&self) -> Vec<(Emoji, u64)> {
        Emoji::PALETTE
            .into_iter()
            .map(|emoji| (emoji, self.count(emoji)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    /// Confirmed adds per emoji that are not yet part of the server counts.
    pub fn overlay(&self) -> HashMap<Emoji, u64> {
        self.overlay
            .values()
            .fold(HashMap::new(), |mut acc, emoji| {
                *acc.entry(*emoji).or_default() += 1;
                acc
            })
    }

    pub fn pending(&self, emoji: Emoji) -> usize {
        self.pending.get(&emoji).copied().unwrap_or(0)
    }

    pub fn pending_total(&self) -> usize {
        self.pending.values().sum()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Records that an add for `emoji` has been sent.
    pub fn begin(&mut self, emoji: Emoji) {
        *self.pending.entry(emoji).or_default() += 1;
    }

    /// Applies the backend's answer for one add. Only `emoji`'s entry is
    /// touched, so answers may arrive in any order.
    pub fn resolve(
        &mut self,
        emoji: Emoji,
        result: MutationResult<ReactionId>,
    ) -> Result<u64, MutationError> {
        if let Some(pending) = self.pending.get_mut(&emoji) {
            *pending = pending.saturating_sub(1);
            if *pending == 0 {
                self.pending.remove(&emoji);
            }
        }
        match result {
            Ok(reaction) => {
                self.error = None;
                if self.seen.contains(&reaction) {
                    debug!(%emoji, reaction = %reaction.0, "reaction already in snapshot");
                } else {
                    self.overlay.insert(reaction.clone(), emoji);
                }
                let count = self.count(emoji);
                debug!(%emoji, reaction = %reaction.0, count, "reaction confirmed");
                Ok(count)
            }
            Err(err) => {
                debug!(%emoji, %err, "reaction failed");
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Replaces the server snapshot. Overlay entries the snapshot lists are
    /// dropped; the others were confirmed after it was taken and stay.
    pub fn reconcile(&mut self, server: HashMap<Emoji, u64>, ids: HashSet<ReactionId>) {
        self.overlay.retain(|id, _| !ids.contains(id));
        self.server = server;
        self.seen = ids;
        debug!(unabsorbed = self.overlay.len(), "reactions reconciled");
    }
}
