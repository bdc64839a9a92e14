//! Outstanding calls keyed by correlation id

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tokio::time::Instant;

struct PendingEntry {
    reply: oneshot::Sender<Value>,
    deadline: Option<Instant>,
}

/// Registry of calls awaiting a response
///
/// Callers hold it behind the bridge's mutex; every mutation is a single
/// locked operation, so dispatch never observes a half-registered call.
#[derive(Default)]
pub(crate) struct PendingRegistry {
    entries: HashMap<String, PendingEntry>,
}

impl PendingRegistry {
    /// Register a call. Returns `None` if the id is already pending.
    pub(crate) fn register(
        &mut self,
        id: &str,
        deadline: Option<Instant>,
    ) -> Option<oneshot::Receiver<Value>> {
        if self.entries.contains_key(id) {
            return None;
        }
        let (reply, rx) = oneshot::channel();
        self.entries
            .insert(id.to_string(), PendingEntry { reply, deadline });
        Some(rx)
    }

    /// Remove a matched entry and hand back its reply channel
    pub(crate) fn take(&mut self, id: &str) -> Option<oneshot::Sender<Value>> {
        self.entries.remove(id).map(|entry| entry.reply)
    }

    /// Forget an entry without resolving it
    pub(crate) fn cancel(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Drop entries whose deadline is at or before `now`
    pub(crate) fn prune_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.deadline.map_or(true, |deadline| deadline > now));
        before - self.entries.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
