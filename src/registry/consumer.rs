//! Consumer registry
//!
//! Maps consumer identities to their pending-delivery flag. An entry is
//! created either explicitly through `register` (counted) or lazily on the
//! first frame request from an unseen identity (uncounted). Counted entries
//! are removed when their last registration goes away.

use std::collections::HashMap;

/// Per-consumer delivery state
#[derive(Debug, Clone)]
pub struct ConsumerEntry {
    /// A frame was published since this consumer last took one
    pub pending: bool,

    /// Outstanding explicit registrations
    pub registrations: u32,

    /// Number of delivery signals consumed
    pub signals_taken: u64,
}

impl ConsumerEntry {
    fn new() -> Self {
        Self {
            pending: false,
            registrations: 0,
            signals_taken: 0,
        }
    }
}

/// Result of dropping one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unregistered {
    /// The identity was never registered
    Unknown,
    /// Other registrations keep the entry alive
    Remaining(u32),
    /// The entry was removed
    Removed,
}

/// Identity to pending-flag map
///
/// Not synchronized; owned by the sync monitor.
#[derive(Debug, Default)]
pub struct ConsumerRegistry {
    entries: HashMap<String, ConsumerEntry>,
}

impl ConsumerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one registration for `id`
    ///
    /// Returns true if the entry was created by this call.
    pub fn register(&mut self, id: &str) -> bool {
        let created = self.ensure(id);
        if let Some(entry) = self.entries.get_mut(id) {
            entry.registrations += 1;
        }
        created
    }

    /// Create an uncounted entry for `id` if it does not exist
    ///
    /// Returns true if the entry was created by this call. New entries start
    /// with no pending frame, so a late consumer waits for the next publish.
    pub fn ensure(&mut self, id: &str) -> bool {
        if self.entries.contains_key(id) {
            return false;
        }
        self.entries.insert(id.to_string(), ConsumerEntry::new());
        true
    }

    /// Drop one registration for `id`
    pub fn unregister(&mut self, id: &str) -> Unregistered {
        let Some(entry) = self.entries.get_mut(id) else {
            return Unregistered::Unknown;
        };

        entry.registrations = entry.registrations.saturating_sub(1);
        if entry.registrations > 0 {
            return Unregistered::Remaining(entry.registrations);
        }

        self.entries.remove(id);
        Unregistered::Removed
    }

    /// Flag every consumer as having an undelivered frame
    pub fn mark_all_pending(&mut self) {
        for entry in self.entries.values_mut() {
            entry.pending = true;
        }
    }

    /// Consume the pending flag for `id`
    ///
    /// Returns `None` if the identity is not registered, otherwise whether a
    /// signal was pending. The flag is always false afterwards.
    pub fn take_pending(&mut self, id: &str) -> Option<bool> {
        let entry = self.entries.get_mut(id)?;
        let pending = std::mem::replace(&mut entry.pending, false);
        if pending {
            entry.signals_taken += 1;
        }
        Some(pending)
    }

    /// Put back a signal that was taken but never reached the consumer
    ///
    /// Returns false if the identity is gone.
    pub fn rearm(&mut self, id: &str) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        if !entry.pending {
            entry.pending = true;
            entry.signals_taken = entry.signals_taken.saturating_sub(1);
        }
        true
    }

    /// Check the pending flag without consuming it
    pub fn is_pending(&self, id: &str) -> Option<bool> {
        self.entries.get(id).map(|e| e.pending)
    }

    /// Get an entry
    pub fn get(&self, id: &str) -> Option<&ConsumerEntry> {
        self.entries.get(id)
    }

    /// Check if an identity is known
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of known consumers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no consumers are known
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
