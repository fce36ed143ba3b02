// memory.rs — In-memory action log.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::entry::{ActionLogEntry, ActionStatus, NewLogEntry};
use crate::error::{poisoned, LedgerError};
use crate::log::{matches, next_timestamp, ActionLog, UtcDay};

/// An action log held in a `Vec` behind a mutex.
#[derive(Default)]
pub struct MemoryActionLog {
    entries: Mutex<Vec<ActionLogEntry>>,
}

impl MemoryActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the log from a snapshot of previously written entries.
    pub fn from_entries(entries: Vec<ActionLogEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Copy of every entry, in write order.
    pub fn snapshot(&self) -> Result<Vec<ActionLogEntry>, LedgerError> {
        Ok(self.entries.lock().map_err(poisoned)?.clone())
    }

    pub fn len(&self) -> Result<usize, LedgerError> {
        Ok(self.entries.lock().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len()? == 0)
    }
}

impl ActionLog for MemoryActionLog {
    fn append(&self, entry: NewLogEntry) -> Result<ActionLogEntry, LedgerError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        let last: Option<DateTime<Utc>> = entries.iter().map(|e| e.created_at).max();
        let written = ActionLogEntry::from_new(entry, next_timestamp(last));
        entries.push(written.clone());
        Ok(written)
    }

    fn query(
        &self,
        policy_id: &str,
        status: ActionStatus,
        day: &UtcDay,
    ) -> Result<Vec<ActionLogEntry>, LedgerError> {
        let entries = self.entries.lock().map_err(poisoned)?;
        Ok(entries
            .iter()
            .filter(|e| matches(e, policy_id, status, day))
            .cloned()
            .collect())
    }

    fn list_for_policy(&self, policy_id: &str) -> Result<Vec<ActionLogEntry>, LedgerError> {
        let entries = self.entries.lock().map_err(poisoned)?;
        let mut found: Vec<ActionLogEntry> = entries
            .iter()
            .filter(|e| e.policy_id == policy_id)
            .cloned()
            .collect();
        found.reverse();
        Ok(found)
    }
}
