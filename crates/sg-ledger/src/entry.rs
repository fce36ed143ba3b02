// entry.rs — Action log data model.
//
// An entry is written exactly once per evaluated request and never changed
// afterwards. `created_at` is assigned by the log store, not the caller, and
// is the only field used to decide which UTC day an entry belongs to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Final outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    /// Authorized and executed. Counts towards daily spend.
    Allowed,
    /// Rejected for any reason, including execution failure. Never counts.
    Blocked,
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionStatus::Allowed => write!(f, "ALLOWED"),
            ActionStatus::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// What the caller supplies when appending. The store adds id and timestamp.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub policy_id: String,
    pub agent_id: String,
    pub status: ActionStatus,
    /// One-line outcome.
    pub summary: String,
    /// Full explanation; multiple causes are joined with `"; "`.
    pub reason: String,
    /// The request exactly as serialized. Spend aggregation parses this.
    pub raw_request: String,
    pub source: String,
}

/// A persisted action log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub id: Uuid,
    pub policy_id: String,
    pub agent_id: String,
    pub status: ActionStatus,
    pub summary: String,
    pub reason: String,
    pub raw_request: String,
    pub source: String,
    pub created_at: DateTime<Utc>,

    /// SHA-256 of the previous line in a chained (file-backed) log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
}

impl ActionLogEntry {
    /// Materialize a new entry with a fresh id at `created_at`.
    pub fn from_new(entry: NewLogEntry, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            policy_id: entry.policy_id,
            agent_id: entry.agent_id,
            status: entry.status,
            summary: entry.summary,
            reason: entry.reason,
            raw_request: entry.raw_request,
            source: entry.source,
            created_at,
            previous_hash: None,
        }
    }
}
