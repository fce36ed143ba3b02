// log.rs — The action log collaborator contract.
//
// The orchestrator needs exactly two things from storage: append one entry,
// and fetch the entries for a policy with a given status inside a time
// window. Listing is for operators.

use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::entry::{ActionLogEntry, ActionStatus, NewLogEntry};
use crate::error::LedgerError;

/// One UTC calendar day, inclusive of both bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcDay {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl UtcDay {
    /// The UTC day containing `instant`: 00:00:00.000000000 through
    /// 23:59:59.999999999.
    pub fn containing(instant: DateTime<Utc>) -> Self {
        let start = instant.date_naive().and_time(NaiveTime::MIN).and_utc();
        Self {
            start,
            end: start + Duration::days(1) - Duration::nanoseconds(1),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Exclusive decision rights over one policy's entries, released on drop.
///
/// While a lease is held no other lease for the same policy can be taken on
/// the same log, through any handle or from another process. Queries made
/// under the lease see every line written before it was granted.
#[must_use = "the lease is released as soon as it is dropped"]
pub struct LogLease {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LogLease {
    /// A lease with nothing to release, for stores that are only ever
    /// shared within one process.
    pub fn noop() -> Self {
        Self { release: None }
    }

    pub(crate) fn on_release(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for LogLease {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for LogLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogLease")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// Append-only storage for action log entries.
pub trait ActionLog: Send + Sync {
    /// Try to take the lease for `policy_id` without blocking. `Ok(None)`
    /// means another holder has it; retry later.
    ///
    /// The default suits stores that live entirely in one process, where the
    /// caller's own per-policy lock is already exclusive.
    fn try_lease(&self, _policy_id: &str) -> Result<Option<LogLease>, LedgerError> {
        Ok(Some(LogLease::noop()))
    }


    /// Persist a new entry. The store assigns `id` and a non-decreasing
    /// `created_at`, and returns the entry as written.
    fn append(&self, entry: NewLogEntry) -> Result<ActionLogEntry, LedgerError>;

    /// Entries for `policy_id` with `status` whose `created_at` is in `day`.
    fn query(
        &self,
        policy_id: &str,
        status: ActionStatus,
        day: &UtcDay,
    ) -> Result<Vec<ActionLogEntry>, LedgerError>;

    /// Every entry for `policy_id`, newest first.
    fn list_for_policy(&self, policy_id: &str) -> Result<Vec<ActionLogEntry>, LedgerError>;
}

/// Next write timestamp: wall clock, but never earlier than the last one.
pub(crate) fn next_timestamp(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match last {
        Some(last) if last > now => last,
        _ => now,
    }
}

pub(crate) fn matches(
    entry: &ActionLogEntry,
    policy_id: &str,
    status: ActionStatus,
    day: &UtcDay,
) -> bool {
    entry.policy_id == policy_id && entry.status == status && day.contains(entry.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn day_bounds_are_inclusive() {
        let noon = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        let day = UtcDay::containing(noon);
        assert_eq!(day.start, Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap());
        assert!(day.contains(day.start));
        assert!(day.contains(day.end));
        assert!(!day.contains(day.start - Duration::nanoseconds(1)));
        assert!(!day.contains(day.end + Duration::nanoseconds(1)));
    }

    #[test]
    fn midnight_starts_a_new_day() {
        let midnight = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        let day = UtcDay::containing(midnight);
        assert_eq!(day.start, midnight);
    }

    #[test]
    fn lease_runs_release_once_on_drop() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let lease = LogLease::on_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(released.load(Ordering::SeqCst), 0);
        drop(lease);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let future = Utc::now() + Duration::hours(1);
        assert_eq!(next_timestamp(Some(future)), future);
        assert!(next_timestamp(None) <= Utc::now());
    }
}
