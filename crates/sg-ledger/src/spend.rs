// spend.rs — Daily spend derived from the action log.
//
// There is no stored spend counter. Today's spend for a policy is the sum of
// `amountUsd` over its ALLOWED entries whose `created_at` falls in the UTC
// day of `as_of`, read back from each entry's raw request.
//
// Historical rows whose raw request no longer parses, or whose amount is not
// positive, contribute zero. A single bad row must not lock a policy out.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sg_policy::ActionRequest;

use crate::entry::{ActionLogEntry, ActionStatus};
use crate::error::LedgerError;
use crate::log::{matches, ActionLog, UtcDay};

/// Amount approved under `policy_id` during the UTC day containing `as_of`.
///
/// Never negative. Deterministic for a fixed log snapshot.
pub fn spend_today(
    log: &dyn ActionLog,
    policy_id: &str,
    as_of: DateTime<Utc>,
) -> Result<Decimal, LedgerError> {
    let day = UtcDay::containing(as_of);
    let entries = log.query(policy_id, ActionStatus::Allowed, &day)?;
    let total = spend_in_window(&entries, policy_id, &day);
    tracing::debug!(policy_id, entries = entries.len(), %total, "aggregated daily spend");
    Ok(total)
}

/// Pure aggregation over an arbitrary slice of entries.
///
/// Re-applies the policy/status/day filter, so passing the whole log is fine.
/// Order of `entries` does not matter.
pub fn spend_in_window(entries: &[ActionLogEntry], policy_id: &str, day: &UtcDay) -> Decimal {
    entries
        .iter()
        .filter(|e| matches(e, policy_id, ActionStatus::Allowed, day))
        .map(entry_amount)
        .fold(Decimal::ZERO, |acc, amount| acc.saturating_add(amount))
}

fn entry_amount(entry: &ActionLogEntry) -> Decimal {
    match ActionRequest::from_raw(&entry.raw_request) {
        Ok(request) if request.amount_usd > Decimal::ZERO => request.amount_usd,
        Ok(request) => {
            tracing::debug!(
                entry_id = %entry.id,
                amount = %request.amount_usd,
                "ignoring non-positive logged amount"
            );
            Decimal::ZERO
        }
        Err(e) => {
            tracing::debug!(entry_id = %entry.id, error = %e, "skipping unparseable raw request");
            Decimal::ZERO
        }
    }
}
