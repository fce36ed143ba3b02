//! # sg-enforcer
//!
//! Enforcement orchestrator for Spend Guard.
//!
//! [`Enforcer::execute`] takes an agent's [`ActionRequest`](sg_policy::ActionRequest),
//! evaluates it against the stored policy and today's derived spend, calls
//! the [`TradeExecutor`] only when every rule passes, and records exactly
//! one action-log entry for whatever happened.
//!
//! ## Key invariants
//!
//! - **Budget conservation**: per policy and UTC day, ALLOWED amounts never
//!   sum past the daily budget, however many requests arrive concurrently.
//!   Evaluation and the final log write run under a per-policy lock.
//! - **Logging totality**: every call writes one entry, on every branch.
//! - **No blind retries**: executor failures and timeouts are recorded and
//!   returned as [`OutcomeKind::ExecutionFailed`]; retrying is up to the caller.

pub mod config;
pub mod enforcer;
pub mod error;
pub mod executor;
pub mod locks;
pub mod outcome;

pub use config::EnforcerConfig;
pub use enforcer::{Enforcer, PENDING_TX_ID};
pub use error::EnforcerError;
pub use executor::{ExecutorError, SimulatedExecutor, SwapOrder, SwapReceipt, TradeExecutor};
pub use locks::{PolicyGuard, PolicyLocks};
pub use outcome::{ExecuteOutcome, ExecuteResponse, OutcomeKind};
