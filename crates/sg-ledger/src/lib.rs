//! # sg-ledger
//!
//! Append-only action log and derived daily spend for Spend Guard.
//!
//! Every evaluated request is recorded as one [`ActionLogEntry`]. The log is
//! both the audit trail and the only spend ledger: there is no stored
//! running total. [`spend_today`] recomputes "amount approved today" by
//! summing the `amountUsd` of the ALLOWED entries in the current UTC day.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use rust_decimal::Decimal;
//! use sg_ledger::{spend_today, ActionLog, ActionStatus, JsonlActionLog, NewLogEntry};
//! use sg_policy::ActionRequest;
//!
//! let request = ActionRequest {
//!     policy_id: "p-1".into(),
//!     agent_id: "agent-1".into(),
//!     action: "swap".into(),
//!     protocol: "uniswap".into(),
//!     token_in: "USDC".into(),
//!     token_out: "WETH".into(),
//!     amount_usd: Decimal::new(25, 0),
//!     source: None,
//! };
//!
//! let log = JsonlActionLog::open("/tmp/actions.jsonl").unwrap();
//! log.append(NewLogEntry {
//!     policy_id: request.policy_id.clone(),
//!     agent_id: request.agent_id.clone(),
//!     status: ActionStatus::Allowed,
//!     summary: "swap executed".into(),
//!     reason: "all policy checks passed".into(),
//!     raw_request: request.to_raw().unwrap(),
//!     source: "local-demo".into(),
//! })
//! .unwrap();
//! let spent = spend_today(&log, "p-1", Utc::now()).unwrap();
//! assert_eq!(spent, Decimal::new(25, 0));
//! ```

pub mod entry;
pub mod error;
pub mod hasher;
pub mod jsonl;
pub mod log;
pub mod memory;
pub mod spend;

pub use entry::{ActionLogEntry, ActionStatus, NewLogEntry};
pub use error::LedgerError;
pub use jsonl::JsonlActionLog;
pub use log::{ActionLog, LogLease, UtcDay};
pub use memory::MemoryActionLog;
pub use spend::{spend_in_window, spend_today};
