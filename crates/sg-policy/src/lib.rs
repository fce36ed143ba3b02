//! # sg-policy
//!
//! Delegated spending policies and the policy evaluator for Spend Guard.
//!
//! A [`Policy`] binds exactly one agent to a daily USD budget, three
//! allow-lists (tokens, protocols, actions) and an expiry instant. The
//! [`evaluate`] function decides whether a single [`ActionRequest`] is
//! permitted under that policy, given how much has already been spent today.
//!
//! ## Key invariants
//!
//! - **Pure evaluation**: `evaluate` does no I/O and reads no clock; the
//!   caller supplies `now` and the amount already spent.
//! - **Report everything**: every rule is checked, and every failing rule
//!   contributes one [`Violation`]. A decision is allowed iff none did.
//! - **Empty means nothing**: an empty allow-list permits no member.

pub mod engine;
pub mod error;
pub mod policy;
pub mod request;
pub mod store;

pub use engine::{evaluate, Decision, Violation};
pub use error::PolicyError;
pub use policy::{NewPolicy, Policy, PolicyUpdate};
pub use request::ActionRequest;
pub use store::{JsonFilePolicyStore, MemoryPolicyStore, PolicyStore, WalletAssignment};
