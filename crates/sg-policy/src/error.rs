// error.rs — Error types for the policy subsystem.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur while creating, updating or storing policies.
///
/// Note that a request failing a policy rule is *not* an error: that is a
/// normal [`Decision`](crate::Decision) carrying violations.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The daily budget is below zero.
    #[error("daily budget must be non-negative, got {0}")]
    NegativeBudget(Decimal),

    /// The policy names no agent.
    #[error("agent id must not be empty")]
    MissingAgent,

    /// The requested expiry window is not positive, or reaches past the
    /// representable range of timestamps.
    #[error("expiry window out of range: {0} hours")]
    InvalidExpiry(i64),

    /// No policy exists with the given id.
    #[error("policy not found: {0}")]
    NotFound(String),

    /// A policy with the same id is already stored.
    #[error("policy already exists: {0}")]
    AlreadyExists(String),

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize or deserialize a policy record.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// An in-memory store lock was poisoned by a panicking writer.
    #[error("policy store lock poisoned: {0}")]
    LockPoisoned(String),
}
