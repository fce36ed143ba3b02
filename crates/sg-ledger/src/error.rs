// error.rs — Error types for the action log.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The log file could not be opened, created or locked.
    #[error("cannot open action log {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error while appending or reading back lines.
    #[error("action log write failed: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// An entry did not encode, or a stored line did not decode.
    #[error("action log entry is not valid JSON: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Line `line` links to `actual`, but the line before it hashes to
    /// `expected`.
    #[error("hash chain broken at line {line}: previous_hash should be {expected}, found {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },

    /// A writer panicked while holding the in-memory state.
    #[error("action log state poisoned: {0}")]
    LockPoisoned(String),
}

pub(crate) fn poisoned<T>(e: std::sync::PoisonError<T>) -> LedgerError {
    LedgerError::LockPoisoned(e.to_string())
}
