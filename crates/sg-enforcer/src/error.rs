// error.rs — Error types for the enforcement orchestrator.
//
// Policy violations, missing policies, missing wallets and executor failures
// are *outcomes*, not errors; see `ExecuteOutcome`. The variants here are
// storage faults that prevent the orchestrator from doing its job at all.

use sg_ledger::LedgerError;
use sg_policy::PolicyError;
use thiserror::Error;

/// Errors that can occur while enforcing a request or loading configuration.
#[derive(Debug, Error)]
pub enum EnforcerError {
    /// The policy store failed.
    #[error("policy store error: {0}")]
    Policy(#[from] PolicyError),

    /// The action log failed.
    #[error("action log error: {0}")]
    Ledger(#[from] LedgerError),

    /// The request could not be serialized for the log.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A swap was executed but its ALLOWED entry could not be written.
    /// The spend is real and missing from the ledger; reconcile by hand.
    #[error("swap {tx_id} executed but not recorded: {source}")]
    Unrecorded { tx_id: String, source: LedgerError },

    /// The task running the request panicked or was aborted by runtime
    /// shutdown. Whether its entry was written is unknown.
    #[error("enforcement task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The configuration file is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}
