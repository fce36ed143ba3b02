// outcome.rs — What `Enforcer::execute` returns to its caller.

use serde::{Deserialize, Serialize};
use sg_policy::Violation;
use uuid::Uuid;

/// Which branch of the orchestrator produced the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Authorized and executed.
    Executed,
    /// One or more policy rules failed. Retrying the same request is futile.
    PolicyViolation,
    /// The policy does not exist or has no wallet.
    PreconditionFailed,
    /// Authorized, but the executor failed or timed out. Safe for the caller
    /// to retry.
    ExecutionFailed,
}

/// Full result of one enforcement call. Exactly one log entry (`log_id`)
/// was written to produce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteOutcome {
    pub allowed: bool,
    pub kind: OutcomeKind,
    pub tx_id: Option<String>,
    pub log_id: Uuid,
    /// `"; "`-joined violations, or the single precondition/executor message.
    pub reason: Option<String>,
    /// Structured violations when `kind` is `PolicyViolation`.
    #[serde(default)]
    pub violations: Vec<Violation>,
}

/// The wire shape handed to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub log_id: Uuid,
}

impl ExecuteOutcome {
    /// HTTP status for this outcome: authorization problems are 4xx,
    /// execution faults 5xx.
    pub fn http_status(&self) -> u16 {
        match self.kind {
            OutcomeKind::Executed => 200,
            OutcomeKind::PolicyViolation | OutcomeKind::PreconditionFailed => 403,
            OutcomeKind::ExecutionFailed => 500,
        }
    }

    /// True only for failures a caller may safely retry.
    pub fn is_retryable(&self) -> bool {
        self.kind == OutcomeKind::ExecutionFailed
    }

    pub fn response(&self) -> ExecuteResponse {
        ExecuteResponse {
            allowed: self.allowed,
            tx_id: self.tx_id.clone(),
            reason: self.reason.clone(),
            log_id: self.log_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(kind: OutcomeKind) -> ExecuteOutcome {
        ExecuteOutcome {
            allowed: kind == OutcomeKind::Executed,
            kind,
            tx_id: (kind == OutcomeKind::Executed).then(|| "0xtx".to_string()),
            log_id: Uuid::new_v4(),
            reason: (kind != OutcomeKind::Executed).then(|| "nope".to_string()),
            violations: vec![],
        }
    }

    #[test]
    fn status_classes_distinguish_violation_from_fault() {
        assert_eq!(outcome(OutcomeKind::Executed).http_status(), 200);
        assert_eq!(outcome(OutcomeKind::PolicyViolation).http_status(), 403);
        assert_eq!(outcome(OutcomeKind::PreconditionFailed).http_status(), 403);
        assert_eq!(outcome(OutcomeKind::ExecutionFailed).http_status(), 500);
        assert!(outcome(OutcomeKind::ExecutionFailed).is_retryable());
        assert!(!outcome(OutcomeKind::PolicyViolation).is_retryable());
    }

    #[test]
    fn approved_response_has_tx_and_no_reason() {
        let json = serde_json::to_value(outcome(OutcomeKind::Executed).response()).unwrap();
        assert_eq!(json["allowed"], true);
        assert_eq!(json["txId"], "0xtx");
        assert!(json.get("reason").is_none());
        assert!(json.get("logId").is_some());
    }

    #[test]
    fn blocked_response_has_reason_and_no_tx() {
        let json =
            serde_json::to_value(outcome(OutcomeKind::PolicyViolation).response()).unwrap();
        assert_eq!(json["allowed"], false);
        assert_eq!(json["reason"], "nope");
        assert!(json.get("txId").is_none());
    }
}
