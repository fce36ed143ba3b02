// executor.rs — The trade-execution collaborator.
//
// Given a validated order, an executor attempts the swap and returns a
// transaction id, or fails. The orchestrator never retries: blind retry of
// a financial action is the caller's decision, not ours.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// What the executor is asked to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOrder {
    pub wallet_id: String,
    pub from_token: String,
    pub to_token: String,
    pub amount_usd: Decimal,
}

/// What a successful execution returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapReceipt {
    /// Transaction identifier, if the executor has one yet.
    pub tx_id: Option<String>,
}

/// Execution failures. The `Display` form is embedded in log reasons.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The venue or custody layer refused the order.
    #[error("{0}")]
    Rejected(String),

    /// The executor could not be reached or the connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// No answer within the configured timeout.
    #[error("executor timed out after {0:?}")]
    Timeout(Duration),
}

/// Pluggable trade execution.
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    /// Attempt the swap described by `order`.
    async fn execute_swap(&self, order: &SwapOrder) -> Result<SwapReceipt, ExecutorError>;

    /// Executor display name (for logs).
    fn name(&self) -> &str;
}

/// Dry-run executor: every order "succeeds" with a synthetic transaction id.
///
/// Lets the CLI and local demos run without any custody infrastructure.
#[derive(Debug, Default)]
pub struct SimulatedExecutor;

impl SimulatedExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TradeExecutor for SimulatedExecutor {
    async fn execute_swap(&self, order: &SwapOrder) -> Result<SwapReceipt, ExecutorError> {
        tracing::debug!(
            wallet = %order.wallet_id,
            from = %order.from_token,
            to = %order.to_token,
            amount = %order.amount_usd,
            "simulating swap"
        );
        Ok(SwapReceipt {
            tx_id: Some(format!("sim-{}", Uuid::new_v4().simple())),
        })
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn simulated_executor_returns_tx_id() {
        let order = SwapOrder {
            wallet_id: "0xabc".to_string(),
            from_token: "USDC".to_string(),
            to_token: "WETH".to_string(),
            amount_usd: dec!(10),
        };
        let receipt = SimulatedExecutor::new().execute_swap(&order).await.unwrap();
        assert!(receipt.tx_id.unwrap().starts_with("sim-"));
    }

    #[test]
    fn rejection_displays_venue_message_verbatim() {
        let err = ExecutorError::Rejected("insufficient liquidity".to_string());
        assert_eq!(err.to_string(), "insufficient liquidity");
        assert_eq!(
            ExecutorError::Timeout(Duration::from_secs(30)).to_string(),
            "executor timed out after 30s"
        );
    }
}
