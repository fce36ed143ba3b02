// request.rs — The ephemeral action request an agent submits.
//
// The request is never persisted as such, but its serialized form is copied
// verbatim into every action-log entry, and spend aggregation parses it back
// from there. The JSON shape is therefore a stable wire format (camelCase).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A request by an agent to perform one action under one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub policy_id: String,
    pub agent_id: String,
    pub action: String,
    pub protocol: String,
    pub token_in: String,
    pub token_out: String,
    /// Notional value of the action in USD. Expected to be positive.
    pub amount_usd: Decimal,
    /// Free-form provenance tag. Callers that omit it get the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ActionRequest {
    /// Serialize to the single-line JSON stored in the action log.
    pub fn to_raw(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a request back from its stored form.
    pub fn from_raw(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_wire_shape_with_numeric_amount() {
        let raw = r#"{"policyId":"p-1","agentId":"a-1","action":"swap","protocol":"uniswap","tokenIn":"USDC","tokenOut":"WETH","amountUsd":12.5}"#;
        let req = ActionRequest::from_raw(raw).unwrap();
        assert_eq!(req.amount_usd, dec!(12.5));
        assert_eq!(req.token_out, "WETH");
        assert!(req.source.is_none());
    }

    #[test]
    fn amount_is_stored_as_exact_string() {
        let req = ActionRequest {
            policy_id: "p-1".to_string(),
            agent_id: "a-1".to_string(),
            action: "swap".to_string(),
            protocol: "uniswap".to_string(),
            token_in: "USDC".to_string(),
            token_out: "WETH".to_string(),
            amount_usd: dec!(0.10),
            source: Some("test".to_string()),
        };
        let raw = req.to_raw().unwrap();
        assert!(raw.contains(r#""amountUsd":"0.10""#));
        assert_eq!(ActionRequest::from_raw(&raw).unwrap(), req);
    }
}
