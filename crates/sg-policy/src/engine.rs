// engine.rs — Policy evaluation.
//
// `evaluate()` runs every rule against a request and collects one Violation
// per failing rule. Rules never short-circuit each other, so a rejected agent
// learns everything that is wrong with its request at once.
//
// Rules, in reporting order:
//
// 1. Agent identity matches the policy's agent
// 2. Policy has not expired (`now < expires_at`)
// 3. Amount fits in the remaining daily budget
// 4. Protocol is allow-listed
// 5. Action is allow-listed
// 6. Input token, then output token, are allow-listed (one violation each)
// 7. Amount is strictly positive
//
// Wallet provisioning is deliberately absent: that is an executability
// question answered by the orchestrator, not an authorization one.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::policy::Policy;
use crate::request::ActionRequest;

/// One violated rule. The `Display` form is the human-readable reason.
///
/// Serialized with a `rule` tag whose value is [`Violation::rule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule")]
pub enum Violation {
    #[serde(rename = "agent_id")]
    AgentMismatch { expected: String, actual: String },
    #[serde(rename = "expiry")]
    Expired { expires_at: DateTime<Utc> },
    #[serde(rename = "daily_budget")]
    InsufficientBudget {
        requested: Decimal,
        remaining: Decimal,
    },
    #[serde(rename = "protocol")]
    ProtocolNotAllowed {
        protocol: String,
        allowed: Vec<String>,
    },
    #[serde(rename = "action")]
    ActionNotAllowed { action: String, allowed: Vec<String> },
    #[serde(rename = "token_in")]
    TokenInNotAllowed { token: String, allowed: Vec<String> },
    #[serde(rename = "token_out")]
    TokenOutNotAllowed { token: String, allowed: Vec<String> },
    #[serde(rename = "amount")]
    NonPositiveAmount { amount: Decimal },
}

impl Violation {
    /// Stable name of the rule that produced this violation.
    pub fn rule(&self) -> &'static str {
        match self {
            Violation::AgentMismatch { .. } => "agent_id",
            Violation::Expired { .. } => "expiry",
            Violation::InsufficientBudget { .. } => "daily_budget",
            Violation::ProtocolNotAllowed { .. } => "protocol",
            Violation::ActionNotAllowed { .. } => "action",
            Violation::TokenInNotAllowed { .. } => "token_in",
            Violation::TokenOutNotAllowed { .. } => "token_out",
            Violation::NonPositiveAmount { .. } => "amount",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::AgentMismatch { expected, actual } => {
                write!(f, "agent ID mismatch: expected {}, got {}", expected, actual)
            }
            Violation::Expired { expires_at } => write!(
                f,
                "policy expired at {}",
                expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            Violation::InsufficientBudget {
                requested,
                remaining,
            } => write!(
                f,
                "insufficient daily budget: requested {}, remaining {:.2}",
                requested, remaining
            ),
            Violation::ProtocolNotAllowed { protocol, allowed } => write!(
                f,
                "protocol not allowed: {} (allowed: {})",
                protocol,
                list(allowed)
            ),
            Violation::ActionNotAllowed { action, allowed } => write!(
                f,
                "action not allowed: {} (allowed: {})",
                action,
                list(allowed)
            ),
            Violation::TokenInNotAllowed { token, allowed } => write!(
                f,
                "input token not allowed: {} (allowed: {})",
                token,
                list(allowed)
            ),
            Violation::TokenOutNotAllowed { token, allowed } => write!(
                f,
                "output token not allowed: {} (allowed: {})",
                token,
                list(allowed)
            ),
            Violation::NonPositiveAmount { amount } => {
                write!(f, "amount must be greater than zero, got {}", amount)
            }
        }
    }
}

fn list(allowed: &[String]) -> String {
    if allowed.is_empty() {
        "none".to_string()
    } else {
        allowed.join(", ")
    }
}

/// The evaluator's output: allowed iff there are no violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub violations: Vec<Violation>,
}

impl Decision {
    fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            allowed: violations.is_empty(),
            violations,
        }
    }

    /// Human-readable reasons, in rule order.
    pub fn reasons(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }

    /// All reasons joined with `"; "`, or `None` when allowed.
    pub fn joined_reason(&self) -> Option<String> {
        if self.violations.is_empty() {
            None
        } else {
            Some(self.reasons().join("; "))
        }
    }

    /// The first reason, used as a one-line summary.
    pub fn first_reason(&self) -> Option<String> {
        self.violations.first().map(ToString::to_string)
    }
}

/// Everything a rule may look at.
struct Inputs<'a> {
    policy: &'a Policy,
    spent_today_usd: Decimal,
    request: &'a ActionRequest,
    now: DateTime<Utc>,
}

type Rule = fn(&Inputs<'_>, &mut Vec<Violation>);

const RULES: &[Rule] = &[
    check_agent,
    check_expiry,
    check_budget,
    check_protocol,
    check_action,
    check_tokens,
    check_amount,
];

/// Evaluate `request` against `policy`.
///
/// `spent_today_usd` is the amount already approved under this policy in the
/// current UTC day. The result depends only on the arguments.
pub fn evaluate(
    policy: &Policy,
    spent_today_usd: Decimal,
    request: &ActionRequest,
    now: DateTime<Utc>,
) -> Decision {
    let inputs = Inputs {
        policy,
        spent_today_usd,
        request,
        now,
    };
    let mut violations = Vec::new();
    for rule in RULES {
        rule(&inputs, &mut violations);
    }
    Decision::from_violations(violations)
}

fn check_agent(i: &Inputs<'_>, out: &mut Vec<Violation>) {
    if i.request.agent_id != i.policy.agent_id {
        out.push(Violation::AgentMismatch {
            expected: i.policy.agent_id.clone(),
            actual: i.request.agent_id.clone(),
        });
    }
}

fn check_expiry(i: &Inputs<'_>, out: &mut Vec<Violation>) {
    if i.policy.is_expired_at(i.now) {
        out.push(Violation::Expired {
            expires_at: i.policy.expires_at,
        });
    }
}

fn check_budget(i: &Inputs<'_>, out: &mut Vec<Violation>) {
    let remaining = i.policy.remaining_budget(i.spent_today_usd);
    if i.request.amount_usd > remaining {
        out.push(Violation::InsufficientBudget {
            requested: i.request.amount_usd,
            remaining,
        });
    }
}

fn check_protocol(i: &Inputs<'_>, out: &mut Vec<Violation>) {
    if !i.policy.allowed_protocols.contains(&i.request.protocol) {
        out.push(Violation::ProtocolNotAllowed {
            protocol: i.request.protocol.clone(),
            allowed: members(&i.policy.allowed_protocols),
        });
    }
}

fn check_action(i: &Inputs<'_>, out: &mut Vec<Violation>) {
    if !i.policy.allowed_actions.contains(&i.request.action) {
        out.push(Violation::ActionNotAllowed {
            action: i.request.action.clone(),
            allowed: members(&i.policy.allowed_actions),
        });
    }
}

fn check_tokens(i: &Inputs<'_>, out: &mut Vec<Violation>) {
    let tokens = &i.policy.allowed_tokens;
    if !tokens.contains(&i.request.token_in) {
        out.push(Violation::TokenInNotAllowed {
            token: i.request.token_in.clone(),
            allowed: members(tokens),
        });
    }
    if !tokens.contains(&i.request.token_out) {
        out.push(Violation::TokenOutNotAllowed {
            token: i.request.token_out.clone(),
            allowed: members(tokens),
        });
    }
}

fn check_amount(i: &Inputs<'_>, out: &mut Vec<Violation>) {
    if i.request.amount_usd <= Decimal::ZERO {
        out.push(Violation::NonPositiveAmount {
            amount: i.request.amount_usd,
        });
    }
}

fn members(set: &BTreeSet<String>) -> Vec<String> {
    set.iter().cloned().collect()
}
