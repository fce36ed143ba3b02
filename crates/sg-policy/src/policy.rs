// policy.rs — The delegated-authority record.
//
// A policy is issued by a principal (the owner) to exactly one agent. It is
// versioned only by explicit updates to its rule fields or by the one-time
// assignment of a custody wallet; the evaluator never mutates it.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PolicyError;

/// What one agent may do on behalf of its owner.
///
/// Allow-lists are `BTreeSet`s so that violation messages list allowed
/// members in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Opaque unique identifier.
    pub id: String,
    /// Principal who created the policy.
    pub owner_id: String,
    /// The single agent identity this policy authorizes.
    pub agent_id: String,
    /// Ceiling on approved notional value per UTC calendar day.
    pub daily_budget_usd: Decimal,
    pub allowed_tokens: BTreeSet<String>,
    pub allowed_protocols: BTreeSet<String>,
    pub allowed_actions: BTreeSet<String>,
    /// Custody account that executes approved actions. Absent until provisioned.
    #[serde(default)]
    pub agent_wallet_id: Option<String>,
    /// The policy grants no authority at or after this instant.
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Policy {
    /// Check the structural invariants: a named agent and a non-negative budget.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.agent_id.trim().is_empty() {
            return Err(PolicyError::MissingAgent);
        }
        if self.daily_budget_usd < Decimal::ZERO {
            return Err(PolicyError::NegativeBudget(self.daily_budget_usd));
        }
        Ok(())
    }

    /// True if the policy grants no authority at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Budget left for today given what was already spent. May be negative.
    pub fn remaining_budget(&self, spent_today_usd: Decimal) -> Decimal {
        self.daily_budget_usd - spent_today_usd
    }

    /// Apply a rule-field patch. The policy is left untouched if the result
    /// would be invalid.
    pub fn apply_update(&mut self, update: PolicyUpdate) -> Result<(), PolicyError> {
        let mut next = self.clone();
        if let Some(budget) = update.daily_budget_usd {
            next.daily_budget_usd = budget;
        }
        if let Some(tokens) = update.allowed_tokens {
            next.allowed_tokens = tokens.into_iter().collect();
        }
        if let Some(protocols) = update.allowed_protocols {
            next.allowed_protocols = protocols.into_iter().collect();
        }
        if let Some(actions) = update.allowed_actions {
            next.allowed_actions = actions.into_iter().collect();
        }
        if let Some(expires_at) = update.expires_at {
            next.expires_at = expires_at;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// Input for creating a policy. Expiry is relative to creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPolicy {
    pub owner_id: String,
    pub agent_id: String,
    pub daily_budget_usd: Decimal,
    #[serde(default)]
    pub allowed_tokens: Vec<String>,
    #[serde(default)]
    pub allowed_protocols: Vec<String>,
    #[serde(default)]
    pub allowed_actions: Vec<String>,
    pub expiry_hours: i64,
}

impl NewPolicy {
    /// Build a validated policy with a fresh id, created at `now`.
    pub fn into_policy(self, now: DateTime<Utc>) -> Result<Policy, PolicyError> {
        if self.expiry_hours <= 0 {
            return Err(PolicyError::InvalidExpiry(self.expiry_hours));
        }
        let expires_at = Duration::try_hours(self.expiry_hours)
            .and_then(|window| now.checked_add_signed(window))
            .ok_or(PolicyError::InvalidExpiry(self.expiry_hours))?;
        let policy = Policy {
            id: Uuid::new_v4().to_string(),
            owner_id: self.owner_id,
            agent_id: self.agent_id,
            daily_budget_usd: self.daily_budget_usd,
            allowed_tokens: self.allowed_tokens.into_iter().collect(),
            allowed_protocols: self.allowed_protocols.into_iter().collect(),
            allowed_actions: self.allowed_actions.into_iter().collect(),
            agent_wallet_id: None,
            expires_at,
            created_at: now,
        };
        policy.validate()?;
        Ok(policy)
    }
}

/// A patch over the mutable rule fields. `None` leaves a field unchanged.
///
/// Identity fields (id, owner, agent, creation time) cannot be patched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyUpdate {
    pub daily_budget_usd: Option<Decimal>,
    pub allowed_tokens: Option<Vec<String>>,
    pub allowed_protocols: Option<Vec<String>>,
    pub allowed_actions: Option<Vec<String>>,
    pub expires_at: Option<DateTime<Utc>>,
}
