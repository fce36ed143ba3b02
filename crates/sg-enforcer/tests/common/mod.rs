// Shared fixtures for enforcer integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use sg_enforcer::{Enforcer, EnforcerConfig, ExecutorError, SwapOrder, SwapReceipt, TradeExecutor};
use sg_ledger::MemoryActionLog;
use sg_policy::{ActionRequest, MemoryPolicyStore, NewPolicy, Policy, PolicyStore};

/// How the scripted executor answers.
#[derive(Clone)]
pub enum Script {
    Succeed(Option<String>),
    Fail(String),
    Hang,
}

/// Executor double that counts calls and answers per its script.
pub struct ScriptedExecutor {
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new(script: Script) -> Arc<Self> {
        Self::with_delay(script, Duration::ZERO)
    }

    pub fn with_delay(script: Script, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TradeExecutor for ScriptedExecutor {
    async fn execute_swap(&self, _order: &SwapOrder) -> Result<SwapReceipt, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.script {
            Script::Succeed(tx_id) => Ok(SwapReceipt {
                tx_id: tx_id.clone(),
            }),
            Script::Fail(message) => Err(ExecutorError::Rejected(message.clone())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(SwapReceipt::default())
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub struct Harness {
    pub policies: Arc<MemoryPolicyStore>,
    pub log: Arc<MemoryActionLog>,
    pub executor: Arc<ScriptedExecutor>,
    pub enforcer: Arc<Enforcer>,
}

impl Harness {
    pub fn new(executor: Arc<ScriptedExecutor>) -> Self {
        let policies = Arc::new(MemoryPolicyStore::new());
        let log = Arc::new(MemoryActionLog::new());
        let config = EnforcerConfig::for_project(".");
        let enforcer = Enforcer::new(
            policies.clone(),
            log.clone(),
            executor.clone(),
            &config,
        );
        Self {
            policies,
            log,
            executor,
            enforcer: Arc::new(enforcer),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(ScriptedExecutor::new(Script::Succeed(Some("0xtx".to_string()))))
    }

    /// A USDC/WETH swap policy for agent-1 with the given budget and a wallet.
    pub fn policy(&self, budget: Decimal) -> Policy {
        let policy = self
            .policies
            .create(
                NewPolicy {
                    owner_id: "owner-1".to_string(),
                    agent_id: "agent-1".to_string(),
                    daily_budget_usd: budget,
                    allowed_tokens: vec!["USDC".to_string(), "WETH".to_string()],
                    allowed_protocols: vec!["uniswap".to_string()],
                    allowed_actions: vec!["swap".to_string()],
                    expiry_hours: 24,
                },
                Utc::now(),
            )
            .unwrap();
        self.policies.assign_wallet(&policy.id, "0xwallet").unwrap();
        self.policies.get(&policy.id).unwrap().unwrap()
    }

    pub fn log_len(&self) -> usize {
        self.log.len().unwrap()
    }
}

pub fn swap(policy_id: &str, amount: Decimal) -> ActionRequest {
    ActionRequest {
        policy_id: policy_id.to_string(),
        agent_id: "agent-1".to_string(),
        action: "swap".to_string(),
        protocol: "uniswap".to_string(),
        token_in: "USDC".to_string(),
        token_out: "WETH".to_string(),
        amount_usd: amount,
        source: Some("test".to_string()),
    }
}
