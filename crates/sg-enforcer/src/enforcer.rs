// enforcer.rs — The enforcement orchestrator.
//
// `Enforcer::execute` is the only component with side effects. For each
// request it:
//
//   1. takes the per-policy lock, then the log's lease for the policy
//   2. loads the policy               → missing: BLOCKED "policy not found"
//   3. derives today's spend from the log
//   4. evaluates every rule           → any violation: BLOCKED, all reasons
//   5. checks the wallet              → missing: BLOCKED "agent wallet not configured"
//   6. calls the executor (timeout)   → failure: BLOCKED, executor message
//   7. records ALLOWED and returns the transaction id
//
// Every branch writes exactly one log entry before returning. The lock and
// the lease are held until that write lands, so the next request for the
// same policy, from this process or another sharing the log, always sees
// this one's spend.
//
// Steps 2-7 run on a spawned task that owns the lock. Dropping the
// `execute` future stops the wait for the result, not the sequence, so an
// executed swap is always recorded.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sg_ledger::{spend_today, ActionLog, ActionLogEntry, ActionStatus, LogLease, NewLogEntry};
use sg_policy::{evaluate, ActionRequest, PolicyStore};

use crate::config::EnforcerConfig;
use crate::error::EnforcerError;
use crate::executor::{ExecutorError, SwapOrder, TradeExecutor};
use crate::locks::PolicyLocks;
use crate::outcome::{ExecuteOutcome, OutcomeKind};

/// Placeholder transaction id when the executor does not report one.
pub const PENDING_TX_ID: &str = "pending";

/// Pause between attempts to take a log lease held by another handle.
const LEASE_RETRY: Duration = Duration::from_millis(5);

const POLICY_NOT_FOUND: &str = "policy not found";
const WALLET_NOT_CONFIGURED: &str = "agent wallet not configured";

/// Sequences evaluation, execution and logging for agent action requests.
pub struct Enforcer {
    inner: Arc<Inner>,
    locks: PolicyLocks,
}

/// The collaborators a spawned request task needs.
#[derive(Clone)]
struct Inner {
    policies: Arc<dyn PolicyStore>,
    log: Arc<dyn ActionLog>,
    executor: Arc<dyn TradeExecutor>,
    executor_timeout: Duration,
    default_source: String,
}

/// Per-request values shared by every log write.
struct Context {
    policy_id: String,
    agent_id: String,
    raw_request: String,
    source: String,
}

impl Enforcer {
    pub fn new(
        policies: Arc<dyn PolicyStore>,
        log: Arc<dyn ActionLog>,
        executor: Arc<dyn TradeExecutor>,
        config: &EnforcerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                policies,
                log,
                executor,
                executor_timeout: config.executor_timeout(),
                default_source: config.default_source.clone(),
            }),
            locks: PolicyLocks::new(),
        }
    }

    /// Override the executor timeout.
    pub fn with_executor_timeout(mut self, timeout: Duration) -> Self {
        Arc::make_mut(&mut self.inner).executor_timeout = timeout;
        self
    }

    /// Decide, execute if permitted, and record one request.
    ///
    /// Returns `Err` only when storage fails; every decision, including
    /// executor failure, is an `Ok(ExecuteOutcome)`. Once the policy lock is
    /// taken the request runs to completion even if this future is dropped.
    pub async fn execute(&self, request: ActionRequest) -> Result<ExecuteOutcome, EnforcerError> {
        let ctx = Context {
            policy_id: request.policy_id.clone(),
            agent_id: request.agent_id.clone(),
            raw_request: request.to_raw()?,
            source: request
                .source
                .clone()
                .unwrap_or_else(|| self.inner.default_source.clone()),
        };

        let guard = self.locks.acquire(&request.policy_id).await;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let _guard = guard;
            inner.decide(ctx, request).await
        })
        .await?
    }
}

impl Inner {
    /// Take the log's lease for the policy, polling while another handle
    /// holds it.
    async fn lease(&self, policy_id: &str) -> Result<LogLease, EnforcerError> {
        let mut waited = false;
        loop {
            if let Some(lease) = self.log.try_lease(policy_id)? {
                if waited {
                    tracing::debug!(policy_id, "log lease acquired after waiting");
                }
                return Ok(lease);
            }
            waited = true;
            tokio::time::sleep(LEASE_RETRY).await;
        }
    }

    async fn decide(
        &self,
        ctx: Context,
        request: ActionRequest,
    ) -> Result<ExecuteOutcome, EnforcerError> {
        let _lease = self.lease(&request.policy_id).await?;

        let Some(policy) = self.policies.get(&request.policy_id)? else {
            let entry = self.record(
                &ctx,
                ActionStatus::Blocked,
                POLICY_NOT_FOUND.to_string(),
                format!("{}: {}", POLICY_NOT_FOUND, request.policy_id),
            )?;
            tracing::warn!(policy_id = %ctx.policy_id, agent_id = %ctx.agent_id, "blocked: policy not found");
            return Ok(blocked(OutcomeKind::PreconditionFailed, &entry, POLICY_NOT_FOUND));
        };

        let now = Utc::now();
        let spent = spend_today(self.log.as_ref(), &policy.id, now)?;
        let decision = evaluate(&policy, spent, &request, now);

        if let (Some(summary), Some(reason)) = (decision.first_reason(), decision.joined_reason()) {
            let entry = self.record(&ctx, ActionStatus::Blocked, summary, reason.clone())?;
            tracing::warn!(
                policy_id = %ctx.policy_id,
                agent_id = %ctx.agent_id,
                violations = decision.violations.len(),
                %reason,
                "blocked: policy violation"
            );
            let mut outcome = blocked(OutcomeKind::PolicyViolation, &entry, &reason);
            outcome.violations = decision.violations;
            return Ok(outcome);
        }

        let Some(wallet_id) = policy.agent_wallet_id.clone() else {
            let entry = self.record(
                &ctx,
                ActionStatus::Blocked,
                WALLET_NOT_CONFIGURED.to_string(),
                WALLET_NOT_CONFIGURED.to_string(),
            )?;
            tracing::warn!(policy_id = %ctx.policy_id, "blocked: agent wallet not configured");
            return Ok(blocked(OutcomeKind::PreconditionFailed, &entry, WALLET_NOT_CONFIGURED));
        };

        let order = SwapOrder {
            wallet_id,
            from_token: request.token_in.clone(),
            to_token: request.token_out.clone(),
            amount_usd: request.amount_usd,
        };

        match self.call_executor(&order).await {
            Ok(tx_id) => {
                let summary = format!(
                    "swap executed: {} USD {} -> {}",
                    order.amount_usd, order.from_token, order.to_token
                );
                let reason = format!("all policy checks passed (tx {})", tx_id);
                let entry = self
                    .record(&ctx, ActionStatus::Allowed, summary, reason)
                    .map_err(|e| match e {
                        EnforcerError::Ledger(source) => {
                            tracing::error!(
                                policy_id = %ctx.policy_id,
                                tx_id = %tx_id,
                                error = %source,
                                "swap executed but ALLOWED entry not written"
                            );
                            EnforcerError::Unrecorded {
                                tx_id: tx_id.clone(),
                                source,
                            }
                        }
                        other => other,
                    })?;
                tracing::info!(
                    policy_id = %ctx.policy_id,
                    agent_id = %ctx.agent_id,
                    amount = %order.amount_usd,
                    tx_id = %tx_id,
                    "allowed: swap executed"
                );
                Ok(ExecuteOutcome {
                    allowed: true,
                    kind: OutcomeKind::Executed,
                    tx_id: Some(tx_id),
                    log_id: entry.id,
                    reason: None,
                    violations: Vec::new(),
                })
            }
            Err(e) => {
                let reason = format!("trade execution failed: {}", e);
                let entry = self.record(
                    &ctx,
                    ActionStatus::Blocked,
                    "trade execution failed".to_string(),
                    reason.clone(),
                )?;
                tracing::warn!(
                    policy_id = %ctx.policy_id,
                    executor = self.executor.name(),
                    error = %e,
                    "blocked: execution failed"
                );
                Ok(blocked(OutcomeKind::ExecutionFailed, &entry, &reason))
            }
        }
    }

    /// One executor call under the timeout. No retries.
    async fn call_executor(&self, order: &SwapOrder) -> Result<String, ExecutorError> {
        match tokio::time::timeout(self.executor_timeout, self.executor.execute_swap(order)).await
        {
            Ok(Ok(receipt)) => Ok(receipt
                .tx_id
                .unwrap_or_else(|| PENDING_TX_ID.to_string())),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ExecutorError::Timeout(self.executor_timeout)),
        }
    }

    fn record(
        &self,
        ctx: &Context,
        status: ActionStatus,
        summary: String,
        reason: String,
    ) -> Result<ActionLogEntry, EnforcerError> {
        Ok(self.log.append(NewLogEntry {
            policy_id: ctx.policy_id.clone(),
            agent_id: ctx.agent_id.clone(),
            status,
            summary,
            reason,
            raw_request: ctx.raw_request.clone(),
            source: ctx.source.clone(),
        })?)
    }
}

fn blocked(kind: OutcomeKind, entry: &ActionLogEntry, reason: &str) -> ExecuteOutcome {
    ExecuteOutcome {
        allowed: false,
        kind,
        tx_id: None,
        log_id: entry.id,
        reason: Some(reason.to_string()),
        violations: Vec::new(),
    }
}
