// concurrency.rs — Budget conservation under concurrent requests.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::{swap, Harness, Script, ScriptedExecutor};
use sg_enforcer::{Enforcer, EnforcerConfig, ExecuteOutcome, OutcomeKind};
use sg_ledger::{spend_in_window, ActionStatus, JsonlActionLog, UtcDay};
use sg_policy::{JsonFilePolicyStore, NewPolicy, PolicyStore};

/// Fire every request at once and collect the outcomes.
async fn race(h: &Harness, requests: Vec<sg_policy::ActionRequest>) -> Vec<ExecuteOutcome> {
    let mut handles = Vec::new();
    for request in requests {
        let enforcer = Arc::clone(&h.enforcer);
        handles.push(tokio::spawn(async move { enforcer.execute(request).await }));
    }
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }
    outcomes
}

fn allowed_total(h: &Harness, policy_id: &str) -> Decimal {
    let entries = h.log.snapshot().unwrap();
    spend_in_window(&entries, policy_id, &UtcDay::containing(Utc::now()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_never_exceed_budget() {
    let h = Harness::new(ScriptedExecutor::with_delay(
        Script::Succeed(Some("0xtx".to_string())),
        Duration::from_millis(5),
    ));
    let policy = h.policy(dec!(100));

    let requests = (0..10).map(|_| swap(&policy.id, dec!(30))).collect();
    let outcomes = race(&h, requests).await;

    let allowed = outcomes.iter().filter(|o| o.allowed).count();
    assert_eq!(allowed, 3);
    assert_eq!(h.executor.calls(), 3);
    assert_eq!(h.log_len(), 10);
    assert_eq!(allowed_total(&h, &policy.id), dec!(90));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_amounts_stay_within_budget() {
    let h = Harness::new(ScriptedExecutor::with_delay(
        Script::Succeed(Some("0xtx".to_string())),
        Duration::from_millis(2),
    ));
    let policy = h.policy(dec!(50));

    let amounts = [dec!(7.5), dec!(12), dec!(20), dec!(3.25), dec!(15), dec!(9.99)];
    let requests = amounts
        .iter()
        .cycle()
        .take(24)
        .map(|amount| swap(&policy.id, *amount))
        .collect();
    let outcomes = race(&h, requests).await;

    let total = allowed_total(&h, &policy.id);
    assert!(total <= dec!(50), "allowed total {} exceeds budget", total);
    assert!(outcomes.iter().any(|o| o.allowed));

    // Every outcome's log entry agrees with it.
    let entries = h.log.snapshot().unwrap();
    assert_eq!(entries.len(), outcomes.len());
    for outcome in &outcomes {
        let entry = entries.iter().find(|e| e.id == outcome.log_id).unwrap();
        let expected = if outcome.allowed {
            ActionStatus::Allowed
        } else {
            ActionStatus::Blocked
        };
        assert_eq!(entry.status, expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn policies_do_not_share_budget() {
    let h = Harness::succeeding();
    let a = h.policy(dec!(60));
    let b = h.policy(dec!(60));

    let mut requests = Vec::new();
    for _ in 0..4 {
        requests.push(swap(&a.id, dec!(20)));
        requests.push(swap(&b.id, dec!(20)));
    }
    let outcomes = race(&h, requests).await;

    assert_eq!(outcomes.iter().filter(|o| o.allowed).count(), 6);
    assert_eq!(allowed_total(&h, &a.id), dec!(60));
    assert_eq!(allowed_total(&h, &b.id), dec!(60));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_executions_release_budget_for_others() {
    let h = Harness::new(ScriptedExecutor::with_delay(
        Script::Fail("venue down".to_string()),
        Duration::from_millis(2),
    ));
    let policy = h.policy(dec!(10));

    let requests = (0..5).map(|_| swap(&policy.id, dec!(10))).collect();
    let outcomes = race(&h, requests).await;

    // Nothing was spent, so every request reached the executor.
    assert!(outcomes.iter().all(|o| !o.allowed));
    assert_eq!(h.executor.calls(), 5);
    assert!(allowed_total(&h, &policy.id).is_zero());
}

/// Two orchestrators with their own locks and log handles on one file stand
/// in for two processes sharing a project.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_log_handles_share_one_budget() {
    let dir = tempfile::tempdir().unwrap();
    let config = EnforcerConfig::for_project(dir.path());
    std::fs::create_dir_all(config.action_log.parent().unwrap()).unwrap();
    let policies = Arc::new(JsonFilePolicyStore::new(&config.policies_dir).unwrap());
    let policy = policies
        .create(
            NewPolicy {
                owner_id: "owner-1".to_string(),
                agent_id: "agent-1".to_string(),
                daily_budget_usd: dec!(100),
                allowed_tokens: vec!["USDC".to_string(), "WETH".to_string()],
                allowed_protocols: vec!["uniswap".to_string()],
                allowed_actions: vec!["swap".to_string()],
                expiry_hours: 24,
            },
            Utc::now(),
        )
        .unwrap();
    policies.assign_wallet(&policy.id, "0xwallet").unwrap();

    let executor = ScriptedExecutor::with_delay(
        Script::Succeed(Some("0xtx".to_string())),
        Duration::from_millis(20),
    );
    let enforcers: Vec<Arc<Enforcer>> = (0..2)
        .map(|_| {
            let log = Arc::new(JsonlActionLog::open(&config.action_log).unwrap());
            Arc::new(Enforcer::new(
                policies.clone(),
                log,
                executor.clone(),
                &config,
            ))
        })
        .collect();

    let handles: Vec<_> = enforcers
        .iter()
        .map(|enforcer| {
            let enforcer = Arc::clone(enforcer);
            let request = swap(&policy.id, dec!(60));
            tokio::spawn(async move { enforcer.execute(request).await })
        })
        .collect();
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(outcomes.iter().filter(|o| o.allowed).count(), 1);
    assert_eq!(executor.calls(), 1);

    assert!(JsonlActionLog::verify_chain(&config.action_log).unwrap());
    let entries = JsonlActionLog::read_all(&config.action_log).unwrap();
    assert_eq!(entries.len(), 2);
    let day = UtcDay::containing(Utc::now());
    assert_eq!(spend_in_window(&entries, &policy.id, &day), dec!(60));
}

#[tokio::test]
async fn abandoned_request_still_records_its_swap() {
    let h = Harness::new(ScriptedExecutor::with_delay(
        Script::Succeed(Some("0xtx".to_string())),
        Duration::from_millis(100),
    ));
    let policy = h.policy(dec!(100));

    // The caller gives up while the executor is still working.
    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        h.enforcer.execute(swap(&policy.id, dec!(60))),
    )
    .await;
    assert!(abandoned.is_err());

    // The next request queues behind it and sees its spend.
    let next = h.enforcer.execute(swap(&policy.id, dec!(60))).await.unwrap();
    assert_eq!(next.kind, OutcomeKind::PolicyViolation);

    assert_eq!(h.executor.calls(), 1);
    let entries = h.log.snapshot().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].status, ActionStatus::Allowed);
    assert_eq!(entries[1].status, ActionStatus::Blocked);
    assert_eq!(allowed_total(&h, &policy.id), dec!(60));
}
