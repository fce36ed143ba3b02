// locks.rs — Per-policy serialization boundary.
//
// The orchestrator's read-spend / decide / execute / record sequence is a
// check-then-act against the log. Two requests for the same policy must not
// interleave inside it, or both could pass the budget check. `PolicyLocks`
// hands out one async mutex per policy id.
//
// Lifecycle: an entry exists only while someone holds or waits for it. Arcs
// are only cloned under the table lock, so when a guard drops and the table
// holds the sole remaining reference, nobody else can be waiting and the
// entry is removed.
//
// This boundary covers one process. Across processes the orchestrator also
// takes the action log's per-policy lease (`ActionLog::try_lease`).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Table = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// A table of per-policy async locks owned by one orchestrator.
#[derive(Default)]
pub struct PolicyLocks {
    table: Arc<Table>,
}

impl PolicyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `policy_id`.
    pub async fn acquire(&self, policy_id: &str) -> PolicyGuard {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            table
                .entry(policy_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = lock.lock_owned().await;
        PolicyGuard {
            policy_id: policy_id.to_string(),
            guard: Some(guard),
            table: Arc::clone(&self.table),
        }
    }

    /// Number of policies currently held or awaited.
    pub fn active(&self) -> usize {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Exclusive access to one policy. Released on drop.
pub struct PolicyGuard {
    policy_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<Table>,
}

impl Drop for PolicyGuard {
    fn drop(&mut self) {
        // Release the mutex (and its Arc) before inspecting the count.
        self.guard.take();
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = table.get(&self.policy_id) {
            if Arc::strong_count(lock) == 1 {
                table.remove(&self.policy_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn entry_removed_after_release() {
        let locks = PolicyLocks::new();
        {
            let _guard = locks.acquire("p-1").await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn different_policies_do_not_block_each_other() {
        let locks = PolicyLocks::new();
        let _a = locks.acquire("p-1").await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.acquire("p-2")).await;
        assert!(b.is_ok());
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_policy_is_mutually_exclusive() {
        let locks = Arc::new(PolicyLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("p-1").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }
}
