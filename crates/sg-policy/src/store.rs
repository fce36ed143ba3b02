// store.rs — Policy persistence.
//
// The enforcement core only ever reads policies by id. Everything else here
// (create, rule updates, wallet assignment, listing) serves the operator
// surface. Two backends are provided:
//
//   MemoryPolicyStore   — a map behind an RwLock, for tests and embedding
//   JsonFilePolicyStore — one JSON file per policy: `<dir>/<policy_id>.json`

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::policy::{NewPolicy, Policy, PolicyUpdate};

/// Result of assigning a custody wallet to a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAssignment {
    pub agent_wallet_id: String,
    /// True if the policy already had a wallet; the existing one is kept.
    pub already_exists: bool,
}

/// Storage collaborator for policies.
///
/// Implementors provide the five primitive operations; the lifecycle
/// operations (`create`, `update_rules`, `assign_wallet`) are built on them.
pub trait PolicyStore: Send + Sync {
    /// Store a new policy. Fails if the id is taken.
    fn insert(&self, policy: &Policy) -> Result<(), PolicyError>;

    /// Look up a policy. Unknown ids are `Ok(None)`, never an error.
    fn get(&self, policy_id: &str) -> Result<Option<Policy>, PolicyError>;

    /// Overwrite an existing policy.
    fn save(&self, policy: &Policy) -> Result<(), PolicyError>;

    /// Remove a policy. Returns false if it did not exist.
    fn delete(&self, policy_id: &str) -> Result<bool, PolicyError>;

    /// All policies, newest first.
    fn list(&self) -> Result<Vec<Policy>, PolicyError>;

    /// Policies created by `owner_id`, newest first.
    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Policy>, PolicyError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|p| p.owner_id == owner_id)
            .collect())
    }

    /// Validate and store a new policy created at `now`.
    fn create(&self, new_policy: NewPolicy, now: DateTime<Utc>) -> Result<Policy, PolicyError> {
        let policy = new_policy.into_policy(now)?;
        self.insert(&policy)?;
        tracing::info!(policy_id = %policy.id, agent_id = %policy.agent_id, "policy created");
        Ok(policy)
    }

    /// Patch the rule fields of a stored policy.
    fn update_rules(&self, policy_id: &str, update: PolicyUpdate) -> Result<Policy, PolicyError> {
        let mut policy = self
            .get(policy_id)?
            .ok_or_else(|| PolicyError::NotFound(policy_id.to_string()))?;
        policy.apply_update(update)?;
        self.save(&policy)?;
        tracing::info!(policy_id = %policy.id, "policy rules updated");
        Ok(policy)
    }

    /// Attach a custody wallet. Idempotent: an existing wallet is never replaced.
    fn assign_wallet(
        &self,
        policy_id: &str,
        wallet_id: &str,
    ) -> Result<WalletAssignment, PolicyError> {
        let mut policy = self
            .get(policy_id)?
            .ok_or_else(|| PolicyError::NotFound(policy_id.to_string()))?;
        if let Some(existing) = &policy.agent_wallet_id {
            return Ok(WalletAssignment {
                agent_wallet_id: existing.clone(),
                already_exists: true,
            });
        }
        policy.agent_wallet_id = Some(wallet_id.to_string());
        self.save(&policy)?;
        tracing::info!(policy_id = %policy.id, wallet = %wallet_id, "agent wallet assigned");
        Ok(WalletAssignment {
            agent_wallet_id: wallet_id.to_string(),
            already_exists: false,
        })
    }
}

fn newest_first(policies: &mut [Policy]) {
    policies.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// In-memory policy store.
#[derive(Default)]
pub struct MemoryPolicyStore {
    policies: RwLock<HashMap<String, Policy>>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> PolicyError {
    PolicyError::LockPoisoned(e.to_string())
}

impl PolicyStore for MemoryPolicyStore {
    fn insert(&self, policy: &Policy) -> Result<(), PolicyError> {
        let mut policies = self.policies.write().map_err(poisoned)?;
        if policies.contains_key(&policy.id) {
            return Err(PolicyError::AlreadyExists(policy.id.clone()));
        }
        policies.insert(policy.id.clone(), policy.clone());
        Ok(())
    }

    fn get(&self, policy_id: &str) -> Result<Option<Policy>, PolicyError> {
        Ok(self.policies.read().map_err(poisoned)?.get(policy_id).cloned())
    }

    fn save(&self, policy: &Policy) -> Result<(), PolicyError> {
        let mut policies = self.policies.write().map_err(poisoned)?;
        if !policies.contains_key(&policy.id) {
            return Err(PolicyError::NotFound(policy.id.clone()));
        }
        policies.insert(policy.id.clone(), policy.clone());
        Ok(())
    }

    fn delete(&self, policy_id: &str) -> Result<bool, PolicyError> {
        Ok(self
            .policies
            .write()
            .map_err(poisoned)?
            .remove(policy_id)
            .is_some())
    }

    fn list(&self) -> Result<Vec<Policy>, PolicyError> {
        let mut all: Vec<Policy> = self
            .policies
            .read()
            .map_err(poisoned)?
            .values()
            .cloned()
            .collect();
        newest_first(&mut all);
        Ok(all)
    }
}

/// File-backed policy store: one pretty-printed JSON file per policy.
pub struct JsonFilePolicyStore {
    store_dir: PathBuf,
}

impl JsonFilePolicyStore {
    /// Create a store backed by `store_dir`, creating the directory if needed.
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| PolicyError::IoError {
            path: store_dir.display().to_string(),
            source,
        })?;
        Ok(Self { store_dir })
    }

    /// Path to the JSON file for a policy id.
    ///
    /// Ids come from untrusted requests, so anything that is not a plain
    /// `[A-Za-z0-9_-]` token maps to no file at all.
    fn policy_file(&self, policy_id: &str) -> Option<PathBuf> {
        let plain = !policy_id.is_empty()
            && policy_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        plain.then(|| self.store_dir.join(format!("{}.json", policy_id)))
    }

    fn write(&self, path: &Path, policy: &Policy) -> Result<(), PolicyError> {
        let json = serde_json::to_string_pretty(policy)?;
        fs::write(path, json).map_err(|source| PolicyError::IoError {
            path: path.display().to_string(),
            source,
        })
    }

    fn read(path: &Path) -> Result<Policy, PolicyError> {
        let json = fs::read_to_string(path).map_err(|source| PolicyError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl PolicyStore for JsonFilePolicyStore {
    fn insert(&self, policy: &Policy) -> Result<(), PolicyError> {
        let path = self
            .policy_file(&policy.id)
            .ok_or_else(|| PolicyError::NotFound(policy.id.clone()))?;
        if path.exists() {
            return Err(PolicyError::AlreadyExists(policy.id.clone()));
        }
        self.write(&path, policy)
    }

    fn get(&self, policy_id: &str) -> Result<Option<Policy>, PolicyError> {
        match self.policy_file(policy_id) {
            Some(path) if path.exists() => Ok(Some(Self::read(&path)?)),
            _ => Ok(None),
        }
    }

    fn save(&self, policy: &Policy) -> Result<(), PolicyError> {
        match self.policy_file(&policy.id) {
            Some(path) if path.exists() => self.write(&path, policy),
            _ => Err(PolicyError::NotFound(policy.id.clone())),
        }
    }

    fn delete(&self, policy_id: &str) -> Result<bool, PolicyError> {
        let Some(path) = self.policy_file(policy_id) else {
            return Ok(false);
        };
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|source| PolicyError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<Policy>, PolicyError> {
        let entries = fs::read_dir(&self.store_dir).map_err(|source| PolicyError::IoError {
            path: self.store_dir.display().to_string(),
            source,
        })?;

        let mut policies = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PolicyError::IoError {
                path: self.store_dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match Self::read(&path) {
                    Ok(policy) => policies.push(policy),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unreadable policy file")
                    }
                }
            }
        }

        newest_first(&mut policies);
        Ok(policies)
    }
}
