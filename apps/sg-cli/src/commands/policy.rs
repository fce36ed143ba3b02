// policy.rs — Policy subcommands: create, show, list, update, assign-wallet, delete.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use rust_decimal::Decimal;
use sg_enforcer::EnforcerConfig;
use sg_policy::{JsonFilePolicyStore, NewPolicy, Policy, PolicyStore, PolicyUpdate};

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// Create a policy authorizing one agent.
    Create {
        /// Principal issuing the policy.
        #[arg(long)]
        owner: String,
        /// Agent identity the policy authorizes.
        #[arg(long)]
        agent: String,
        /// Daily budget in USD (e.g., "100" or "49.50").
        #[arg(long)]
        budget: Decimal,
        /// Allowed token symbols, comma separated.
        #[arg(long, value_delimiter = ',')]
        tokens: Vec<String>,
        /// Allowed protocols, comma separated.
        #[arg(long, value_delimiter = ',')]
        protocols: Vec<String>,
        /// Allowed actions, comma separated.
        #[arg(long, value_delimiter = ',', default_value = "swap")]
        actions: Vec<String>,
        /// Hours until the policy expires.
        #[arg(long, default_value = "24")]
        expiry_hours: i64,
    },
    /// Show one policy as JSON.
    Show {
        /// Policy ID.
        id: String,
    },
    /// List policies, newest first.
    List {
        /// Only policies created by this owner.
        #[arg(long)]
        owner: Option<String>,
    },
    /// Change the rules of an existing policy.
    Update {
        /// Policy ID.
        id: String,
        #[arg(long)]
        budget: Option<Decimal>,
        #[arg(long, value_delimiter = ',')]
        tokens: Option<Vec<String>>,
        #[arg(long, value_delimiter = ',')]
        protocols: Option<Vec<String>>,
        #[arg(long, value_delimiter = ',')]
        actions: Option<Vec<String>>,
        /// New expiry instant (RFC 3339).
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,
    },
    /// Attach a custody wallet. An existing wallet is kept.
    AssignWallet {
        /// Policy ID.
        id: String,
        /// Custody wallet identifier.
        wallet: String,
    },
    /// Delete a policy. Its action-log history is kept.
    Delete {
        /// Policy ID.
        id: String,
    },
}

pub fn execute(cmd: &PolicyCommands, config: &EnforcerConfig) -> anyhow::Result<()> {
    let store = JsonFilePolicyStore::new(&config.policies_dir).with_context(|| {
        format!("opening policy store at {}", config.policies_dir.display())
    })?;

    match cmd {
        PolicyCommands::Create {
            owner,
            agent,
            budget,
            tokens,
            protocols,
            actions,
            expiry_hours,
        } => {
            let policy = create_policy(
                &store,
                NewPolicy {
                    owner_id: owner.clone(),
                    agent_id: agent.clone(),
                    daily_budget_usd: *budget,
                    allowed_tokens: tokens.clone(),
                    allowed_protocols: protocols.clone(),
                    allowed_actions: actions.clone(),
                    expiry_hours: *expiry_hours,
                },
            )?;
            println!("Created policy {}", policy.id);
            println!("  Agent:   {}", policy.agent_id);
            println!("  Budget:  {} USD/day", policy.daily_budget_usd);
            println!("  Expires: {}", policy.expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
        }

        PolicyCommands::Show { id } => {
            let policy = store
                .get(id)?
                .ok_or_else(|| anyhow::anyhow!("Policy not found: {}", id))?;
            println!("{}", serde_json::to_string_pretty(&policy)?);
        }

        PolicyCommands::List { owner } => {
            let policies = match owner {
                Some(owner) => store.list_by_owner(owner)?,
                None => store.list()?,
            };
            print_policies(&policies);
        }

        PolicyCommands::Update {
            id,
            budget,
            tokens,
            protocols,
            actions,
            expires_at,
        } => {
            let update = PolicyUpdate {
                daily_budget_usd: *budget,
                allowed_tokens: tokens.clone(),
                allowed_protocols: protocols.clone(),
                allowed_actions: actions.clone(),
                expires_at: *expires_at,
            };
            let policy = store.update_rules(id, update)?;
            println!("Updated policy {}", policy.id);
        }

        PolicyCommands::AssignWallet { id, wallet } => {
            let assignment = store.assign_wallet(id, wallet)?;
            if assignment.already_exists {
                println!(
                    "Policy {} already has wallet {} (unchanged)",
                    id, assignment.agent_wallet_id
                );
            } else {
                println!("Assigned wallet {} to policy {}", assignment.agent_wallet_id, id);
            }
        }

        PolicyCommands::Delete { id } => {
            if !store.delete(id)? {
                anyhow::bail!("Policy not found: {}", id);
            }
            println!("Deleted policy {}", id);
        }
    }

    Ok(())
}

fn create_policy(store: &dyn PolicyStore, new_policy: NewPolicy) -> anyhow::Result<Policy> {
    Ok(store.create(new_policy, Utc::now())?)
}

fn print_policies(policies: &[Policy]) {
    if policies.is_empty() {
        println!("No policies.");
        return;
    }

    println!(
        "{:<38} {:<16} {:>12} {:<8} EXPIRES",
        "ID", "AGENT", "BUDGET/DAY", "WALLET"
    );
    println!("{}", "-".repeat(96));

    let now = Utc::now();
    for policy in policies {
        let expires = if policy.is_expired_at(now) {
            "expired".to_string()
        } else {
            policy.expires_at.format("%Y-%m-%d %H:%M").to_string()
        };
        println!(
            "{:<38} {:<16} {:>12} {:<8} {}",
            policy.id,
            truncate(&policy.agent_id, 16),
            policy.daily_budget_usd.to_string(),
            if policy.agent_wallet_id.is_some() { "yes" } else { "no" },
            expires,
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    } else {
        s.to_string()
    }
}
