// log.rs — Action log subcommands: list, spend, verify.

use chrono::Utc;
use clap::Subcommand;
use sg_enforcer::EnforcerConfig;
use sg_ledger::{spend_in_window, ActionLogEntry, JsonlActionLog, LedgerError, UtcDay};
use sg_policy::{JsonFilePolicyStore, PolicyStore};

#[derive(Subcommand)]
pub enum LogCommands {
    /// Show recent entries for a policy, newest first.
    List {
        /// Policy ID.
        policy: String,
        /// Number of entries to show.
        #[arg(short, default_value = "20")]
        n: usize,
    },
    /// Show today's approved spend and remaining budget for a policy.
    Spend {
        /// Policy ID.
        policy: String,
    },
    /// Verify the action log hash chain.
    Verify,
}

pub fn execute(cmd: &LogCommands, config: &EnforcerConfig) -> anyhow::Result<()> {
    let path = &config.action_log;

    match cmd {
        LogCommands::List { policy, n } => {
            let entries = for_policy(read_entries(config)?, policy);
            let recent: Vec<_> = entries.into_iter().take(*n).collect();
            if recent.is_empty() {
                println!("No log entries for policy {}.", policy);
                return Ok(());
            }

            println!("{:<20} {:<8} {:<12} SUMMARY", "TIMESTAMP", "STATUS", "SOURCE");
            println!("{}", "-".repeat(80));
            for entry in &recent {
                println!(
                    "{:<20} {:<8} {:<12} {}",
                    entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.status.to_string(),
                    entry.source,
                    entry.summary,
                );
            }
        }

        LogCommands::Spend { policy } => {
            let store = JsonFilePolicyStore::new(&config.policies_dir)?;
            let record = store
                .get(policy)?
                .ok_or_else(|| anyhow::anyhow!("Policy not found: {}", policy))?;

            let now = Utc::now();
            let day = UtcDay::containing(now);
            let spent = spend_in_window(&read_entries(config)?, policy, &day);

            println!("Policy:    {}", record.id);
            println!("Day (UTC): {}", day.start.format("%Y-%m-%d"));
            println!("Budget:    {} USD", record.daily_budget_usd);
            println!("Spent:     {} USD", spent);
            println!("Remaining: {:.2} USD", record.remaining_budget(spent));
            if record.is_expired_at(now) {
                println!("(policy expired at {})", record.expires_at.to_rfc3339());
            }
        }

        LogCommands::Verify => {
            if !path.exists() {
                println!("No action log found at {}", path.display());
                return Ok(());
            }

            match JsonlActionLog::verify_chain(path) {
                Ok(_) => {
                    let entries = JsonlActionLog::read_all(path)?;
                    println!(
                        "Action log verified: {} entr{}, hash chain intact.",
                        entries.len(),
                        if entries.len() == 1 { "y" } else { "ies" }
                    );
                }
                Err(LedgerError::IntegrityViolation {
                    line,
                    expected,
                    actual,
                }) => {
                    println!("INTEGRITY VIOLATION at line {}:", line);
                    println!("  Expected previous_hash: {}", expected);
                    println!("  Actual previous_hash:   {}", actual);
                    println!();
                    println!("The action log may have been tampered with.");
                    anyhow::bail!("Action log integrity check failed");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

/// All entries in the project log, oldest first. A missing log is empty.
fn read_entries(config: &EnforcerConfig) -> anyhow::Result<Vec<ActionLogEntry>> {
    if !config.action_log.exists() {
        return Ok(Vec::new());
    }
    Ok(JsonlActionLog::read_all(&config.action_log)?)
}

fn for_policy(entries: Vec<ActionLogEntry>, policy_id: &str) -> Vec<ActionLogEntry> {
    let mut matching: Vec<_> = entries
        .into_iter()
        .filter(|e| e.policy_id == policy_id)
        .collect();
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    matching
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_ledger::{ActionLog, ActionStatus, NewLogEntry};
    use tempfile::TempDir;

    fn entry(policy_id: &str, status: ActionStatus) -> NewLogEntry {
        NewLogEntry {
            policy_id: policy_id.to_string(),
            agent_id: "agent-1".to_string(),
            status,
            summary: "test".to_string(),
            reason: "test".to_string(),
            raw_request: r#"{"amountUsd":"5"}"#.to_string(),
            source: "test".to_string(),
        }
    }

    #[test]
    fn for_policy_filters_and_orders_newest_first() {
        let project = TempDir::new().unwrap();
        let config = EnforcerConfig::for_project(project.path());
        std::fs::create_dir_all(config.action_log.parent().unwrap()).unwrap();
        let log = JsonlActionLog::open(&config.action_log).unwrap();
        let first = log.append(entry("p-1", ActionStatus::Allowed)).unwrap();
        log.append(entry("p-2", ActionStatus::Allowed)).unwrap();
        let third = log.append(entry("p-1", ActionStatus::Blocked)).unwrap();

        let listed = for_policy(read_entries(&config).unwrap(), "p-1");
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at >= listed[1].created_at);
        let ids: Vec<_> = listed.iter().map(|e| e.id).collect();
        assert!(ids.contains(&first.id) && ids.contains(&third.id));
    }

    #[test]
    fn missing_log_reads_as_empty_and_verifies() {
        let project = TempDir::new().unwrap();
        let config = EnforcerConfig::for_project(project.path());

        assert!(read_entries(&config).unwrap().is_empty());
        assert!(execute(&LogCommands::Verify, &config).is_ok());
    }

    #[test]
    fn verify_fails_on_tampered_log() {
        let project = TempDir::new().unwrap();
        let config = EnforcerConfig::for_project(project.path());
        std::fs::create_dir_all(config.action_log.parent().unwrap()).unwrap();
        {
            let log = JsonlActionLog::open(&config.action_log).unwrap();
            log.append(entry("p-1", ActionStatus::Allowed)).unwrap();
            log.append(entry("p-1", ActionStatus::Allowed)).unwrap();
        }
        let content = std::fs::read_to_string(&config.action_log).unwrap();
        let edited = content.replacen("\"summary\":\"test\"", "\"summary\":\"edit\"", 1);
        std::fs::write(&config.action_log, edited).unwrap();

        assert!(execute(&LogCommands::Verify, &config).is_err());
    }
}
