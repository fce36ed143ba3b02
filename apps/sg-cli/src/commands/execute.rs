// execute.rs — Submit one action request through the enforcer.

use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use rust_decimal::Decimal;
use sg_enforcer::{Enforcer, EnforcerConfig, ExecuteOutcome, SimulatedExecutor};
use sg_ledger::JsonlActionLog;
use sg_policy::{ActionRequest, JsonFilePolicyStore};

#[derive(Args)]
pub struct ExecuteArgs {
    /// Policy the agent acts under.
    #[arg(long)]
    pub policy: String,
    /// Agent identity making the request.
    #[arg(long)]
    pub agent: String,
    #[arg(long, default_value = "swap")]
    pub action: String,
    #[arg(long)]
    pub protocol: String,
    #[arg(long)]
    pub token_in: String,
    #[arg(long)]
    pub token_out: String,
    /// Notional value in USD.
    #[arg(long)]
    pub amount: Decimal,
    /// Provenance tag (defaults to the configured source).
    #[arg(long)]
    pub source: Option<String>,
}

impl ExecuteArgs {
    fn to_request(&self) -> ActionRequest {
        ActionRequest {
            policy_id: self.policy.clone(),
            agent_id: self.agent.clone(),
            action: self.action.clone(),
            protocol: self.protocol.clone(),
            token_in: self.token_in.clone(),
            token_out: self.token_out.clone(),
            amount_usd: self.amount,
            source: self.source.clone(),
        }
    }
}

pub async fn execute(args: &ExecuteArgs, config: &EnforcerConfig) -> anyhow::Result<()> {
    let outcome = run(args.to_request(), config).await?;

    println!("{}", serde_json::to_string_pretty(&outcome.response())?);
    if !outcome.allowed {
        anyhow::bail!(
            "request blocked (status {}): {}",
            outcome.http_status(),
            outcome.reason.as_deref().unwrap_or("unknown reason")
        );
    }
    Ok(())
}

/// Wire the file-backed stores to a simulated executor and run one request.
async fn run(request: ActionRequest, config: &EnforcerConfig) -> anyhow::Result<ExecuteOutcome> {
    if let Some(parent) = config.action_log.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let policies = Arc::new(
        JsonFilePolicyStore::new(&config.policies_dir).context("opening policy store")?,
    );
    let log = Arc::new(JsonlActionLog::open(&config.action_log).context("opening action log")?);
    let enforcer = Enforcer::new(policies, log, Arc::new(SimulatedExecutor::new()), config);

    Ok(enforcer.execute(request).await?)
}
