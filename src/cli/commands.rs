//! CLI command implementations
//!
//! Thin adapters over the library engines: parse arguments, run one
//! operation, print the result as JSON on stdout. All policy (preflight,
//! retries, backups) lives in the library.

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::funds::{
    run_airdrop, AirdropRequest, MixStrategy, RedistributionEngine, TransferEngine,
};
use crate::model::WalletExport;
use crate::resolver::WalletResolver;
use crate::rpc::{LedgerClient, RetryPolicy};
use crate::store::ProjectStore;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn ledger(config: &Config, cluster: Option<&str>, rpc_url: Option<&str>) -> LedgerClient {
    let endpoint = config.resolve_rpc(cluster, rpc_url);
    let base = Duration::from_millis(config.rpc.retry_base_delay_ms);
    LedgerClient::new(
        endpoint,
        Duration::from_millis(config.rpc.timeout_ms),
        RetryPolicy {
            max_attempts: config.rpc.max_retries,
            base_delay: base,
            max_delay: base * 8,
        },
    )
}

fn store(config: &Config) -> Result<ProjectStore> {
    Ok(ProjectStore::new(&config.data_dir)?)
}

/// Redacted wallet view for listing output
#[derive(Serialize)]
struct WalletView<'a> {
    id: &'a str,
    address: &'a str,
    name: Option<&'a str>,
    created_at: &'a str,
}

impl<'a> From<&'a WalletExport> for WalletView<'a> {
    fn from(w: &'a WalletExport) -> Self {
        Self {
            id: &w.id,
            address: &w.address,
            name: w.name.as_deref(),
            created_at: &w.created_at,
        }
    }
}

pub fn transfer(
    config: &Config,
    sender_secret: &str,
    recipient: &str,
    amount_sol: &str,
    cluster: Option<&str>,
    rpc_url: Option<&str>,
) -> Result<()> {
    let engine = TransferEngine::new(ledger(config, cluster, rpc_url));
    let signature = engine.transfer(&sender_secret.into(), recipient, amount_sol)?;
    print_json(&json!({
        "signature": signature.to_string(),
        "recipient": recipient,
        "amount_sol": amount_sol,
    }))
}

#[allow(clippy::too_many_arguments)]
pub fn airdrop(
    config: &Config,
    address: &str,
    sol: f64,
    confirm_seconds: f64,
    poll_interval: f64,
    retries: u32,
    backoff_seconds: f64,
    cluster: Option<&str>,
    rpc_url: Option<&str>,
) -> Result<()> {
    let rpc = ledger(config, cluster, rpc_url);
    let request = AirdropRequest {
        address: address.to_string(),
        sol,
        confirm_seconds,
        poll_interval,
        retries,
        backoff_seconds,
    };
    let outcome = run_airdrop(&rpc, &request)?;
    print_json(&outcome)
}

pub fn mix(
    config: &Config,
    wallet_ids: &[String],
    strategy: MixStrategy,
    cluster: Option<&str>,
    rpc_url: Option<&str>,
) -> Result<()> {
    let store = store(config)?;
    let transfers = TransferEngine::new(ledger(config, cluster, rpc_url));
    let report = RedistributionEngine::new(&store, &transfers).mix(wallet_ids, strategy)?;
    print_json(&report)
}

pub fn consolidate(
    config: &Config,
    target: &str,
    project: Option<&str>,
    min_reserve_sol: Option<f64>,
    cluster: Option<&str>,
    rpc_url: Option<&str>,
) -> Result<()> {
    let store = store(config)?;
    let transfers = TransferEngine::new(ledger(config, cluster, rpc_url));
    let report =
        RedistributionEngine::new(&store, &transfers).consolidate(target, project, min_reserve_sol)?;
    print_json(&report)
}

pub fn project_create(config: &Config, name: &str, wallets: usize) -> Result<()> {
    let store = store(config)?;
    let mut project = store.create_project(name)?;
    if wallets > 0 {
        project.generate_wallets(wallets);
        store.save_project(&project)?;
    }
    info!(
        "Created project {} ({} wallets)",
        project.project_id,
        project.wallets.len()
    );
    print_json(&project)
}

pub fn project_list(config: &Config) -> Result<()> {
    let store = store(config)?;
    let projects: Vec<serde_json::Value> = store
        .load_all()?
        .iter()
        .map(|(p, _)| {
            json!({
                "project_id": p.project_id,
                "name": p.name,
                "slug": p.slug,
                "created_at": p.created_at,
                "wallets": p.wallets.len(),
            })
        })
        .collect();
    print_json(&projects)
}

pub fn project_delete(config: &Config, project_id: &str) -> Result<()> {
    let store = store(config)?;
    let trashed = store.delete_project(project_id)?;
    print_json(&json!({
        "project_id": project_id,
        "moved_to": trashed,
    }))
}

pub fn wallet_generate(config: &Config, project_id: &str, count: usize) -> Result<()> {
    let store = store(config)?;
    let created = store.with_project(project_id, |project| {
        Ok(project.generate_wallets(count))
    })?;
    // Full exports, secrets included: generation is the one moment the
    // caller is expected to capture key material
    print_json(&created)
}

pub fn wallet_import(config: &Config, project_id: &str, file: &str) -> Result<()> {
    let content = std::fs::read_to_string(file)?;
    let lines: Vec<String> = content.lines().map(str::to_string).collect();
    let store = store(config)?;
    let imported = store.with_project(project_id, |project| project.import_wallets(&lines))?;
    let views: Vec<WalletView> = imported.iter().map(WalletView::from).collect();
    print_json(&views)
}

pub fn wallet_list(config: &Config, project_id: &str) -> Result<()> {
    let store = store(config)?;
    let project = store.load_project(project_id)?;
    let views: Vec<WalletView> = project.wallets.iter().map(WalletView::from).collect();
    print_json(&views)
}

pub fn wallet_remove(config: &Config, project_id: &str, identifier: &str) -> Result<()> {
    let store = store(config)?;
    let removed = store.remove_wallet(project_id, identifier)?;
    print_json(&json!({
        "removed": WalletView::from(&removed),
        "backed_up": true,
    }))
}

pub fn wallet_balance(
    config: &Config,
    identifier: &str,
    project: Option<&str>,
    cluster: Option<&str>,
    rpc_url: Option<&str>,
) -> Result<()> {
    let store = store(config)?;
    let resolved = WalletResolver::new(&store).require(identifier, project)?;
    let engine = TransferEngine::new(ledger(config, cluster, rpc_url));
    let lamports = engine.balance_lamports(&resolved.wallet.address)?;
    print_json(&json!({
        "wallet_id": resolved.wallet.id,
        "address": resolved.wallet.address,
        "lamports": lamports,
        "sol": crate::amount::lamports_to_sol(lamports),
    }))
}
