//! Batch fund redistribution: mixing and consolidation
//!
//! Both operations resolve wallets through the exact-match resolver and move
//! funds through the transfer engine, but their partial-failure policies
//! differ on purpose. A mix run is exploratory, so the first failed transfer
//! aborts the rest of the batch (the completed ledger is still returned). A
//! consolidation wants to drain as many wallets as possible, so each failure
//! is recorded and processing continues.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use tracing::{info, warn};

use crate::amount::{lamports_to_sol, LAMPORTS_PER_SOL};
use crate::error::{Error, Result};
use crate::resolver::{ResolvedWallet, WalletResolver};
use crate::store::ProjectStore;

use super::transfer::TransferEngine;

/// How mix picks destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixStrategy {
    Random,
    #[serde(rename = "roundrobin")]
    RoundRobin,
}

/// Tunable mix amount heuristics.
///
/// The defaults reproduce the legacy behavior: round-robin moves half the
/// source balance, and every hop keeps a small fee margin behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixPolicy {
    /// Fraction of the source balance a round-robin hop moves
    pub split_fraction: f64,
    /// SOL left behind on every source to cover fees
    pub fee_margin_sol: f64,
}

impl Default for MixPolicy {
    fn default() -> Self {
        Self {
            split_fraction: 0.5,
            fee_margin_sol: 0.00001,
        }
    }
}

impl MixPolicy {
    pub fn fee_margin_lamports(&self) -> u64 {
        (self.fee_margin_sol * LAMPORTS_PER_SOL as f64).round() as u64
    }
}

/// One source→destination hop selected by a mix strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedHop {
    pub from: usize,
    pub to: usize,
    pub lamports: u64,
}

/// One executed transfer in a batch report
#[derive(Debug, Clone, Serialize)]
pub struct TransferRecord {
    pub from_wallet_id: String,
    pub from_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_wallet_id: Option<String>,
    pub to_address: String,
    pub amount_sol: f64,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MixReport {
    pub strategy: MixStrategy,
    pub transfers: usize,
    pub history: Vec<TransferRecord>,
    /// Set when the batch stopped early; completed transfers stay in
    /// `history`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedWallet {
    pub wallet_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidateReport {
    pub project_id: String,
    pub target_wallet_id: String,
    pub target_address: String,
    pub transfers: usize,
    pub history: Vec<TransferRecord>,
    pub skipped: Vec<SkippedWallet>,
}

/// Default SOL reserve a consolidation leaves on each source
pub const DEFAULT_MIN_RESERVE_SOL: f64 = 0.00001;

/// Plan round-robin hops: source `i` sends to `(i+1) mod n`.
///
/// Entries are `(address, balance_lamports)` pairs. Sources whose computed
/// amount is zero, or whose successor shares their address, are skipped.
pub fn plan_round_robin(entries: &[(String, u64)], policy: &MixPolicy) -> Result<Vec<PlannedHop>> {
    let n = entries.len();
    if n < 2 {
        return Err(Error::InvalidRequest(
            "round-robin mix needs at least 2 wallets".to_string(),
        ));
    }
    let margin = policy.fee_margin_lamports();
    let mut hops = Vec::new();
    for i in 0..n {
        let j = (i + 1) % n;
        if entries[i].0 == entries[j].0 {
            continue;
        }
        let split = (entries[i].1 as f64 * policy.split_fraction).floor() as u64;
        let lamports = split.saturating_sub(margin);
        if lamports == 0 {
            continue;
        }
        hops.push(PlannedHop {
            from: i,
            to: j,
            lamports,
        });
    }
    Ok(hops)
}

/// Plan random hops: each source picks a uniformly random different
/// destination and a uniformly random amount in `[0, balance - margin]`.
pub fn plan_random(
    entries: &[(String, u64)],
    policy: &MixPolicy,
    rng: &mut impl Rng,
) -> Vec<PlannedHop> {
    let n = entries.len();
    let margin = policy.fee_margin_lamports();
    let mut hops = Vec::new();
    for i in 0..n {
        let choices: Vec<usize> = (0..n).filter(|&j| j != i).collect();
        let Some(&j) = choices.choose(rng) else {
            continue;
        };
        if entries[i].0 == entries[j].0 {
            continue;
        }
        let max = entries[i].1.saturating_sub(margin);
        if max == 0 {
            continue;
        }
        let lamports = rng.gen_range(0..=max);
        if lamports == 0 {
            continue;
        }
        hops.push(PlannedHop {
            from: i,
            to: j,
            lamports,
        });
    }
    hops
}

/// Select consolidation sources from `(address, balance)` entries.
///
/// Returns `(selected, skipped)` where selected carries `(index, lamports)`
/// and skipped carries `(index, reason)`. The target is never selected and
/// neither is any wallet at or below the reserve.
pub fn plan_consolidation(
    entries: &[(String, u64)],
    target_address: &str,
    reserve_lamports: u64,
) -> (Vec<(usize, u64)>, Vec<(usize, String)>) {
    let mut selected = Vec::new();
    let mut skipped = Vec::new();
    for (i, (address, balance)) in entries.iter().enumerate() {
        if address == target_address {
            skipped.push((i, "same address as target (self-send skipped)".to_string()));
            continue;
        }
        let amount = balance.saturating_sub(reserve_lamports);
        if amount == 0 {
            skipped.push((
                i,
                format!(
                    "no available balance (balance={} SOL)",
                    lamports_to_sol(*balance)
                ),
            ));
            continue;
        }
        selected.push((i, amount));
    }
    (selected, skipped)
}

/// Drives mix and consolidate batches over the store
pub struct RedistributionEngine<'a> {
    store: &'a ProjectStore,
    transfers: &'a TransferEngine,
    policy: MixPolicy,
}

impl<'a> RedistributionEngine<'a> {
    pub fn new(store: &'a ProjectStore, transfers: &'a TransferEngine) -> Self {
        Self {
            store,
            transfers,
            policy: MixPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MixPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Mix balances among a wallet set. Fail-fast: the first transfer error
    /// aborts the remaining batch.
    pub fn mix(&self, wallet_ids: &[String], strategy: MixStrategy) -> Result<MixReport> {
        if wallet_ids.is_empty() {
            return Err(Error::InvalidRequest("wallet_ids required".to_string()));
        }

        let resolver = WalletResolver::new(self.store);
        let mut resolved: Vec<ResolvedWallet> = Vec::with_capacity(wallet_ids.len());
        for id in wallet_ids {
            resolved.push(resolver.require(id, None)?);
        }

        let mut entries = Vec::with_capacity(resolved.len());
        for r in &resolved {
            let balance = self.transfers.balance_lamports(&r.wallet.address)?;
            entries.push((r.wallet.address.clone(), balance));
        }

        let hops = match strategy {
            MixStrategy::RoundRobin => plan_round_robin(&entries, &self.policy)?,
            MixStrategy::Random => {
                plan_random(&entries, &self.policy, &mut rand::thread_rng())
            }
        };
        info!(
            "Mix ({:?}): {} wallets, {} planned hops",
            strategy,
            resolved.len(),
            hops.len()
        );

        let mut history = Vec::new();
        let mut aborted = None;
        for hop in hops {
            let src = &resolved[hop.from];
            let dst = &resolved[hop.to];
            let result = src
                .wallet
                .keypair()
                .and_then(|keypair| {
                    let to = Pubkey::from_str(&dst.wallet.address)
                        .map_err(|e| Error::InvalidAddress(e.to_string()))?;
                    self.transfers.transfer_lamports(&keypair, &to, hop.lamports)
                });
            match result {
                Ok(signature) => history.push(TransferRecord {
                    from_wallet_id: src.wallet.id.clone(),
                    from_address: src.wallet.address.clone(),
                    to_wallet_id: None,
                    to_address: dst.wallet.address.clone(),
                    amount_sol: lamports_to_sol(hop.lamports),
                    signature: signature.to_string(),
                }),
                Err(e) => {
                    warn!("Mix aborted at wallet {}: {}", src.wallet.id, e);
                    aborted = Some(e.to_string());
                    break;
                }
            }
        }

        Ok(MixReport {
            strategy,
            transfers: history.len(),
            history,
            aborted,
        })
    }

    /// Drain every other wallet in scope into the target, keeping
    /// `min_reserve_sol` behind on each source. Best-effort: per-wallet
    /// failures land in `skipped` and processing continues.
    pub fn consolidate(
        &self,
        target_id: &str,
        project_scope: Option<&str>,
        min_reserve_sol: Option<f64>,
    ) -> Result<ConsolidateReport> {
        let resolver = WalletResolver::new(self.store);
        let target = resolver.require(target_id, None)?;
        let target_pubkey = Pubkey::from_str(&target.wallet.address)
            .map_err(|e| Error::InvalidAddress(e.to_string()))?;

        let project = match project_scope {
            Some(project_id) => self.store.load_project(project_id)?,
            None => target.project.clone(),
        };
        let reserve_sol = min_reserve_sol.unwrap_or(DEFAULT_MIN_RESERVE_SOL);
        let reserve = (reserve_sol * LAMPORTS_PER_SOL as f64).round() as u64;
        info!(
            "Consolidating project {} into wallet {} (reserve {} SOL)",
            project.project_id, target.wallet.id, reserve_sol
        );

        let mut history = Vec::new();
        let mut skipped = Vec::new();
        for wallet in &project.wallets {
            if wallet.address == target.wallet.address {
                skipped.push(SkippedWallet {
                    wallet_id: wallet.id.clone(),
                    reason: "same address as target (self-send skipped)".to_string(),
                });
                continue;
            }
            let balance = match self.transfers.balance_lamports(&wallet.address) {
                Ok(balance) => balance,
                Err(e) => {
                    skipped.push(SkippedWallet {
                        wallet_id: wallet.id.clone(),
                        reason: format!("balance query failed: {e}"),
                    });
                    continue;
                }
            };
            let amount = balance.saturating_sub(reserve);
            if amount == 0 {
                skipped.push(SkippedWallet {
                    wallet_id: wallet.id.clone(),
                    reason: format!(
                        "no available balance (balance={} SOL)",
                        lamports_to_sol(balance)
                    ),
                });
                continue;
            }
            let result = wallet
                .keypair()
                .and_then(|keypair| {
                    self.transfers
                        .transfer_lamports(&keypair, &target_pubkey, amount)
                });
            match result {
                Ok(signature) => history.push(TransferRecord {
                    from_wallet_id: wallet.id.clone(),
                    from_address: wallet.address.clone(),
                    to_wallet_id: Some(target.wallet.id.clone()),
                    to_address: target.wallet.address.clone(),
                    amount_sol: lamports_to_sol(amount),
                    signature: signature.to_string(),
                }),
                Err(e) => {
                    warn!("Consolidation skipping wallet {}: {}", wallet.id, e);
                    skipped.push(SkippedWallet {
                        wallet_id: wallet.id.clone(),
                        reason: format!("transfer failed: {e}"),
                    });
                }
            }
        }

        Ok(ConsolidateReport {
            project_id: project.project_id.clone(),
            target_wallet_id: target.wallet.id.clone(),
            target_address: target.wallet.address.clone(),
            transfers: history.len(),
            history,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sol(v: f64) -> u64 {
        (v * LAMPORTS_PER_SOL as f64) as u64
    }

    fn entries(balances: &[u64]) -> Vec<(String, u64)> {
        balances
            .iter()
            .enumerate()
            .map(|(i, &b)| (format!("addr{i}"), b))
            .collect()
    }

    #[test]
    fn test_round_robin_sends_to_successor_mod_n() {
        let policy = MixPolicy::default();
        let entries = entries(&[sol(1.0), sol(2.0), sol(4.0)]);
        let hops = plan_round_robin(&entries, &policy).unwrap();

        assert_eq!(hops.len(), 3);
        for (i, hop) in hops.iter().enumerate() {
            assert_eq!(hop.from, i);
            assert_eq!(hop.to, (i + 1) % 3);
            let expected = (entries[i].1 / 2) - policy.fee_margin_lamports();
            assert_eq!(hop.lamports, expected);
        }
    }

    #[test]
    fn test_round_robin_skips_empty_sources() {
        // Scenario: A=1.0 SOL, B=0 -> exactly one hop, A to B, ~0.49999 SOL
        let policy = MixPolicy::default();
        let entries = entries(&[sol(1.0), 0]);
        let hops = plan_round_robin(&entries, &policy).unwrap();

        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].from, 0);
        assert_eq!(hops[0].to, 1);
        assert_eq!(hops[0].lamports, sol(0.5) - policy.fee_margin_lamports());
    }

    #[test]
    fn test_round_robin_requires_two_wallets() {
        let policy = MixPolicy::default();
        assert!(matches!(
            plan_round_robin(&entries(&[sol(1.0)]), &policy),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_round_robin_respects_policy_overrides() {
        let policy = MixPolicy {
            split_fraction: 0.25,
            fee_margin_sol: 0.0,
        };
        let hops = plan_round_robin(&entries(&[sol(4.0), sol(4.0)]), &policy).unwrap();
        assert_eq!(hops[0].lamports, sol(1.0));
    }

    #[test]
    fn test_random_never_self_sends_and_respects_margin() {
        let policy = MixPolicy::default();
        let margin = policy.fee_margin_lamports();
        let entries = entries(&[sol(1.0), sol(0.5), 0, sol(2.0)]);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let hops = plan_random(&entries, &policy, &mut rng);
            for hop in &hops {
                assert_ne!(hop.from, hop.to);
                assert!(hop.lamports > 0);
                assert!(hop.lamports <= entries[hop.from].1.saturating_sub(margin));
                // The zero-balance wallet is never a source
                assert_ne!(hop.from, 2);
            }
        }
    }

    #[test]
    fn test_consolidation_never_selects_target_or_dry_wallets() {
        let reserve = 10_000u64;
        let mut e = entries(&[sol(1.0), 0, sol(0.3)]);
        e.push(("target".to_string(), sol(5.0)));

        let (selected, skipped) = plan_consolidation(&e, "target", reserve);

        let selected_idx: Vec<usize> = selected.iter().map(|(i, _)| *i).collect();
        assert_eq!(selected_idx, vec![0, 2]);
        assert_eq!(selected[0].1, sol(1.0) - reserve);
        assert_eq!(selected[1].1, sol(0.3) - reserve);

        // Total transferred bounded by total available minus reserves
        let total: u64 = selected.iter().map(|(_, l)| l).sum();
        assert!(total <= (sol(1.0) - reserve) + (sol(0.3) - reserve));

        assert_eq!(skipped.len(), 2);
        assert!(skipped.iter().any(|(i, r)| *i == 1 && r.contains("no available balance")));
        assert!(skipped.iter().any(|(i, r)| *i == 3 && r.contains("self-send")));
    }

    #[test]
    fn test_consolidation_skips_balance_exactly_at_reserve() {
        let reserve = 10_000u64;
        let e = vec![("a".to_string(), reserve), ("t".to_string(), 0)];
        let (selected, skipped) = plan_consolidation(&e, "t", reserve);
        assert!(selected.is_empty());
        assert!(skipped.iter().any(|(i, _)| *i == 0));
    }

    #[test]
    fn test_mix_strategy_serde_names() {
        assert_eq!(
            serde_json::from_str::<MixStrategy>(r#""roundrobin""#).unwrap(),
            MixStrategy::RoundRobin
        );
        assert_eq!(
            serde_json::from_str::<MixStrategy>(r#""random""#).unwrap(),
            MixStrategy::Random
        );
    }
}
