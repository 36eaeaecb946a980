//! C3 Auto-Discovery Filter (spec.md 4.3): fetch tx, infer mint, run safety
//! checks, track momentum window, decide to arm.
//!
//! No `regex` dependency here — like the teacher's `classify_error` in
//! `error_recovery_manager.rs`, the cheap log-text heuristics are plain
//! case-insensitive substring checks, since the teacher's tree has no
//! `regex` dependency anywhere.

use anyhow::Result;

use crate::adapters::{ClusterRpcClient, Commitment, FetchedTransaction};
use crate::config::AutoSnipeConfig;
use crate::constants::{
    MINT_PROBE_MAX_ACCOUNTS, TX_FETCH_CONFIRMED_ATTEMPTS, TX_FETCH_CONFIRMED_BASE_MS,
    TX_FETCH_FINALIZED_ATTEMPTS, TX_FETCH_FINALIZED_BASE_MS,
};
use crate::error::RejectReason;
use crate::mint_layout::parse_mint_layout;
use crate::rpc_retry::{retry_with_backoff, RetryBudget};
use crate::safety::{classify_token_program, run_safety_check, SafetyOk};
use crate::session::{now_ms, AutoStats, MomentumEntry};

/// spec.md 4.3 step 1: `isCreateFromLogs = any log matches /instruction:\s*create/i`.
pub fn is_create_from_logs(logs: &[String]) -> bool {
    logs.iter().any(|l| {
        let lower = l.to_lowercase();
        lower.contains("instruction: create") || lower.contains("instruction:create")
    })
}

/// spec.md 4.3 step 2: fetch the originating transaction, trying
/// `confirmed` then `finalized` with the specified retry budgets.
pub async fn fetch_transaction(
    rpc: &dyn ClusterRpcClient,
    signature: &str,
) -> Result<Option<FetchedTransaction>> {
    let confirmed_budget = RetryBudget::new(TX_FETCH_CONFIRMED_ATTEMPTS, TX_FETCH_CONFIRMED_BASE_MS);
    let result = retry_with_backoff("get_transaction(confirmed)", confirmed_budget, || {
        rpc.get_transaction(signature, Commitment::Confirmed)
    })
    .await;

    if let Ok(Some(tx)) = result {
        return Ok(Some(tx));
    }

    let finalized_budget = RetryBudget::new(TX_FETCH_FINALIZED_ATTEMPTS, TX_FETCH_FINALIZED_BASE_MS);
    retry_with_backoff("get_transaction(finalized)", finalized_budget, || {
        rpc.get_transaction(signature, Commitment::Finalized)
    })
    .await
}

/// spec.md 4.3 step 3: mint inference. Builds the union of mints in
/// pre/post token balances; falls back to probing up to 25 static account
/// keys for an initialized mint owned by a known token program.
pub async fn infer_mint(rpc: &dyn ClusterRpcClient, tx: &FetchedTransaction) -> Option<String> {
    let mut union: Vec<String> = Vec::new();
    for entry in tx.pre_token_balances.iter().chain(tx.post_token_balances.iter()) {
        if !union.contains(&entry.mint) {
            union.push(entry.mint.clone());
        }
    }

    if union.len() == 1 {
        return Some(union[0].clone());
    }
    if union.len() > 1 {
        // "If >1, use the first (heuristic: trades involve a single
        // relevant token)" — spec.md 9 open question 1 keeps this
        // permissive rule unless product says otherwise.
        return Some(union[0].clone());
    }

    let probe_keys: Vec<String> = tx.static_account_keys.iter().take(MINT_PROBE_MAX_ACCOUNTS).cloned().collect();
    if probe_keys.is_empty() {
        return None;
    }
    let accounts = rpc.get_multiple_accounts_info(&probe_keys).await.ok()?;
    for (key, account) in probe_keys.iter().zip(accounts.iter()) {
        let Some(account) = account else { continue };
        if classify_token_program(&account.owner).is_none() {
            continue;
        }
        if let Some(layout) = parse_mint_layout(&account.data) {
            if layout.is_initialized {
                return Some(key.clone());
            }
        }
    }
    None
}

/// spec.md 4.3 step 4: `isMintNewInTx = mint in postTokenBalances and mint
/// not in preTokenBalances`.
pub fn is_mint_new_in_tx(tx: &FetchedTransaction, mint: &str) -> bool {
    let in_post = tx.post_token_balances.iter().any(|b| b.mint == mint);
    let in_pre = tx.pre_token_balances.iter().any(|b| b.mint == mint);
    in_post && !in_pre
}

pub struct DiscoveryOutcome {
    pub target_mint: String,
}

/// Orchestrates spec.md 4.3 steps 1-10 for one notification against one
/// session's momentum map, bumping `stats` at each stage so
/// `AutoStats::monotonicity_holds` (spec.md 8 property 6) is maintained by
/// construction. Callers (signal_router.rs) are responsible for the
/// epoch-guard re-check around RPC suspension points (spec.md 5, 9).
pub async fn run_auto_discovery(
    rpc: &dyn ClusterRpcClient,
    cfg: &AutoSnipeConfig,
    momentum: &mut std::collections::HashMap<String, MomentumEntry>,
    stats: &mut AutoStats,
    signature: &str,
    logs: &[String],
) -> Result<DiscoveryOutcome, RejectReason> {
    stats.signals += 1;
    let is_create_from_logs = is_create_from_logs(logs);

    let tx = fetch_transaction(rpc, signature).await.map_err(|_| RejectReason::NoMint);
    let tx = match tx {
        Ok(Some(tx)) => tx,
        _ => {
            stats.bump_reject(&RejectReason::NoMint);
            return Err(RejectReason::NoMint);
        }
    };
    stats.tx_ok += 1;

    let mint = match infer_mint(rpc, &tx).await {
        Some(mint) => mint,
        None => {
            stats.bump_reject(&RejectReason::NoMint);
            return Err(RejectReason::NoMint);
        }
    };
    stats.mint_inferred += 1;

    let is_create = is_create_from_logs || is_mint_new_in_tx(&tx, &mint);
    let now = now_ms();

    let entry_exists = momentum.contains_key(&mint);
    if !entry_exists {
        if !is_create {
            stats.bump_reject(&RejectReason::NotNew);
            return Err(RejectReason::NotNew);
        }
        momentum.insert(mint.clone(), MomentumEntry::new(now));
    } else {
        let window_ms = cfg.window_sec as i64 * 1000;
        let expired = {
            let entry = momentum.get(&mint).unwrap();
            now - entry.first_seen_ms > window_ms
        };
        if expired {
            if !is_create {
                stats.bump_reject(&RejectReason::WindowExpired);
                return Err(RejectReason::WindowExpired);
            }
            momentum.get_mut(&mint).unwrap().reset(now);
        }
    }

    let age_sec = {
        let entry = momentum.get(&mint).unwrap();
        (now - entry.created_at_ms) / 1000
    };
    if age_sec > cfg.max_tx_age_sec as i64 {
        stats.bump_reject(&RejectReason::TooOld);
        return Err(RejectReason::TooOld);
    }

    {
        // spec.md 4.3 step 7: the fee payer is the transaction's first
        // static account key.
        let payer = tx.static_account_keys.first().cloned();
        let entry = momentum.get_mut(&mint).unwrap();
        entry.count += 1;
        if let Some(payer) = payer {
            entry.unique_fee_payers.insert(payer);
        }
    }

    let needs_safety_check = momentum.get(&mint).unwrap().safety.is_none();
    if needs_safety_check {
        let result = run_safety_check(rpc, &mint, cfg).await;
        momentum.get_mut(&mint).unwrap().safety = Some(result);
    }

    let safety_result = momentum.get(&mint).unwrap().safety.clone().expect("safety checked above");
    let safety_ok: SafetyOk = match safety_result {
        Ok(ok) => ok,
        Err(reason) => {
            stats.bump_reject(&RejectReason::Safety(reason.clone()));
            return Err(RejectReason::Safety(reason));
        }
    };
    let _ = safety_ok;
    stats.safety_ok += 1;

    let entry = momentum.get(&mint).unwrap();
    if entry.count < cfg.min_signals_in_window {
        stats.bump_reject(&RejectReason::Momentum);
        return Err(RejectReason::Momentum);
    }
    if (entry.unique_fee_payers.len() as u32) < cfg.min_unique_fee_payers_in_window {
        stats.bump_reject(&RejectReason::UniquePayers);
        return Err(RejectReason::UniquePayers);
    }

    stats.triggered += 1;
    Ok(DiscoveryOutcome { target_mint: mint })
}
