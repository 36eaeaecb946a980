//! C5 Action Materializer (spec.md 4.5): turns an armed `pendingAction`
//! lacking unsigned transactions into one carrying them, routing by
//! mode (snipe: single swap-adapter call; volume: aggregator with
//! launchpad/AMM fallback), appending a tip transaction last when MEV is
//! enabled.

use std::collections::HashMap;
use std::time::Instant;

use once_cell::sync::Lazy;
use tokio::sync::Mutex;
use tracing::warn;

use crate::adapters::{
    BlockEngineClient, BuildTipTxParams, BuildUnsignedTxParams, DexAggregatorAdapter, Pool, QuoteParams, SwapAdapter,
    SwapTxParams, TradeAction, TradeLocalAdapter, TradeLocalParams,
};
use crate::cluster::Cluster;
use crate::config::{BotConfig, Mode};
use crate::constants::{
    SNIPE_COMPUTE_UNIT_LIMIT, SNIPE_COMPUTE_UNIT_PRICE_MICROLAMPORTS, SWAP_ADAPTER_CALL_TIMEOUT, TIP_ACCOUNT_CACHE_TTL,
    TIP_BASE_LAMPORTS, TIP_JITTER_LAMPORTS, WRAPPED_SOL_MINT,
};
use crate::constants::sol_to_lamports;
use crate::error::MaterializeError;
use crate::session::{now_ms, PendingAction, Session, SignAndBundleAction};

/// Result of a successful materialization (spec.md 4.5).
pub struct MaterializeSuccess {
    pub txs: Vec<String>,
    pub route: Option<String>,
}

struct CachedTipAccounts {
    accounts: Vec<String>,
    fetched_at: Instant,
}

/// Tip-account cache keyed by cluster, shared across sessions (spec.md 4.5
/// step 3, 4.6, 8 property 9: "SHOULD be cached 30 minutes; stale-on-error
/// is acceptable").
static TIP_ACCOUNT_CACHE: Lazy<Mutex<HashMap<Cluster, CachedTipAccounts>>> = Lazy::new(|| Mutex::new(HashMap::new()));

async fn get_or_refresh_tip_accounts(block_engine: &dyn BlockEngineClient, cluster: Cluster) -> Vec<String> {
    let mut cache = TIP_ACCOUNT_CACHE.lock().await;
    if let Some(entry) = cache.get(&cluster) {
        if entry.fetched_at.elapsed() < TIP_ACCOUNT_CACHE_TTL {
            return entry.accounts.clone();
        }
    }
    match block_engine.get_tip_accounts(cluster).await {
        Ok(accounts) => {
            cache.insert(cluster, CachedTipAccounts { accounts: accounts.clone(), fetched_at: Instant::now() });
            accounts
        }
        Err(e) => {
            // Stale-on-error: serve the last known list rather than failing
            // tip inclusion outright (spec.md 4.5, 8 property 9).
            warn!("tip account refresh failed, serving stale cache if any: {e}");
            cache.get(&cluster).map(|entry| entry.accounts.clone()).unwrap_or_default()
        }
    }
}

/// Appends a tip transaction, or returns `None` (never an error) if tipping
/// doesn't apply here (spec.md 4.5 step 3, 7: "proceed without a tip rather
/// than fail the whole action").
async fn build_tip_tx_if_applicable(
    swap_adapter: &dyn SwapAdapter,
    block_engine: &dyn BlockEngineClient,
    cluster: Cluster,
    owner: &str,
) -> Option<String> {
    if !cluster.is_mainnet() {
        return None;
    }
    let accounts = get_or_refresh_tip_accounts(block_engine, cluster).await;
    if accounts.is_empty() {
        warn!("no tip accounts available, proceeding without a tip");
        return None;
    }
    let tip_account = accounts[fastrand::usize(..accounts.len())].clone();
    let tip_lamports = TIP_BASE_LAMPORTS + fastrand::u64(0..TIP_JITTER_LAMPORTS);
    let params = BuildTipTxParams { cluster, owner: owner.to_string(), tip_account, tip_lamports, memo: None };
    match swap_adapter.build_unsigned_tip_tx_base64(params).await {
        Ok(tx) => Some(tx),
        Err(e) => {
            warn!("tip tx build failed, proceeding without a tip: {e}");
            None
        }
    }
}

/// Entry point: materializes the session's current `pendingAction` if it
/// needs unsigned txs, re-validating staleness before the write (spec.md
/// 4.4, 4.5, 5, 9).
pub async fn materialize(
    session: &std::sync::Arc<Mutex<Session>>,
    swap_adapter: &dyn SwapAdapter,
    aggregator: &dyn DexAggregatorAdapter,
    trade_local: &dyn TradeLocalAdapter,
    block_engine: &dyn BlockEngineClient,
) {
    let snapshot = session.lock().await.snapshot();
    let Some(config) = snapshot.config.clone() else { return };

    let action = {
        let guard = session.lock().await;
        match &guard.pending_action {
            Some(PendingAction::SignAndBundle(a)) if a.needs_unsigned_txs => a.clone(),
            // Idempotency: nothing to do if unset or already materialized
            // (spec.md 4.5 "Idempotency").
            _ => return,
        }
    };
    let owner = session.lock().await.owner.clone();

    let result = match config.mode {
        Mode::Snipe => materialize_snipe(swap_adapter, block_engine, &config, &owner, &action).await,
        Mode::Volume => materialize_volume(swap_adapter, aggregator, trade_local, block_engine, &config, &owner, &action).await,
    };

    let mut guard = session.lock().await;
    if snapshot.is_stale(&guard) {
        return;
    }
    match result {
        Ok(success) => {
            guard.pending_action = Some(PendingAction::SignAndBundle(SignAndBundleAction {
                unsigned_txs_base64: success.txs,
                needs_unsigned_txs: false,
                ..action
            }));
            if config.mode == Mode::Volume {
                guard.last_volume_route = success.route;
            }
            guard.logs.info("materialized pendingAction");
        }
        Err(e) => {
            guard.logs.error(format!("materialization failed: {e}"));
            guard.pending_action = None;
            if config.mode == Mode::Volume {
                guard.last_volume_action_ms = now_ms();
            }
        }
    }
}

async fn materialize_snipe(
    swap_adapter: &dyn SwapAdapter,
    block_engine: &dyn BlockEngineClient,
    config: &BotConfig,
    owner: &str,
    action: &SignAndBundleAction,
) -> Result<MaterializeSuccess, MaterializeError> {
    let memo = format!(
        "mode=snipe;phase={:?};source={:?};sig={};mint={}",
        config.pumpfun_phase,
        action.source,
        action.trigger_signature,
        action.target_mint.as_deref().unwrap_or("")
    );
    let params = BuildUnsignedTxParams {
        cluster: config.cluster,
        owner: owner.to_string(),
        amount_sol: config.buy_amount_sol,
        memo,
        cu_limit: Some(SNIPE_COMPUTE_UNIT_LIMIT),
        cu_price: Some(SNIPE_COMPUTE_UNIT_PRICE_MICROLAMPORTS),
    };
    let buy_tx = swap_adapter
        .build_unsigned_buy_tx_base64(params)
        .await
        .map_err(|e| MaterializeError::AdapterFailure(e.to_string()))?;

    let mut txs = vec![buy_tx];
    if config.mev_enabled {
        if let Some(tip) = build_tip_tx_if_applicable(swap_adapter, block_engine, config.cluster, owner).await {
            txs.push(tip);
        }
    }
    Ok(MaterializeSuccess { txs, route: None })
}

async fn materialize_volume(
    swap_adapter: &dyn SwapAdapter,
    aggregator: &dyn DexAggregatorAdapter,
    trade_local: &dyn TradeLocalAdapter,
    block_engine: &dyn BlockEngineClient,
    config: &BotConfig,
    owner: &str,
    _action: &SignAndBundleAction,
) -> Result<MaterializeSuccess, MaterializeError> {
    let mint = config.volume.token_mint.clone().ok_or(MaterializeError::MissingTokenMint)?;
    let amount_lamports = sol_to_lamports(config.buy_amount_sol);

    let primary = timeout_aggregator_route(aggregator, owner, config, &mint, amount_lamports).await;
    let (txs, route) = match primary {
        Ok(txs) => (txs, "jupiter"),
        Err(primary_err) => {
            warn!("aggregator route failed, falling back to launchpad: {primary_err}");
            let launchpad = trade_local_route(trade_local, owner, &mint, Pool::Pump, config).await;
            match launchpad {
                Ok(tx) => {
                    if config.volume.roundtrip {
                        warn!("roundtrip only applies to the primary aggregator route; fallback is buy-only");
                    }
                    (vec![tx], "pumpfun")
                }
                Err(launchpad_err) => {
                    let amm = trade_local_route(trade_local, owner, &mint, Pool::Raydium, config).await;
                    match amm {
                        Ok(tx) => {
                            if config.volume.roundtrip {
                                warn!("roundtrip only applies to the primary aggregator route; fallback is buy-only");
                            }
                            (vec![tx], "raydium")
                        }
                        Err(amm_err) => {
                            return Err(MaterializeError::AllRoutesFailed {
                                primary: primary_err,
                                secondary: format!("launchpad: {launchpad_err}; amm: {amm_err}"),
                            });
                        }
                    }
                }
            }
        }
    };

    finish_volume(swap_adapter, block_engine, config, owner, txs, route).await
}

async fn timeout_aggregator_route(
    aggregator: &dyn DexAggregatorAdapter,
    owner: &str,
    config: &BotConfig,
    mint: &str,
    amount_lamports: u64,
) -> Result<Vec<String>, String> {
    tokio::time::timeout(SWAP_ADAPTER_CALL_TIMEOUT, async {
        let quote = aggregator
            .quote(QuoteParams {
                input_mint: WRAPPED_SOL_MINT.to_string(),
                output_mint: mint.to_string(),
                amount: amount_lamports,
                slippage_bps: config.volume.slippage_bps,
            })
            .await
            .map_err(|e| e.to_string())?;
        let buy_tx = aggregator
            .swap_tx_base64(SwapTxParams { quote: quote.clone(), user_public_key: owner.to_string(), wrap_and_unwrap_sol: true })
            .await
            .map_err(|e| e.to_string())?;

        let mut txs = vec![buy_tx];
        if config.volume.roundtrip {
            let reverse_quote = aggregator
                .quote(QuoteParams {
                    input_mint: mint.to_string(),
                    output_mint: WRAPPED_SOL_MINT.to_string(),
                    amount: quote.out_amount,
                    slippage_bps: config.volume.slippage_bps,
                })
                .await
                .map_err(|e| e.to_string())?;
            let sell_tx = aggregator
                .swap_tx_base64(SwapTxParams {
                    quote: reverse_quote,
                    user_public_key: owner.to_string(),
                    wrap_and_unwrap_sol: true,
                })
                .await
                .map_err(|e| e.to_string())?;
            txs.push(sell_tx);
        }
        Ok(txs)
    })
    .await
    .unwrap_or_else(|_| Err("aggregator call timed out".to_string()))
}

async fn trade_local_route(
    trade_local: &dyn TradeLocalAdapter,
    owner: &str,
    mint: &str,
    pool: Pool,
    config: &BotConfig,
) -> Result<String, String> {
    let slippage_percent = (config.volume.slippage_bps as f64 / 100.0).ceil().max(1.0);
    tokio::time::timeout(
        SWAP_ADAPTER_CALL_TIMEOUT,
        trade_local.trade_tx_base64(TradeLocalParams {
            owner: owner.to_string(),
            mint: mint.to_string(),
            action: TradeAction::Buy,
            pool,
            amount: config.buy_amount_sol,
            denominated_in_sol: true,
            slippage_percent,
            priority_fee_sol: None,
        }),
    )
    .await
    .unwrap_or_else(|_| Err(anyhow::anyhow!("{pool:?} call timed out")))
    .map_err(|e| e.to_string())
}

async fn finish_volume(
    swap_adapter: &dyn SwapAdapter,
    block_engine: &dyn BlockEngineClient,
    config: &BotConfig,
    owner: &str,
    mut txs: Vec<String>,
    route: &str,
) -> Result<MaterializeSuccess, MaterializeError> {
    if config.mev_enabled {
        if let Some(tip) = build_tip_tx_if_applicable(swap_adapter, block_engine, config.cluster, owner).await {
            txs.push(tip);
        }
    }
    Ok(MaterializeSuccess { txs, route: Some(route.to_string()) })
}
