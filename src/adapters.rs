//! External interface traits (spec.md 6) and the handful of concrete
//! implementations that are direct, uncontroversial bindings rather than
//! business logic (the RPC client and the block-engine HTTP client).
//! Production `SwapAdapter`/`DexAggregatorAdapter`/`TradeLocalAdapter`
//! implementations are explicitly out of scope (spec.md 1); only in-memory
//! fakes for tests ship here, grounded on the trait shapes the teacher's
//! `jito_bundle_client.rs` and `pumpfun_executor.rs` show for equivalent
//! venue calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cluster::Cluster;
use crate::constants::{BUNDLE_SUBMIT_BASE_MS, BUNDLE_SUBMIT_JITTER_MS, BUNDLE_SUBMIT_MAX_RETRIES};

// ---------------------------------------------------------------------------
// 6.1 ClusterRpcClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub owner: String,
    pub data: Vec<u8>,
    pub lamports: u64,
}

#[derive(Debug, Clone)]
pub struct FetchedTransaction {
    pub pre_token_balances: Vec<TokenBalanceEntry>,
    pub post_token_balances: Vec<TokenBalanceEntry>,
    /// Static account keys in transaction-message order (index 0 is
    /// conventionally the fee payer, per spec.md 4.3 step 7 "first static
    /// account key").
    pub static_account_keys: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TokenBalanceEntry {
    pub mint: String,
}

#[derive(Debug, Clone)]
pub struct TokenSupply {
    pub amount: u64,
    pub decimals: u8,
}

#[derive(Debug, Clone)]
pub struct LargestAccountEntry {
    pub amount: u64,
}

#[derive(Debug, Clone)]
pub struct SignatureEntry {
    pub signature: String,
    pub block_time: Option<i64>,
}

/// spec.md 6.1. "All methods: throw on non-2xx. Implementations SHOULD
/// retry transient errors internally" — the retry wrapper lives in
/// `rpc_retry.rs` and callers (C3, C5) apply it around these calls; this
/// trait itself is a thin, non-retrying binding.
#[async_trait]
pub trait ClusterRpcClient: Send + Sync {
    async fn get_latest_blockhash(&self, commitment: Commitment) -> Result<String>;
    async fn get_multiple_accounts_info(&self, pubkeys: &[String]) -> Result<Vec<Option<AccountInfo>>>;
    async fn get_account_info(&self, pubkey: &str, commitment: Commitment) -> Result<Option<AccountInfo>>;
    async fn get_transaction(&self, signature: &str, commitment: Commitment) -> Result<Option<FetchedTransaction>>;
    async fn get_token_supply(&self, mint: &str) -> Result<TokenSupply>;
    async fn get_token_largest_accounts(&self, mint: &str) -> Result<Vec<LargestAccountEntry>>;
    async fn get_signatures_for_address(&self, pubkey: &str, limit: usize, commitment: Commitment) -> Result<Vec<SignatureEntry>>;
}

/// Concrete binding over `solana_client`'s nonblocking RPC client. This is a
/// direct plumbing binding (not a business-logic adapter), grounded on
/// `pumpfun_executor.rs`'s `rpc_client.get_balance` usage pattern and the
/// teacher's existing `solana-client`/`solana-rpc-client` dependencies.
pub struct SolanaRpcAdapter {
    client: Arc<solana_client::nonblocking::rpc_client::RpcClient>,
}

impl SolanaRpcAdapter {
    pub fn new(http_endpoint: &str) -> Self {
        Self {
            client: Arc::new(solana_client::nonblocking::rpc_client::RpcClient::new(
                http_endpoint.to_string(),
            )),
        }
    }
}

#[async_trait]
impl ClusterRpcClient for SolanaRpcAdapter {
    async fn get_latest_blockhash(&self, _commitment: Commitment) -> Result<String> {
        let hash = self.client.get_latest_blockhash().await?;
        Ok(hash.to_string())
    }

    async fn get_multiple_accounts_info(&self, pubkeys: &[String]) -> Result<Vec<Option<AccountInfo>>> {
        let keys: Result<Vec<solana_sdk::pubkey::Pubkey>> = pubkeys
            .iter()
            .map(|p| p.parse().map_err(|e| anyhow!("invalid pubkey {p}: {e}")))
            .collect();
        let keys = keys?;
        let accounts = self.client.get_multiple_accounts(&keys).await?;
        Ok(accounts
            .into_iter()
            .map(|maybe| {
                maybe.map(|acc| AccountInfo { owner: acc.owner.to_string(), data: acc.data, lamports: acc.lamports })
            })
            .collect())
    }

    async fn get_account_info(&self, pubkey: &str, _commitment: Commitment) -> Result<Option<AccountInfo>> {
        let key: solana_sdk::pubkey::Pubkey = pubkey.parse()?;
        match self.client.get_account(&key).await {
            Ok(acc) => Ok(Some(AccountInfo { owner: acc.owner.to_string(), data: acc.data, lamports: acc.lamports })),
            Err(_) => Ok(None),
        }
    }

    async fn get_transaction(&self, signature: &str, commitment: Commitment) -> Result<Option<FetchedTransaction>> {
        use solana_transaction_status::UiTransactionEncoding;
        let sig: solana_sdk::signature::Signature = signature.parse()?;
        let cfg = solana_client::rpc_config::RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(solana_sdk::commitment_config::CommitmentConfig {
                commitment: match commitment {
                    Commitment::Confirmed => solana_sdk::commitment_config::CommitmentLevel::Confirmed,
                    Commitment::Finalized => solana_sdk::commitment_config::CommitmentLevel::Finalized,
                    Commitment::Processed => solana_sdk::commitment_config::CommitmentLevel::Processed,
                },
            }),
            max_supported_transaction_version: Some(0),
        };
        match self.client.get_transaction_with_config(&sig, cfg).await {
            Ok(tx) => Ok(Some(extract_balances(tx))),
            Err(_) => Ok(None),
        }
    }

    async fn get_token_supply(&self, mint: &str) -> Result<TokenSupply> {
        let key: solana_sdk::pubkey::Pubkey = mint.parse()?;
        let supply = self.client.get_token_supply(&key).await?;
        Ok(TokenSupply { amount: supply.amount.parse().unwrap_or(0), decimals: supply.decimals })
    }

    async fn get_token_largest_accounts(&self, mint: &str) -> Result<Vec<LargestAccountEntry>> {
        let key: solana_sdk::pubkey::Pubkey = mint.parse()?;
        let accounts = self.client.get_token_largest_accounts(&key).await?;
        Ok(accounts
            .into_iter()
            .map(|a| LargestAccountEntry { amount: a.amount.amount.parse().unwrap_or(0) })
            .collect())
    }

    async fn get_signatures_for_address(&self, pubkey: &str, limit: usize, _commitment: Commitment) -> Result<Vec<SignatureEntry>> {
        let key: solana_sdk::pubkey::Pubkey = pubkey.parse()?;
        let cfg = solana_client::rpc_config::GetConfirmedSignaturesForAddress2Config {
            limit: Some(limit),
            ..Default::default()
        };
        let sigs = self.client.get_signatures_for_address_with_config(&key, cfg).await?;
        Ok(sigs.into_iter().map(|s| SignatureEntry { signature: s.signature, block_time: s.block_time }).collect())
    }
}

fn extract_balances(
    tx: solana_transaction_status::EncodedConfirmedTransactionWithStatusMeta,
) -> FetchedTransaction {
    let mut pre = Vec::new();
    let mut post = Vec::new();
    let mut static_account_keys = Vec::new();

    if let Some(meta) = tx.transaction.meta {
        if let solana_transaction_status::option_serializer::OptionSerializer::Some(balances) = meta.pre_token_balances {
            pre.extend(balances.into_iter().map(|b| TokenBalanceEntry { mint: b.mint }));
        }
        if let solana_transaction_status::option_serializer::OptionSerializer::Some(balances) = meta.post_token_balances {
            post.extend(balances.into_iter().map(|b| TokenBalanceEntry { mint: b.mint }));
        }
    }
    if let solana_transaction_status::EncodedTransaction::Json(ui_tx) = tx.transaction.transaction {
        if let solana_transaction_status::UiMessage::Raw(raw) = ui_tx.message {
            static_account_keys = raw.account_keys;
        }
    }

    FetchedTransaction { pre_token_balances: pre, post_token_balances: post, static_account_keys }
}

// ---------------------------------------------------------------------------
// 6.2 ClusterWsClient — see ws_client.rs for the trait + concrete impl; kept
// in its own module since log_stream.rs is its only consumer.
// ---------------------------------------------------------------------------

// ---------------------------------------------------------------------------
// 6.3 SwapAdapter (snipe placeholder, spec.md 4.5 step 2)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BuildUnsignedTxParams {
    pub cluster: Cluster,
    pub owner: String,
    pub amount_sol: f64,
    pub memo: String,
    pub cu_limit: Option<u32>,
    pub cu_price: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct BuildTipTxParams {
    pub cluster: Cluster,
    pub owner: String,
    pub tip_account: String,
    pub tip_lamports: u64,
    pub memo: Option<String>,
}

#[async_trait]
pub trait SwapAdapter: Send + Sync {
    async fn build_unsigned_buy_tx_base64(&self, params: BuildUnsignedTxParams) -> Result<String>;
    async fn build_unsigned_sell_tx_base64(&self, params: BuildUnsignedTxParams) -> Result<String>;
    async fn build_unsigned_tip_tx_base64(&self, params: BuildTipTxParams) -> Result<String>;
}

// ---------------------------------------------------------------------------
// 6.4 DexAggregatorAdapter (volume primary, spec.md 4.5)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct QuoteParams {
    pub input_mint: String,
    pub output_mint: String,
    pub amount: u64,
    pub slippage_bps: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub out_amount: u64,
    #[serde(flatten)]
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub struct SwapTxParams {
    pub quote: Quote,
    pub user_public_key: String,
    pub wrap_and_unwrap_sol: bool,
}

#[async_trait]
pub trait DexAggregatorAdapter: Send + Sync {
    async fn quote(&self, params: QuoteParams) -> Result<Quote>;
    async fn swap_tx_base64(&self, params: SwapTxParams) -> Result<String>;
}

// ---------------------------------------------------------------------------
// 6.5 TradeLocalAdapter (volume fallback, spec.md 4.5)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pool {
    Pump,
    Raydium,
}

#[derive(Debug, Clone)]
pub struct TradeLocalParams {
    pub owner: String,
    pub mint: String,
    pub action: TradeAction,
    pub pool: Pool,
    pub amount: f64,
    pub denominated_in_sol: bool,
    pub slippage_percent: f64,
    pub priority_fee_sol: Option<f64>,
}

/// "MAY return either base64 or base58 text or raw bytes; adapter
/// normalizes to base64 for the core" (spec.md 6.5) — callers receive an
/// already-normalized base64 string, so the trait method signature bakes
/// that contract in rather than leaving it to each implementation.
#[async_trait]
pub trait TradeLocalAdapter: Send + Sync {
    async fn trade_tx_base64(&self, params: TradeLocalParams) -> Result<String>;
}

// ---------------------------------------------------------------------------
// 6.6 BlockEngineClient (spec.md 4.6, 6.6)
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BlockEngineClient: Send + Sync {
    async fn get_tip_accounts(&self, cluster: Cluster) -> Result<Vec<String>>;
    async fn simulate_bundle(&self, cluster: Cluster, txs_base58: &[String]) -> Result<Value>;
    async fn send_bundle(&self, cluster: Cluster, txs_base58: &[String]) -> Result<String>;
    async fn get_bundle_statuses(&self, cluster: Cluster, ids: &[String]) -> Result<Value>;
}

/// JSON-RPC 2.0 block-engine client over HTTP. Grounded directly on
/// `jito_bundle_client.rs`'s `submit_bundle_once`/`submit_with_retries`
/// (429-aware jittered backoff, up to 3 attempts) and
/// `BundleSubmissionRequest{jsonrpc,id,method,params}` shape.
pub struct JitoBlockEngineClient {
    http: reqwest::Client,
    base_url: String,
}

impl JitoBlockEngineClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder().timeout(Duration::from_secs(10)).build().expect("http client"),
            base_url: base_url.into(),
        }
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let resp = self.http.post(format!("{}/api/v1/bundles", self.base_url)).json(&body).send().await?;
            let status = resp.status();
            if status.as_u16() == 429 {
                if attempt >= BUNDLE_SUBMIT_MAX_RETRIES {
                    return Err(anyhow!("block engine rate-limited after {attempt} attempts"));
                }
                let backoff_ms =
                    BUNDLE_SUBMIT_BASE_MS * 2u64.pow(attempt - 1) + fastrand::u64(0..BUNDLE_SUBMIT_JITTER_MS);
                warn!("block engine 429, retrying in {backoff_ms}ms (attempt {attempt})");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                continue;
            }
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(anyhow!("block engine error {status}: {text}"));
            }
            let parsed: Value = resp.json().await?;
            if let Some(err) = parsed.get("error") {
                return Err(anyhow!("block engine rpc error: {err}"));
            }
            return Ok(parsed.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}

#[async_trait]
impl BlockEngineClient for JitoBlockEngineClient {
    async fn get_tip_accounts(&self, _cluster: Cluster) -> Result<Vec<String>> {
        let result = self.rpc_call("getTipAccounts", json!([])).await?;
        let accounts: Vec<String> = serde_json::from_value(result)?;
        Ok(accounts)
    }

    async fn simulate_bundle(&self, _cluster: Cluster, txs_base58: &[String]) -> Result<Value> {
        self.rpc_call("simulateBundle", json!([txs_base58])).await
    }

    async fn send_bundle(&self, _cluster: Cluster, txs_base58: &[String]) -> Result<String> {
        let result = self.rpc_call("sendBundle", json!([txs_base58])).await?;
        match result {
            Value::String(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }

    async fn get_bundle_statuses(&self, _cluster: Cluster, ids: &[String]) -> Result<Value> {
        self.rpc_call("getBundleStatuses", json!([ids])).await
    }
}

// ---------------------------------------------------------------------------
// In-memory fakes for tests (not production adapters; spec.md 1 explicitly
// places real venue adapters out of scope).
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeRpcClient {
    pub blockhash: Mutex<String>,
    pub accounts: Mutex<HashMap<String, AccountInfo>>,
    pub transactions: Mutex<HashMap<String, FetchedTransaction>>,
    pub token_supplies: Mutex<HashMap<String, TokenSupply>>,
    pub largest_accounts: Mutex<HashMap<String, Vec<LargestAccountEntry>>>,
}

#[async_trait]
impl ClusterRpcClient for FakeRpcClient {
    async fn get_latest_blockhash(&self, _commitment: Commitment) -> Result<String> {
        Ok(self.blockhash.lock().await.clone())
    }

    async fn get_multiple_accounts_info(&self, pubkeys: &[String]) -> Result<Vec<Option<AccountInfo>>> {
        let accounts = self.accounts.lock().await;
        Ok(pubkeys.iter().map(|p| accounts.get(p).cloned()).collect())
    }

    async fn get_account_info(&self, pubkey: &str, _commitment: Commitment) -> Result<Option<AccountInfo>> {
        Ok(self.accounts.lock().await.get(pubkey).cloned())
    }

    async fn get_transaction(&self, signature: &str, _commitment: Commitment) -> Result<Option<FetchedTransaction>> {
        Ok(self.transactions.lock().await.get(signature).cloned())
    }

    async fn get_token_supply(&self, mint: &str) -> Result<TokenSupply> {
        self.token_supplies.lock().await.get(mint).cloned().ok_or_else(|| anyhow!("no supply for {mint}"))
    }

    async fn get_token_largest_accounts(&self, mint: &str) -> Result<Vec<LargestAccountEntry>> {
        Ok(self.largest_accounts.lock().await.get(mint).cloned().unwrap_or_default())
    }

    async fn get_signatures_for_address(&self, _pubkey: &str, _limit: usize, _commitment: Commitment) -> Result<Vec<SignatureEntry>> {
        Ok(vec![])
    }
}

pub struct FakeBlockEngineClient {
    pub tip_accounts: Vec<String>,
    pub fail_simulate: bool,
}

#[async_trait]
impl BlockEngineClient for FakeBlockEngineClient {
    async fn get_tip_accounts(&self, _cluster: Cluster) -> Result<Vec<String>> {
        Ok(self.tip_accounts.clone())
    }

    async fn simulate_bundle(&self, _cluster: Cluster, _txs_base58: &[String]) -> Result<Value> {
        if self.fail_simulate {
            return Err(anyhow!("simulation failed"));
        }
        Ok(json!({ "ok": true }))
    }

    async fn send_bundle(&self, _cluster: Cluster, _txs_base58: &[String]) -> Result<String> {
        Ok(uuid::Uuid::new_v4().to_string())
    }

    async fn get_bundle_statuses(&self, _cluster: Cluster, _ids: &[String]) -> Result<Value> {
        Ok(json!({ "value": [] }))
    }
}

/// Deterministic fake for `SwapAdapter` (spec.md 6.3) — returns fixed,
/// inspectable tags rather than real serialized transactions.
pub struct FakeSwapAdapter;

#[async_trait]
impl SwapAdapter for FakeSwapAdapter {
    async fn build_unsigned_buy_tx_base64(&self, _params: BuildUnsignedTxParams) -> Result<String> {
        Ok("fake_buy_tx".to_string())
    }

    async fn build_unsigned_sell_tx_base64(&self, _params: BuildUnsignedTxParams) -> Result<String> {
        Ok("fake_sell_tx".to_string())
    }

    async fn build_unsigned_tip_tx_base64(&self, params: BuildTipTxParams) -> Result<String> {
        Ok(format!("fake_tip_tx:{}:{}", params.tip_account, params.tip_lamports))
    }
}

/// Fake `DexAggregatorAdapter` (spec.md 6.4); `fail_quote` simulates a mint
/// with no aggregator route, forcing volume-mode fallback.
#[derive(Default)]
pub struct FakeDexAggregatorAdapter {
    pub fail_quote: bool,
}

#[async_trait]
impl DexAggregatorAdapter for FakeDexAggregatorAdapter {
    async fn quote(&self, params: QuoteParams) -> Result<Quote> {
        if self.fail_quote {
            return Err(anyhow!("no aggregator route for {}", params.output_mint));
        }
        Ok(Quote { out_amount: params.amount, raw: Value::Null })
    }

    async fn swap_tx_base64(&self, _params: SwapTxParams) -> Result<String> {
        Ok("fake_aggregator_swap_tx".to_string())
    }
}

/// Fake `TradeLocalAdapter` (spec.md 6.5); `fail_pools` simulates a pool
/// with no available route for the volume-mode fallback chain.
#[derive(Default)]
pub struct FakeTradeLocalAdapter {
    pub fail_pools: Vec<Pool>,
}

#[async_trait]
impl TradeLocalAdapter for FakeTradeLocalAdapter {
    async fn trade_tx_base64(&self, params: TradeLocalParams) -> Result<String> {
        if self.fail_pools.contains(&params.pool) {
            return Err(anyhow!("{:?} pool unavailable for {}", params.pool, params.mint));
        }
        Ok(format!("fake_trade_local_tx:{:?}", params.pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_rpc_client_round_trips_blockhash() {
        let fake = FakeRpcClient::default();
        *fake.blockhash.lock().await = "abc123".to_string();
        assert_eq!(fake.get_latest_blockhash(Commitment::Processed).await.unwrap(), "abc123");
    }
}
