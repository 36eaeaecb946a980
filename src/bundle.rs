//! C6 Bundle Lifecycle (spec.md 4.6): `Prepare` decodes edge-signed
//! transactions, verifies tip-account inclusion, simulates, and records a
//! `PreparedBundle`/`BundleStatus` pair; `Submit` sends it to the block
//! engine and merges a single status poll. Grounded on
//! `jito_bundle_client.rs`'s base58-encode-then-`sendBundle` shape, stripped
//! of its tip-transaction construction (C5 already built that) and its
//! continuous rate-limited retry loop (this spec submits once per call).

use std::sync::Arc;

use solana_sdk::transaction::VersionedTransaction;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::adapters::BlockEngineClient;
use crate::cluster::Cluster;
use crate::error::BundleError;
use crate::session::{now_ms, BundleState, BundleStatus, PreparedBundle, Session};

/// spec.md 4.6: bundles must carry between 1 and `MAX_BUNDLE_SIZE`
/// transactions, with the tip transaction last.
fn decode_signed_txs(signed_txs_base64: &[String]) -> Result<(Vec<String>, Vec<String>), BundleError> {
    use base64::Engine;
    let mut txs_base58 = Vec::with_capacity(signed_txs_base64.len());
    let mut first_signatures = Vec::with_capacity(signed_txs_base64.len());
    for encoded in signed_txs_base64 {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| BundleError::DecodeFailed(e.to_string()))?;
        let tx: VersionedTransaction =
            bincode::deserialize(&bytes).map_err(|e| BundleError::DecodeFailed(e.to_string()))?;
        let signature = tx
            .signatures
            .first()
            .map(|s| s.to_string())
            .ok_or_else(|| BundleError::DecodeFailed("transaction has no signatures".to_string()))?;
        first_signatures.push(signature);
        txs_base58.push(bs58::encode(bytes).into_string());
    }
    Ok((txs_base58, first_signatures))
}

/// Best-effort check that the last transaction in the bundle pays one of
/// the block engine's known tip accounts (spec.md 4.6 step "verify the last
/// tx pays a known tip account"). Lookup or mismatch failures are logged,
/// never fatal (spec.md 7: non-fatal warning).
async fn verify_tip_account(block_engine: &dyn BlockEngineClient, cluster: Cluster, last_tx_base64: &str) {
    use base64::Engine;
    let tip_accounts = match block_engine.get_tip_accounts(cluster).await {
        Ok(accounts) => accounts,
        Err(e) => {
            warn!("could not verify tip account, proceeding anyway: {e}");
            return;
        }
    };
    let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(last_tx_base64) else { return };
    let Ok(tx) = bincode::deserialize::<VersionedTransaction>(&bytes) else { return };
    let keys = tx.message.static_account_keys();
    let pays_tip = keys.iter().any(|k| tip_accounts.iter().any(|t| t == &k.to_string()));
    if !pays_tip {
        warn!("last bundle transaction does not appear to pay a known tip account");
    }
}

/// `Prepare(cluster, owner, signedTxsBase64[1..5])` (spec.md 4.6).
pub async fn prepare_bundle(
    session: &Arc<Mutex<Session>>,
    block_engine: &dyn BlockEngineClient,
    cluster: Cluster,
    signed_txs_base64: Vec<String>,
) -> Result<String, BundleError> {
    if !cluster.is_mainnet() {
        return Err(BundleError::DevnetRefused);
    }
    if signed_txs_base64.is_empty() || signed_txs_base64.len() > crate::constants::MAX_BUNDLE_SIZE {
        return Err(BundleError::DecodeFailed(format!(
            "bundle must carry 1..={} transactions, got {}",
            crate::constants::MAX_BUNDLE_SIZE,
            signed_txs_base64.len()
        )));
    }

    let (txs_base58, first_signatures) = decode_signed_txs(&signed_txs_base64)?;
    if let Some(last) = signed_txs_base64.last() {
        verify_tip_account(block_engine, cluster, last).await;
    }

    let remote_status = match block_engine.simulate_bundle(cluster, &txs_base58).await {
        Ok(result) => Some(result),
        Err(e) => {
            return Err(BundleError::SimulationFailed(e.to_string()));
        }
    };

    let local_id = Uuid::new_v4().to_string();
    let now = now_ms();
    let mut guard = session.lock().await;
    guard.prepared_bundles.insert(
        local_id.clone(),
        PreparedBundle { local_id: local_id.clone(), signed_txs_base58: txs_base58, created_at_ms: now },
    );
    guard.bundles.insert(
        local_id.clone(),
        BundleStatus {
            local_id: local_id.clone(),
            remote_id: None,
            state: BundleState::Prepared,
            created_at_ms: now,
            last_update_ms: now,
            remote_status,
            error: None,
            first_signatures,
        },
    );
    guard.pending_action = None;
    Ok(local_id)
}

/// `Submit(cluster, owner, localId)` (spec.md 4.6): sends the prepared
/// bundle and merges a single status poll; polling errors are swallowed
/// since the bundle has already been submitted and a failed poll shouldn't
/// surface as a submit failure.
pub async fn submit_bundle(
    session: &Arc<Mutex<Session>>,
    block_engine: &dyn BlockEngineClient,
    cluster: Cluster,
    local_id: &str,
) -> Result<String, BundleError> {
    let txs_base58 = {
        let guard = session.lock().await;
        guard
            .prepared_bundles
            .get(local_id)
            .map(|b| b.signed_txs_base58.clone())
            .ok_or(BundleError::NotFound)?
    };

    let remote_id = match block_engine.send_bundle(cluster, &txs_base58).await {
        Ok(id) => id,
        Err(e) => {
            let mut guard = session.lock().await;
            if let Some(status) = guard.bundles.get_mut(local_id) {
                status.state = BundleState::Error;
                status.error = Some(e.to_string());
                status.last_update_ms = now_ms();
            }
            return Err(BundleError::SubmitFailed(e.to_string()));
        }
    };

    {
        let mut guard = session.lock().await;
        if let Some(status) = guard.bundles.get_mut(local_id) {
            status.remote_id = Some(remote_id.clone());
            status.state = BundleState::Submitted;
            status.last_update_ms = now_ms();
        }
    }

    match block_engine.get_bundle_statuses(cluster, &[remote_id.clone()]).await {
        Ok(result) => {
            let mut guard = session.lock().await;
            if let Some(status) = guard.bundles.get_mut(local_id) {
                status.remote_status = Some(result);
                status.last_update_ms = now_ms();
            }
        }
        Err(e) => {
            warn!("bundle status poll failed, submit already succeeded: {e}");
        }
    }

    Ok(remote_id)
}
