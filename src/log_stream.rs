//! C1 Log Stream Multiplexer (spec.md 4.1): one WS connection per cluster,
//! multiplexing `logsSubscribe` across every session that cares about it,
//! with dedup, cheap pre-RPC heuristics, and reconnect-with-backoff.
//!
//! The dispatcher loop shape (`select!` over ws-event/backoff-sleep,
//! exponential reconnect with jitter, a "stable" window that resets the
//! backoff) is grounded on `other_examples/`'s `ws_stream.rs` reconnect
//! sample and the teacher's `error_recovery_manager.rs` backoff math.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::adapters::ClusterRpcClient;
use crate::cluster::{Cluster, ClusterRuntime, TopicKey};
use crate::config::ProcessConfig;
use crate::constants::{WS_RECONNECT_BASE_MS, WS_RECONNECT_MAX_MS, WS_STABLE_RESET_SECS};
use crate::logring::LogLevel;
use crate::ws_client::{ClusterWsClient, TungsteniteWsClient, WsEvent};

/// A deduped, parsed `logsNotification` ready for routing (spec.md 4.1 -> 4.2).
#[derive(Debug, Clone)]
pub struct LogNotification {
    pub topic: TopicKey,
    pub signature: String,
    pub logs: Vec<String>,
}

/// spec.md 4.1's AMM-pool-init heuristic: `/initialize2|initialize/i`.
/// No `regex` dependency in the teacher's tree, so this is a manual
/// case-insensitive substring check, mirroring `error_recovery_manager.rs`'s
/// `classify_error`.
pub fn looks_like_raydium_pool_init(logs: &[String]) -> bool {
    logs.iter().any(|l| {
        let lower = l.to_lowercase();
        lower.contains("initialize2") || lower.contains("initialize")
    })
}

/// spec.md 4.1's launchpad-trade heuristic: `/buy|sell|create|initialize/i`.
pub fn looks_like_pumpfun_activity(logs: &[String]) -> bool {
    logs.iter().any(|l| {
        let lower = l.to_lowercase();
        lower.contains("buy") || lower.contains("sell") || lower.contains("create") || lower.contains("initialize")
    })
}

fn program_id_for_topic(topic: TopicKey, process_cfg: &ProcessConfig) -> String {
    match topic {
        TopicKey::RaydiumAmm => process_cfg.raydium_program_id.clone(),
        TopicKey::PumpfunLaunchpad => process_cfg.pumpfun_program_id.clone(),
    }
}

fn ws_url_for_cluster(cluster: Cluster, process_cfg: &ProcessConfig) -> String {
    match cluster {
        Cluster::Mainnet => process_cfg.mainnet_rpc_ws.clone(),
        Cluster::Devnet => process_cfg.devnet_rpc_ws.clone(),
    }
}

/// `EnsureSubscription(cluster, topic)` (spec.md 4.1): send `logsSubscribe`
/// for `topic` if it has no subscription id yet. Idempotent — a topic
/// already subscribed (or already awaiting a reply) is a no-op.
async fn ensure_subscription(
    runtime: &Mutex<ClusterRuntime>,
    ws: &dyn ClusterWsClient,
    topic: TopicKey,
    process_cfg: &ProcessConfig,
    next_request_id: &mut u64,
) {
    let mut guard = runtime.lock().await;
    if guard.topic_to_sub_id.contains_key(&topic) || guard.pending_request_to_topic.values().any(|t| *t == topic) {
        return;
    }
    let request_id = *next_request_id;
    *next_request_id += 1;
    guard.pending_request_to_topic.insert(request_id, topic);
    drop(guard);

    let program_id = program_id_for_topic(topic, process_cfg);
    let payload = json!({
        "jsonrpc": "2.0",
        "id": request_id,
        "method": "logsSubscribe",
        "params": [ { "mentions": [program_id] }, { "commitment": "processed" } ],
    });
    if let Err(err) = ws.send(&payload.to_string()).await {
        warn!("logsSubscribe send failed for {topic:?}: {err}");
    }
}

/// `TeardownIfIdle(cluster)` (spec.md 4.1): if no session in this cluster is
/// running, unsubscribe every active topic. Caller decides whether to then
/// close the WS connection entirely.
pub async fn teardown_if_idle(runtime: &Arc<Mutex<ClusterRuntime>>, ws: &dyn ClusterWsClient) {
    let idle = !runtime.lock().await.any_session_running().await;
    if !idle {
        return;
    }
    let sub_ids: Vec<u64> = runtime.lock().await.topic_to_sub_id.values().copied().collect();
    for sub_id in sub_ids {
        let payload = json!({ "jsonrpc": "2.0", "id": 0, "method": "logsUnsubscribe", "params": [sub_id] });
        if let Err(err) = ws.send(&payload.to_string()).await {
            warn!("logsUnsubscribe({sub_id}) failed: {err}");
        }
    }
    runtime.lock().await.reset_subscriptions();
}

/// Parse one raw WS text frame into either a subscription-confirmation
/// (handled in place) or zero/one deduped `LogNotification`.
async fn handle_ws_text(runtime: &Mutex<ClusterRuntime>, text: &str) -> Option<LogNotification> {
    let value: Value = serde_json::from_str(text).ok()?;

    // Subscription confirmation: {"jsonrpc":"2.0","result":<sub_id>,"id":<request_id>}
    if let (Some(id), Some(result)) = (value.get("id"), value.get("result")) {
        let request_id = id.as_u64()?;
        let sub_id = result.as_u64()?;
        let mut guard = runtime.lock().await;
        if let Some(topic) = guard.pending_request_to_topic.remove(&request_id) {
            guard.topic_to_sub_id.insert(topic, sub_id);
            guard.sub_id_to_topic.insert(sub_id, topic);
            guard.logs.info(format!("subscribed {topic:?} -> sub_id {sub_id}"));
        }
        return None;
    }

    // logsNotification: {"method":"logsNotification","params":{"subscription":<sub_id>,"result":{"value":{"signature":...,"logs":[...],"err":...}}}}
    if value.get("method").and_then(Value::as_str) != Some("logsNotification") {
        return None;
    }
    let params = value.get("params")?;
    let sub_id = params.get("subscription")?.as_u64()?;
    let result_value = params.get("result")?.get("value")?;
    if !result_value.get("err")?.is_null() {
        return None; // failed txs are not actionable signals.
    }
    let signature = result_value.get("signature")?.as_str()?.to_string();
    let logs: Vec<String> = result_value
        .get("logs")?
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();

    let mut guard = runtime.lock().await;
    let topic = *guard.sub_id_to_topic.get(&sub_id)?;
    if !guard.dedup.observe(&signature) {
        return None;
    }
    let passes_heuristic = match topic {
        TopicKey::RaydiumAmm => looks_like_raydium_pool_init(&logs),
        TopicKey::PumpfunLaunchpad => looks_like_pumpfun_activity(&logs),
    };
    if !passes_heuristic {
        return None;
    }
    guard.logs.push(LogLevel::Info, format!("{topic:?} signal: {signature}"));
    drop(guard);

    Some(LogNotification { topic, signature, logs })
}

fn backoff_delay(attempt: u32) -> std::time::Duration {
    let base = WS_RECONNECT_BASE_MS as f64 * 2f64.powi(attempt.saturating_sub(1) as i32);
    let capped = base.min(WS_RECONNECT_MAX_MS as f64);
    let jitter = capped * 0.2 * fastrand::f64();
    std::time::Duration::from_millis((capped + jitter) as u64)
}

/// Runs forever: connect, subscribe both topics, forward deduped signal
/// notifications to `on_notification`, reconnect with exponential backoff
/// and jitter on any close/error (spec.md 4.1, 9 open question 4).
pub async fn run_cluster_dispatcher<F, Fut>(
    cluster: Cluster,
    runtime: Arc<Mutex<ClusterRuntime>>,
    process_cfg: Arc<ProcessConfig>,
    rpc: Arc<dyn ClusterRpcClient>,
    on_notification: F,
) where
    F: Fn(Arc<Mutex<ClusterRuntime>>, Arc<dyn ClusterRpcClient>, LogNotification) -> Fut + Send + Sync + 'static + Clone,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let url = ws_url_for_cluster(cluster, &process_cfg);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        info!("{cluster}: connecting to {url} (attempt {attempt})");
        let connected = TungsteniteWsClient::connect(&url).await;
        let (ws, mut rx) = match connected {
            Ok(pair) => pair,
            Err(err) => {
                error!("{cluster}: ws connect failed: {err}");
                sleep(backoff_delay(attempt)).await;
                continue;
            }
        };

        runtime.lock().await.ws_open = true;
        runtime.lock().await.reset_subscriptions();
        let mut next_request_id: u64 = 1;
        ensure_subscription(&runtime, &ws, TopicKey::RaydiumAmm, &process_cfg, &mut next_request_id).await;
        ensure_subscription(&runtime, &ws, TopicKey::PumpfunLaunchpad, &process_cfg, &mut next_request_id).await;

        let connected_at = Instant::now();
        let mut disconnect_reason = "closed".to_string();
        // Opportunistic idle check: Stop doesn't have direct access to this
        // task's WS handle, so teardown happens here instead (spec.md 4.1
        // TeardownIfIdle).
        let mut idle_check = tokio::time::interval(std::time::Duration::from_secs(5));

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(WsEvent::Open) => debug!("{cluster}: ws open"),
                        Some(WsEvent::Message(text)) => {
                            if let Some(notification) = handle_ws_text(&runtime, &text).await {
                                let handler = on_notification.clone();
                                let runtime = runtime.clone();
                                let rpc = rpc.clone();
                                tokio::spawn(async move { handler(runtime, rpc, notification).await });
                            }
                        }
                        Some(WsEvent::Error(err)) => {
                            disconnect_reason = err;
                            break;
                        }
                        Some(WsEvent::Close) | None => break,
                    }
                }
                _ = idle_check.tick() => {
                    teardown_if_idle(&runtime, &ws).await;
                }
            }
        }

        runtime.lock().await.ws_open = false;
        warn!("{cluster}: ws disconnected ({disconnect_reason}), reconnecting");

        if connected_at.elapsed().as_secs() >= WS_STABLE_RESET_SECS {
            attempt = 0;
        }
        sleep(backoff_delay(attempt + 1)).await;
    }
}
