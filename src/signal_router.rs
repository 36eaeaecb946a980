//! C2 Signal Router (spec.md 4.2): fan a deduped log notification out to
//! every running session in the cluster, route by mode x phase x target
//! mode, and arm `pendingAction` when a session's criteria are met.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::adapters::ClusterRpcClient;
use crate::auto_discovery::{fetch_transaction, infer_mint, run_auto_discovery};
use crate::cluster::{ClusterRuntime, TopicKey};
use crate::config::{Mode, PumpFunPhase, SnipeTargetMode};
use crate::constants::{EMPTY_SNIPE_LIST_WARN_INTERVAL_SECS, HEARTBEAT_INTERVAL_SECS};
use crate::error::RejectReason;
use crate::log_stream::LogNotification;
use crate::session::{now_ms, PendingAction, Session, SignAndBundleAction, Source};

fn source_for_topic(topic: TopicKey) -> Source {
    match topic {
        TopicKey::RaydiumAmm => Source::Raydium,
        TopicKey::PumpfunLaunchpad => Source::Pumpfun,
    }
}

/// spec.md 4.2 step 4: throttle heartbeat emission to once per 15s per
/// (session, src).
fn heartbeat_due(session: &mut Session, src: Source, now: i64) -> bool {
    let key = format!("{src:?}");
    let due = match session.last_heartbeat_ms.get(&key) {
        Some(last) => now - last >= (HEARTBEAT_INTERVAL_SECS as i64) * 1000,
        None => true,
    };
    if due {
        session.last_heartbeat_ms.insert(key, now);
    }
    due
}

/// spec.md 4.2 step 5: throttle the empty-snipe-list warning to once/minute.
fn empty_snipe_list_warn_due(session: &mut Session, now: i64) -> bool {
    let due = match session.last_empty_snipe_list_warn_ms {
        Some(last) => now - last >= (EMPTY_SNIPE_LIST_WARN_INTERVAL_SECS as i64) * 1000,
        None => true,
    };
    if due {
        session.last_empty_snipe_list_warn_ms = Some(now);
    }
    due
}

/// Entry point wired as `log_stream::run_cluster_dispatcher`'s
/// `on_notification` callback. Iterates every session in the cluster,
/// routes the notification per-session, and arms `pendingAction` on a hit.
pub async fn route_notification(
    runtime: Arc<Mutex<ClusterRuntime>>,
    rpc: Arc<dyn ClusterRpcClient>,
    notification: LogNotification,
) {
    let src = source_for_topic(notification.topic);
    let sessions: Vec<Arc<Mutex<Session>>> = runtime.lock().await.sessions.values().cloned().collect();

    for session_arc in sessions {
        let rpc_semaphore = runtime.lock().await.rpc_semaphore.clone();
        route_for_session(&session_arc, rpc.as_ref(), rpc_semaphore, src, &notification).await;
    }
}

async fn route_for_session(
    session_arc: &Arc<Mutex<Session>>,
    rpc: &dyn ClusterRpcClient,
    rpc_semaphore: Arc<tokio::sync::Semaphore>,
    src: Source,
    notification: &LogNotification,
) {
    // spec.md 4.2 step 2: snapshot (running, config, epoch) before any
    // suspension point; step 1: skip non-running sessions outright.
    let snapshot = {
        let mut session = session_arc.lock().await;
        if !session.running {
            return;
        }
        let now = now_ms();
        if heartbeat_due(&mut session, src, now) {
            session.logs.info(format!("heartbeat: {src:?} signal {}", notification.signature));
        }
        session.snapshot()
    };
    let Some(config) = snapshot.config.clone() else { return };

    match config.mode {
        Mode::Volume => {
            // Volume-mode arming is driven by C7's timer, not by log
            // notifications (spec.md 4.2, 4.7).
        }
        Mode::Snipe => {
            // spec.md 4.2 step 3: topic-to-mode routing table. snipe+pre
            // accepts only pumpfun signals, snipe+post accepts only raydium.
            let phase_src_ok = match (config.pumpfun_phase, src) {
                (PumpFunPhase::Pre, Source::Pumpfun) => true,
                (PumpFunPhase::Post, Source::Raydium) => true,
                _ => false,
            };
            if !phase_src_ok {
                return;
            }
            match config.snipe_target_mode {
                // step 5: snipe+pre+auto hands to C3. There is no
                // snipe+post+auto path; post-phase sniping is list-only.
                SnipeTargetMode::Auto if config.pumpfun_phase == PumpFunPhase::Pre => {
                    route_auto_target(session_arc, rpc, rpc_semaphore, src, notification, &snapshot).await;
                }
                SnipeTargetMode::Auto => {}
                SnipeTargetMode::List => {
                    route_list_target(session_arc, rpc, rpc_semaphore, src, notification, &snapshot, &config.snipe_list)
                        .await;
                }
            }
        }
    }
}

async fn route_auto_target(
    session_arc: &Arc<Mutex<Session>>,
    rpc: &dyn ClusterRpcClient,
    rpc_semaphore: Arc<tokio::sync::Semaphore>,
    src: Source,
    notification: &LogNotification,
    snapshot: &crate::session::SessionSnapshot,
) {
    let Some(config) = snapshot.config.clone() else { return };

    let outcome = {
        let _permit = rpc_semaphore.acquire().await.expect("rpc semaphore never closed");
        let mut session = session_arc.lock().await;
        if snapshot.is_stale(&session) {
            return;
        }
        run_auto_discovery(
            rpc,
            &config.auto_snipe,
            &mut session.auto_mint_stats,
            &mut session.auto_stats,
            &notification.signature,
            &notification.logs,
        )
        .await
    };

    let mut session = session_arc.lock().await;
    if snapshot.is_stale(&session) {
        return; // re-check before any observable write (spec.md 4.4, 5, 9).
    }
    match outcome {
        Ok(result) => {
            arm_pending_action(&mut session, src, notification.signature.clone(), Some(result.target_mint));
        }
        Err(reason) => {
            info!("auto-discovery reject for {}: {reason}", notification.signature);
        }
    }
}

async fn route_list_target(
    session_arc: &Arc<Mutex<Session>>,
    rpc: &dyn ClusterRpcClient,
    rpc_semaphore: Arc<tokio::sync::Semaphore>,
    src: Source,
    notification: &LogNotification,
    snapshot: &crate::session::SessionSnapshot,
    snipe_list: &[String],
) {
    if snipe_list.is_empty() {
        let mut session = session_arc.lock().await;
        if snapshot.is_stale(&session) {
            return;
        }
        let now = now_ms();
        if empty_snipe_list_warn_due(&mut session, now) {
            session.logs.warn("snipe_target_mode=list but snipe_list is empty");
        }
        session.auto_stats.bump_reject(&RejectReason::EmptySnipeList);
        return;
    }

    let mint = {
        let _permit = rpc_semaphore.acquire().await.expect("rpc semaphore never closed");
        let tx = match fetch_transaction(rpc, &notification.signature).await {
            Ok(Some(tx)) => tx,
            _ => return,
        };
        infer_mint(rpc, &tx).await
    };
    let Some(mint) = mint else { return };
    if !snipe_list.iter().any(|m| m == &mint) {
        return;
    }

    let mut session = session_arc.lock().await;
    if snapshot.is_stale(&session) {
        return;
    }
    arm_pending_action(&mut session, src, notification.signature.clone(), Some(mint));
}

fn arm_pending_action(session: &mut Session, src: Source, trigger_signature: String, target_mint: Option<String>) {
    let action = PendingAction::SignAndBundle(SignAndBundleAction {
        reason: format!("{src:?} signal matched"),
        unsigned_txs_base64: vec![],
        trigger_signature,
        source: src,
        target_mint,
        needs_unsigned_txs: true,
    });
    if session.try_set_pending_action(action) {
        session.logs.info("armed pendingAction");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FakeRpcClient;
    use crate::cluster::Cluster;
    use crate::config::{AutoSnipeConfig, BotConfig, Mode, PumpFunPhase, SnipeTargetMode, VolumeConfig};

    fn list_config(snipe_list: Vec<String>) -> BotConfig {
        BotConfig {
            cluster: Cluster::Mainnet,
            mode: Mode::Snipe,
            pumpfun_phase: PumpFunPhase::Post,
            snipe_target_mode: SnipeTargetMode::List,
            auto_snipe: AutoSnipeConfig::default(),
            mev_enabled: false,
            buy_amount_sol: 0.1,
            volume: VolumeConfig::default(),
            snipe_list,
        }
    }

    #[tokio::test]
    async fn empty_snipe_list_bumps_reject_without_arming() {
        let session = Arc::new(Mutex::new(Session::new("owner1".into(), Cluster::Mainnet)));
        session.lock().await.start(list_config(vec![]));
        let snapshot = session.lock().await.snapshot();
        let rpc = FakeRpcClient::default();
        let notification = LogNotification {
            topic: TopicKey::PumpfunLaunchpad,
            signature: "sig1".into(),
            logs: vec!["Instruction: Buy".into()],
        };
        route_list_target(&session, &rpc, Arc::new(tokio::sync::Semaphore::new(2)), Source::Pumpfun, &notification, &snapshot, &[])
            .await;
        let guard = session.lock().await;
        assert!(guard.pending_action.is_none());
        assert_eq!(*guard.auto_stats.rejects.get("emptySnipeList").unwrap(), 1);
    }

    #[tokio::test]
    async fn volume_mode_never_arms_from_notifications() {
        let session = Arc::new(Mutex::new(Session::new("owner1".into(), Cluster::Mainnet)));
        let mut cfg = list_config(vec!["M".into()]);
        cfg.mode = Mode::Volume;
        session.lock().await.start(cfg);
        let rpc = FakeRpcClient::default();
        let notification = LogNotification {
            topic: TopicKey::RaydiumAmm,
            signature: "sig1".into(),
            logs: vec!["initialize2".into()],
        };
        route_for_session(&session, &rpc, Arc::new(tokio::sync::Semaphore::new(2)), Source::Raydium, &notification).await;
        assert!(session.lock().await.pending_action.is_none());
    }

    #[tokio::test]
    async fn stopped_session_is_skipped_entirely() {
        let session = Arc::new(Mutex::new(Session::new("owner1".into(), Cluster::Mainnet)));
        let rpc = FakeRpcClient::default();
        let notification = LogNotification {
            topic: TopicKey::RaydiumAmm,
            signature: "sig1".into(),
            logs: vec!["initialize2".into()],
        };
        route_for_session(&session, &rpc, Arc::new(tokio::sync::Semaphore::new(2)), Source::Raydium, &notification).await;
        assert!(session.lock().await.pending_action.is_none());
    }
}
