//! Keyless, multi-tenant Solana trading-signal core.
//!
//! Owns no keys and holds no persisted state: every `Session` lives in
//! process memory for the life of the process (spec.md 1, 3). The crate is
//! organized by the seven components this design decomposes into:
//!
//! - C1 [`log_stream`] — per-cluster WebSocket log multiplexer
//! - C2 [`signal_router`] — fans deduped notifications out to sessions
//! - C3 [`auto_discovery`] — momentum-window + safety-gated mint discovery
//! - C4 [`session`] — per-wallet state machine
//! - C5 [`materializer`] — turns an armed action into signable transactions
//! - C6 [`bundle`] — Jito-style bundle prepare/submit lifecycle
//! - C7 [`volume_timer`] — per-session volume-mode cadence driver
//!
//! [`adapters`] defines the external interface traits this core consumes;
//! production implementations of the venue-facing ones (`SwapAdapter`,
//! `DexAggregatorAdapter`, `TradeLocalAdapter`) are out of scope (spec.md 1)
//! and only in-memory fakes ship here.

pub mod adapters;
pub mod auto_discovery;
pub mod bundle;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod dedup;
pub mod error;
pub mod log_stream;
pub mod logring;
pub mod materializer;
pub mod mint_layout;
pub mod rpc_retry;
pub mod safety;
pub mod session;
pub mod signal_router;
pub mod viz;
pub mod volume_timer;
pub mod ws_client;

use std::sync::Arc;

use tokio::sync::Mutex;

use adapters::{BlockEngineClient, ClusterRpcClient, DexAggregatorAdapter, SwapAdapter, TradeLocalAdapter};
use cluster::{Cluster, ClusterRuntime};
use config::{BotConfig, ProcessConfig};
use error::BundleError;
use logring::LogLine;
use session::{BundleStatus, PendingAction, PreparedBundle};

/// Read-only snapshot of one session's externally visible state (spec.md
/// 6.7 `GetSessionView`).
pub struct SessionView {
    pub running: bool,
    pub pending_action: Option<PendingAction>,
    pub bundles: Vec<BundleStatus>,
    pub prepared_bundles: Vec<PreparedBundle>,
    pub session_logs: Vec<LogLine>,
    pub cluster_logs: Vec<LogLine>,
}

/// Facade wiring together a cluster's runtime, its log-stream dispatcher,
/// and the external adapters needed by materialization and bundling. One
/// `CoreHandle` per cluster; the edge holds one per supported cluster.
pub struct CoreHandle {
    pub cluster: Cluster,
    pub runtime: Arc<Mutex<ClusterRuntime>>,
    pub rpc: Arc<dyn ClusterRpcClient>,
    pub swap_adapter: Arc<dyn SwapAdapter>,
    pub aggregator: Arc<dyn DexAggregatorAdapter>,
    pub trade_local: Arc<dyn TradeLocalAdapter>,
    pub block_engine: Arc<dyn BlockEngineClient>,
}

impl CoreHandle {
    pub fn new(
        cluster: Cluster,
        rpc: Arc<dyn ClusterRpcClient>,
        swap_adapter: Arc<dyn SwapAdapter>,
        aggregator: Arc<dyn DexAggregatorAdapter>,
        trade_local: Arc<dyn TradeLocalAdapter>,
        block_engine: Arc<dyn BlockEngineClient>,
    ) -> Self {
        Self {
            cluster,
            runtime: Arc::new(Mutex::new(ClusterRuntime::new(cluster))),
            rpc,
            swap_adapter,
            aggregator,
            trade_local,
            block_engine,
        }
    }

    /// Launches the cluster's WebSocket dispatcher (C1), wired to route
    /// every deduped notification into C2 (spec.md 4.1, 4.2, 5).
    pub fn spawn_dispatcher(&self, process_cfg: Arc<ProcessConfig>) -> tokio::task::JoinHandle<()> {
        let runtime = self.runtime.clone();
        let rpc = self.rpc.clone();
        let cluster = self.cluster;
        tokio::spawn(async move {
            log_stream::run_cluster_dispatcher(cluster, runtime, process_cfg, rpc, |rt, rpc, notification| async move {
                signal_router::route_notification(rt, rpc, notification).await;
            })
            .await;
        })
    }

    /// `StartSession(owner, config)` (spec.md 4.4, 6.7).
    pub async fn start_session(&self, owner: &str, config: BotConfig) {
        let session = self.runtime.lock().await.session_or_create(owner);
        let is_volume = config.mode == config::Mode::Volume && config.volume.enabled;
        session.lock().await.start(config);
        if is_volume {
            volume_timer::ensure_volume_timer(&session).await;
        }
    }

    /// `StopSession(owner)` (spec.md 4.4, 6.7). The cluster's WS
    /// subscriptions are torn down by the dispatcher's own idle check
    /// ([`log_stream::run_cluster_dispatcher`]) the next time it polls, since
    /// the live WS handle lives only inside that task.
    pub async fn stop_session(&self, owner: &str) {
        let session = self.runtime.lock().await.session_or_create(owner);
        session.lock().await.stop();
    }

    /// `GetSessionView(owner)` (spec.md 6.7).
    pub async fn get_session_view(&self, owner: &str) -> SessionView {
        let session = self.runtime.lock().await.session_or_create(owner);
        let guard = session.lock().await;
        let cluster_logs = self.runtime.lock().await.logs.snapshot();
        SessionView {
            running: guard.running,
            pending_action: guard.pending_action.clone(),
            bundles: guard.bundles.values().cloned().collect(),
            prepared_bundles: guard.prepared_bundles.values().cloned().collect(),
            session_logs: guard.logs.snapshot(),
            cluster_logs,
        }
    }

    /// Materializes the session's pending action if it needs unsigned txs
    /// (spec.md 4.5, 6.7: "Edge triggers Materialize").
    pub async fn materialize(&self, owner: &str) {
        let session = self.runtime.lock().await.session_or_create(owner);
        materializer::materialize(
            &session,
            self.swap_adapter.as_ref(),
            self.aggregator.as_ref(),
            self.trade_local.as_ref(),
            self.block_engine.as_ref(),
        )
        .await;
    }

    /// `PrepareBundle(owner, signedTxsBase64)` (spec.md 4.6, 6.7).
    pub async fn prepare_bundle(&self, owner: &str, signed_txs_base64: Vec<String>) -> Result<String, BundleError> {
        let session = self.runtime.lock().await.session_or_create(owner);
        bundle::prepare_bundle(&session, self.block_engine.as_ref(), self.cluster, signed_txs_base64).await
    }

    /// `SubmitBundle(owner, localId)` (spec.md 4.6, 6.7).
    pub async fn submit_bundle(&self, owner: &str, local_id: &str) -> Result<String, BundleError> {
        let session = self.runtime.lock().await.session_or_create(owner);
        bundle::submit_bundle(&session, self.block_engine.as_ref(), self.cluster, local_id).await
    }
}

/// Re-exported for convenience at the crate root.
pub use error::RejectReason;
