//! `Session` (spec.md 3, 4.4), the per-wallet state machine (C4).
//!
//! Spec.md 9 flags "dynamic ad-hoc fields attached to pendingAction" as a
//! redesign target: "Model pendingAction as a tagged variant with an
//! explicit record per kind." `PendingAction` below is exactly that.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;
use crate::config::BotConfig;
use crate::constants::LOG_RING_CAP;
use crate::logring::LogRing;

/// Source of a pending action / trigger (spec.md 3, 4.2, 4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Raydium,
    Pumpfun,
    VolumeTimer,
}

/// The single discriminated kind this spec defines (spec.md 3: "kind =
/// SIGN_AND_BUNDLE"). Modeled as an enum so a future kind is an additive
/// variant rather than another ad-hoc optional field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PendingAction {
    SignAndBundle(SignAndBundleAction),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignAndBundleAction {
    pub reason: String,
    pub unsigned_txs_base64: Vec<String>,
    pub trigger_signature: String,
    pub source: Source,
    pub target_mint: Option<String>,
    pub needs_unsigned_txs: bool,
}

impl PendingAction {
    pub fn needs_unsigned_txs(&self) -> bool {
        match self {
            PendingAction::SignAndBundle(a) => a.needs_unsigned_txs,
        }
    }
}

/// Per-mint, per-session momentum tracking (spec.md 3, 4.3).
#[derive(Debug, Clone)]
pub struct MomentumEntry {
    pub first_seen_ms: i64,
    pub created_at_ms: i64,
    pub count: u32,
    pub unique_fee_payers: std::collections::HashSet<String>,
    /// `None` = not yet checked; `Some(ok, reason)` once the safety check
    /// has run and been memoized for this mint/session window.
    pub safety: Option<Result<crate::safety::SafetyOk, String>>,
}

impl MomentumEntry {
    pub fn new(now_ms: i64) -> Self {
        Self {
            first_seen_ms: now_ms,
            created_at_ms: now_ms,
            count: 0,
            unique_fee_payers: std::collections::HashSet::new(),
            safety: None,
        }
    }

    pub fn reset(&mut self, now_ms: i64) {
        self.first_seen_ms = now_ms;
        self.created_at_ms = now_ms;
        self.count = 0;
        self.unique_fee_payers.clear();
        self.safety = None;
    }
}

/// Per-transaction local/remote bundle state (spec.md 3, 4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleState {
    Prepared,
    Submitted,
    Confirmed,
    Dropped,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleStatus {
    pub local_id: String,
    pub remote_id: Option<String>,
    pub state: BundleState,
    pub created_at_ms: i64,
    pub last_update_ms: i64,
    pub remote_status: Option<serde_json::Value>,
    pub error: Option<String>,
    pub first_signatures: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedBundle {
    pub local_id: String,
    pub signed_txs_base58: Vec<String>,
    pub created_at_ms: i64,
}

/// Counters required by spec.md 3, 7, 8 (`autoStats`). Monotonically
/// non-decreasing under a fixed config (spec.md 8 property 6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoStats {
    pub signals: u64,
    pub tx_ok: u64,
    pub mint_inferred: u64,
    pub safety_ok: u64,
    pub triggered: u64,
    pub rejects: HashMap<String, u64>,
}

impl AutoStats {
    pub fn bump_reject(&mut self, reason: &crate::error::RejectReason) {
        *self.rejects.entry(reason.counter_key()).or_insert(0) += 1;
    }

    /// spec.md 8 property 6: triggered <= safetyOk <= mintInferred <= txOk <= signals.
    pub fn monotonicity_holds(&self) -> bool {
        self.triggered <= self.safety_ok
            && self.safety_ok <= self.mint_inferred
            && self.mint_inferred <= self.tx_ok
            && self.tx_ok <= self.signals
    }
}

/// Per-wallet session state (spec.md 3, 4.4). Holds only a back-index
/// (`cluster`) into its owning `ClusterRuntime`, never a pointer to it
/// (spec.md 9's redesign note on the cyclic-graph anti-pattern).
pub struct Session {
    pub owner: String,
    pub cluster: Cluster,
    pub running: bool,
    pub config: Option<std::sync::Arc<BotConfig>>,
    pub epoch: u64,
    pub logs: LogRing,
    pub bundles: HashMap<String, BundleStatus>,
    pub prepared_bundles: HashMap<String, PreparedBundle>,
    pub pending_action: Option<PendingAction>,
    pub auto_mint_stats: HashMap<String, MomentumEntry>,
    pub auto_stats: AutoStats,
    /// Used by C7 to throttle volume-mode pending-action production
    /// (spec.md 4.5, 4.7); also bumped on materialization failure to avoid
    /// tight retry loops (spec.md 4.5 error handling contract).
    pub last_volume_action_ms: i64,
    pub last_volume_route: Option<String>,
    /// Handle to the per-session volume-timer task, if running (spec.md
    /// 4.7: "must be idempotent under re-start").
    pub volume_timer_handle: Option<tokio::task::JoinHandle<()>>,
    /// Last heartbeat emission time per (src) for the 15s throttle
    /// (spec.md 4.2 step 4).
    pub last_heartbeat_ms: HashMap<String, i64>,
    /// Last empty-snipe-list warning time, for the 1/minute throttle
    /// (spec.md 4.2 step 5).
    pub last_empty_snipe_list_warn_ms: Option<i64>,
}

impl Session {
    pub fn new(owner: String, cluster: Cluster) -> Self {
        Self {
            owner,
            cluster,
            running: false,
            config: None,
            epoch: 0,
            logs: LogRing::new(LOG_RING_CAP),
            bundles: HashMap::new(),
            prepared_bundles: HashMap::new(),
            pending_action: None,
            auto_mint_stats: HashMap::new(),
            auto_stats: AutoStats::default(),
            last_volume_action_ms: 0,
            last_volume_route: None,
            volume_timer_handle: None,
            last_heartbeat_ms: HashMap::new(),
            last_empty_snipe_list_warn_ms: None,
        }
    }

    /// Snapshot `(running, config, epoch)` to capture before any
    /// asynchronous continuation (spec.md 4.2 step 2, 4.4, 5, 9). The
    /// returned snapshot must be re-validated with `is_stale` before any
    /// observable write.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot { running: self.running, config: self.config.clone(), epoch: self.epoch }
    }

    /// `Start(owner, config)` transition (spec.md 4.4).
    pub fn start(&mut self, config: BotConfig) {
        self.config = Some(std::sync::Arc::new(config));
        self.pending_action = None;
        self.auto_mint_stats.clear();
        self.epoch += 1;
        self.running = true;
    }

    /// `Stop(owner)` transition (spec.md 4.4). Caller is responsible for
    /// cancelling `volume_timer_handle` and calling C1's `TeardownIfIdle`.
    pub fn stop(&mut self) {
        self.config = None;
        self.pending_action = None;
        self.epoch += 1;
        self.running = false;
        if let Some(handle) = self.volume_timer_handle.take() {
            handle.abort();
        }
    }

    /// Set the pending action iff running and none is already set
    /// (spec.md 4.4 invariant, 8 property 1). Returns `false` if rejected.
    pub fn try_set_pending_action(&mut self, action: PendingAction) -> bool {
        if !self.running || self.pending_action.is_some() {
            return false;
        }
        self.pending_action = Some(action);
        true
    }
}

/// `(running, config, epoch)` captured at the start of an async
/// continuation (spec.md 4.2 step 2, 5, 9's "correctness floor").
#[derive(Clone)]
pub struct SessionSnapshot {
    pub running: bool,
    pub config: Option<std::sync::Arc<BotConfig>>,
    pub epoch: u64,
}

impl SessionSnapshot {
    /// True if the session has moved on since this snapshot was taken —
    /// any observable write based on the snapshot must be aborted silently
    /// (spec.md 4.4 invariant, 5, 9).
    pub fn is_stale(&self, current: &Session) -> bool {
        current.running != self.running || current.epoch != self.epoch
    }
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
