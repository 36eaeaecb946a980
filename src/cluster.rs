//! `Cluster` tag and `ClusterRuntime` (spec.md 3, 5, 9).
//!
//! Spec.md 9 flags the source's cyclic `ClusterRuntime <-> Session <-> WS
//! <-> subscription maps` pointer graph as a redesign target: "Model as a
//! flat per-cluster container owning subscription state plus an index of
//! sessions by owner. Sessions hold a back-index (cluster tag), never a
//! pointer to the runtime." That is exactly the shape below: `ClusterRuntime`
//! owns everything cluster-scoped; `Session` (session.rs) only stores its
//! `Cluster` tag and is looked up by owner through `ClusterRuntime::sessions`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};

use crate::constants::{LOG_RING_CAP, RPC_SEMAPHORE_CAPACITY};
use crate::dedup::DedupSet;
use crate::logring::LogRing;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cluster {
    Mainnet,
    Devnet,
}

impl Cluster {
    /// Bundle submission is mainnet-only (spec.md 3, 4.6, 8 property 5).
    pub fn is_mainnet(self) -> bool {
        matches!(self, Cluster::Mainnet)
    }
}

impl std::fmt::Display for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cluster::Mainnet => write!(f, "mainnet"),
            Cluster::Devnet => write!(f, "devnet"),
        }
    }
}

/// A subscribed log topic: one of the two known program-log streams
/// (spec.md 4.1, 4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopicKey {
    RaydiumAmm,
    PumpfunLaunchpad,
}

/// State the cluster dispatcher (sole writer, spec.md 5) owns: the WS
/// connection handle (opaque to this struct — owned by `log_stream.rs`),
/// subscription id maps, pending-request map, dedup set, and cluster log
/// ring. Also indexes sessions by owner (spec.md 3's `owner -> Session` map).
pub struct ClusterRuntime {
    pub cluster: Cluster,
    /// subscription-key -> subscription-id, populated once the WS replies.
    pub topic_to_sub_id: HashMap<TopicKey, u64>,
    /// inverse of the above.
    pub sub_id_to_topic: HashMap<u64, TopicKey>,
    /// outstanding JSON-RPC request id -> topic key awaiting a `result`.
    pub pending_request_to_topic: HashMap<u64, TopicKey>,
    pub dedup: DedupSet,
    pub logs: LogRing,
    pub sessions: HashMap<String, Arc<Mutex<Session>>>,
    /// Throttles outbound RPCs to at most `RPC_SEMAPHORE_CAPACITY` in flight
    /// (spec.md 4.3, 5), shared across every session in this cluster.
    pub rpc_semaphore: Arc<Semaphore>,
    /// True once C1 has an open WebSocket for this cluster.
    pub ws_open: bool,
}

impl ClusterRuntime {
    pub fn new(cluster: Cluster) -> Self {
        Self {
            cluster,
            topic_to_sub_id: HashMap::new(),
            sub_id_to_topic: HashMap::new(),
            pending_request_to_topic: HashMap::new(),
            dedup: DedupSet::new(),
            logs: LogRing::new(LOG_RING_CAP),
            sessions: HashMap::new(),
            rpc_semaphore: Arc::new(Semaphore::new(RPC_SEMAPHORE_CAPACITY)),
            ws_open: false,
        }
    }

    /// Lookup-or-create a session by owner (spec.md 3: "Sessions are created
    /// lazily on first reference and are never destroyed within a process").
    pub fn session_or_create(&mut self, owner: &str) -> Arc<Mutex<Session>> {
        self.sessions
            .entry(owner.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(owner.to_string(), self.cluster))))
            .clone()
    }

    /// True if any session in this cluster is currently running (used by
    /// `TeardownIfIdle`, spec.md 4.1).
    pub async fn any_session_running(&self) -> bool {
        for session in self.sessions.values() {
            if session.lock().await.running {
                return true;
            }
        }
        false
    }

    /// Atomically replace subscription maps on reconnect (spec.md 4.1:
    /// "the new subscription IDs must replace the old maps atomically").
    pub fn reset_subscriptions(&mut self) {
        self.topic_to_sub_id.clear();
        self.sub_id_to_topic.clear();
        self.pending_request_to_topic.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_is_mainnet_only_for_mainnet() {
        assert!(Cluster::Mainnet.is_mainnet());
        assert!(!Cluster::Devnet.is_mainnet());
    }

    #[tokio::test]
    async fn session_or_create_is_idempotent_lookup() {
        let mut runtime = ClusterRuntime::new(Cluster::Mainnet);
        let a = runtime.session_or_create("owner1");
        let b = runtime.session_or_create("owner1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(runtime.sessions.len(), 1);
    }

    #[tokio::test]
    async fn any_session_running_reflects_session_state() {
        let mut runtime = ClusterRuntime::new(Cluster::Mainnet);
        assert!(!runtime.any_session_running().await);
        let session = runtime.session_or_create("owner1");
        session.lock().await.running = true;
        assert!(runtime.any_session_running().await);
    }
}
