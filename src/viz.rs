//! Log-line classification for `SubscribeVizEvents` (spec.md 6.7): a pure
//! heuristic categorizer, not a parser — "policy, not a contract" per
//! spec.md 9. Grounded on the teacher's substring-heuristic style already
//! used in `log_stream.rs`/`auto_discovery.rs` for program-log matching.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VizCategory {
    HeliusWs,
    SolanaRpc,
    Pumpfun,
    Raydium,
    Jupiter,
    Jito,
    PumpPortal,
    TxBuilder,
    BackendApi,
    Other,
}

impl VizCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            VizCategory::HeliusWs => "helius-ws",
            VizCategory::SolanaRpc => "solana-rpc",
            VizCategory::Pumpfun => "pumpfun",
            VizCategory::Raydium => "raydium",
            VizCategory::Jupiter => "jupiter",
            VizCategory::Jito => "jito",
            VizCategory::PumpPortal => "pumpportal",
            VizCategory::TxBuilder => "tx-builder",
            VizCategory::BackendApi => "backend-api",
            VizCategory::Other => "other",
        }
    }
}

/// Classifies a single log line by heuristic substring match, first match
/// wins. Order matters: `pumpportal` is checked ahead of `pumpfun` since
/// "pumpportal" lines also contain "pump".
pub fn classify(line: &str) -> VizCategory {
    let lower = line.to_lowercase();
    if lower.contains("pumpportal") {
        VizCategory::PumpPortal
    } else if lower.contains("helius") && (lower.contains("ws") || lower.contains("websocket")) {
        VizCategory::HeliusWs
    } else if lower.contains("jito") || lower.contains("block-engine") || lower.contains("block engine") {
        VizCategory::Jito
    } else if lower.contains("jupiter") || lower.contains("aggregator") {
        VizCategory::Jupiter
    } else if lower.contains("raydium") {
        VizCategory::Raydium
    } else if lower.contains("pumpfun") || lower.contains("pump.fun") {
        VizCategory::Pumpfun
    } else if lower.contains("unsigned tx") || lower.contains("tx builder") || lower.contains("materializ") {
        VizCategory::TxBuilder
    } else if lower.contains("rpc") {
        VizCategory::SolanaRpc
    } else if lower.contains("session") || lower.contains("bundle") || lower.contains("edge") {
        VizCategory::BackendApi
    } else {
        VizCategory::Other
    }
}
