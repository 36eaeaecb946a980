//! `BotConfig` (spec.md 3, per-session immutable snapshot, supplied by the
//! edge) and `ProcessConfig` (ambient, process-wide, env-loaded — grounded
//! on the teacher's `SharedConfig::from_env()` in `lib.rs`).

use std::env;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Snipe,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PumpFunPhase {
    Pre,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnipeTargetMode {
    List,
    Auto,
}

/// Auto-discovery tuning parameters (spec.md 4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoSnipeConfig {
    pub window_sec: u64,
    pub min_signals_in_window: u32,
    pub min_unique_fee_payers_in_window: u32,
    pub max_tx_age_sec: u64,
    pub require_mint_authority_disabled: bool,
    pub require_freeze_authority_disabled: bool,
    pub allow_token_2022: bool,
    pub max_top1_holder_pct: f64,
    pub max_top10_holder_pct: f64,
}

impl Default for AutoSnipeConfig {
    fn default() -> Self {
        Self {
            window_sec: 8,
            min_signals_in_window: 3,
            min_unique_fee_payers_in_window: 3,
            max_tx_age_sec: 20,
            require_mint_authority_disabled: true,
            require_freeze_authority_disabled: true,
            allow_token_2022: true,
            max_top1_holder_pct: 20.0,
            max_top10_holder_pct: 60.0,
        }
    }
}

/// Volume-mode tuning parameters (spec.md 3, 4.5, 4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub enabled: bool,
    pub interval_sec: u64,
    pub token_mint: Option<String>,
    pub slippage_bps: u16,
    pub roundtrip: bool,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self { enabled: false, interval_sec: 30, token_mint: None, slippage_bps: 100, roundtrip: false }
    }
}

/// Immutable per-session config snapshot (spec.md 3). Replaced atomically
/// (never mutated in place) on restart; `Session::epoch` increments whenever
/// the pointer is swapped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub cluster: Cluster,
    pub mode: Mode,
    pub pumpfun_phase: PumpFunPhase,
    pub snipe_target_mode: SnipeTargetMode,
    pub auto_snipe: AutoSnipeConfig,
    pub mev_enabled: bool,
    pub buy_amount_sol: f64,
    pub volume: VolumeConfig,
    pub snipe_list: Vec<String>,
}

/// Process-wide configuration never part of a `BotConfig` snapshot — RPC/WS
/// endpoints, block-engine base URL. Grounded on `SharedConfig::from_env()`.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub mainnet_rpc_http: String,
    pub mainnet_rpc_ws: String,
    pub devnet_rpc_http: String,
    pub devnet_rpc_ws: String,
    pub block_engine_url: String,
    pub raydium_program_id: String,
    pub pumpfun_program_id: String,
}

impl ProcessConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mainnet_rpc_http = env::var("MAINNET_RPC_HTTP")
            .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string());
        let mainnet_rpc_ws = env::var("MAINNET_RPC_WS")
            .unwrap_or_else(|_| "wss://api.mainnet-beta.solana.com".to_string());
        let devnet_rpc_http = env::var("DEVNET_RPC_HTTP")
            .unwrap_or_else(|_| "https://api.devnet.solana.com".to_string());
        let devnet_rpc_ws = env::var("DEVNET_RPC_WS")
            .unwrap_or_else(|_| "wss://api.devnet.solana.com".to_string());
        let block_engine_url = env::var("BLOCK_ENGINE_URL")
            .unwrap_or_else(|_| "https://mainnet.block-engine.jito.wtf".to_string());
        let raydium_program_id = env::var("RAYDIUM_PROGRAM_ID")
            .unwrap_or_else(|_| crate::constants::RAYDIUM_AMM_V4_PROGRAM_ID.to_string());
        let pumpfun_program_id = env::var("PUMPFUN_PROGRAM_ID")
            .unwrap_or_else(|_| crate::constants::PUMPFUN_PROGRAM_ID.to_string());

        Ok(Self {
            mainnet_rpc_http,
            mainnet_rpc_ws,
            devnet_rpc_http,
            devnet_rpc_ws,
            block_engine_url,
            raydium_program_id,
            pumpfun_program_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_snipe_defaults_match_scenario_a_shape() {
        let cfg = AutoSnipeConfig::default();
        assert_eq!(cfg.window_sec, 8);
        assert_eq!(cfg.min_signals_in_window, 3);
        assert_eq!(cfg.min_unique_fee_payers_in_window, 3);
        assert_eq!(cfg.max_tx_age_sec, 20);
    }
}
