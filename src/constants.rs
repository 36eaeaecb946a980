//! Centralized constants, mirroring the teacher's single magic-number module.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Lamports / SOL
// ---------------------------------------------------------------------------

pub const SOL_DECIMALS: u64 = 1_000_000_000;

pub const fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / SOL_DECIMALS as f64
}

pub const fn sol_to_lamports(sol: f64) -> u64 {
    (sol * SOL_DECIMALS as f64) as u64
}

// ---------------------------------------------------------------------------
// C1 Log Stream Multiplexer (spec.md 4.1)
// ---------------------------------------------------------------------------

/// Cap on the per-cluster signature dedup set before trimming (spec.md 3, 8).
pub const DEDUP_SET_CAP: usize = 3000;
/// Target size after trimming the dedup set, oldest-first.
pub const DEDUP_SET_TRIM_TO: usize = 2000;

/// Cap on bounded log rings (cluster-level and session-level).
pub const LOG_RING_CAP: usize = 500;

/// WS reconnect backoff bounds (ambient addition, spec.md 4.1 / 9 open question 4).
pub const WS_RECONNECT_BASE_MS: u64 = 1_000;
pub const WS_RECONNECT_MAX_MS: u64 = 60_000;
/// Session considered "stable" after this long without a disconnect; backoff resets.
pub const WS_STABLE_RESET_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// C3 Auto-Discovery Filter RPC retry budgets (spec.md 4.3 step 2)
// ---------------------------------------------------------------------------

pub const TX_FETCH_CONFIRMED_ATTEMPTS: u32 = 3;
pub const TX_FETCH_CONFIRMED_BASE_MS: u64 = 200;
pub const TX_FETCH_FINALIZED_ATTEMPTS: u32 = 2;
pub const TX_FETCH_FINALIZED_BASE_MS: u64 = 250;

/// Shared per-cluster RPC fan-out cap (spec.md 4.3, 5).
pub const RPC_SEMAPHORE_CAPACITY: usize = 2;

/// Number of static account keys probed when balance-delta mint inference fails.
pub const MINT_PROBE_MAX_ACCOUNTS: usize = 25;

/// Number of largest holders fetched for the safety check (spec.md 4.3).
pub const MAX_LARGEST_HOLDERS: usize = 20;
/// Holder-concentration caps apply only once this many non-zero holders exist.
pub const MIN_NONZERO_HOLDERS_FOR_CONCENTRATION_GATE: usize = 5;

/// Token-2022 TLV extension types rejected outright (spec.md 4.3).
pub const BLOCKED_EXTENSION_TYPES: [u16; 6] = [1, 4, 10, 12, 14, 16];

// ---------------------------------------------------------------------------
// Mint account layout offsets (spec.md 4.3 step 3; SPL token mint, 82 bytes)
// ---------------------------------------------------------------------------

pub const MINT_LAYOUT_LEN: usize = 82;
pub const MINT_AUTHORITY_OPTION_OFFSET: usize = 0;
pub const MINT_SUPPLY_OFFSET: usize = 36;
pub const MINT_DECIMALS_OFFSET: usize = 44;
pub const MINT_INITIALIZED_OFFSET: usize = 45;
pub const MINT_FREEZE_AUTHORITY_OPTION_OFFSET: usize = 46;

// ---------------------------------------------------------------------------
// C5 Action Materializer (spec.md 4.5)
// ---------------------------------------------------------------------------

pub const SNIPE_COMPUTE_UNIT_LIMIT: u32 = 1_000_000;
pub const SNIPE_COMPUTE_UNIT_PRICE_MICROLAMPORTS: u64 = 20_000;

/// Tip lamports = TIP_BASE_LAMPORTS + U[0, TIP_JITTER_LAMPORTS) (spec.md 4.5).
pub const TIP_BASE_LAMPORTS: u64 = 1_000;
pub const TIP_JITTER_LAMPORTS: u64 = 50_000;

/// Tip-account cache staleness (spec.md 4.5, 8 property 9).
pub const TIP_ACCOUNT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Per-call timeout for external swap-adapter calls in fallback routing (spec.md 5).
pub const SWAP_ADAPTER_CALL_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// C6 Bundle Lifecycle (spec.md 4.6)
// ---------------------------------------------------------------------------

pub const MAX_BUNDLE_SIZE: usize = 5;
pub const BUNDLE_SUBMIT_MAX_RETRIES: u32 = 3;
pub const BUNDLE_SUBMIT_BASE_MS: u64 = 400;
pub const BUNDLE_SUBMIT_JITTER_MS: u64 = 200;

// ---------------------------------------------------------------------------
// C7 Volume Timer (spec.md 4.7)
// ---------------------------------------------------------------------------

pub const VOLUME_TIMER_MIN_INTERVAL_SECS: u64 = 2;
/// Driver tick rate, independent of the configured interval.
pub const VOLUME_TIMER_TICK: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Venue program ids (spec.md 4.1: "known program IDs {raydium-AMM-program,
// optional launchpad-program}"). Overridable via ProcessConfig::from_env.
// ---------------------------------------------------------------------------

pub const RAYDIUM_AMM_V4_PROGRAM_ID: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";
pub const PUMPFUN_PROGRAM_ID: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

/// Wrapped-SOL mint (spec.md 4.5: "input=native wrapper").
pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

// ---------------------------------------------------------------------------
// C2 Signal Router heartbeat / warning throttles (spec.md 4.2)
// ---------------------------------------------------------------------------

pub const HEARTBEAT_INTERVAL_SECS: u64 = 15;
pub const EMPTY_SNIPE_LIST_WARN_INTERVAL_SECS: u64 = 60;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sol_lamports_roundtrip() {
        assert_eq!(sol_to_lamports(1.0), SOL_DECIMALS);
        assert_eq!(lamports_to_sol(SOL_DECIMALS), 1.0);
        assert_eq!(sol_to_lamports(0.5), 500_000_000);
    }

    #[test]
    fn blocked_extension_types_match_spec() {
        assert_eq!(BLOCKED_EXTENSION_TYPES, [1, 4, 10, 12, 14, 16]);
    }
}
