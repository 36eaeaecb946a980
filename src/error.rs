//! Typed boundary errors (spec.md 7). Internal plumbing stays on `anyhow`,
//! matching the teacher's tree (no `thiserror` anywhere in it) — these enums
//! implement `Display`/`std::error::Error` by hand and convert into
//! `anyhow::Error` the same way the teacher's `ErrorType` does.

use std::fmt;

/// Typed reject reason produced by C2/C3 (spec.md 4.2 step 5, 4.3, 7, 8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    NoMint,
    NotNew,
    WindowExpired,
    TooOld,
    Momentum,
    UniquePayers,
    Safety(String),
    EmptySnipeList,
}

impl RejectReason {
    /// Stable counter key used by `Session::auto_stats.rejects`.
    pub fn counter_key(&self) -> String {
        match self {
            RejectReason::NoMint => "noMint".to_string(),
            RejectReason::NotNew => "notNew".to_string(),
            RejectReason::WindowExpired => "windowExpired".to_string(),
            RejectReason::TooOld => "tooOld".to_string(),
            RejectReason::Momentum => "momentum".to_string(),
            RejectReason::UniquePayers => "uniquePayers".to_string(),
            RejectReason::Safety(reason) => reason.clone(),
            RejectReason::EmptySnipeList => "emptySnipeList".to_string(),
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.counter_key())
    }
}

impl std::error::Error for RejectReason {}

/// Surfaced to the edge when C5 materialization fails (spec.md 4.5, 7).
#[derive(Debug, Clone)]
pub enum MaterializeError {
    /// All volume-mode routes raised; carries the primary and secondary causes.
    AllRoutesFailed { primary: String, secondary: String },
    MissingTokenMint,
    AdapterFailure(String),
    RpcFailure(String),
}

impl fmt::Display for MaterializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterializeError::AllRoutesFailed { primary, secondary } => write!(
                f,
                "all volume routes failed: primary={primary}, secondary={secondary}"
            ),
            MaterializeError::MissingTokenMint => {
                write!(f, "volume mode requires a configured token mint")
            }
            MaterializeError::AdapterFailure(reason) => write!(f, "adapter failure: {reason}"),
            MaterializeError::RpcFailure(reason) => write!(f, "rpc failure: {reason}"),
        }
    }
}

impl std::error::Error for MaterializeError {}

/// Surfaced to the edge on Prepare/Submit failure (spec.md 4.6, 7).
#[derive(Debug, Clone)]
pub enum BundleError {
    DevnetRefused,
    NotFound,
    SimulationFailed(String),
    SubmitFailed(String),
    DecodeFailed(String),
}

impl fmt::Display for BundleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleError::DevnetRefused => write!(f, "bundles are mainnet-only"),
            BundleError::NotFound => write!(f, "prepared bundle not found"),
            BundleError::SimulationFailed(reason) => write!(f, "simulation failed: {reason}"),
            BundleError::SubmitFailed(reason) => write!(f, "submit failed: {reason}"),
            BundleError::DecodeFailed(reason) => write!(f, "decode failed: {reason}"),
        }
    }
}

impl std::error::Error for BundleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_reason_counter_keys_match_spec_scenarios() {
        assert_eq!(RejectReason::NoMint.counter_key(), "noMint");
        assert_eq!(
            RejectReason::Safety("mint authority still enabled".into()).counter_key(),
            "mint authority still enabled"
        );
    }

    #[test]
    fn bundle_error_devnet_message_matches_spec_wording() {
        assert_eq!(BundleError::DevnetRefused.to_string(), "bundles are mainnet-only");
    }
}
