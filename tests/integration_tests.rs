//! Cross-component integration tests (spec.md 8's end-to-end scenarios plus
//! the universal properties), driven through `CoreHandle` and
//! `signal_router::route_notification` rather than any single module's
//! internals — per-module unit tests already cover each component in
//! isolation.

use std::sync::Arc;

use base64::Engine;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::system_instruction;
use solana_sdk::transaction::{Transaction, VersionedTransaction};

use solana_session_core::adapters::{
    AccountInfo, FakeBlockEngineClient, FakeDexAggregatorAdapter, FakeRpcClient, FakeSwapAdapter, FakeTradeLocalAdapter,
    FetchedTransaction, LargestAccountEntry, TokenBalanceEntry, TokenSupply,
};
use solana_session_core::cluster::{Cluster, TopicKey};
use solana_session_core::config::{AutoSnipeConfig, BotConfig, Mode, PumpFunPhase, SnipeTargetMode, VolumeConfig};
use solana_session_core::error::BundleError;
use solana_session_core::log_stream::LogNotification;
use solana_session_core::mint_layout::{build_mint_layout_bytes, MintLayout};
use solana_session_core::session::{PendingAction, SignAndBundleAction, Source};
use solana_session_core::signal_router::route_notification;
use solana_session_core::CoreHandle;

fn core_handle(cluster: Cluster, rpc: Arc<FakeRpcClient>) -> CoreHandle {
    CoreHandle::new(
        cluster,
        rpc,
        Arc::new(FakeSwapAdapter),
        Arc::new(FakeDexAggregatorAdapter::default()),
        Arc::new(FakeTradeLocalAdapter::default()),
        Arc::new(FakeBlockEngineClient { tip_accounts: vec![], fail_simulate: false }),
    )
}

fn auto_snipe_config() -> BotConfig {
    BotConfig {
        cluster: Cluster::Mainnet,
        mode: Mode::Snipe,
        pumpfun_phase: PumpFunPhase::Pre,
        snipe_target_mode: SnipeTargetMode::Auto,
        auto_snipe: AutoSnipeConfig::default(),
        mev_enabled: true,
        buy_amount_sol: 0.1,
        volume: VolumeConfig::default(),
        snipe_list: vec![],
    }
}

fn signed_tx_base64_paying(to: &Pubkey) -> String {
    let payer = Keypair::new();
    let ix = system_instruction::transfer(&payer.pubkey(), to, 1_000);
    let message = Message::new(&[ix], Some(&payer.pubkey()));
    let tx = Transaction::new(&[&payer], message, solana_sdk::hash::Hash::default());
    let versioned = VersionedTransaction::from(tx);
    let bytes = bincode::serialize(&versioned).unwrap();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

async fn seed_safe_mint(rpc: &FakeRpcClient, mint: &str) {
    rpc.accounts.lock().await.insert(
        mint.to_string(),
        AccountInfo {
            owner: spl_token::id().to_string(),
            data: build_mint_layout_bytes(&MintLayout {
                mint_authority_present: false,
                supply: 1_000_000,
                decimals: 6,
                is_initialized: true,
                freeze_authority_present: false,
            }),
            lamports: 1,
        },
    );
    rpc.token_supplies.lock().await.insert(mint.to_string(), TokenSupply { amount: 1_000_000, decimals: 6 });
    rpc.largest_accounts.lock().await.insert(
        mint.to_string(),
        vec![120_000, 80_000, 70_000, 60_000, 50_000, 45_000, 25_000]
            .into_iter()
            .map(|amount| LargestAccountEntry { amount })
            .collect(),
    );
}

async fn seed_create_tx(rpc: &FakeRpcClient, sig: &str, mint: &str, payer: &str) {
    rpc.transactions.lock().await.insert(
        sig.to_string(),
        FetchedTransaction {
            pre_token_balances: vec![],
            post_token_balances: vec![TokenBalanceEntry { mint: mint.to_string() }],
            static_account_keys: vec![payer.to_string()],
        },
    );
}

/// Scenario A (spec.md 8), driven through `route_notification` across a
/// runtime with two registered sessions, one running and one stopped, to
/// exercise C2's per-cluster fan-out rather than a single session directly.
#[tokio::test]
async fn scenario_a_notification_fanout_arms_only_the_running_session() {
    let rpc = Arc::new(FakeRpcClient::default());
    seed_safe_mint(&rpc, "M").await;
    seed_create_tx(&rpc, "sig1", "M", "p1").await;
    seed_create_tx(&rpc, "sig2", "M", "p2").await;
    seed_create_tx(&rpc, "sig3", "M", "p3").await;

    let core = core_handle(Cluster::Mainnet, rpc.clone());
    core.start_session("owner_running", auto_snipe_config()).await;
    core.runtime.lock().await.session_or_create("owner_stopped");

    for sig in ["sig1", "sig2", "sig3"] {
        let notification =
            LogNotification { topic: TopicKey::PumpfunLaunchpad, signature: sig.to_string(), logs: vec!["Program log: Instruction: Create".to_string()] };
        route_notification(core.runtime.clone(), core.rpc.clone(), notification).await;
    }

    let running_view = core.get_session_view("owner_running").await;
    match running_view.pending_action.expect("owner_running should have armed") {
        PendingAction::SignAndBundle(action) => {
            assert_eq!(action.source, Source::Pumpfun);
            assert_eq!(action.target_mint.as_deref(), Some("M"));
            assert_eq!(action.trigger_signature, "sig3");
            assert!(action.needs_unsigned_txs);
        }
    }

    let stopped_view = core.get_session_view("owner_stopped").await;
    assert!(stopped_view.pending_action.is_none());
}

/// Scenario A continued through Materialize/Prepare/Submit, exercising
/// C4->C5->C6 via the public `CoreHandle` facade in one coherent trace.
#[tokio::test]
async fn end_to_end_snipe_flow_through_prepare_and_submit() {
    let rpc = Arc::new(FakeRpcClient::default());
    let core = core_handle(Cluster::Mainnet, rpc);
    let owner = "owner1";
    core.start_session(owner, auto_snipe_config()).await;

    {
        let session = core.runtime.lock().await.session_or_create(owner);
        let mut guard = session.lock().await;
        assert!(guard.try_set_pending_action(PendingAction::SignAndBundle(SignAndBundleAction {
            reason: "pumpfun signal matched".into(),
            unsigned_txs_base64: vec![],
            trigger_signature: "sig3".into(),
            source: Source::Pumpfun,
            target_mint: Some("M".into()),
            needs_unsigned_txs: true,
        })));
    }

    core.materialize(owner).await;
    let view = core.get_session_view(owner).await;
    let unsigned_count = match view.pending_action.expect("materialize should keep the action armed") {
        PendingAction::SignAndBundle(action) => {
            assert!(!action.needs_unsigned_txs);
            action.unsigned_txs_base64.len()
        }
    };
    assert!(unsigned_count >= 1);

    let signed_txs: Vec<String> = (0..unsigned_count).map(|_| signed_tx_base64_paying(&Pubkey::new_unique())).collect();
    let local_id = core.prepare_bundle(owner, signed_txs).await.expect("prepare should succeed on mainnet");

    let view = core.get_session_view(owner).await;
    assert!(view.pending_action.is_none());
    assert_eq!(view.prepared_bundles.len(), 1);
    assert_eq!(view.bundles.len(), 1);

    let remote_id = core.submit_bundle(owner, &local_id).await.expect("submit should succeed");
    let view = core.get_session_view(owner).await;
    let status = view.bundles.into_iter().find(|b| b.local_id == local_id).unwrap();
    assert_eq!(status.remote_id.as_deref(), Some(remote_id.as_str()));

    core.stop_session(owner).await;
    let view = core.get_session_view(owner).await;
    assert!(!view.running);
    assert!(view.pending_action.is_none());
}

/// Scenario D (spec.md 8): devnet Prepare is always refused, session state
/// untouched.
#[tokio::test]
async fn scenario_d_devnet_prepare_refused_via_core_handle() {
    let rpc = Arc::new(FakeRpcClient::default());
    let core = core_handle(Cluster::Devnet, rpc);
    let owner = "owner1";
    let mut config = auto_snipe_config();
    config.cluster = Cluster::Devnet;
    core.start_session(owner, config).await;

    let result = core.prepare_bundle(owner, vec![signed_tx_base64_paying(&Pubkey::new_unique())]).await;
    assert!(matches!(result, Err(BundleError::DevnetRefused)));

    let view = core.get_session_view(owner).await;
    assert!(view.bundles.is_empty());
    assert!(view.prepared_bundles.is_empty());
}

/// Scenario F (spec.md 8): aggregator route fails, fallback to the
/// launchpad `trade-local` route succeeds degraded (buy-only, roundtrip
/// dropped for the fallback).
#[tokio::test]
async fn scenario_f_volume_route_fallback_via_core_handle() {
    let rpc = Arc::new(FakeRpcClient::default());
    let core = CoreHandle::new(
        Cluster::Mainnet,
        rpc,
        Arc::new(FakeSwapAdapter),
        Arc::new(FakeDexAggregatorAdapter { fail_quote: true }),
        Arc::new(FakeTradeLocalAdapter::default()),
        Arc::new(FakeBlockEngineClient { tip_accounts: vec![], fail_simulate: false }),
    );

    let owner = "owner1";
    let config = BotConfig {
        cluster: Cluster::Mainnet,
        mode: Mode::Volume,
        pumpfun_phase: PumpFunPhase::Post,
        snipe_target_mode: SnipeTargetMode::Auto,
        auto_snipe: AutoSnipeConfig::default(),
        mev_enabled: false,
        buy_amount_sol: 0.2,
        volume: VolumeConfig { enabled: true, interval_sec: 30, token_mint: Some("T".into()), slippage_bps: 150, roundtrip: true },
        snipe_list: vec![],
    };
    core.start_session(owner, config).await;

    {
        let session = core.runtime.lock().await.session_or_create(owner);
        let mut guard = session.lock().await;
        assert!(guard.try_set_pending_action(PendingAction::SignAndBundle(SignAndBundleAction {
            reason: "volume timer: roundtrip buy+sell".into(),
            unsigned_txs_base64: vec![],
            trigger_signature: "volumeTimer:1".into(),
            source: Source::VolumeTimer,
            target_mint: Some("T".into()),
            needs_unsigned_txs: true,
        })));
    }

    core.materialize(owner).await;

    let view = core.get_session_view(owner).await;
    match view.pending_action.expect("fallback route should still materialize an action") {
        PendingAction::SignAndBundle(action) => {
            assert_eq!(action.unsigned_txs_base64, vec!["fake_trade_local_tx:Pump".to_string()]);
        }
    }
}

/// Universal property 1 (spec.md 8): at-most-one pending action, even when
/// a notification arrives while the session already carries one.
#[tokio::test]
async fn at_most_one_pending_action_under_repeated_notifications() {
    let rpc = Arc::new(FakeRpcClient::default());
    seed_safe_mint(&rpc, "M").await;
    seed_create_tx(&rpc, "sig1", "M", "p1").await;
    seed_create_tx(&rpc, "sig2", "M", "p2").await;
    seed_create_tx(&rpc, "sig3", "M", "p3").await;
    seed_create_tx(&rpc, "sig4", "M", "p4").await;

    let core = core_handle(Cluster::Mainnet, rpc);
    let owner = "owner1";
    core.start_session(owner, auto_snipe_config()).await;

    for sig in ["sig1", "sig2", "sig3", "sig4"] {
        let notification =
            LogNotification { topic: TopicKey::PumpfunLaunchpad, signature: sig.to_string(), logs: vec!["Program log: Instruction: Create".to_string()] };
        route_notification(core.runtime.clone(), core.rpc.clone(), notification).await;
    }

    let view = core.get_session_view(owner).await;
    let (action_count, trigger_signature) = match view.pending_action {
        Some(PendingAction::SignAndBundle(action)) => (1, action.trigger_signature),
        None => (0, String::new()),
    };
    assert_eq!(action_count, 1);
    // Triggered on the 3rd signal (sig3); sig4 must not clobber it since an
    // action is already armed.
    assert_eq!(trigger_signature, "sig3");
}

/// Universal property 2 (spec.md 8): Stop mid-flight makes any in-progress
/// async continuation's write unobservable, driven through the
/// `CoreHandle` facade rather than `materializer` directly.
#[tokio::test]
async fn epoch_invalidation_drops_late_materialize_after_restart() {
    let rpc = Arc::new(FakeRpcClient::default());
    let core = core_handle(Cluster::Mainnet, rpc);
    let owner = "owner1";
    core.start_session(owner, auto_snipe_config()).await;

    {
        let session = core.runtime.lock().await.session_or_create(owner);
        let mut guard = session.lock().await;
        assert!(guard.try_set_pending_action(PendingAction::SignAndBundle(SignAndBundleAction {
            reason: "pumpfun signal matched".into(),
            unsigned_txs_base64: vec![],
            trigger_signature: "sig1".into(),
            source: Source::Pumpfun,
            target_mint: Some("M".into()),
            needs_unsigned_txs: true,
        })));
    }

    let materialize_fut = core.materialize(owner);
    // Restart before the materialize future is polled to completion; this
    // bumps the session's epoch and clears pendingAction.
    core.start_session(owner, auto_snipe_config()).await;
    materialize_fut.await;

    let view = core.get_session_view(owner).await;
    assert!(view.pending_action.is_none(), "materialize must not resurrect state from before the restart");
}
