//! Walks one owner through Start → auto-armed volume tick → Materialize →
//! PrepareBundle → SubmitBundle against in-memory fakes, printing the
//! session view at each step. No network calls; swap adapters, aggregator,
//! trade-local, and the block-engine are all fakes (spec.md 1 keeps real
//! venue integrations out of scope for this crate).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use solana_session_core::adapters::{
    FakeBlockEngineClient, FakeDexAggregatorAdapter, FakeRpcClient, FakeSwapAdapter, FakeTradeLocalAdapter,
};
use solana_session_core::cluster::Cluster;
use solana_session_core::config::{AutoSnipeConfig, BotConfig, Mode, PumpFunPhase, SnipeTargetMode, VolumeConfig};
use solana_session_core::session::PendingAction;
use solana_session_core::CoreHandle;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("session-core demo: keyless multi-tenant trading-signal core");
    println!("=============================================================");

    let core = CoreHandle::new(
        Cluster::Mainnet,
        Arc::new(FakeRpcClient::default()),
        Arc::new(FakeSwapAdapter),
        Arc::new(FakeDexAggregatorAdapter { fail_quote: false }),
        Arc::new(FakeTradeLocalAdapter::default()),
        Arc::new(FakeBlockEngineClient { tip_accounts: vec!["TipAccount111111111111111111111111111111".into()], fail_simulate: false }),
    );

    let owner = "DemoOwner11111111111111111111111111111111";
    let config = BotConfig {
        cluster: Cluster::Mainnet,
        mode: Mode::Volume,
        pumpfun_phase: PumpFunPhase::Post,
        snipe_target_mode: SnipeTargetMode::Auto,
        auto_snipe: AutoSnipeConfig::default(),
        mev_enabled: true,
        buy_amount_sol: 0.05,
        volume: VolumeConfig { enabled: true, interval_sec: 2, token_mint: Some("DemoMint111111111111111111111111111111111".into()), slippage_bps: 150, roundtrip: true },
        snipe_list: vec![],
    };

    println!("\n[1] StartSession({owner}) in volume mode");
    core.start_session(owner, config).await;

    println!("[2] waiting for the volume timer to arm a pendingAction...");
    let mut view = core.get_session_view(owner).await;
    for _ in 0..10 {
        if view.pending_action.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        view = core.get_session_view(owner).await;
    }

    match &view.pending_action {
        Some(PendingAction::SignAndBundle(action)) => {
            println!("    pendingAction armed: source={:?} reason={}", action.source, action.reason);
        }
        None => {
            println!("    no pendingAction armed within the demo window, exiting");
            return Ok(());
        }
    }

    println!("[3] Materialize -> builds unsigned transactions via the fake swap/aggregator adapters");
    core.materialize(owner).await;
    let view = core.get_session_view(owner).await;
    let unsigned = match &view.pending_action {
        Some(PendingAction::SignAndBundle(action)) => action.unsigned_txs_base64.clone(),
        None => vec![],
    };
    println!("    unsigned tx count: {}", unsigned.len());

    println!("[4] PrepareBundle with demo-signed placeholder transactions");
    let signed = build_demo_signed_txs(unsigned.len().max(1));
    match core.prepare_bundle(owner, signed).await {
        Ok(local_id) => {
            println!("    prepared bundle {local_id}");
            println!("[5] SubmitBundle({local_id})");
            match core.submit_bundle(owner, &local_id).await {
                Ok(remote_id) => println!("    submitted, remote id: {remote_id}"),
                Err(e) => println!("    submit failed: {e}"),
            }
        }
        Err(e) => println!("    prepare failed: {e}"),
    }

    println!("\n[6] StopSession({owner})");
    core.stop_session(owner).await;

    let view = core.get_session_view(owner).await;
    println!("\nfinal session view: running={} bundles={}", view.running, view.bundles.len());
    for line in view.session_logs {
        println!("  log: {}", line.message);
    }

    Ok(())
}

/// One throwaway system-transfer transaction, base64-encoded the way the
/// edge would deliver client-signed transactions (spec.md 6: "Client-signed
/// transactions arrive as base64 serialized versioned transactions").
fn build_demo_signed_txs(count: usize) -> Vec<String> {
    use base64::Engine;
    use solana_sdk::{
        hash::Hash, message::Message, signature::Keypair, signer::Signer, system_instruction,
        transaction::{Transaction, VersionedTransaction},
    };

    (0..count)
        .map(|_| {
            let payer = Keypair::new();
            let to = Keypair::new().pubkey();
            let ix = system_instruction::transfer(&payer.pubkey(), &to, 1);
            let message = Message::new(&[ix], Some(&payer.pubkey()));
            let tx = Transaction::new(&[&payer], message, Hash::default());
            let versioned = VersionedTransaction::from(tx);
            let bytes = bincode::serialize(&versioned).expect("serialize demo tx");
            base64::engine::general_purpose::STANDARD.encode(bytes)
        })
        .collect()
}
