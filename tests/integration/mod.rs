//! Integration tests for the fee-tier arbitrage engine.
//!
//! Engine scenarios run against `MockChainClient`. The RPC tests at the
//! bottom need a live endpoint in BASE_RPC_URL.
//! Run with: cargo test --test integration -- --ignored

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio_test::{assert_err, assert_ok};

use feetier_arb::arbitrage::TradePhase;
use feetier_arb::chain::mock::MockConfig;
use feetier_arb::chain::{Asset, ChainClient, MockChainClient, MockFailure, RpcChainClient};
use feetier_arb::config::EngineConfig;
use feetier_arb::engine::{Engine, RefreshMode};
use feetier_arb::network::{preset, NetworkConfig};

const WALLET: Address = Address::repeat_byte(0x42);

/// 10^15 wei.
fn finney(n: u64) -> U256 {
    U256::from(n) * U256::from(1_000_000_000_000_000u64)
}

fn usdc(micro: u64) -> U256 {
    U256::from(micro)
}

/// Base with 1 ETH and the round trip from the worked example:
/// 0.005 ETH -> 17.40 USDC at 0.05%, 17.40 USDC -> 0.005012 ETH at 0.3%.
fn scenario_a_chain() -> (NetworkConfig, MockChainClient) {
    scenario_a_chain_with(MockConfig::default())
}

fn scenario_a_chain_with(config: MockConfig) -> (NetworkConfig, MockChainClient) {
    let network = preset("base").unwrap();
    let client = MockChainClient::with_config(&network, config);
    client.set_balance(Asset::Native, finney(1_000));
    client.set_pool(
        network.wrapped_native,
        network.quote_token,
        500,
        finney(5),
        usdc(17_400_000),
    );
    client.set_pool(
        network.quote_token,
        network.wrapped_native,
        3000,
        usdc(17_400_000),
        U256::from(5_012_000_000_000_000u64),
    );
    (network, client)
}

fn test_engine(network: NetworkConfig, client: &MockChainClient, min_profit_bps: i64) -> Arc<Engine> {
    let clients: HashMap<String, Arc<dyn ChainClient>> = HashMap::from([(
        network.id.clone(),
        Arc::new(client.clone()) as Arc<dyn ChainClient>,
    )]);
    let config = EngineConfig {
        // Ticks are driven by hand.
        scan_interval: Duration::from_secs(3600),
        min_profit_bps,
        ..EngineConfig::default()
    };
    Arc::new(Engine::new(config, WALLET, vec![network], clients))
}

#[tokio::test]
async fn scenario_a_profitable_round_trip_executes() {
    let (network, client) = scenario_a_chain();
    let engine = test_engine(network.clone(), &client, -100);
    engine.init().await;
    // 17.40 USDC for 0.005 ETH
    assert_eq!(engine.native_price("base").await, dec!(3480));

    engine.start(Some(false)).await;
    let outcome = engine.tick().await.expect("tick should run");

    let report = outcome.report.unwrap();
    let best = report.best().unwrap();
    assert_eq!((best.fee_in, best.fee_out), (500, 3000));
    assert_eq!(best.spread_bps, 24);
    assert!(best.profitable);

    let trade = outcome.trade.expect("profitable opportunity should execute");
    assert!(trade.success, "trade failed: {:?}", trade.error);
    assert_eq!(trade.tx_hashes.len(), 5);
    assert_eq!(client.calls(), vec!["wrap", "approve", "swap", "approve", "swap"]);

    // +0.000012 ETH from the spread, -397k gas at 0.01 gwei.
    assert_eq!(trade.realized_profit, dec!(0.00000803));
    assert_eq!(client.balance(Asset::Token(network.wrapped_native)), U256::from(5_012_000_000_000_000u64));

    let stopped = engine.stop().await;
    assert_eq!(stopped.stats.trades_attempted, 1);
    assert_eq!(stopped.stats.trades_executed, 1);
    assert_eq!(stopped.stats.trades_succeeded, 1);
    assert_eq!(stopped.stats.win_rate, dec!(100));
    assert_eq!(stopped.stats.gross_profit_usd, trade.realized_profit_usd);
    // Balance-derived: 0.00000803 ETH at 3480.
    assert_eq!(stopped.real_profit_usd, dec!(0.0279444));
}

#[tokio::test]
async fn scenario_a_below_threshold_is_not_traded() {
    let (network, client) = scenario_a_chain();
    let engine = test_engine(network, &client, 50);
    engine.init().await;
    engine.start(Some(false)).await;

    let outcome = engine.tick().await.unwrap();

    assert!(!outcome.report.unwrap().best().unwrap().profitable);
    assert!(outcome.trade.is_none());
    assert!(client.calls().is_empty());
    engine.stop().await;
}

#[tokio::test]
async fn scenario_b_failed_quote_is_skipped() {
    let network = preset("base").unwrap();
    let client = MockChainClient::for_network(&network);
    client.set_balance(Asset::Native, finney(1_000));
    for (fee, out) in [(100u32, 17_450_000u64), (500, 17_400_000), (3000, 17_300_000)] {
        client.set_pool(network.wrapped_native, network.quote_token, fee, finney(5), usdc(out));
        client.set_pool(
            network.quote_token,
            network.wrapped_native,
            fee,
            usdc(17_400_000),
            finney(5),
        );
    }
    // Second leg of (3000, 500) sells exactly the 3000-tier output.
    client.fail(MockFailure::QuoteAmount {
        token_in: network.quote_token,
        fee: 500,
        amount_in: usdc(17_300_000),
    });
    let engine = test_engine(network, &client, 0);

    let report = assert_ok!(engine.scan_network("base").await);
    assert_err!(engine.scan_network("polygon").await);

    assert_eq!(report.pairs_quoted, 5);
    assert_eq!(report.pairs_skipped, 1);
    assert!(!report
        .opportunities
        .iter()
        .any(|o| (o.fee_in, o.fee_out) == (3000, 500)));
    assert!(report
        .opportunities
        .iter()
        .any(|o| (o.fee_in, o.fee_out) == (500, 3000)));
}

#[tokio::test]
async fn scenario_c_execute_while_busy_is_noop() {
    let (network, client) = scenario_a_chain();
    let engine = test_engine(network, &client, -100);
    engine.init().await;
    engine.start(Some(false)).await;

    let report = engine.scan_network("base").await.unwrap();
    let best = report.best().unwrap().clone();

    let guard = engine.executor().try_acquire().expect("executor idle");
    assert!(engine.is_executing());
    assert!(engine.execute_opportunity(&best).await.is_none());
    assert!(engine.tick().await.is_none());
    drop(guard);

    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.stats.trades_attempted, 0);
    assert!(snapshot.trade_log.is_empty());
    assert!(client.calls().is_empty());

    engine.stop().await;
}

#[tokio::test]
async fn scenario_c_second_trade_while_first_in_flight_is_noop() {
    let (network, client) = scenario_a_chain_with(MockConfig {
        latency_ms: 10,
        ..MockConfig::default()
    });
    let engine = test_engine(network, &client, -100);
    engine.init().await;

    let report = engine.scan_network("base").await.unwrap();
    let best = report.best().unwrap().clone();

    let (first, second) = tokio::join!(
        engine.execute_opportunity(&best),
        engine.execute_opportunity(&best)
    );

    let results: Vec<_> = [first, second].into_iter().flatten().collect();
    assert_eq!(results.len(), 1);
    assert!(results[0].success, "trade failed: {:?}", results[0].error);
    assert_eq!(client.calls(), vec!["wrap", "approve", "swap", "approve", "swap"]);
    assert!(!engine.is_executing());

    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.stats.trades_attempted, 1);
    assert_eq!(snapshot.trade_log.len(), 1);
}

#[tokio::test]
async fn scenario_d_stop_when_never_started() {
    let (network, client) = scenario_a_chain();
    let engine = test_engine(network, &client, 0);

    let stopped = engine.stop().await;

    assert!(stopped.success);
    assert!(!stopped.is_running);
    assert!(!stopped.was_running);
    assert_eq!(stopped.stats.current_phase, TradePhase::Idle);
    assert_eq!(stopped.real_profit_usd, Decimal::ZERO);
    assert!(!engine.is_running());

    // A second stop is just as safe.
    assert!(engine.stop().await.success);
}

#[tokio::test]
async fn scenario_e_partial_sequence_is_recorded_failed() {
    let (network, client) = scenario_a_chain();
    client.fail(MockFailure::Approve {
        token: network.quote_token,
    });
    let engine = test_engine(network.clone(), &client, -100);
    engine.init().await;
    engine.start(Some(false)).await;

    let trade = engine.tick().await.unwrap().trade.unwrap();

    assert!(!trade.success);
    assert_eq!(trade.failed_phase, Some(TradePhase::ApprovingOut));
    assert_eq!(trade.realized_profit_usd, Decimal::ZERO);
    let after = trade.balances_after.unwrap();
    assert!(after.wrapped.is_zero());
    assert_eq!(after.quote, usdc(17_400_000));

    // Nothing unwinds the swap.
    assert_eq!(client.balance(Asset::Token(network.quote_token)), usdc(17_400_000));

    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.stats.trades_failed, 1);
    assert_eq!(snapshot.stats.trades_executed, 1);
    assert_eq!(snapshot.trade_log[0].phase, TradePhase::ApprovingOut);
    assert!(snapshot.trade_log[0].error.as_deref().unwrap().contains("approve"));
    assert_eq!(snapshot.arms[0].losses, 1);

    engine.stop().await;
}

#[tokio::test]
async fn native_price_move_is_not_real_profit() {
    let (network, client) = scenario_a_chain();
    let engine = test_engine(network.clone(), &client, 0);
    engine.init().await;
    engine.start(Some(true)).await;
    assert_eq!(engine.native_price("base").await, dec!(3480));

    // 17.50 USDC per 0.005 ETH.
    client.set_pool(
        network.wrapped_native,
        network.quote_token,
        500,
        finney(5),
        usdc(17_500_000),
    );
    assert_eq!(engine.refresh_balances(RefreshMode::Update).await, 1);

    assert_eq!(engine.native_price("base").await, dec!(3500));
    assert_eq!(engine.snapshot().await.stats.real_profit_usd, Decimal::ZERO);
    assert_eq!(engine.stop().await.real_profit_usd, Decimal::ZERO);
}

#[tokio::test]
async fn failed_trade_does_not_stop_scheduler() {
    let (network, client) = scenario_a_chain();
    client.fail(MockFailure::Swap {
        token_in: network.wrapped_native,
    });
    let engine = test_engine(network, &client, -100);
    engine.init().await;
    engine.start(Some(false)).await;

    let first = engine.tick().await.unwrap();
    assert!(!first.trade.unwrap().success);

    client.clear_failures();
    let second = engine.tick().await.unwrap();
    assert!(second.trade.unwrap().success);

    let stopped = engine.stop().await;
    assert_eq!(stopped.stats.trades_attempted, 2);
    assert_eq!(stopped.stats.win_rate, dec!(50));
}

#[tokio::test]
async fn scheduler_drives_ticks_until_stop() {
    let (network, client) = scenario_a_chain();
    let clients: HashMap<String, Arc<dyn ChainClient>> = HashMap::from([(
        network.id.clone(),
        Arc::new(client.clone()) as Arc<dyn ChainClient>,
    )]);
    let config = EngineConfig {
        scan_interval: Duration::from_millis(20),
        ..EngineConfig::default()
    };
    let engine = Arc::new(Engine::new(config, WALLET, vec![network], clients));
    engine.init().await;

    engine.start(Some(true)).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    let stopped = engine.stop().await;

    assert!(stopped.stats.scans >= 2, "scans: {}", stopped.stats.scans);
    let scans = engine.snapshot().await.stats.scans;
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(engine.snapshot().await.stats.scans, scans);
}

/// Get a read-only client for Base from the environment.
fn live_client() -> Option<(NetworkConfig, RpcChainClient)> {
    dotenvy::dotenv().ok();
    let rpc_url = std::env::var("BASE_RPC_URL").ok()?;
    let mut network = preset("base")?;
    network.rpc_url = rpc_url;
    let client = RpcChainClient::new(&network, Duration::from_secs(10)).ok()?;
    Some((network, client))
}

#[tokio::test]
#[ignore = "requires BASE_RPC_URL"]
async fn live_gas_price_and_quote() {
    let Some((network, client)) = live_client() else {
        println!("Skipping: BASE_RPC_URL not set");
        return;
    };

    let gas_price = assert_ok!(client.gas_price().await);
    assert!(!gas_price.is_zero());

    let out = client
        .quote_exact_in(network.wrapped_native, network.quote_token, finney(5), 500)
        .await
        .expect("quote");
    assert!(!out.is_zero());
    println!("0.005 WETH -> {} USDC minor units", out);
}

#[tokio::test]
#[ignore = "requires BASE_RPC_URL"]
async fn live_client_refuses_to_sign() {
    let Some((_, client)) = live_client() else {
        println!("Skipping: BASE_RPC_URL not set");
        return;
    };

    assert_err!(client.wrap(finney(1)).await);
}
