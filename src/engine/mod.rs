//! The arbitrage engine.
//!
//! [`Engine`] owns every piece of mutable state: per-network runtime
//! state, selector arms, counters, the trade log and the scheduler. Each
//! tick runs:
//!
//! ```text
//! pick network -> scan fee-tier pairs -> rank -> maybe execute best -> record
//! ```
//!
//! State sits behind one `RwLock` that is never held across a chain call.
//! The executor's single-flight flag is the only guard between ticks and
//! trades.

pub mod scheduler;
pub mod selector;
pub mod snapshot;
pub mod stats;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::Address;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::arbitrage::{
    snapshot_balances, BalanceSnapshot, Opportunity, OpportunityScanner, ScanReport,
    TradeExecutor, TradeResult,
};
use crate::chain::{ChainClient, RpcChainClient};
use crate::config::{Config, EngineConfig};
use crate::error::{ArbitrageError, BotError, ChainError};
use crate::metrics;
use crate::network::NetworkConfig;
use crate::strategy::{Strategy, StrategyAction, StrategyFlags, StrategyStatus};
use crate::utils::{format_units, redact_address, NATIVE_DECIMALS};

use self::scheduler::SchedulerHandle;
use self::selector::ChainSelector;
use self::snapshot::{
    ConfigView, EngineSnapshot, NetworkHealthView, NetworkStatusView, OpportunityView, StatsView,
    TradeLogEntryView,
};
use self::stats::{StatsAggregator, Valuation};

/// Opportunities kept from each tick.
pub const RECENT_PER_TICK: usize = 5;
/// Recent opportunity window.
pub const RECENT_CAPACITY: usize = 10;

/// Mutable per-network state.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkRuntime {
    /// Passed its latest balance refresh.
    pub connected: bool,
    /// Native + wrapped balance at or above the configured minimum.
    pub active: bool,
    /// Last known balances.
    pub balances: Option<BalanceSnapshot>,
    /// Latest native price in USD.
    pub native_price_usd: Decimal,
    /// Latest refresh error.
    pub last_error: Option<String>,
    /// Latest successful refresh.
    pub last_refresh: Option<OffsetDateTime>,
}

impl NetworkRuntime {
    fn new(native_price_usd: Decimal) -> Self {
        Self {
            connected: false,
            active: false,
            balances: None,
            native_price_usd,
            last_error: None,
            last_refresh: None,
        }
    }
}

/// Whether a refresh sets the start-of-run baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Record valuations as the baseline.
    Baseline,
    /// Record valuations as current.
    Update,
}

#[derive(Debug)]
struct EngineState {
    runtime: HashMap<String, NetworkRuntime>,
    selector: ChainSelector,
    stats: StatsAggregator,
    recent: VecDeque<Opportunity>,
    strategies: StrategyFlags,
    tick_count: u64,
}

/// What one tick did.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    /// Zero-based tick index.
    pub tick: u64,
    /// Network scanned, if any was connected.
    pub network: Option<String>,
    /// Scan result.
    pub report: Option<ScanReport>,
    /// Trade result, if one ran.
    pub trade: Option<TradeResult>,
    /// Whether balances were refreshed.
    pub refreshed: bool,
}

/// Response to a start request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOutcome {
    /// Whether this call started the engine.
    pub success: bool,
    /// Running flag after the call.
    pub is_running: bool,
    /// Dry-run flag after the call.
    pub is_dry_run: bool,
    /// Reason when not started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Balances captured as the baseline.
    pub initial_balances: Vec<NetworkStatusView>,
}

/// Response to a stop request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOutcome {
    /// Always true; stopping is idempotent.
    pub success: bool,
    /// Always false.
    pub is_running: bool,
    /// Whether the engine was running before the call.
    pub was_running: bool,
    /// Final counters.
    pub stats: StatsView,
    /// Balance-derived profit for the run.
    pub real_profit_usd: Decimal,
    /// Balances after the final refresh.
    pub final_balances: Vec<NetworkStatusView>,
}

/// Scan, select and execute engine.
pub struct Engine {
    config: EngineConfig,
    wallet: Address,
    networks: Vec<NetworkConfig>,
    clients: HashMap<String, Arc<dyn ChainClient>>,
    scanner: OpportunityScanner,
    executor: TradeExecutor,
    state: RwLock<EngineState>,
    running: AtomicBool,
    dry_run: AtomicBool,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("wallet", &redact_address(&self.wallet))
            .field("networks", &self.networks.iter().map(|n| &n.id).collect::<Vec<_>>())
            .field("running", &self.is_running())
            .field("dry_run", &self.is_dry_run())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine over `networks`, each served by the client under its id.
    ///
    /// A zero refresh cadence or scan interval is raised to the smallest
    /// usable value.
    pub fn new(
        mut config: EngineConfig,
        wallet: Address,
        networks: Vec<NetworkConfig>,
        clients: HashMap<String, Arc<dyn ChainClient>>,
    ) -> Self {
        config.balance_refresh_ticks = config.balance_refresh_ticks.max(1);
        config.scan_interval = config.scan_interval.max(scheduler::MIN_PERIOD);

        let runtime = networks
            .iter()
            .map(|n| (n.id.clone(), NetworkRuntime::new(config.fallback_native_price_usd)))
            .collect();
        let state = EngineState {
            runtime,
            selector: ChainSelector::new(networks.iter().map(|n| n.id.clone())),
            stats: StatsAggregator::default(),
            recent: VecDeque::with_capacity(RECENT_CAPACITY),
            strategies: StrategyFlags::default(),
            tick_count: 0,
        };

        Self {
            scanner: OpportunityScanner::new(&config),
            executor: TradeExecutor::new(wallet, config.max_slippage_bps),
            dry_run: AtomicBool::new(config.default_dry_run),
            running: AtomicBool::new(false),
            scheduler: Mutex::new(None),
            state: RwLock::new(state),
            config,
            wallet,
            networks,
            clients,
        }
    }

    /// Build an engine with JSON-RPC clients for every configured network.
    pub fn from_config(config: &Config) -> Result<Self, BotError> {
        let engine_config = config.engine_config()?;
        let wallet = config.wallet()?;
        let networks = config.network_configs()?;

        let mut clients: HashMap<String, Arc<dyn ChainClient>> = HashMap::new();
        for network in &networks {
            let client = RpcChainClient::new(network, config.rpc_timeout())?;
            clients.insert(network.id.clone(), Arc::new(client));
        }

        Ok(Self::new(engine_config, wallet, networks, clients))
    }

    /// Run parameters.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Operator address.
    pub fn wallet(&self) -> Address {
        self.wallet
    }

    /// Configured networks.
    pub fn networks(&self) -> &[NetworkConfig] {
        &self.networks
    }

    /// The trade executor.
    pub fn executor(&self) -> &TradeExecutor {
        &self.executor
    }

    /// Whether the scheduler is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether ticks only scan.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run.load(Ordering::Acquire)
    }

    /// Whether a trade is in flight.
    pub fn is_executing(&self) -> bool {
        self.executor.is_busy()
    }

    fn network(&self, id: &str) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.id == id)
    }

    fn client(&self, id: &str) -> Option<&dyn ChainClient> {
        self.clients.get(id).map(|c| &**c)
    }

    /// Check every network once. Networks that fail stay visible but are
    /// excluded from selection. Returns the number connected.
    pub async fn init(&self) -> usize {
        let connected = self.refresh_balances(RefreshMode::Update).await;
        info!(
            connected,
            configured = self.networks.len(),
            wallet = %redact_address(&self.wallet),
            "Engine initialized"
        );
        connected
    }

    /// Ids of networks that passed their latest refresh, in config order.
    pub async fn connected_networks(&self) -> Vec<String> {
        let state = self.state.read().await;
        self.networks
            .iter()
            .filter(|n| state.runtime.get(&n.id).is_some_and(|r| r.connected))
            .map(|n| n.id.clone())
            .collect()
    }

    /// Latest native price for `network`.
    pub async fn native_price(&self, network: &str) -> Decimal {
        self.state
            .read()
            .await
            .runtime
            .get(network)
            .map(|r| r.native_price_usd)
            .unwrap_or(self.config.fallback_native_price_usd)
    }

    /// Start ticking. Rejected when already running.
    pub async fn start(self: &Arc<Self>, dry_run: Option<bool>) -> StartOutcome {
        let mut slot = self.scheduler.lock().await;

        if self.is_running() {
            return StartOutcome {
                success: false,
                is_running: true,
                is_dry_run: self.is_dry_run(),
                message: Some("engine is already running".to_string()),
                initial_balances: Vec::new(),
            };
        }

        let dry_run = dry_run.unwrap_or(self.config.default_dry_run);
        self.dry_run.store(dry_run, Ordering::Release);
        {
            let mut state = self.state.write().await;
            state.stats.start_run(OffsetDateTime::now_utc());
            state.recent.clear();
            state.tick_count = 0;
        }
        self.executor.reset_phase();

        let connected = self.refresh_balances(RefreshMode::Baseline).await;
        self.running.store(true, Ordering::Release);

        let engine = Arc::clone(self);
        *slot = Some(scheduler::spawn(self.config.scan_interval, move || {
            let engine = Arc::clone(&engine);
            async move {
                engine.tick().await;
            }
        }));

        info!(
            dry_run,
            connected,
            interval_ms = self.config.scan_interval.as_millis() as u64,
            "Engine started"
        );

        StartOutcome {
            success: true,
            is_running: true,
            is_dry_run: dry_run,
            message: None,
            initial_balances: self.network_views().await,
        }
    }

    /// Stop ticking, wait for any tick in progress, then refresh balances
    /// once more. Safe to call when not running.
    pub async fn stop(&self) -> StopOutcome {
        let mut slot = self.scheduler.lock().await;

        let was_running = self.running.swap(false, Ordering::AcqRel);
        if let Some(handle) = slot.take() {
            handle.stop().await;
        }

        self.refresh_balances(RefreshMode::Update).await;
        self.executor.reset_phase();

        let (stats, real_profit_usd) = {
            let mut state = self.state.write().await;
            state.stats.set_current_network(None);
            let stats = state.stats.stats();
            (
                StatsView::new(stats, self.executor.phase(), OffsetDateTime::now_utc()),
                stats.real_profit_usd,
            )
        };

        if was_running {
            info!(real_profit_usd = %real_profit_usd, "Engine stopped");
        } else {
            debug!("Stop requested while not running");
        }

        StopOutcome {
            success: true,
            is_running: false,
            was_running,
            stats,
            real_profit_usd,
            final_balances: self.network_views().await,
        }
    }

    /// One scan-and-maybe-execute cycle. Returns `None` when stopped or
    /// while a trade is in flight.
    #[instrument(skip(self), fields(tick = tracing::field::Empty))]
    pub async fn tick(&self) -> Option<TickOutcome> {
        if !self.is_running() {
            return None;
        }
        if self.executor.is_busy() {
            debug!("Trade in flight, skipping tick");
            return None;
        }

        let (tick, picked) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let tick = state.tick_count;
            state.tick_count += 1;
            let active: Vec<String> = self
                .networks
                .iter()
                .filter(|n| state.runtime.get(&n.id).is_some_and(|r| r.connected))
                .map(|n| n.id.clone())
                .collect();
            let picked = state.selector.pick(tick, &active);
            state.stats.set_current_network(picked.clone());
            (tick, picked)
        };
        tracing::Span::current().record("tick", tick);

        let mut outcome = TickOutcome {
            tick,
            network: picked.clone(),
            report: None,
            trade: None,
            refreshed: false,
        };

        match picked {
            Some(id) => {
                let report = self.scan_and_record(&id).await;
                outcome.trade = match report.as_ref().and_then(|r| r.best()) {
                    Some(best) if best.profitable => self.maybe_execute(best).await,
                    _ => None,
                };
                outcome.report = report;
            }
            None => warn!("No connected networks to scan"),
        }

        if (tick + 1) % self.config.balance_refresh_ticks == 0 {
            self.refresh_balances(RefreshMode::Update).await;
            outcome.refreshed = true;
        }

        Some(outcome)
    }

    async fn scan_and_record(&self, id: &str) -> Option<ScanReport> {
        let (network, client) = match (self.network(id), self.client(id)) {
            (Some(network), Some(client)) => (network, client),
            _ => {
                warn!(network = id, "Picked network has no client");
                return None;
            }
        };

        let price = self.native_price(id).await;
        let report = self.scanner.scan(client, network, price).await;
        metrics::record_scan(id, report.pairs_quoted, report.profitable_count());

        let mut state = self.state.write().await;
        state.stats.record_scan(&report);
        for opportunity in report.opportunities.iter().take(RECENT_PER_TICK).rev() {
            state.recent.push_front(opportunity.clone());
        }
        state.recent.truncate(RECENT_CAPACITY);

        Some(report)
    }

    async fn maybe_execute(&self, best: &Opportunity) -> Option<TradeResult> {
        if self.is_dry_run() {
            info!(
                route = %best.route,
                spread_bps = best.spread_bps,
                net_usd = %best.net_profit_usd,
                "Dry run: would execute"
            );
            return None;
        }

        let (enabled, active) = {
            let state = self.state.read().await;
            (
                state.strategies.is_enabled(Strategy::SimpleArbitrage),
                state.runtime.get(&best.network).is_some_and(|r| r.active),
            )
        };
        if !enabled {
            debug!("simple-arbitrage disabled, not executing");
            return None;
        }
        if !active {
            info!(network = %best.network, "Balance below minimum, not executing");
            return None;
        }

        self.execute_opportunity(best).await
    }

    /// Execute `opportunity` and record the outcome. Returns `None` if
    /// another trade is in flight; nothing is recorded in that case.
    pub async fn execute_opportunity(&self, opportunity: &Opportunity) -> Option<TradeResult> {
        let (Some(network), Some(client)) = (
            self.network(&opportunity.network),
            self.client(&opportunity.network),
        ) else {
            warn!(network = %opportunity.network, "Cannot execute on unknown network");
            return None;
        };

        let price = self.native_price(&network.id).await;
        let result = self.executor.execute(client, network, opportunity, price).await?;

        let mut state = self.state.write().await;
        state.stats.record_trade(opportunity, &result, network);
        state.selector.record_outcome(&network.id, result.success);
        Some(result)
    }

    /// Scan one network without touching engine state.
    pub async fn scan_network(&self, id: &str) -> Result<ScanReport, ArbitrageError> {
        let (Some(network), Some(client)) = (self.network(id), self.client(id)) else {
            return Err(ArbitrageError::UnknownNetwork(id.to_string()));
        };
        let price = self.native_price(id).await;
        Ok(self.scanner.scan(client, network, price).await)
    }

    /// Refresh balances and prices on every network. Returns the number
    /// that responded.
    #[instrument(skip(self))]
    pub async fn refresh_balances(&self, mode: RefreshMode) -> usize {
        let mut updates = Vec::with_capacity(self.networks.len());
        for network in &self.networks {
            let result = match self.client(&network.id) {
                Some(client) => match snapshot_balances(client, network, self.wallet).await {
                    Ok(balances) => {
                        let price = self.discover_price(client, network).await;
                        Ok((balances, price))
                    }
                    Err(e) => Err(e),
                },
                None => Err(ChainError::Connectivity {
                    network: network.id.clone(),
                    reason: "no client configured".to_string(),
                }),
            };
            updates.push((network, result));
        }

        let now = OffsetDateTime::now_utc();
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let mut connected = 0;

        for (network, result) in updates {
            let runtime = state
                .runtime
                .entry(network.id.clone())
                .or_insert_with(|| NetworkRuntime::new(self.config.fallback_native_price_usd));

            match result {
                Ok((balances, price)) => {
                    if !runtime.connected {
                        info!(network = %network.id, "Network connected");
                    }
                    runtime.connected = true;
                    if let Some(price) = price {
                        runtime.native_price_usd = price;
                    }
                    runtime.active = format_units(balances.native_total(), NATIVE_DECIMALS)
                        >= self.config.min_active_balance;
                    runtime.balances = Some(balances);
                    runtime.last_error = None;
                    runtime.last_refresh = Some(now);

                    let valuation = Valuation {
                        balances,
                        native_price_usd: runtime.native_price_usd,
                        quote_decimals: network.quote_decimals,
                    };
                    let value = valuation.value_usd();
                    match mode {
                        RefreshMode::Baseline => state.stats.set_baseline(&network.id, valuation),
                        RefreshMode::Update => {
                            state.stats.revalue(&network.id, valuation);
                        }
                    }
                    debug!(
                        network = %network.id,
                        value_usd = %value,
                        price = %runtime.native_price_usd,
                        active = runtime.active,
                        "Balances refreshed"
                    );
                    metrics::record_balance_refresh(&network.id, true);
                    connected += 1;
                }
                Err(e) => {
                    if runtime.connected || runtime.last_refresh.is_none() {
                        warn!(network = %network.id, error = %e, "Network unreachable");
                    }
                    runtime.connected = false;
                    runtime.last_error = Some(e.to_string());
                    metrics::record_balance_refresh(&network.id, false);
                }
            }
        }

        let real_profit = state.stats.stats().real_profit_usd;
        metrics::set_real_profit_usd(real_profit.to_f64().unwrap_or_default());
        connected
    }

    /// Native price from quoting the trade size into the quote asset on the
    /// first fee tier that answers.
    async fn discover_price(
        &self,
        client: &dyn ChainClient,
        network: &NetworkConfig,
    ) -> Option<Decimal> {
        for &fee in &network.fee_tiers {
            match client
                .quote_exact_in(
                    network.wrapped_native,
                    network.quote_token,
                    self.config.trade_size_wei,
                    fee,
                )
                .await
            {
                Ok(out) if !out.is_zero() => {
                    let quote = format_units(out, network.quote_decimals);
                    return quote.checked_div(self.config.trade_size).map(|p| p.round_dp(6));
                }
                Ok(_) => continue,
                Err(e) => debug!(network = %network.id, fee, error = %e, "Price quote failed"),
            }
        }
        None
    }

    /// Clear counters, the trade log and recent opportunities. The running
    /// flag and the profit baseline are kept.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        state.stats.reset_counters();
        state.recent.clear();
        info!("Stats reset");
    }

    /// Enable or disable a strategy.
    pub async fn set_strategy(&self, strategy: Strategy, action: StrategyAction) -> StrategyStatus {
        let mut state = self.state.write().await;
        let enabled = state.strategies.apply(strategy, action);
        info!(%strategy, enabled, "Strategy toggled");
        StrategyStatus {
            name: strategy.to_string(),
            enabled,
            implemented: strategy.is_implemented(),
        }
    }

    async fn network_views(&self) -> Vec<NetworkStatusView> {
        let state = self.state.read().await;
        self.network_views_locked(&state)
    }

    fn network_views_locked(&self, state: &EngineState) -> Vec<NetworkStatusView> {
        let ledger = state.stats.ledger();
        self.networks
            .iter()
            .filter_map(|n| {
                state.runtime.get(&n.id).map(|runtime| {
                    NetworkStatusView::new(n, runtime, ledger.current(&n.id), ledger.baseline(&n.id))
                })
            })
            .collect()
    }

    /// Redacted connectivity per network.
    pub async fn health(&self) -> Vec<NetworkHealthView> {
        let state = self.state.read().await;
        self.networks
            .iter()
            .map(|n| {
                let runtime = state.runtime.get(&n.id);
                NetworkHealthView {
                    id: n.id.clone(),
                    connected: runtime.is_some_and(|r| r.connected),
                    active: runtime.is_some_and(|r| r.active),
                }
            })
            .collect()
    }

    /// Full read-only view of engine state.
    pub async fn snapshot(&self) -> EngineSnapshot {
        let state = self.state.read().await;
        let now = OffsetDateTime::now_utc();
        let quote_decimals = |id: &str| self.network(id).map(|n| n.quote_decimals).unwrap_or(6);

        EngineSnapshot {
            is_running: self.is_running(),
            is_dry_run: self.is_dry_run(),
            is_executing: self.is_executing(),
            tick_count: state.tick_count,
            wallet: redact_address(&self.wallet),
            stats: StatsView::new(state.stats.stats(), self.executor.phase(), now),
            networks: self.network_views_locked(&state),
            arms: state.selector.arms().to_vec(),
            strategies: state.strategies.statuses(),
            recent_opportunities: state.recent.iter().map(OpportunityView::from).collect(),
            trade_log: state
                .stats
                .log()
                .iter()
                .map(|e| TradeLogEntryView::new(e, quote_decimals(&e.network)))
                .collect(),
            config: ConfigView {
                scan_interval_ms: self.config.scan_interval.as_millis() as u64,
                min_profit_bps: self.config.min_profit_bps,
                max_slippage_bps: self.config.max_slippage_bps,
                trade_size: self.config.trade_size,
                fee_tiers: self.config.fee_tiers.clone(),
                estimated_gas_units: self.config.gas_limits.total(),
                balance_refresh_ticks: self.config.balance_refresh_ticks,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Asset, MockChainClient, MockFailure};
    use crate::network::preset;
    use alloy::primitives::U256;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    const WALLET: Address = Address::repeat_byte(0xaa);

    fn eth(millis: u64) -> U256 {
        U256::from(millis) * U256::from(1_000_000_000_000_000u64)
    }

    fn mock(network: &NetworkConfig) -> MockChainClient {
        let client = MockChainClient::for_network(network);
        client.set_balance(Asset::Native, eth(1_000));
        client.set_balance(Asset::Token(network.quote_token), U256::from(10_000_000u64));
        for fee in [100u32, 500, 3000] {
            client.set_pool(
                network.wrapped_native,
                network.quote_token,
                fee,
                eth(5),
                U256::from(17_400_000u64),
            );
            client.set_pool(
                network.quote_token,
                network.wrapped_native,
                fee,
                U256::from(17_400_000u64),
                eth(5) - U256::from(u64::from(fee) * 1_000_000_000u64),
            );
        }
        client
    }

    fn engine_with(ids: &[&str], config: EngineConfig) -> (Arc<Engine>, Vec<MockChainClient>) {
        let networks: Vec<NetworkConfig> = ids.iter().map(|id| preset(id).unwrap()).collect();
        let mocks: Vec<MockChainClient> = networks.iter().map(mock).collect();
        let clients = networks
            .iter()
            .zip(&mocks)
            .map(|(n, m)| (n.id.clone(), Arc::new(m.clone()) as Arc<dyn ChainClient>))
            .collect();
        (Arc::new(Engine::new(config, WALLET, networks, clients)), mocks)
    }

    fn slow_config() -> EngineConfig {
        EngineConfig {
            scan_interval: Duration::from_secs(3600),
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn init_discovers_price_and_connectivity() {
        let (engine, mocks) = engine_with(&["base", "arbitrum"], slow_config());
        mocks[1].fail(MockFailure::Balance);

        assert_eq!(engine.init().await, 1);
        assert_eq!(engine.connected_networks().await, vec!["base".to_string()]);
        // 17.4 USDC for 0.005 ETH
        assert_eq!(engine.native_price("base").await, dec!(3480));
        assert_eq!(engine.native_price("arbitrum").await, dec!(3500));

        let health = engine.health().await;
        assert!(health[0].connected && !health[1].connected);
    }

    #[tokio::test]
    async fn tick_is_noop_when_stopped() {
        let (engine, _) = engine_with(&["base"], slow_config());
        engine.init().await;
        assert!(engine.tick().await.is_none());
    }

    #[tokio::test]
    async fn zero_cadence_and_interval_are_clamped() {
        let config = EngineConfig {
            scan_interval: Duration::ZERO,
            balance_refresh_ticks: 0,
            ..EngineConfig::default()
        };
        let (engine, _) = engine_with(&["base"], config);
        assert_eq!(engine.config().balance_refresh_ticks, 1);
        assert_eq!(engine.config().scan_interval, Duration::from_millis(1));

        engine.init().await;
        engine.start(Some(true)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        let stopped = engine.stop().await;

        assert!(stopped.stats.scans >= 1, "scans: {}", stopped.stats.scans);
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let (engine, _) = engine_with(&["base"], slow_config());
        engine.init().await;

        let first = engine.start(Some(true)).await;
        assert!(first.success && first.is_dry_run);
        assert_eq!(first.initial_balances.len(), 1);

        let second = engine.start(Some(false)).await;
        assert!(!second.success);
        assert!(second.is_dry_run);

        engine.stop().await;
    }

    #[tokio::test]
    async fn dry_run_tick_scans_without_trading() {
        let (engine, mocks) = engine_with(&["base", "optimism"], slow_config());
        engine.init().await;
        engine.start(Some(true)).await;

        let first = engine.tick().await.unwrap();
        let second = engine.tick().await.unwrap();

        assert_eq!(first.network.as_deref(), Some("base"));
        assert_eq!(second.network.as_deref(), Some("optimism"));
        assert!(first.trade.is_none());
        assert!(mocks.iter().all(|m| m.calls().is_empty()));

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.stats.scans, 2);
        assert_eq!(snapshot.stats.opportunities_found, 12);
        assert_eq!(snapshot.recent_opportunities.len(), RECENT_CAPACITY);
        assert_eq!(snapshot.recent_opportunities[0].network, "optimism");

        engine.stop().await;
    }

    #[tokio::test]
    async fn live_tick_executes_profitable_best() {
        let config = EngineConfig {
            min_profit_bps: -100,
            ..slow_config()
        };
        let (engine, mocks) = engine_with(&["base"], config);
        engine.init().await;
        engine.start(Some(false)).await;

        let outcome = engine.tick().await.unwrap();
        let trade = outcome.trade.unwrap();
        assert!(trade.success, "{:?}", trade.error);
        assert_eq!(mocks[0].calls().len(), 5);

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.stats.trades_attempted, 1);
        assert_eq!(snapshot.stats.trades_succeeded, 1);
        assert_eq!(snapshot.trade_log.len(), 1);
        assert_eq!(snapshot.arms[0].wins, 1);

        engine.stop().await;
    }

    #[tokio::test]
    async fn disabled_strategy_blocks_execution() {
        let config = EngineConfig {
            min_profit_bps: -100,
            ..slow_config()
        };
        let (engine, mocks) = engine_with(&["base"], config);
        engine.init().await;
        engine
            .set_strategy(Strategy::SimpleArbitrage, StrategyAction::Disable)
            .await;
        engine.start(Some(false)).await;

        let outcome = engine.tick().await.unwrap();
        assert!(outcome.report.is_some());
        assert!(outcome.trade.is_none());
        assert!(mocks[0].calls().is_empty());

        engine.stop().await;
    }

    #[tokio::test]
    async fn refresh_cadence_reconnects_network() {
        let config = EngineConfig {
            balance_refresh_ticks: 2,
            ..slow_config()
        };
        let (engine, mocks) = engine_with(&["base"], config);
        mocks[0].fail(MockFailure::Balance);
        engine.init().await;
        engine.start(Some(true)).await;

        let first = engine.tick().await.unwrap();
        assert!(first.network.is_none());
        assert!(!first.refreshed);

        mocks[0].clear_failures();
        let second = engine.tick().await.unwrap();
        assert!(second.refreshed);
        assert_eq!(engine.connected_networks().await, vec!["base".to_string()]);

        engine.stop().await;
    }

    #[tokio::test]
    async fn stop_without_start_is_safe() {
        let (engine, _) = engine_with(&["base"], slow_config());

        let stopped = engine.stop().await;

        assert!(stopped.success);
        assert!(!stopped.is_running);
        assert!(!stopped.was_running);
        assert_eq!(stopped.real_profit_usd, Decimal::ZERO);
    }

    #[tokio::test]
    async fn reset_clears_counters_but_not_running() {
        let (engine, _) = engine_with(&["base"], slow_config());
        engine.init().await;
        engine.start(Some(true)).await;
        engine.tick().await;

        engine.reset().await;

        let snapshot = engine.snapshot().await;
        assert!(snapshot.is_running);
        assert_eq!(snapshot.stats.scans, 0);
        assert!(snapshot.recent_opportunities.is_empty());

        engine.stop().await;
    }

    #[tokio::test]
    async fn scan_network_rejects_unknown_id() {
        let (engine, _) = engine_with(&["base"], slow_config());
        let err = engine.scan_network("solana").await.unwrap_err();
        assert!(matches!(err, ArbitrageError::UnknownNetwork(_)));
        assert_eq!(engine.scan_network("base").await.unwrap().pairs_quoted, 6);
    }
}
