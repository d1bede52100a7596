//! Read-only JSON views of engine state.
//!
//! Every view is an explicit mapping from an internal type. On-chain amounts
//! are emitted as decimal strings of minor units, `Decimal` values as
//! strings and timestamps as unix milliseconds.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use time::OffsetDateTime;

use super::selector::SelectorArm;
use super::stats::{EngineStats, TradeLogEntry};
use super::NetworkRuntime;
use crate::arbitrage::{BalanceSnapshot, Opportunity, TradePhase};
use crate::network::NetworkConfig;
use crate::strategy::StrategyStatus;
use crate::utils::{format_units, NATIVE_DECIMALS};

/// Serialize a `U256` as a decimal string.
pub fn u256_string<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

/// Unix timestamp in milliseconds.
pub fn unix_ms(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Balances in minor units and display units.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancesView {
    /// Native asset (wei).
    #[serde(serialize_with = "u256_string")]
    pub native: U256,
    /// Wrapped native (wei).
    #[serde(serialize_with = "u256_string")]
    pub wrapped: U256,
    /// Quote asset (minor units).
    #[serde(serialize_with = "u256_string")]
    pub quote: U256,
    /// Native in display units.
    pub native_formatted: Decimal,
    /// Wrapped in display units.
    pub wrapped_formatted: Decimal,
    /// Quote in display units.
    pub quote_formatted: Decimal,
}

impl BalancesView {
    /// Map a snapshot using the network's quote decimals.
    pub fn new(balances: &BalanceSnapshot, quote_decimals: u8) -> Self {
        Self {
            native: balances.native,
            wrapped: balances.wrapped,
            quote: balances.quote,
            native_formatted: format_units(balances.native, NATIVE_DECIMALS),
            wrapped_formatted: format_units(balances.wrapped, NATIVE_DECIMALS),
            quote_formatted: format_units(balances.quote, quote_decimals),
        }
    }
}

/// One network's connectivity and balances.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatusView {
    /// Network id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// EVM chain id.
    pub chain_id: u64,
    /// Explorer URL.
    pub explorer_url: String,
    /// Fee tiers probed.
    pub fee_tiers: Vec<u32>,
    /// Passed its latest balance refresh.
    pub connected: bool,
    /// Holds at least the minimum active balance.
    pub active: bool,
    /// Latest native price in USD.
    pub native_price_usd: Decimal,
    /// Last known balances.
    pub balances: Option<BalancesView>,
    /// Latest USD valuation.
    pub value_usd: Option<Decimal>,
    /// Valuation at start of run.
    pub baseline_usd: Option<Decimal>,
    /// Latest refresh error.
    pub last_error: Option<String>,
    /// Latest successful refresh.
    pub last_refresh_ms: Option<i64>,
}

impl NetworkStatusView {
    /// Map a network's config, runtime state and valuations.
    pub fn new(
        config: &NetworkConfig,
        runtime: &NetworkRuntime,
        value_usd: Option<Decimal>,
        baseline_usd: Option<Decimal>,
    ) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            chain_id: config.chain_id,
            explorer_url: config.explorer_url.clone(),
            fee_tiers: config.fee_tiers.clone(),
            connected: runtime.connected,
            active: runtime.active,
            native_price_usd: runtime.native_price_usd,
            balances: runtime
                .balances
                .as_ref()
                .map(|b| BalancesView::new(b, config.quote_decimals)),
            value_usd,
            baseline_usd,
            last_error: runtime.last_error.clone(),
            last_refresh_ms: runtime.last_refresh.map(unix_ms),
        }
    }
}

/// Redacted connectivity line for `/health`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkHealthView {
    /// Network id.
    pub id: String,
    /// Connected flag.
    pub connected: bool,
    /// Active flag.
    pub active: bool,
}

/// Counters for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    /// Scans.
    pub scans: u64,
    /// Round trips quoted.
    pub opportunities_found: u64,
    /// Round trips above threshold.
    pub profitable_opportunities: u64,
    /// Trades attempted.
    pub trades_attempted: u64,
    /// Trades that mined a transaction.
    pub trades_executed: u64,
    /// Trades settled.
    pub trades_succeeded: u64,
    /// Trades failed.
    pub trades_failed: u64,
    /// Cumulative realized profit.
    pub gross_profit_usd: Decimal,
    /// Cumulative swap gas.
    pub gas_cost_usd: Decimal,
    /// Gross minus gas.
    pub net_profit_usd: Decimal,
    /// Balance-derived profit.
    pub real_profit_usd: Decimal,
    /// Succeeded / attempted, percent.
    pub win_rate: Decimal,
    /// Seconds since start.
    pub uptime_secs: u64,
    /// Network picked on the latest tick.
    pub current_network: Option<String>,
    /// Executor phase label.
    pub current_phase: TradePhase,
    /// Run start.
    pub started_at_ms: Option<i64>,
    /// Latest scan.
    pub last_scan_at_ms: Option<i64>,
}

impl StatsView {
    /// Map counters at `now`.
    pub fn new(stats: &EngineStats, phase: TradePhase, now: OffsetDateTime) -> Self {
        Self {
            scans: stats.scans,
            opportunities_found: stats.opportunities_found,
            profitable_opportunities: stats.profitable_opportunities,
            trades_attempted: stats.trades_attempted,
            trades_executed: stats.trades_executed,
            trades_succeeded: stats.trades_succeeded,
            trades_failed: stats.trades_failed,
            gross_profit_usd: stats.gross_profit_usd,
            gas_cost_usd: stats.gas_cost_usd,
            net_profit_usd: stats.net_profit_usd,
            real_profit_usd: stats.real_profit_usd,
            win_rate: stats.win_rate(),
            uptime_secs: stats.uptime(now).as_secs(),
            current_network: stats.current_network.clone(),
            current_phase: phase,
            started_at_ms: stats.started_at.map(unix_ms),
            last_scan_at_ms: stats.last_scan_at.map(unix_ms),
        }
    }
}

/// Detected opportunity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityView {
    /// Network id.
    pub network: String,
    /// Route label.
    pub route: String,
    /// First leg fee.
    pub fee_in: u32,
    /// Second leg fee.
    pub fee_out: u32,
    /// Trade size (wei).
    #[serde(serialize_with = "u256_string")]
    pub amount_in: U256,
    /// Quoted intermediate (quote minor units).
    #[serde(serialize_with = "u256_string")]
    pub intermediate: U256,
    /// Quoted final amount (wei).
    #[serde(serialize_with = "u256_string")]
    pub amount_out: U256,
    /// Spread in bps.
    pub spread_bps: i64,
    /// Gross profit in native units.
    pub gross_profit: Decimal,
    /// Gross profit in USD.
    pub gross_profit_usd: Decimal,
    /// Estimated gas in USD.
    pub gas_cost_usd: Decimal,
    /// Net profit in USD.
    pub net_profit_usd: Decimal,
    /// Above threshold.
    pub profitable: bool,
    /// Detection time.
    pub detected_at_ms: i64,
}

impl From<&Opportunity> for OpportunityView {
    fn from(o: &Opportunity) -> Self {
        Self {
            network: o.network.clone(),
            route: o.route.clone(),
            fee_in: o.fee_in,
            fee_out: o.fee_out,
            amount_in: o.amount_in,
            intermediate: o.intermediate,
            amount_out: o.amount_out,
            spread_bps: o.spread_bps,
            gross_profit: o.gross_profit,
            gross_profit_usd: o.gross_profit_usd,
            gas_cost_usd: o.gas_cost_usd,
            net_profit_usd: o.net_profit_usd,
            profitable: o.profitable,
            detected_at_ms: unix_ms(o.detected_at),
        }
    }
}

/// Trade log entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeLogEntryView {
    /// Sequence number.
    pub id: u64,
    /// Completion time.
    pub timestamp_ms: i64,
    /// Network id.
    pub network: String,
    /// Route label.
    pub route: String,
    /// First leg fee.
    pub fee_in: u32,
    /// Second leg fee.
    pub fee_out: u32,
    /// Trade size (wei).
    #[serde(serialize_with = "u256_string")]
    pub amount_in: U256,
    /// Quoted spread.
    pub spread_bps: i64,
    /// Net profit the quote promised.
    pub expected_net_profit_usd: Decimal,
    /// Settled flag.
    pub success: bool,
    /// `SETTLED` or the failing phase.
    pub phase: TradePhase,
    /// Realized native profit.
    pub realized_profit: Decimal,
    /// Realized USD profit.
    pub realized_profit_usd: Decimal,
    /// Swap gas in USD.
    pub realized_gas_usd: Decimal,
    /// Final transaction.
    pub tx_hash: Option<String>,
    /// Explorer link.
    pub explorer_url: Option<String>,
    /// All transactions.
    pub tx_hashes: Vec<String>,
    /// Duration.
    pub duration_ms: u64,
    /// Balances before.
    pub balances_before: Option<BalancesView>,
    /// Balances after.
    pub balances_after: Option<BalancesView>,
    /// Failure message.
    pub error: Option<String>,
}

impl TradeLogEntryView {
    /// Map an entry using the network's quote decimals.
    pub fn new(entry: &TradeLogEntry, quote_decimals: u8) -> Self {
        Self {
            id: entry.id,
            timestamp_ms: unix_ms(entry.timestamp),
            network: entry.network.clone(),
            route: entry.route.clone(),
            fee_in: entry.fee_in,
            fee_out: entry.fee_out,
            amount_in: entry.amount_in,
            spread_bps: entry.spread_bps,
            expected_net_profit_usd: entry.expected_net_profit_usd,
            success: entry.success,
            phase: entry.phase,
            realized_profit: entry.realized_profit,
            realized_profit_usd: entry.realized_profit_usd,
            realized_gas_usd: entry.realized_gas_usd,
            tx_hash: entry.tx_hash.clone(),
            explorer_url: entry.explorer_url.clone(),
            tx_hashes: entry.tx_hashes.clone(),
            duration_ms: entry.duration.as_millis() as u64,
            balances_before: entry
                .balances_before
                .as_ref()
                .map(|b| BalancesView::new(b, quote_decimals)),
            balances_after: entry
                .balances_after
                .as_ref()
                .map(|b| BalancesView::new(b, quote_decimals)),
            error: entry.error.clone(),
        }
    }
}

/// Run parameters shown alongside state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigView {
    /// Tick period.
    pub scan_interval_ms: u64,
    /// Spread threshold.
    pub min_profit_bps: i64,
    /// Slippage tolerance.
    pub max_slippage_bps: u32,
    /// Trade size in native units.
    pub trade_size: Decimal,
    /// Fee tiers probed.
    pub fee_tiers: Vec<u32>,
    /// Gas units budgeted per trade.
    pub estimated_gas_units: u64,
    /// Balance refresh cadence.
    pub balance_refresh_ticks: u64,
}

/// Full engine state for `GET /status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    /// Scheduler running.
    pub is_running: bool,
    /// Scan-only mode.
    pub is_dry_run: bool,
    /// A trade is in flight.
    pub is_executing: bool,
    /// Ticks since start.
    pub tick_count: u64,
    /// Redacted operator address.
    pub wallet: String,
    /// Counters.
    pub stats: StatsView,
    /// Per-network state.
    pub networks: Vec<NetworkStatusView>,
    /// Selector scorecards.
    pub arms: Vec<SelectorArm>,
    /// Strategy flags.
    pub strategies: Vec<StrategyStatus>,
    /// Recent opportunities, newest first.
    pub recent_opportunities: Vec<OpportunityView>,
    /// Trade history, newest first.
    pub trade_log: Vec<TradeLogEntryView>,
    /// Run parameters.
    pub config: ConfigView,
}
