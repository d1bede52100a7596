//! Running counters, the bounded trade log and balance-derived profit.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use alloy::primitives::U256;
use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::arbitrage::{BalanceSnapshot, Opportunity, ScanReport, TradePhase, TradeResult};
use crate::network::NetworkConfig;

/// Maximum trade log length.
pub const TRADE_LOG_CAPACITY: usize = 100;

/// Counters for the current run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    /// Network scans completed.
    pub scans: u64,
    /// Round trips quoted.
    pub opportunities_found: u64,
    /// Round trips above the spread threshold.
    pub profitable_opportunities: u64,
    /// Trades that entered the executor.
    pub trades_attempted: u64,
    /// Trades that mined at least one transaction.
    pub trades_executed: u64,
    /// Trades that settled.
    pub trades_succeeded: u64,
    /// Trades that failed.
    pub trades_failed: u64,
    /// Sum of realized trade profit in USD.
    pub gross_profit_usd: Decimal,
    /// Sum of realized swap gas in USD.
    pub gas_cost_usd: Decimal,
    /// `gross_profit_usd - gas_cost_usd`.
    pub net_profit_usd: Decimal,
    /// Portfolio value now minus at start, across baselined networks.
    pub real_profit_usd: Decimal,
    /// When the run started.
    pub started_at: Option<OffsetDateTime>,
    /// Network picked on the latest tick.
    pub current_network: Option<String>,
    /// When the latest scan finished.
    pub last_scan_at: Option<OffsetDateTime>,
}

impl EngineStats {
    /// Settled trades as a percentage of attempts.
    pub fn win_rate(&self) -> Decimal {
        if self.trades_attempted == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.trades_succeeded) * Decimal::ONE_HUNDRED
            / Decimal::from(self.trades_attempted))
        .round_dp(2)
    }

    /// Time since the run started.
    pub fn uptime(&self, now: OffsetDateTime) -> Duration {
        self.started_at
            .and_then(|started| Duration::try_from(now - started).ok())
            .unwrap_or_default()
    }
}

/// One executed trade, denormalized for display.
#[derive(Debug, Clone)]
pub struct TradeLogEntry {
    /// Sequence number within the process.
    pub id: u64,
    /// When the trade finished.
    pub timestamp: OffsetDateTime,
    /// Network id.
    pub network: String,
    /// Route label.
    pub route: String,
    /// First leg fee tier.
    pub fee_in: u32,
    /// Second leg fee tier.
    pub fee_out: u32,
    /// Trade size in wei.
    pub amount_in: U256,
    /// Quoted spread.
    pub spread_bps: i64,
    /// Net USD profit the quote promised.
    pub expected_net_profit_usd: Decimal,
    /// Whether the trade settled.
    pub success: bool,
    /// `SETTLED`, or the phase that failed.
    pub phase: TradePhase,
    /// Realized native profit.
    pub realized_profit: Decimal,
    /// Realized USD profit.
    pub realized_profit_usd: Decimal,
    /// Swap gas in USD.
    pub realized_gas_usd: Decimal,
    /// Final transaction hash.
    pub tx_hash: Option<String>,
    /// Explorer link for the final transaction.
    pub explorer_url: Option<String>,
    /// All mined transactions.
    pub tx_hashes: Vec<String>,
    /// Trade duration.
    pub duration: Duration,
    /// Balances before.
    pub balances_before: Option<BalanceSnapshot>,
    /// Balances after.
    pub balances_after: Option<BalanceSnapshot>,
    /// Error message on failure.
    pub error: Option<String>,
}

/// Newest-first trade history, bounded.
#[derive(Debug, Clone)]
pub struct TradeLog {
    entries: VecDeque<TradeLogEntry>,
    capacity: usize,
    next_id: u64,
}

impl Default for TradeLog {
    fn default() -> Self {
        Self::with_capacity(TRADE_LOG_CAPACITY)
    }
}

impl TradeLog {
    /// Log holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(TRADE_LOG_CAPACITY)),
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    /// Insert at the front, evicting the oldest entry when full.
    pub fn push(
        &mut self,
        opportunity: &Opportunity,
        result: &TradeResult,
        network: &NetworkConfig,
    ) -> &TradeLogEntry {
        let entry = TradeLogEntry {
            id: self.next_id,
            timestamp: OffsetDateTime::now_utc(),
            network: result.network.clone(),
            route: opportunity.route.clone(),
            fee_in: opportunity.fee_in,
            fee_out: opportunity.fee_out,
            amount_in: opportunity.amount_in,
            spread_bps: opportunity.spread_bps,
            expected_net_profit_usd: opportunity.net_profit_usd,
            success: result.success,
            phase: result.failed_phase.unwrap_or(TradePhase::Settled),
            realized_profit: result.realized_profit,
            realized_profit_usd: result.realized_profit_usd,
            realized_gas_usd: result.realized_gas_usd,
            tx_hash: result.tx_hash.clone(),
            explorer_url: result.tx_hash.as_deref().map(|h| network.tx_url(h)),
            tx_hashes: result.tx_hashes.clone(),
            duration: result.duration,
            balances_before: result.balances_before,
            balances_after: result.balances_after,
            error: result.error.clone(),
        };
        self.next_id += 1;
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
        &self.entries[0]
    }

    /// Entries, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &TradeLogEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Ids keep increasing.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Balances of one network priced at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Valuation {
    /// Balances read at the refresh.
    pub balances: BalanceSnapshot,
    /// Native price discovered at the refresh.
    pub native_price_usd: Decimal,
    /// Decimals of the network's quote asset.
    pub quote_decimals: u8,
}

impl Valuation {
    /// USD value of these balances at their own price.
    pub fn value_usd(&self) -> Decimal {
        self.balances.value_usd(self.native_price_usd, self.quote_decimals)
    }

    /// USD value of `balances` at this valuation's price.
    pub fn price(&self, balances: &BalanceSnapshot) -> Decimal {
        balances.value_usd(self.native_price_usd, self.quote_decimals)
    }
}

/// Per-network balances at start and the latest priced refresh.
///
/// Baselines keep raw balances. Both sides are valued at the latest price
/// so a moving native price alone never shows up as profit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfitLedger {
    baseline: BTreeMap<String, BalanceSnapshot>,
    current: BTreeMap<String, Valuation>,
}

impl ProfitLedger {
    /// Record the start-of-run balances.
    pub fn set_baseline(&mut self, network: &str, valuation: Valuation) {
        self.baseline.insert(network.to_string(), valuation.balances);
        self.current.insert(network.to_string(), valuation);
    }

    /// Record the latest balances and price.
    pub fn update(&mut self, network: &str, valuation: Valuation) {
        self.current.insert(network.to_string(), valuation);
    }

    /// Sum of `current - baseline` over networks that have a baseline,
    /// both valued at the network's latest price.
    pub fn real_profit_usd(&self) -> Decimal {
        self.baseline
            .iter()
            .filter_map(|(network, baseline)| {
                let current = self.current.get(network)?;
                Some(current.value_usd() - current.price(baseline))
            })
            .sum()
    }

    /// Baseline balances for `network`, valued at the latest price.
    pub fn baseline(&self, network: &str) -> Option<Decimal> {
        let baseline = self.baseline.get(network)?;
        self.current.get(network).map(|current| current.price(baseline))
    }

    /// Baseline balances for `network`.
    pub fn baseline_balances(&self, network: &str) -> Option<&BalanceSnapshot> {
        self.baseline.get(network)
    }

    /// Latest valuation for `network`.
    pub fn current(&self, network: &str) -> Option<Decimal> {
        self.current.get(network).map(Valuation::value_usd)
    }

    /// Forget all valuations.
    pub fn clear(&mut self) {
        self.baseline.clear();
        self.current.clear();
    }
}

/// Counters, trade log and profit ledger updated together.
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    stats: EngineStats,
    log: TradeLog,
    ledger: ProfitLedger,
}

impl StatsAggregator {
    /// Current counters.
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Trade history.
    pub fn log(&self) -> &TradeLog {
        &self.log
    }

    /// Valuations behind `real_profit_usd`.
    pub fn ledger(&self) -> &ProfitLedger {
        &self.ledger
    }

    /// Clear everything for a new run starting at `now`.
    pub fn start_run(&mut self, now: OffsetDateTime) {
        self.stats = EngineStats {
            started_at: Some(now),
            ..EngineStats::default()
        };
        self.log.clear();
        self.ledger.clear();
    }

    /// Clear counters and the log, keeping the run start and baselines.
    pub fn reset_counters(&mut self) {
        self.stats = EngineStats {
            started_at: self.stats.started_at,
            current_network: self.stats.current_network.take(),
            real_profit_usd: self.ledger.real_profit_usd(),
            ..EngineStats::default()
        };
        self.log.clear();
    }

    /// Set the network picked for this tick.
    pub fn set_current_network(&mut self, network: Option<String>) {
        self.stats.current_network = network;
    }

    /// Count a finished scan.
    pub fn record_scan(&mut self, report: &ScanReport) {
        self.stats.scans += 1;
        self.stats.opportunities_found += report.opportunities.len() as u64;
        self.stats.profitable_opportunities += report.profitable_count() as u64;
        self.stats.last_scan_at = Some(OffsetDateTime::now_utc());
    }

    /// Count a trade and append it to the log.
    pub fn record_trade(
        &mut self,
        opportunity: &Opportunity,
        result: &TradeResult,
        network: &NetworkConfig,
    ) {
        let stats = &mut self.stats;
        stats.trades_attempted += 1;
        if result.submitted() {
            stats.trades_executed += 1;
        }
        if result.success {
            stats.trades_succeeded += 1;
        } else {
            stats.trades_failed += 1;
        }
        stats.gross_profit_usd += result.realized_profit_usd;
        stats.gas_cost_usd += result.realized_gas_usd;
        stats.net_profit_usd = stats.gross_profit_usd - stats.gas_cost_usd;

        self.log.push(opportunity, result, network);
    }

    /// Record start-of-run balances.
    pub fn set_baseline(&mut self, network: &str, valuation: Valuation) {
        self.ledger.set_baseline(network, valuation);
        self.stats.real_profit_usd = self.ledger.real_profit_usd();
    }

    /// Record a refreshed valuation and recompute `real_profit_usd`.
    pub fn revalue(&mut self, network: &str, valuation: Valuation) -> Decimal {
        self.ledger.update(network, valuation);
        self.stats.real_profit_usd = self.ledger.real_profit_usd();
        self.stats.real_profit_usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::{evaluate_round_trip, RoundTripQuote};
    use crate::network::preset;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn opportunity() -> Opportunity {
        let quote = RoundTripQuote {
            fee_in: 500,
            fee_out: 3000,
            amount_in: U256::from(5_000u64),
            intermediate: U256::from(17u64),
            amount_out: U256::from(5_012u64),
        };
        evaluate_round_trip("base", "route".into(), quote, dec!(3500), 0, U256::ZERO, 0)
    }

    fn result(success: bool, hashes: usize) -> TradeResult {
        let tx_hashes: Vec<String> = (0..hashes).map(|i| format!("0x{i:02}")).collect();
        TradeResult {
            network: "base".to_string(),
            success,
            failed_phase: (!success).then_some(TradePhase::Swapping2),
            realized_profit: dec!(0.00001),
            realized_profit_usd: if success { dec!(0.035) } else { Decimal::ZERO },
            realized_gas_usd: dec!(0.01),
            tx_hash: tx_hashes.last().cloned(),
            tx_hashes,
            duration: Duration::from_millis(1200),
            balances_before: None,
            balances_after: None,
            error: (!success).then(|| "reverted".to_string()),
        }
    }

    #[test]
    fn record_trade_updates_counters() {
        let network = preset("base").unwrap();
        let mut agg = StatsAggregator::default();

        agg.record_trade(&opportunity(), &result(true, 5), &network);
        agg.record_trade(&opportunity(), &result(false, 0), &network);

        let stats = agg.stats();
        assert_eq!(stats.trades_attempted, 2);
        assert_eq!(stats.trades_executed, 1);
        assert_eq!(stats.trades_succeeded, 1);
        assert_eq!(stats.trades_failed, 1);
        assert_eq!(stats.gross_profit_usd, dec!(0.035));
        assert_eq!(stats.gas_cost_usd, dec!(0.02));
        assert_eq!(stats.net_profit_usd, dec!(0.015));
        assert_eq!(stats.win_rate(), dec!(50));
    }

    #[test]
    fn log_is_newest_first_with_explorer_link() {
        let network = preset("base").unwrap();
        let mut log = TradeLog::default();
        log.push(&opportunity(), &result(true, 1), &network);
        log.push(&opportunity(), &result(false, 2), &network);

        let latest = log.iter().next().unwrap();
        assert_eq!(latest.id, 2);
        assert_eq!(latest.phase, TradePhase::Swapping2);
        assert_eq!(
            latest.explorer_url.as_deref(),
            Some("https://basescan.org/tx/0x01")
        );
    }

    #[test]
    fn log_is_capped() {
        let network = preset("base").unwrap();
        let mut log = TradeLog::default();
        for _ in 0..(TRADE_LOG_CAPACITY + 25) {
            log.push(&opportunity(), &result(true, 1), &network);
        }
        assert_eq!(log.len(), TRADE_LOG_CAPACITY);
        let ids: Vec<u64> = log.iter().map(|e| e.id).collect();
        assert_eq!(ids[0], (TRADE_LOG_CAPACITY + 25) as u64);
        assert!(ids.windows(2).all(|w| w[0] > w[1]));
    }

    /// `eth` whole units of native, `usd` whole units of a 6-decimal quote.
    fn valued(eth: u64, usd: u64, price: Decimal) -> Valuation {
        Valuation {
            balances: BalanceSnapshot {
                native: U256::from(eth) * U256::from(10u64).pow(U256::from(18u64)),
                wrapped: U256::ZERO,
                quote: U256::from(usd * 1_000_000),
            },
            native_price_usd: price,
            quote_decimals: 6,
        }
    }

    #[test]
    fn real_profit_sums_baselined_networks_only() {
        let mut agg = StatsAggregator::default();
        agg.set_baseline("base", valued(1, 100, dec!(2000)));
        agg.set_baseline("arbitrum", valued(2, 50, dec!(2000)));

        agg.revalue("base", valued(1, 103, dec!(2000)));
        agg.revalue("arbitrum", valued(2, 49, dec!(2000)));
        // No baseline: ignored.
        let real = agg.revalue("optimism", valued(5, 1000, dec!(2000)));

        assert_eq!(real, dec!(2));
        assert_eq!(agg.stats().real_profit_usd, dec!(2));
    }

    #[test]
    fn price_move_alone_is_not_profit() {
        let mut agg = StatsAggregator::default();
        agg.set_baseline("base", valued(1, 100, dec!(3480)));

        let real = agg.revalue("base", valued(1, 100, dec!(3500)));

        assert_eq!(real, Decimal::ZERO);
        assert_eq!(agg.ledger().baseline("base"), Some(dec!(3600)));
        assert_eq!(agg.ledger().current("base"), Some(dec!(3600)));

        // A gained unit of quote still counts, at whatever price.
        let real = agg.revalue("base", valued(1, 101, dec!(3300)));
        assert_eq!(real, dec!(1));
    }

    #[test]
    fn reset_counters_keeps_baseline() {
        let network = preset("base").unwrap();
        let mut agg = StatsAggregator::default();
        let start = OffsetDateTime::now_utc();
        agg.start_run(start);
        agg.set_baseline("base", valued(1, 100, dec!(2000)));
        agg.revalue("base", valued(1, 103, dec!(2000)));
        agg.record_trade(&opportunity(), &result(true, 5), &network);

        agg.reset_counters();

        assert_eq!(agg.stats().trades_attempted, 0);
        assert!(agg.log().is_empty());
        assert_eq!(agg.stats().real_profit_usd, dec!(3));
        assert_eq!(agg.stats().started_at, Some(start));

        agg.start_run(OffsetDateTime::now_utc());
        assert_eq!(agg.stats().real_profit_usd, Decimal::ZERO);
        assert!(agg.ledger().baseline_balances("base").is_none());
    }

    #[test]
    fn uptime_without_start_is_zero() {
        let stats = EngineStats::default();
        assert_eq!(stats.uptime(OffsetDateTime::now_utc()), Duration::ZERO);
    }
}
