//! Prometheus metrics for latency tracking and monitoring.
//!
//! This module provides metrics for:
//! - Scan and trade latency
//! - Scan, opportunity and trade counters
//! - Balance refresh outcomes

use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use tracing::debug;

// === Metric Name Constants ===

/// Scan latency metric name.
pub const METRIC_SCAN_LATENCY: &str = "scan_latency_ms";
/// Trade latency metric name.
pub const METRIC_TRADE_LATENCY: &str = "trade_latency_ms";
/// Scans counter metric name.
pub const METRIC_SCANS: &str = "scans_total";
/// Opportunities detected counter metric name.
pub const METRIC_OPPORTUNITIES_DETECTED: &str = "opportunities_detected_total";
/// Profitable opportunities counter metric name.
pub const METRIC_OPPORTUNITIES_PROFITABLE: &str = "opportunities_profitable_total";
/// Trades attempted counter metric name.
pub const METRIC_TRADES_ATTEMPTED: &str = "trades_attempted_total";
/// Trades succeeded counter metric name.
pub const METRIC_TRADES_SUCCEEDED: &str = "trades_succeeded_total";
/// Trades failed counter metric name.
pub const METRIC_TRADES_FAILED: &str = "trades_failed_total";
/// Balance refreshes counter metric name.
pub const METRIC_BALANCE_REFRESHES: &str = "balance_refreshes_total";
/// Real profit gauge metric name.
pub const METRIC_REAL_PROFIT_USD: &str = "real_profit_usd";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(METRIC_SCAN_LATENCY, "Fee-tier scan latency in milliseconds");
    describe_histogram!(
        METRIC_TRADE_LATENCY,
        "Round-trip trade sequence latency in milliseconds"
    );

    describe_counter!(METRIC_SCANS, "Total number of network scans");
    describe_counter!(
        METRIC_OPPORTUNITIES_DETECTED,
        "Total number of quoted round trips"
    );
    describe_counter!(
        METRIC_OPPORTUNITIES_PROFITABLE,
        "Total number of round trips above the spread threshold"
    );
    describe_counter!(METRIC_TRADES_ATTEMPTED, "Total number of trades attempted");
    describe_counter!(METRIC_TRADES_SUCCEEDED, "Total number of trades settled");
    describe_counter!(METRIC_TRADES_FAILED, "Total number of trades that failed");
    describe_counter!(
        METRIC_BALANCE_REFRESHES,
        "Total number of per-network balance refreshes"
    );
    describe_gauge!(
        METRIC_REAL_PROFIT_USD,
        "Balance-derived profit since start in USD"
    );

    debug!("Metrics initialized");
}

/// Record a completed scan.
pub fn record_scan(network: &str, quoted: usize, profitable: usize) {
    counter!(METRIC_SCANS, "network" => network.to_string()).increment(1);
    counter!(METRIC_OPPORTUNITIES_DETECTED, "network" => network.to_string())
        .increment(quoted as u64);
    counter!(METRIC_OPPORTUNITIES_PROFITABLE, "network" => network.to_string())
        .increment(profitable as u64);
}

/// Record a trade outcome.
pub fn record_trade(network: &str, success: bool) {
    counter!(METRIC_TRADES_ATTEMPTED, "network" => network.to_string()).increment(1);
    if success {
        counter!(METRIC_TRADES_SUCCEEDED, "network" => network.to_string()).increment(1);
    } else {
        counter!(METRIC_TRADES_FAILED, "network" => network.to_string()).increment(1);
    }
}

/// Record one network's balance refresh.
pub fn record_balance_refresh(network: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!(
        METRIC_BALANCE_REFRESHES,
        "network" => network.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Publish the balance-derived profit.
pub fn set_real_profit_usd(value: f64) {
    gauge!(METRIC_REAL_PROFIT_USD).set(value);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for a network scan.
pub fn timer_scan() -> LatencyTimer {
    LatencyTimer::new(METRIC_SCAN_LATENCY)
}

/// Create a latency timer for a trade sequence.
pub fn timer_trade() -> LatencyTimer {
    LatencyTimer::new(METRIC_TRADE_LATENCY)
}
