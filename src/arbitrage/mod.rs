//! Arbitrage module for detecting and executing opportunities.
//!
//! This module handles:
//! - Spread and profit calculations
//! - Fee-tier round-trip scanning
//! - Trade execution with balance verification

pub mod calculator;
pub mod executor;
pub mod scanner;

pub use calculator::{
    estimate_profit, evaluate_round_trip, min_amount_out, rank, spread_bps, GasLimits,
    Opportunity, ProfitEstimate, RoundTripQuote,
};
pub use executor::{
    snapshot_balances, BalanceSnapshot, ExecutionGuard, TradeExecutor, TradePhase, TradeResult,
};
pub use scanner::{quote_round_trip, OpportunityScanner, ScanReport};
