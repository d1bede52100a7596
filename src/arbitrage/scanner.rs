//! Round-trip opportunity scanning across fee tiers.

use std::time::{Duration, Instant};

use alloy::primitives::U256;
use rust_decimal::Decimal;
use smallvec::SmallVec;
use tracing::{debug, info, instrument, warn};

use super::calculator::{evaluate_round_trip, rank, GasLimits, Opportunity, RoundTripQuote};
use crate::chain::ChainClient;
use crate::config::EngineConfig;
use crate::error::ArbitrageError;
use crate::metrics;
use crate::network::NetworkConfig;

/// Ordered fee-tier pairs; three tiers give six pairs.
pub type FeePairs = SmallVec<[(u32, u32); 8]>;

/// Result of scanning one network.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Network scanned.
    pub network: String,
    /// Opportunities ranked best-first by net USD profit.
    pub opportunities: Vec<Opportunity>,
    /// Pairs that returned a quote.
    pub pairs_quoted: usize,
    /// Pairs skipped because a leg could not be quoted.
    pub pairs_skipped: usize,
    /// Gas price used for estimates, in wei.
    pub gas_price: U256,
    /// Whether the gas price lookup failed and the fallback was used.
    pub gas_price_fallback: bool,
    /// Wall-clock scan duration.
    pub duration: Duration,
}

impl ScanReport {
    /// Best opportunity, if any pair quoted.
    pub fn best(&self) -> Option<&Opportunity> {
        self.opportunities.first()
    }

    /// Number of opportunities that clear the spread threshold.
    pub fn profitable_count(&self) -> usize {
        self.opportunities.iter().filter(|o| o.profitable).count()
    }
}

/// Enumerates fee-tier pairs and quotes each round trip.
#[derive(Debug, Clone)]
pub struct OpportunityScanner {
    trade_size: U256,
    min_profit_bps: i64,
    gas_limits: GasLimits,
    fallback_gas_price: U256,
    fee_tiers: Vec<u32>,
}

impl OpportunityScanner {
    /// Create a scanner from engine configuration.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            trade_size: config.trade_size_wei,
            min_profit_bps: config.min_profit_bps,
            gas_limits: config.gas_limits,
            fallback_gas_price: config.fallback_gas_price,
            fee_tiers: config.fee_tiers.clone(),
        }
    }

    /// Trade size in native minor units.
    pub fn trade_size(&self) -> U256 {
        self.trade_size
    }

    /// All ordered pairs `(fee_in, fee_out)` with `fee_in != fee_out`.
    pub fn fee_pairs(fee_tiers: &[u32]) -> FeePairs {
        let mut pairs = FeePairs::new();
        for &fee_in in fee_tiers {
            for &fee_out in fee_tiers {
                if fee_in != fee_out {
                    pairs.push((fee_in, fee_out));
                }
            }
        }
        pairs
    }

    /// Scan one network. Never fails: unquotable pairs are skipped and a
    /// failed gas price lookup falls back to the configured gas price.
    #[instrument(skip(self, client, network), fields(network = %network.id))]
    pub async fn scan(
        &self,
        client: &dyn ChainClient,
        network: &NetworkConfig,
        native_price_usd: Decimal,
    ) -> ScanReport {
        let started = Instant::now();
        let _timer = metrics::timer_scan();

        let (gas_price, gas_price_fallback) = match client.gas_price().await {
            Ok(price) => (price, false),
            Err(source) => {
                let err = ArbitrageError::Scan {
                    network: network.id.clone(),
                    source,
                };
                warn!(error = %err, fallback_wei = %self.fallback_gas_price, "Using fallback gas price");
                (self.fallback_gas_price, true)
            }
        };

        let fee_tiers = if network.fee_tiers.is_empty() {
            &self.fee_tiers
        } else {
            &network.fee_tiers
        };

        let mut opportunities = Vec::new();
        let mut pairs_skipped = 0;

        // Sequential on purpose: keeps quote order deterministic and the RPC calm.
        for (fee_in, fee_out) in Self::fee_pairs(fee_tiers) {
            match quote_round_trip(client, network, fee_in, fee_out, self.trade_size).await {
                Ok(quote) => {
                    let opportunity = evaluate_round_trip(
                        &network.id,
                        network.route_label(fee_in, fee_out),
                        quote,
                        native_price_usd,
                        self.gas_limits.total(),
                        gas_price,
                        self.min_profit_bps,
                    );
                    debug!(
                        fee_in,
                        fee_out,
                        spread_bps = opportunity.spread_bps,
                        net_profit_usd = %opportunity.net_profit_usd,
                        "Quoted round trip"
                    );
                    opportunities.push(opportunity);
                }
                Err(err) => {
                    debug!(error = %err, "Pair skipped");
                    pairs_skipped += 1;
                }
            }
        }

        rank(&mut opportunities);

        let report = ScanReport {
            network: network.id.clone(),
            pairs_quoted: opportunities.len(),
            pairs_skipped,
            opportunities,
            gas_price,
            gas_price_fallback,
            duration: started.elapsed(),
        };

        if let Some(best) = report.best() {
            info!(
                quoted = report.pairs_quoted,
                skipped = report.pairs_skipped,
                best_route = %best.route,
                best_spread_bps = best.spread_bps,
                best_net_usd = %best.net_profit_usd,
                "Scan complete"
            );
        } else {
            info!(skipped = report.pairs_skipped, "Scan complete, no quotable pairs");
        }

        report
    }
}

/// Quote native -> quote asset at `fee_in`, then back at `fee_out`.
pub async fn quote_round_trip(
    client: &dyn ChainClient,
    network: &NetworkConfig,
    fee_in: u32,
    fee_out: u32,
    amount_in: U256,
) -> Result<RoundTripQuote, ArbitrageError> {
    let to_quote_err = |source| ArbitrageError::Quote {
        fee_in,
        fee_out,
        source,
    };

    let intermediate = client
        .quote_exact_in(network.wrapped_native, network.quote_token, amount_in, fee_in)
        .await
        .map_err(to_quote_err)?;
    let amount_out = client
        .quote_exact_in(network.quote_token, network.wrapped_native, intermediate, fee_out)
        .await
        .map_err(to_quote_err)?;

    Ok(RoundTripQuote {
        fee_in,
        fee_out,
        amount_in,
        intermediate,
        amount_out,
    })
}
