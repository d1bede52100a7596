//! Spread and profit calculations for round-trip opportunities.
//!
//! All on-chain amounts stay in minor units (`U256`) until the spread has
//! been computed; conversion to `Decimal` happens only for USD figures.

use alloy::primitives::{U256, U512};
use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::utils::{format_units, signed_delta, NATIVE_DECIMALS};

/// Basis points in one unit.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Gas units budgeted for one full trade sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasLimits {
    /// Wrap native asset.
    pub wrap: u64,
    /// One ERC-20 approve.
    pub approve: u64,
    /// One exactInputSingle swap.
    pub swap: u64,
}

impl GasLimits {
    /// Estimated units for wrap + 2 x approve + 2 x swap, saturating.
    pub fn total(&self) -> u64 {
        self.wrap
            .saturating_add(self.approve.saturating_mul(2))
            .saturating_add(self.swap.saturating_mul(2))
    }
}

impl Default for GasLimits {
    fn default() -> Self {
        Self {
            wrap: 50_000,
            approve: 50_000,
            swap: 180_000,
        }
    }
}

/// Detected round-trip opportunity on one network.
#[derive(Debug, Clone, PartialEq)]
pub struct Opportunity {
    /// Network id.
    pub network: String,
    /// Route label for display.
    pub route: String,
    /// Fee tier of the first leg (native -> quote).
    pub fee_in: u32,
    /// Fee tier of the second leg (quote -> native).
    pub fee_out: u32,
    /// Trade size in native minor units.
    pub amount_in: U256,
    /// Quoted quote-asset amount after leg one.
    pub intermediate: U256,
    /// Quoted native amount after leg two.
    pub amount_out: U256,
    /// Signed round-trip spread in basis points.
    pub spread_bps: i64,
    /// Gross profit in native units (signed).
    pub gross_profit: Decimal,
    /// Gross profit in USD.
    pub gross_profit_usd: Decimal,
    /// Estimated gas cost of the full sequence in USD.
    pub gas_cost_usd: Decimal,
    /// Gross profit minus estimated gas.
    pub net_profit_usd: Decimal,
    /// Whether the spread clears the configured minimum.
    pub profitable: bool,
    /// Timestamp when the opportunity was detected.
    pub detected_at: OffsetDateTime,
}

/// Inputs for evaluating one quoted round trip.
#[derive(Debug, Clone, Copy)]
pub struct RoundTripQuote {
    /// Fee tier of the first leg.
    pub fee_in: u32,
    /// Fee tier of the second leg.
    pub fee_out: u32,
    /// Trade size in native minor units.
    pub amount_in: U256,
    /// Quoted intermediate amount.
    pub intermediate: U256,
    /// Quoted final amount.
    pub amount_out: U256,
}

/// Output of the profit calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfitEstimate {
    /// Gross profit in USD.
    pub gross_profit_usd: Decimal,
    /// Estimated gas cost in USD.
    pub gas_cost_usd: Decimal,
    /// Net profit in USD.
    pub net_profit_usd: Decimal,
}

/// Signed spread `(out - in) * 10000 / in`, integer division toward zero.
///
/// Returns 0 when `amount_in` is zero; saturates at the `i64` range. The
/// product is taken in 512 bits so no input size overflows it.
pub fn spread_bps(amount_in: U256, amount_out: U256) -> i64 {
    if amount_in.is_zero() {
        return 0;
    }
    let bps = U512::from(BPS_DENOMINATOR);
    let denominator = U512::from(amount_in);
    if amount_out >= amount_in {
        let magnitude = U512::from(amount_out - amount_in) * bps / denominator;
        i64::try_from(magnitude).unwrap_or(i64::MAX)
    } else {
        let magnitude = U512::from(amount_in - amount_out) * bps / denominator;
        i64::try_from(magnitude).map(|m| -m).unwrap_or(i64::MIN)
    }
}

/// Estimated gas cost in native units for `gas_units` at `gas_price` wei.
pub fn gas_cost_native(gas_units: u64, gas_price: U256) -> Decimal {
    format_units(U256::from(gas_units).saturating_mul(gas_price), NATIVE_DECIMALS)
}

/// Convert a gross native profit and gas estimate into USD figures.
pub fn estimate_profit(
    gross_profit: Decimal,
    native_price_usd: Decimal,
    gas_units: u64,
    gas_price: U256,
) -> ProfitEstimate {
    let gross_profit_usd = gross_profit * native_price_usd;
    let gas_cost_usd = gas_cost_native(gas_units, gas_price) * native_price_usd;
    ProfitEstimate {
        gross_profit_usd,
        gas_cost_usd,
        net_profit_usd: gross_profit_usd - gas_cost_usd,
    }
}

/// Build an [`Opportunity`] from a quoted round trip.
pub fn evaluate_round_trip(
    network: &str,
    route: String,
    quote: RoundTripQuote,
    native_price_usd: Decimal,
    gas_units: u64,
    gas_price: U256,
    min_profit_bps: i64,
) -> Opportunity {
    let spread = spread_bps(quote.amount_in, quote.amount_out);
    let gross_profit = signed_delta(quote.amount_out, quote.amount_in, NATIVE_DECIMALS);
    let estimate = estimate_profit(gross_profit, native_price_usd, gas_units, gas_price);

    Opportunity {
        network: network.to_string(),
        route,
        fee_in: quote.fee_in,
        fee_out: quote.fee_out,
        amount_in: quote.amount_in,
        intermediate: quote.intermediate,
        amount_out: quote.amount_out,
        spread_bps: spread,
        gross_profit,
        gross_profit_usd: estimate.gross_profit_usd,
        gas_cost_usd: estimate.gas_cost_usd,
        net_profit_usd: estimate.net_profit_usd,
        profitable: spread >= min_profit_bps,
        detected_at: OffsetDateTime::now_utc(),
    }
}

/// Minimum output after applying `max_slippage_bps` to a quoted amount.
pub fn min_amount_out(quoted: U256, max_slippage_bps: u32) -> U256 {
    let keep = BPS_DENOMINATOR.saturating_sub(u64::from(max_slippage_bps));
    quoted * U256::from(keep) / U256::from(BPS_DENOMINATOR)
}

/// Rank opportunities best-first by net USD profit.
pub fn rank(opportunities: &mut [Opportunity]) {
    opportunities.sort_by(|a, b| b.net_profit_usd.cmp(&a.net_profit_usd));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn wei(eth_millionths: u64) -> U256 {
        // 1 millionth ETH = 1e12 wei
        U256::from(eth_millionths) * U256::from(1_000_000_000_000u64)
    }

    #[test]
    fn spread_is_integer_bps() {
        // 0.005 ETH in, 0.005012 ETH out: 12e12 * 10000 / 5e15 = 24
        assert_eq!(spread_bps(wei(5_000), wei(5_012)), 24);
    }

    #[test]
    fn spread_truncates_toward_zero() {
        assert_eq!(spread_bps(U256::from(3u64), U256::from(4u64)), 3_333);
        assert_eq!(spread_bps(U256::from(3u64), U256::from(2u64)), -3_333);
        assert_eq!(spread_bps(U256::ZERO, U256::from(5u64)), 0);
    }

    #[test]
    fn spread_has_no_precision_loss_on_large_sizes() {
        let amount_in = U256::from(10u64).pow(U256::from(30u64));
        let amount_out = amount_in + U256::from(10u64).pow(U256::from(26u64));
        assert_eq!(spread_bps(amount_in, amount_out), 1);
    }

    #[test]
    fn gas_limits_total() {
        let limits = GasLimits {
            wrap: 10,
            approve: 20,
            swap: 30,
        };
        assert_eq!(limits.total(), 110);

        let unbounded = GasLimits {
            wrap: u64::MAX,
            approve: u64::MAX / 2 + 1,
            swap: 1,
        };
        assert_eq!(unbounded.total(), u64::MAX);
    }

    #[test]
    fn spread_saturates_instead_of_wrapping() {
        let huge_out = U256::MAX / U256::from(BPS_DENOMINATOR) + U256::from(2u64);
        assert_eq!(spread_bps(U256::from(1u64), huge_out), i64::MAX);
        assert_eq!(spread_bps(U256::from(1u64), U256::MAX), i64::MAX);
        // Halving an input near the top of the range loses half.
        assert_eq!(spread_bps(U256::MAX, U256::MAX / U256::from(2u64)), -5_000);
    }

    #[test]
    fn estimate_profit_subtracts_gas() {
        // 100_000 gas at 10 gwei = 0.001 ETH
        let estimate = estimate_profit(
            dec!(0.002),
            dec!(3500),
            100_000,
            U256::from(10_000_000_000u64),
        );
        assert_eq!(estimate.gross_profit_usd, dec!(7));
        assert_eq!(estimate.gas_cost_usd, dec!(3.5));
        assert_eq!(estimate.net_profit_usd, dec!(3.5));
    }

    #[test]
    fn evaluate_round_trip_flags_profitability() {
        let quote = RoundTripQuote {
            fee_in: 500,
            fee_out: 3000,
            amount_in: wei(5_000),
            intermediate: U256::from(17_400_000u64),
            amount_out: wei(5_012),
        };

        let opp = evaluate_round_trip("base", "r".into(), quote, dec!(3500), 0, U256::ZERO, -100);
        assert_eq!(opp.spread_bps, 24);
        assert_eq!(opp.gross_profit, dec!(0.000012));
        assert_eq!(opp.gross_profit_usd, dec!(0.042));
        assert!(opp.profitable);

        let strict = evaluate_round_trip("base", "r".into(), quote, dec!(3500), 0, U256::ZERO, 25);
        assert!(!strict.profitable);
    }

    #[test]
    fn min_amount_out_applies_slippage() {
        assert_eq!(min_amount_out(U256::from(10_000u64), 50), U256::from(9_950u64));
        assert_eq!(min_amount_out(U256::from(10_000u64), 20_000), U256::ZERO);
    }

    #[test]
    fn rank_sorts_by_net_profit_descending() {
        let quote = RoundTripQuote {
            fee_in: 100,
            fee_out: 500,
            amount_in: wei(5_000),
            intermediate: U256::from(1u64),
            amount_out: wei(4_990),
        };
        let worse = evaluate_round_trip("base", "a".into(), quote, dec!(3500), 0, U256::ZERO, 0);
        let better = evaluate_round_trip(
            "base",
            "b".into(),
            RoundTripQuote {
                amount_out: wei(5_010),
                ..quote
            },
            dec!(3500),
            0,
            U256::ZERO,
            0,
        );

        let mut list = vec![worse, better];
        rank(&mut list);
        assert_eq!(list[0].route, "b");
    }
}
