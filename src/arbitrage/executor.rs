//! Round-trip trade execution.
//!
//! A trade is five independent on-chain transactions:
//!
//! ```text
//! IDLE -> WRAPPING -> APPROVING_IN -> SWAPPING_1 -> APPROVING_OUT -> SWAPPING_2 -> SETTLED | FAILED
//! ```
//!
//! Only one trade runs at a time across the process. Profit is measured
//! from balance snapshots taken before and after the sequence, never from
//! quotes. A failed step leaves earlier steps in place; nothing is unwound.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};
use tracing::{debug, error, info, instrument, warn};

use super::calculator::{min_amount_out, Opportunity};
use crate::chain::{Asset, ChainClient, SwapParams, TxReceipt};
use crate::error::{ArbitrageError, ChainError};
use crate::metrics;
use crate::network::NetworkConfig;
use crate::utils::{format_units, signed_delta, NATIVE_DECIMALS};

/// Phase of the trade state machine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, IntoStaticStr, Serialize,
)]
pub enum TradePhase {
    /// No trade in flight.
    #[default]
    #[strum(serialize = "IDLE")]
    #[serde(rename = "IDLE")]
    Idle,
    /// Wrapping the native asset.
    #[strum(serialize = "WRAPPING")]
    #[serde(rename = "WRAPPING")]
    Wrapping,
    /// Approving the router on the wrapped asset.
    #[strum(serialize = "APPROVING_IN")]
    #[serde(rename = "APPROVING_IN")]
    ApprovingIn,
    /// Wrapped -> quote swap.
    #[strum(serialize = "SWAPPING_1")]
    #[serde(rename = "SWAPPING_1")]
    Swapping1,
    /// Approving the router on the quote asset.
    #[strum(serialize = "APPROVING_OUT")]
    #[serde(rename = "APPROVING_OUT")]
    ApprovingOut,
    /// Quote -> wrapped swap.
    #[strum(serialize = "SWAPPING_2")]
    #[serde(rename = "SWAPPING_2")]
    Swapping2,
    /// Sequence completed.
    #[strum(serialize = "SETTLED")]
    #[serde(rename = "SETTLED")]
    Settled,
    /// A step failed.
    #[strum(serialize = "FAILED")]
    #[serde(rename = "FAILED")]
    Failed,
}

impl TradePhase {
    /// Whether the phase ends a trade.
    pub fn is_terminal(self) -> bool {
        matches!(self, TradePhase::Settled | TradePhase::Failed)
    }
}

/// Native, wrapped and quote balances at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
    /// Native asset (minor units).
    pub native: U256,
    /// Wrapped native (minor units).
    pub wrapped: U256,
    /// Quote asset (minor units).
    pub quote: U256,
}

impl BalanceSnapshot {
    /// Native plus wrapped, the amount a round trip should grow.
    pub fn native_total(&self) -> U256 {
        self.native.saturating_add(self.wrapped)
    }

    /// USD value: `(native + wrapped) * price + quote`.
    pub fn value_usd(&self, native_price_usd: Decimal, quote_decimals: u8) -> Decimal {
        format_units(self.native_total(), NATIVE_DECIMALS) * native_price_usd
            + format_units(self.quote, quote_decimals)
    }
}

/// Read native, wrapped and quote balances for `owner`.
pub async fn snapshot_balances(
    client: &dyn ChainClient,
    network: &NetworkConfig,
    owner: Address,
) -> Result<BalanceSnapshot, ChainError> {
    let native = client.balance_of(Asset::Native, owner).await?;
    let wrapped = client
        .balance_of(Asset::Token(network.wrapped_native), owner)
        .await?;
    let quote = client
        .balance_of(Asset::Token(network.quote_token), owner)
        .await?;
    Ok(BalanceSnapshot {
        native,
        wrapped,
        quote,
    })
}

/// Outcome of one trade attempt.
#[derive(Debug, Clone)]
pub struct TradeResult {
    /// Network traded on.
    pub network: String,
    /// Whether the sequence settled.
    pub success: bool,
    /// Phase that failed, if any.
    pub failed_phase: Option<TradePhase>,
    /// Realized native-unit profit (signed).
    pub realized_profit: Decimal,
    /// Realized profit in USD.
    pub realized_profit_usd: Decimal,
    /// Gas paid by the two swaps, in USD.
    pub realized_gas_usd: Decimal,
    /// Hash of the last transaction that was mined.
    pub tx_hash: Option<String>,
    /// Every mined transaction, in order.
    pub tx_hashes: Vec<String>,
    /// Wall-clock duration.
    pub duration: Duration,
    /// Balances before the first step.
    pub balances_before: Option<BalanceSnapshot>,
    /// Balances after the last attempted step.
    pub balances_after: Option<BalanceSnapshot>,
    /// Error message on failure.
    pub error: Option<String>,
}

impl TradeResult {
    /// Whether at least one transaction reached the chain.
    pub fn submitted(&self) -> bool {
        !self.tx_hashes.is_empty()
    }
}

/// Mined transactions of one trade.
#[derive(Debug, Default)]
struct Receipts {
    hashes: Vec<String>,
    swap_fees_wei: U256,
}

impl Receipts {
    fn record(&mut self, receipt: TxReceipt, is_swap: bool) {
        debug!(tx_hash = %receipt.hash, gas_used = receipt.gas_used, "Transaction mined");
        if is_swap {
            self.swap_fees_wei = self.swap_fees_wei.saturating_add(receipt.fee_wei());
        }
        self.hashes.push(receipt.hash);
    }
}

/// Releases the single-flight flag when dropped.
#[derive(Debug)]
pub struct ExecutionGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs trade sequences one at a time.
#[derive(Debug)]
pub struct TradeExecutor {
    owner: Address,
    max_slippage_bps: u32,
    in_flight: AtomicBool,
    phase: Mutex<TradePhase>,
}

impl TradeExecutor {
    /// Create an executor trading from `owner`.
    pub fn new(owner: Address, max_slippage_bps: u32) -> Self {
        Self {
            owner,
            max_slippage_bps,
            in_flight: AtomicBool::new(false),
            phase: Mutex::new(TradePhase::Idle),
        }
    }

    /// Whether a trade is in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claim the single-flight slot, or `None` if a trade already holds it.
    pub fn try_acquire(&self) -> Option<ExecutionGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ExecutionGuard {
                flag: &self.in_flight,
            })
    }

    /// Current (or last) phase.
    pub fn phase(&self) -> TradePhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reset the phase label to idle. Ignored while a trade is in flight.
    pub fn reset_phase(&self) {
        if !self.is_busy() {
            self.enter(TradePhase::Idle);
        }
    }

    fn enter(&self, phase: TradePhase) {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
        debug!(%phase, "Trade phase");
    }

    /// Execute `opportunity` on `network`.
    ///
    /// Returns `None` without touching any state when another trade is in
    /// flight. Otherwise the result is always recorded, success or not.
    #[instrument(
        skip(self, client, network, opportunity),
        fields(network = %network.id, fee_in = opportunity.fee_in, fee_out = opportunity.fee_out)
    )]
    pub async fn execute(
        &self,
        client: &dyn ChainClient,
        network: &NetworkConfig,
        opportunity: &Opportunity,
        native_price_usd: Decimal,
    ) -> Option<TradeResult> {
        let Some(_guard) = self.try_acquire() else {
            debug!("Trade already in flight, skipping");
            return None;
        };

        let started = Instant::now();
        let _timer = metrics::timer_trade();
        info!(
            route = %opportunity.route,
            spread_bps = opportunity.spread_bps,
            expected_net_usd = %opportunity.net_profit_usd,
            "Executing round trip"
        );

        let mut receipts = Receipts::default();
        let (before, outcome) = match snapshot_balances(client, network, self.owner).await {
            Ok(before) => {
                let outcome = self
                    .run_sequence(client, network, opportunity, &mut receipts)
                    .await;
                (Some(before), outcome)
            }
            Err(source) => (
                None,
                Err(ArbitrageError::Execution {
                    phase: TradePhase::Idle,
                    source,
                }),
            ),
        };

        let after = match before {
            Some(_) => match snapshot_balances(client, network, self.owner).await {
                Ok(after) => Some(after),
                Err(e) => {
                    warn!(error = %e, "Could not read balances after trade");
                    None
                }
            },
            None => None,
        };

        let realized_gas_usd =
            format_units(receipts.swap_fees_wei, NATIVE_DECIMALS) * native_price_usd;

        let result = match outcome {
            Ok(()) => {
                self.enter(TradePhase::Settled);
                let realized_profit = match (before, after) {
                    (Some(b), Some(a)) => {
                        signed_delta(a.native_total(), b.native_total(), NATIVE_DECIMALS)
                    }
                    _ => Decimal::ZERO,
                };
                let realized_profit_usd = realized_profit * native_price_usd;
                info!(
                    realized_profit = %realized_profit,
                    realized_profit_usd = %realized_profit_usd,
                    realized_gas_usd = %realized_gas_usd,
                    tx_hash = receipts.hashes.last().map(String::as_str).unwrap_or_default(),
                    "Trade settled"
                );
                TradeResult {
                    network: network.id.clone(),
                    success: true,
                    failed_phase: None,
                    realized_profit,
                    realized_profit_usd,
                    realized_gas_usd,
                    tx_hash: receipts.hashes.last().cloned(),
                    tx_hashes: receipts.hashes,
                    duration: started.elapsed(),
                    balances_before: before,
                    balances_after: after,
                    error: None,
                }
            }
            Err(err) => {
                let failed_phase = match &err {
                    ArbitrageError::Execution { phase, .. } => *phase,
                    _ => self.phase(),
                };
                self.enter(TradePhase::Failed);
                error!(
                    phase = %failed_phase,
                    error = %err,
                    mined = receipts.hashes.len(),
                    "Trade failed; completed steps are not unwound"
                );
                TradeResult {
                    network: network.id.clone(),
                    success: false,
                    failed_phase: Some(failed_phase),
                    realized_profit: Decimal::ZERO,
                    realized_profit_usd: Decimal::ZERO,
                    realized_gas_usd,
                    tx_hash: receipts.hashes.last().cloned(),
                    tx_hashes: receipts.hashes,
                    duration: started.elapsed(),
                    balances_before: before,
                    balances_after: after,
                    error: Some(err.to_string()),
                }
            }
        };

        metrics::record_trade(&result.network, result.success);
        Some(result)
    }

    async fn run_sequence(
        &self,
        client: &dyn ChainClient,
        network: &NetworkConfig,
        opportunity: &Opportunity,
        receipts: &mut Receipts,
    ) -> Result<(), ArbitrageError> {
        let amount_in = opportunity.amount_in;
        let fail =
            |phase: TradePhase| move |source: ChainError| ArbitrageError::Execution { phase, source };

        self.enter(TradePhase::Wrapping);
        let receipt = client
            .wrap(amount_in)
            .await
            .map_err(fail(TradePhase::Wrapping))?;
        receipts.record(receipt, false);

        self.enter(TradePhase::ApprovingIn);
        if let Some(receipt) = self
            .ensure_allowance(client, network.wrapped_native, network.router, amount_in)
            .await
            .map_err(fail(TradePhase::ApprovingIn))?
        {
            receipts.record(receipt, false);
        }

        self.enter(TradePhase::Swapping1);
        let quote_before = client
            .balance_of(Asset::Token(network.quote_token), self.owner)
            .await
            .map_err(fail(TradePhase::Swapping1))?;
        let receipt = client
            .swap_exact_in(SwapParams {
                token_in: network.wrapped_native,
                token_out: network.quote_token,
                fee: opportunity.fee_in,
                amount_in,
                amount_out_minimum: min_amount_out(opportunity.intermediate, self.max_slippage_bps),
            })
            .await
            .map_err(fail(TradePhase::Swapping1))?;
        receipts.record(receipt, true);

        // Swap 2 sells what swap 1 actually delivered, not what was quoted.
        let quote_after = client
            .balance_of(Asset::Token(network.quote_token), self.owner)
            .await
            .map_err(fail(TradePhase::Swapping1))?;
        let received = quote_after.saturating_sub(quote_before);
        if received.is_zero() {
            return Err(ArbitrageError::NothingReceived);
        }
        debug!(received = %received, quoted = %opportunity.intermediate, "Swap 1 delivered");

        self.enter(TradePhase::ApprovingOut);
        if let Some(receipt) = self
            .ensure_allowance(client, network.quote_token, network.router, received)
            .await
            .map_err(fail(TradePhase::ApprovingOut))?
        {
            receipts.record(receipt, false);
        }

        self.enter(TradePhase::Swapping2);
        let expected_out = scale_quote(opportunity.amount_out, received, opportunity.intermediate);
        let receipt = client
            .swap_exact_in(SwapParams {
                token_in: network.quote_token,
                token_out: network.wrapped_native,
                fee: opportunity.fee_out,
                amount_in: received,
                amount_out_minimum: min_amount_out(expected_out, self.max_slippage_bps),
            })
            .await
            .map_err(fail(TradePhase::Swapping2))?;
        receipts.record(receipt, true);

        Ok(())
    }

    /// Approve `spender` for the maximum amount when the current allowance
    /// is below `amount`. Returns the approve receipt if one was sent.
    async fn ensure_allowance(
        &self,
        client: &dyn ChainClient,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<Option<TxReceipt>, ChainError> {
        let current = client.allowance(token, self.owner, spender).await?;
        if current >= amount {
            debug!(token = %token, "Allowance sufficient");
            return Ok(None);
        }
        client.approve(token, spender, U256::MAX).await.map(Some)
    }
}

/// Rescale a quoted output to the input actually available.
fn scale_quote(quoted_out: U256, actual_in: U256, quoted_in: U256) -> U256 {
    if quoted_in.is_zero() {
        return quoted_out;
    }
    quoted_out.saturating_mul(actual_in) / quoted_in
}
