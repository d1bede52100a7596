//! Mock chain client for unit testing.
//!
//! This module provides a mock client that can be used in tests
//! without making real network requests. Balances move the way the
//! real contracts would move them: wraps shift native into wrapped,
//! swaps debit the input token and credit the output, and every
//! transaction burns gas from the native balance.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use super::{Asset, ChainClient, SwapParams, TxReceipt};
use crate::error::ChainError;
use crate::network::NetworkConfig;

/// Operation that the mock should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockFailure {
    /// Every balance read.
    Balance,
    /// Gas price lookup.
    GasPrice,
    /// Quotes selling `token_in` at `fee`, any amount.
    Quote {
        /// Token sold.
        token_in: Address,
        /// Fee tier.
        fee: u32,
    },
    /// Quote selling exactly `amount_in` of `token_in` at `fee`.
    QuoteAmount {
        /// Token sold.
        token_in: Address,
        /// Fee tier.
        fee: u32,
        /// Exact input amount.
        amount_in: U256,
    },
    /// Wrap transaction.
    Wrap,
    /// Approve transaction for `token`.
    Approve {
        /// Token being approved.
        token: Address,
    },
    /// Swap selling `token_in`.
    Swap {
        /// Token sold.
        token_in: Address,
    },
}

/// Configuration for mock client behavior.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Gas price returned and charged, in wei.
    pub gas_price: U256,
    /// Gas used by a wrap.
    pub wrap_gas: u64,
    /// Gas used by an approve.
    pub approve_gas: u64,
    /// Gas used by a swap.
    pub swap_gas: u64,
    /// Simulated latency in milliseconds.
    pub latency_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            gas_price: U256::from(10_000_000u64), // 0.01 gwei
            wrap_gas: 45_000,
            approve_gas: 46_000,
            swap_gas: 130_000,
            latency_ms: 0,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    balances: HashMap<Asset, U256>,
    allowances: HashMap<(Address, Address), U256>,
    /// (token_in, token_out, fee) -> (reference in, reference out)
    pools: HashMap<(Address, Address, u32), (U256, U256)>,
    failures: HashSet<MockFailure>,
    tx_count: u64,
    calls: Vec<&'static str>,
}

/// Mock chain client for testing.
#[derive(Debug, Clone)]
pub struct MockChainClient {
    config: MockConfig,
    wrapped_native: Address,
    router: Address,
    state: Arc<Mutex<MockState>>,
}

impl MockChainClient {
    /// Create a mock for the given network's wrapped token and router.
    pub fn for_network(network: &NetworkConfig) -> Self {
        Self::with_config(network, MockConfig::default())
    }

    /// Create a mock with custom configuration.
    pub fn with_config(network: &NetworkConfig, config: MockConfig) -> Self {
        Self {
            config,
            wrapped_native: network.wrapped_native,
            router: network.router,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set a balance.
    pub fn set_balance(&self, asset: Asset, amount: U256) {
        self.state().balances.insert(asset, amount);
    }

    /// Read a balance without going through the trait.
    pub fn balance(&self, asset: Asset) -> U256 {
        self.state().balances.get(&asset).copied().unwrap_or_default()
    }

    /// Set an allowance for the router.
    pub fn set_allowance(&self, token: Address, amount: U256) {
        let router = self.router;
        self.state().allowances.insert((token, router), amount);
    }

    /// Register a pool: selling `reference_in` of `token_in` yields `reference_out`.
    ///
    /// Other amounts are quoted proportionally.
    pub fn set_pool(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        reference_in: U256,
        reference_out: U256,
    ) {
        self.state()
            .pools
            .insert((token_in, token_out, fee), (reference_in, reference_out));
    }

    /// Make an operation fail until cleared.
    pub fn fail(&self, failure: MockFailure) {
        self.state().failures.insert(failure);
    }

    /// Clear all injected failures.
    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Operations performed so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }
    }

    fn quote_locked(
        state: &MockState,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        fee: u32,
    ) -> Result<U256, ChainError> {
        if state.failures.contains(&MockFailure::Quote { token_in, fee })
            || state.failures.contains(&MockFailure::QuoteAmount {
                token_in,
                fee,
                amount_in,
            })
        {
            return Err(ChainError::Reverted("mock quote failure".to_string()));
        }

        let (reference_in, reference_out) = state
            .pools
            .get(&(token_in, token_out, fee))
            .copied()
            .ok_or(ChainError::NoPool { fee })?;

        if reference_in.is_zero() {
            return Err(ChainError::NoPool { fee });
        }
        Ok(amount_in * reference_out / reference_in)
    }

    fn debit(state: &mut MockState, asset: Asset, amount: U256) -> Result<(), ChainError> {
        let balance = state.balances.entry(asset).or_default();
        if *balance < amount {
            return Err(ChainError::InsufficientBalance {
                required: amount.to_string(),
                available: balance.to_string(),
            });
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(state: &mut MockState, asset: Asset, amount: U256) {
        *state.balances.entry(asset).or_default() += amount;
    }

    fn mine(&self, state: &mut MockState, gas_used: u64) -> Result<TxReceipt, ChainError> {
        let receipt = TxReceipt {
            hash: format!("0x{:064x}", state.tx_count + 1),
            gas_used,
            effective_gas_price: self.config.gas_price,
        };
        Self::debit(state, Asset::Native, receipt.fee_wei())?;
        state.tx_count += 1;
        Ok(receipt)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn balance_of(&self, asset: Asset, _owner: Address) -> Result<U256, ChainError> {
        self.simulate_latency().await;
        let state = self.state();
        if state.failures.contains(&MockFailure::Balance) {
            return Err(ChainError::Rpc {
                method: "eth_getBalance".to_string(),
                reason: "mock balance failure".to_string(),
            });
        }
        Ok(state.balances.get(&asset).copied().unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<U256, ChainError> {
        self.simulate_latency().await;
        if self.state().failures.contains(&MockFailure::GasPrice) {
            return Err(ChainError::Rpc {
                method: "eth_gasPrice".to_string(),
                reason: "mock gas price failure".to_string(),
            });
        }
        Ok(self.config.gas_price)
    }

    async fn quote_exact_in(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        fee: u32,
    ) -> Result<U256, ChainError> {
        self.simulate_latency().await;
        let state = self.state();
        Self::quote_locked(&state, token_in, token_out, amount_in, fee)
    }

    async fn allowance(
        &self,
        token: Address,
        _owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        self.simulate_latency().await;
        let state = self.state();
        Ok(state
            .allowances
            .get(&(token, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn wrap(&self, amount: U256) -> Result<TxReceipt, ChainError> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.push("wrap");
        if state.failures.contains(&MockFailure::Wrap) {
            return Err(ChainError::Reverted("mock wrap failure".to_string()));
        }
        Self::debit(&mut state, Asset::Native, amount)?;
        Self::credit(&mut state, Asset::Token(self.wrapped_native), amount);
        self.mine(&mut state, self.config.wrap_gas)
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxReceipt, ChainError> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.push("approve");
        if state.failures.contains(&MockFailure::Approve { token }) {
            return Err(ChainError::Reverted("mock approve failure".to_string()));
        }
        state.allowances.insert((token, spender), amount);
        self.mine(&mut state, self.config.approve_gas)
    }

    async fn swap_exact_in(&self, params: SwapParams) -> Result<TxReceipt, ChainError> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.push("swap");
        if state.failures.contains(&MockFailure::Swap {
            token_in: params.token_in,
        }) {
            return Err(ChainError::Reverted("mock swap failure".to_string()));
        }

        let allowance = state
            .allowances
            .get(&(params.token_in, self.router))
            .copied()
            .unwrap_or_default();
        if allowance < params.amount_in {
            return Err(ChainError::Reverted("STF: allowance too low".to_string()));
        }

        let amount_out = Self::quote_locked(
            &state,
            params.token_in,
            params.token_out,
            params.amount_in,
            params.fee,
        )?;
        if amount_out < params.amount_out_minimum {
            return Err(ChainError::Slippage {
                received: amount_out.to_string(),
                minimum: params.amount_out_minimum.to_string(),
            });
        }

        Self::debit(&mut state, Asset::Token(params.token_in), params.amount_in)?;
        Self::credit(&mut state, Asset::Token(params.token_out), amount_out);
        if allowance != U256::MAX {
            state
                .allowances
                .insert((params.token_in, self.router), allowance - params.amount_in);
        }
        self.mine(&mut state, self.config.swap_gas)
    }
}
