//! Chain connectivity boundary.
//!
//! The engine never implements blockchain semantics itself. Everything it
//! needs from a network goes through [`ChainClient`]:
//! - balances, allowances and gas price reads
//! - exact-input quotes against the venue's quoter
//! - wrap / approve / swap transactions with receipts
//!
//! Implementations:
//! - [`RpcChainClient`]: read-only JSON-RPC client
//! - [`MockChainClient`]: deterministic in-memory client for tests

pub mod mock;
pub mod rpc;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::Serialize;

use crate::error::ChainError;

pub use mock::{MockChainClient, MockFailure};
pub use rpc::RpcChainClient;

/// Asset whose balance is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Asset {
    /// The chain's native asset.
    Native,
    /// An ERC-20 token.
    Token(Address),
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    /// Transaction hash (0x-prefixed).
    pub hash: String,
    /// Gas consumed.
    pub gas_used: u64,
    /// Effective gas price in wei.
    #[serde(serialize_with = "crate::engine::snapshot::u256_string")]
    pub effective_gas_price: U256,
}

impl TxReceipt {
    /// Total fee paid in wei.
    pub fn fee_wei(&self) -> U256 {
        U256::from(self.gas_used) * self.effective_gas_price
    }
}

/// Parameters of a single-hop exact-input swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapParams {
    /// Token sold.
    pub token_in: Address,
    /// Token bought.
    pub token_out: Address,
    /// Pool fee tier.
    pub fee: u32,
    /// Exact amount sold.
    pub amount_in: U256,
    /// Slippage-protected minimum output.
    pub amount_out_minimum: U256,
}

/// Capabilities the engine requires from one network.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Balance of `asset` held by `owner`.
    async fn balance_of(&self, asset: Asset, owner: Address) -> Result<U256, ChainError>;

    /// Current gas price in wei.
    async fn gas_price(&self) -> Result<U256, ChainError>;

    /// Quote an exact-input single-hop swap.
    async fn quote_exact_in(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        fee: u32,
    ) -> Result<U256, ChainError>;

    /// ERC-20 allowance granted by `owner` to `spender`.
    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError>;

    /// Wrap `amount` of the native asset.
    async fn wrap(&self, amount: U256) -> Result<TxReceipt, ChainError>;

    /// Approve `spender` for `amount` of `token`.
    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxReceipt, ChainError>;

    /// Execute an exact-input swap through the router.
    async fn swap_exact_in(&self, params: SwapParams) -> Result<TxReceipt, ChainError>;
}
