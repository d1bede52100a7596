//! Read-only JSON-RPC chain client.
//!
//! Built on an alloy provider over HTTP. Contract reads go through typed
//! `sol!` bindings for ERC-20 `balanceOf`/`allowance` and Quoter V2
//! `quoteExactInputSingle`.
//!
//! Write operations are refused: transaction signing is provided by the
//! host through its own [`ChainClient`] implementation.

use std::fmt::Display;
use std::time::Duration;

use alloy::primitives::aliases::{U160, U24};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::client::RpcClient;
use alloy::sol;
use alloy::transports::http::Http;
use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use super::{Asset, ChainClient, SwapParams, TxReceipt};
use crate::error::ChainError;
use crate::network::NetworkConfig;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
    }

    #[sol(rpc)]
    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params)
            external
            returns (
                uint256 amountOut,
                uint160 sqrtPriceX96After,
                uint32 initializedTicksCrossed,
                uint256 gasEstimate
            );
    }
}

/// Read-only JSON-RPC client for one network.
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    /// Provider over the network's endpoint.
    provider: DynProvider,
    /// Endpoint URL.
    url: Url,
    /// Quoter V2 contract.
    quoter: Address,
}

impl RpcChainClient {
    /// Create a client for the network's RPC endpoint.
    pub fn new(network: &NetworkConfig, timeout: Duration) -> Result<Self, ChainError> {
        let url: Url = network
            .rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainError::Connectivity {
                network: network.id.clone(),
                reason: format!("invalid rpc url: {e}"),
            })?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_millis(2_000))
            .tcp_nodelay(true)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        let client = RpcClient::new(Http::with_client(http, url.clone()), false);
        let provider = ProviderBuilder::new().connect_client(client).erased();

        Ok(Self {
            provider,
            url,
            quoter: network.quoter,
        })
    }
}

fn rpc_error(method: &str, err: impl Display) -> ChainError {
    debug!(method, error = %err, "RPC call failed");
    ChainError::Rpc {
        method: method.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn balance_of(&self, asset: Asset, owner: Address) -> Result<U256, ChainError> {
        match asset {
            Asset::Native => self
                .provider
                .get_balance(owner)
                .await
                .map_err(|e| rpc_error("eth_getBalance", e)),
            Asset::Token(token) => IERC20::new(token, self.provider.clone())
                .balanceOf(owner)
                .call()
                .await
                .map_err(|e| rpc_error("balanceOf", e)),
        }
    }

    async fn gas_price(&self) -> Result<U256, ChainError> {
        let price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| rpc_error("eth_gasPrice", e))?;
        Ok(U256::from(price))
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn quote_exact_in(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        fee: u32,
    ) -> Result<U256, ChainError> {
        let params = IQuoterV2::QuoteExactInputSingleParams {
            tokenIn: token_in,
            tokenOut: token_out,
            amountIn: amount_in,
            fee: U24::try_from(fee).map_err(|_| ChainError::NoPool { fee })?,
            sqrtPriceLimitX96: U160::ZERO,
        };

        let quote = IQuoterV2::new(self.quoter, self.provider.clone())
            .quoteExactInputSingle(params)
            .call()
            .await
            .map_err(|e| rpc_error("quoteExactInputSingle", e))?;
        Ok(quote.amountOut)
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        IERC20::new(token, self.provider.clone())
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| rpc_error("allowance", e))
    }

    async fn wrap(&self, _amount: U256) -> Result<TxReceipt, ChainError> {
        Err(ChainError::ReadOnly { operation: "wrap" })
    }

    async fn approve(
        &self,
        _token: Address,
        _spender: Address,
        _amount: U256,
    ) -> Result<TxReceipt, ChainError> {
        Err(ChainError::ReadOnly { operation: "approve" })
    }

    async fn swap_exact_in(&self, _params: SwapParams) -> Result<TxReceipt, ChainError> {
        Err(ChainError::ReadOnly { operation: "swap" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_are_refused() {
        let network = crate::network::preset("base").unwrap();
        let client = RpcChainClient::new(&network, Duration::from_secs(1)).unwrap();
        let err = client.wrap(U256::from(1u64)).await.unwrap_err();
        assert_eq!(err, ChainError::ReadOnly { operation: "wrap" });
    }

    #[test]
    fn invalid_url_is_rejected() {
        let mut network = crate::network::preset("base").unwrap();
        network.rpc_url = "not a url".to_string();
        let err = RpcChainClient::new(&network, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ChainError::Connectivity { ref network, .. } if network == "base"));
    }

    #[test]
    fn quoter_params_encode_as_tuple() {
        use alloy::sol_types::SolCall;

        let call = IQuoterV2::quoteExactInputSingleCall {
            params: IQuoterV2::QuoteExactInputSingleParams {
                tokenIn: Address::repeat_byte(0x11),
                tokenOut: Address::repeat_byte(0x22),
                amountIn: U256::from(5u64),
                fee: U24::from(500u32),
                sqrtPriceLimitX96: U160::ZERO,
            },
        };
        // quoteExactInputSingle((address,address,uint256,uint24,uint160))
        assert_eq!(IQuoterV2::quoteExactInputSingleCall::SELECTOR, [0xc6, 0xa5, 0x02, 0x6a]);
        assert_eq!(call.abi_encode().len(), 4 + 5 * 32);
    }
}
