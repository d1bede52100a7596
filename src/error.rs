//! Unified error types for the arbitrage engine.

use thiserror::Error;

use crate::arbitrage::TradePhase;

/// Unified error type for the arbitrage engine.
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Chain client error.
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// Arbitrage scan/execution error.
    #[error("arbitrage error: {0}")]
    Arbitrage(#[from] ArbitrageError),

    /// Signing/key error.
    #[error("signing error: {0}")]
    Signing(String),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a [`ChainClient`](crate::chain::ChainClient).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Network failed its liveness check or has no client.
    #[error("network {network} unreachable: {reason}")]
    Connectivity {
        /// Network id.
        network: String,
        /// Reason for failure.
        reason: String,
    },

    /// JSON-RPC call failed.
    #[error("rpc {method} failed: {reason}")]
    Rpc {
        /// RPC method name.
        method: String,
        /// Reason for failure.
        reason: String,
    },

    /// Response could not be decoded.
    #[error("failed to decode {what}: {reason}")]
    Decode {
        /// What was being decoded.
        what: &'static str,
        /// Reason for failure.
        reason: String,
    },

    /// No pool/liquidity for the requested fee tier.
    #[error("no pool for fee tier {fee}")]
    NoPool {
        /// Fee tier in hundredths of a bip.
        fee: u32,
    },

    /// Transaction reverted on chain.
    #[error("transaction reverted: {0}")]
    Reverted(String),

    /// Swap output below the slippage-protected minimum.
    #[error("too little received: got {received}, minimum {minimum}")]
    Slippage {
        /// Amount the swap would produce.
        received: String,
        /// Minimum accepted amount.
        minimum: String,
    },

    /// Balance too low for the requested operation.
    #[error("insufficient balance: need {required}, have {available}")]
    InsufficientBalance {
        /// Required amount (minor units).
        required: String,
        /// Available amount (minor units).
        available: String,
    },

    /// Client cannot sign transactions.
    #[error("{operation} requires a signing client; this client is read-only")]
    ReadOnly {
        /// Operation that was refused.
        operation: &'static str,
    },
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        ChainError::Rpc {
            method: "http".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Scan and execution errors.
#[derive(Error, Debug, Clone)]
pub enum ArbitrageError {
    /// A single fee-tier pair could not be quoted.
    #[error("quote failed for pair {fee_in}/{fee_out}: {source}")]
    Quote {
        /// Fee tier of the first leg.
        fee_in: u32,
        /// Fee tier of the second leg.
        fee_out: u32,
        /// Underlying chain error.
        source: ChainError,
    },

    /// A network-level scan step failed (e.g. gas price lookup).
    #[error("scan of {network} degraded: {source}")]
    Scan {
        /// Network id.
        network: String,
        /// Underlying chain error.
        source: ChainError,
    },

    /// One of the trade steps failed.
    #[error("trade failed while {phase}: {source}")]
    Execution {
        /// Phase that failed.
        phase: TradePhase,
        /// Underlying chain error.
        source: ChainError,
    },

    /// Swap 1 produced no quote asset.
    #[error("swap 1 settled but no quote asset was received")]
    NothingReceived,

    /// Requested network has no client.
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, BotError>;
