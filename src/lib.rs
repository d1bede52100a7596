//! Cross-fee-tier arbitrage engine for concentrated-liquidity DEXes.
//!
//! The same pair is often listed in several fee tiers whose prices drift
//! apart. The engine quotes a round trip through two different tiers and
//! trades when the spread clears the threshold:
//!
//! ```text
//! 0.005 ETH --(0.05% pool)--> 17.40 USDC --(0.3% pool)--> 0.005012 ETH
//! ───────────────────────────────────────────────────────────────────
//! spread: (0.005012 - 0.005) / 0.005 = 24 bps, minus gas
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`network`]: Network presets and overrides
//! - [`chain`]: Chain client boundary, JSON-RPC and mock clients
//! - [`arbitrage`]: Profit math, fee-tier scanning and trade execution
//! - [`engine`]: Network selection, scheduling, stats and snapshots
//! - [`strategy`]: Strategy flags
//! - [`api`]: HTTP control surface
//! - [`metrics`]: Prometheus metrics
//! - [`signing`]: Operator key handling
//! - [`utils`]: Utility functions

pub mod api;
pub mod arbitrage;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod network;
pub mod signing;
pub mod strategy;
pub mod utils;

pub use config::Config;
pub use engine::Engine;
pub use error::{BotError, Result};
