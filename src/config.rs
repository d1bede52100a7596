//! Application configuration loaded from environment variables.

use std::time::Duration;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::arbitrage::GasLimits;
use crate::error::BotError;
use crate::network::{load_networks, NetworkConfig};
use crate::signing;
use crate::utils::{parse_units, NATIVE_DECIMALS};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Wallet ===
    /// Operator private key (hex, starts with 0x).
    pub wallet_private_key: String,

    /// Operator address; must match the key when set.
    #[serde(default)]
    pub wallet_address: Option<String>,

    // === Networks ===
    /// Network ids to trade on (comma separated).
    #[serde(default = "default_networks")]
    pub networks: Vec<String>,

    /// Fee tiers to probe, in hundredths of a bip (comma separated).
    #[serde(default = "default_fee_tiers")]
    pub fee_tiers: Vec<u32>,

    /// Per-request RPC timeout.
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,

    // === Trading Parameters ===
    /// Milliseconds between ticks.
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Minimum spread in bps to trade; may be negative for testing.
    #[serde(default)]
    pub min_profit_bps: i64,

    /// Maximum slippage applied to swap minimums.
    #[serde(default = "default_max_slippage_bps")]
    pub max_slippage_bps: u32,

    /// Trade size in native units (e.g., 0.005).
    #[serde(default = "default_trade_size")]
    pub trade_size: Decimal,

    /// Gas estimate for the wrap step.
    #[serde(default = "default_gas_limit_wrap")]
    pub gas_limit_wrap: u64,

    /// Gas estimate for one approve.
    #[serde(default = "default_gas_limit_approve")]
    pub gas_limit_approve: u64,

    /// Gas estimate for one swap.
    #[serde(default = "default_gas_limit_swap")]
    pub gas_limit_swap: u64,

    /// Gas price used when the network lookup fails.
    #[serde(default = "default_fallback_gas_price_gwei")]
    pub fallback_gas_price_gwei: Decimal,

    /// Native asset price used until a quote-based price is discovered.
    #[serde(default = "default_native_price_usd")]
    pub native_price_usd: Decimal,

    /// Refresh balances every N ticks.
    #[serde(default = "default_balance_refresh_ticks")]
    pub balance_refresh_ticks: u64,

    /// Native + wrapped balance below which a network is inactive.
    #[serde(default = "default_min_active_balance")]
    pub min_active_balance: Decimal,

    // === Operation Modes ===
    /// Simulation mode (scan only) unless /start overrides it.
    #[serde(default = "default_true")]
    pub dry_run: bool,

    // === Server Configuration ===
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_networks() -> Vec<String> {
    vec!["base".to_string(), "arbitrum".to_string(), "optimism".to_string()]
}

fn default_fee_tiers() -> Vec<u32> {
    vec![100, 500, 3000]
}

fn default_rpc_timeout_ms() -> u64 {
    10_000
}

fn default_scan_interval_ms() -> u64 {
    5_000
}

fn default_max_slippage_bps() -> u32 {
    50 // 0.5%
}

fn default_trade_size() -> Decimal {
    Decimal::new(5, 3) // 0.005
}

fn default_gas_limit_wrap() -> u64 {
    50_000
}

fn default_gas_limit_approve() -> u64 {
    50_000
}

fn default_gas_limit_swap() -> u64 {
    180_000
}

fn default_fallback_gas_price_gwei() -> Decimal {
    Decimal::new(1, 2) // 0.01 gwei
}

fn default_native_price_usd() -> Decimal {
    Decimal::new(3500, 0)
}

fn default_balance_refresh_ticks() -> u64 {
    5
}

fn default_min_active_balance() -> Decimal {
    Decimal::new(1, 3) // 0.001
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    3101
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), BotError> {
        let invalid = |msg: &str| Err(BotError::InvalidConfig(msg.to_string()));

        if self.wallet_private_key.is_empty() {
            return invalid("WALLET_PRIVATE_KEY is required");
        }
        if !self.wallet_private_key.starts_with("0x") {
            return invalid("WALLET_PRIVATE_KEY must start with 0x");
        }
        self.wallet()?;

        if self.networks.is_empty() {
            return invalid("NETWORKS must name at least one network");
        }

        let mut tiers = self.fee_tiers.clone();
        tiers.sort_unstable();
        tiers.dedup();
        if tiers.len() < 2 {
            return invalid("FEE_TIERS needs at least two distinct tiers");
        }
        if tiers.iter().any(|fee| *fee == 0 || *fee >= 1_000_000) {
            return invalid("FEE_TIERS must be between 1 and 999999");
        }

        if self.trade_size <= Decimal::ZERO {
            return invalid("TRADE_SIZE must be positive");
        }
        if self.max_slippage_bps >= 10_000 {
            return invalid("MAX_SLIPPAGE_BPS must be below 10000");
        }
        if self.scan_interval_ms < 100 {
            return invalid("SCAN_INTERVAL_MS must be at least 100");
        }
        if self.balance_refresh_ticks == 0 {
            return invalid("BALANCE_REFRESH_TICKS must be at least 1");
        }
        if self.native_price_usd <= Decimal::ZERO {
            return invalid("NATIVE_PRICE_USD must be positive");
        }
        if self.fallback_gas_price_gwei.is_sign_negative() {
            return invalid("FALLBACK_GAS_PRICE_GWEI must not be negative");
        }

        Ok(())
    }

    /// Operator address derived from the key, checked against `WALLET_ADDRESS`.
    pub fn wallet(&self) -> Result<Address, BotError> {
        signing::wallet_address(&self.wallet_private_key, self.wallet_address.as_deref())
    }

    /// Resolve configured networks with their overrides.
    pub fn network_configs(&self) -> Result<Vec<NetworkConfig>, BotError> {
        let networks = load_networks(&self.networks, &self.fee_tiers)?;
        for network in &networks {
            url::Url::parse(&network.rpc_url).map_err(|e| {
                BotError::InvalidConfig(format!(
                    "{}_RPC_URL is not a valid URL: {e}",
                    network.id.to_uppercase()
                ))
            })?;
        }
        Ok(networks)
    }

    /// Per-request RPC timeout.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Engine parameters for one run.
    pub fn engine_config(&self) -> Result<EngineConfig, BotError> {
        let trade_size_wei = parse_units(self.trade_size, NATIVE_DECIMALS)
            .filter(|wei| !wei.is_zero())
            .ok_or_else(|| BotError::InvalidConfig("TRADE_SIZE is not representable".into()))?;
        let fallback_gas_price = parse_units(self.fallback_gas_price_gwei, 9).ok_or_else(|| {
            BotError::InvalidConfig("FALLBACK_GAS_PRICE_GWEI is not representable".into())
        })?;

        Ok(EngineConfig {
            scan_interval: Duration::from_millis(self.scan_interval_ms),
            min_profit_bps: self.min_profit_bps,
            max_slippage_bps: self.max_slippage_bps,
            trade_size: self.trade_size,
            trade_size_wei,
            fee_tiers: self.fee_tiers.clone(),
            gas_limits: GasLimits {
                wrap: self.gas_limit_wrap,
                approve: self.gas_limit_approve,
                swap: self.gas_limit_swap,
            },
            fallback_gas_price,
            fallback_native_price_usd: self.native_price_usd,
            balance_refresh_ticks: self.balance_refresh_ticks.max(1),
            min_active_balance: self.min_active_balance,
            default_dry_run: self.dry_run,
        })
    }
}

/// Parameters fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Time between ticks.
    pub scan_interval: Duration,
    /// Minimum spread to trade (bps, signed).
    pub min_profit_bps: i64,
    /// Slippage tolerance for swap minimums (bps).
    pub max_slippage_bps: u32,
    /// Trade size in native units.
    pub trade_size: Decimal,
    /// Trade size in wei.
    pub trade_size_wei: U256,
    /// Fee tiers to probe.
    pub fee_tiers: Vec<u32>,
    /// Gas estimates for ranking.
    pub gas_limits: GasLimits,
    /// Gas price used when the lookup fails, in wei.
    pub fallback_gas_price: U256,
    /// Native price used until one is discovered.
    pub fallback_native_price_usd: Decimal,
    /// Refresh balances every N ticks.
    pub balance_refresh_ticks: u64,
    /// Minimum native + wrapped balance for a network to be active.
    pub min_active_balance: Decimal,
    /// Mode used when /start does not specify one.
    pub default_dry_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(default_scan_interval_ms()),
            min_profit_bps: 0,
            max_slippage_bps: default_max_slippage_bps(),
            trade_size: default_trade_size(),
            trade_size_wei: U256::from(5_000_000_000_000_000u64),
            fee_tiers: default_fee_tiers(),
            gas_limits: GasLimits::default(),
            fallback_gas_price: U256::from(10_000_000u64),
            fallback_native_price_usd: default_native_price_usd(),
            balance_refresh_ticks: default_balance_refresh_ticks(),
            min_active_balance: default_min_active_balance(),
            default_dry_run: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const TEST_KEY: &str = "0x0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let mut all = vec![("wallet_private_key".to_string(), TEST_KEY.to_string())];
        all.extend(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        envy::from_iter(all).unwrap()
    }

    #[test]
    fn default_values_are_sensible() {
        let config = config_from(&[]);
        assert_eq!(config.networks, vec!["base", "arbitrum", "optimism"]);
        assert_eq!(config.fee_tiers, vec![100, 500, 3000]);
        assert_eq!(config.trade_size, dec!(0.005));
        assert_eq!(config.port, 3101);
        assert!(config.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn engine_config_matches_defaults() {
        let engine = config_from(&[]).engine_config().unwrap();
        assert_eq!(engine, EngineConfig::default());
        assert_eq!(engine.gas_limits.total(), 510_000);
    }

    #[test]
    fn lists_and_signed_thresholds_parse() {
        let config = config_from(&[
            ("networks", "base,optimism"),
            ("fee_tiers", "500,3000"),
            ("min_profit_bps", "-100"),
        ]);
        assert_eq!(config.networks, vec!["base", "optimism"]);
        assert_eq!(config.fee_tiers, vec![500, 3000]);
        assert_eq!(config.min_profit_bps, -100);
    }

    #[test]
    fn validate_rejects_invalid_private_key_prefix() {
        let mut config = config_from(&[]);
        config.wallet_private_key = TEST_KEY.trim_start_matches("0x").to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_checks_wallet_address() {
        let derived = signing::address_from_private_key(TEST_KEY).unwrap();

        let matching = config_from(&[("wallet_address", &derived.to_string())]);
        assert!(matching.validate().is_ok());

        let other = config_from(&[(
            "wallet_address",
            "0x1111111111111111111111111111111111111111",
        )]);
        assert!(matches!(other.validate(), Err(BotError::Signing(_))));
    }

    #[test]
    fn validate_rejects_single_fee_tier() {
        let config = config_from(&[("fee_tiers", "500,500")]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn network_configs_reject_unknown_network() {
        let config = config_from(&[("networks", "base,mars")]);
        assert!(config.network_configs().is_err());
    }
}
