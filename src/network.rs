//! Network definitions: token and contract addresses per chain.

use std::str::FromStr;

use alloy::primitives::{address, Address};
use serde::Serialize;

use crate::error::BotError;

/// Static description of one EVM network the engine can trade on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Short id used in config and APIs (e.g. "base").
    pub id: String,
    /// Display name.
    pub name: String,
    /// EVM chain id.
    pub chain_id: u64,
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// Block explorer base URL.
    pub explorer_url: String,
    /// Symbol of the native asset.
    pub native_symbol: String,
    /// Wrapped native token.
    pub wrapped_native: Address,
    /// Quote asset (USD stablecoin).
    pub quote_token: Address,
    /// Symbol of the quote asset.
    pub quote_symbol: String,
    /// Decimals of the quote asset.
    pub quote_decimals: u8,
    /// Swap router (exactInputSingle).
    pub router: Address,
    /// Quoter V2 contract.
    pub quoter: Address,
    /// Fee tiers available on this network.
    pub fee_tiers: Vec<u32>,
}

/// Public, redaction-safe view of a network.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    /// Network id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// EVM chain id.
    pub chain_id: u64,
    /// Explorer URL.
    pub explorer_url: String,
}

impl NetworkConfig {
    /// Explorer link for a transaction hash.
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }

    /// Public view without the RPC endpoint.
    pub fn info(&self) -> NetworkInfo {
        NetworkInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            chain_id: self.chain_id,
            explorer_url: self.explorer_url.clone(),
        }
    }

    /// Human route label, e.g. `ETH->0.05%->USDC->0.3%->ETH`.
    pub fn route_label(&self, fee_in: u32, fee_out: u32) -> String {
        format!(
            "{native}->{}->{quote}->{}->{native}",
            fee_label(fee_in),
            fee_label(fee_out),
            native = self.native_symbol,
            quote = self.quote_symbol,
        )
    }
}

/// Format a fee tier (hundredths of a bip) as a percentage.
pub fn fee_label(fee: u32) -> String {
    let pct = rust_decimal::Decimal::new(i64::from(fee), 4);
    format!("{}%", pct.normalize())
}

/// Built-in preset for a known network id.
pub fn preset(id: &str) -> Option<NetworkConfig> {
    let fee_tiers = vec![100, 500, 3000];
    let network = match id {
        "base" => NetworkConfig {
            id: "base".to_string(),
            name: "Base".to_string(),
            chain_id: 8453,
            rpc_url: "https://mainnet.base.org".to_string(),
            explorer_url: "https://basescan.org".to_string(),
            native_symbol: "ETH".to_string(),
            wrapped_native: address!("4200000000000000000000000000000000000006"),
            quote_token: address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            quote_symbol: "USDC".to_string(),
            quote_decimals: 6,
            router: address!("2626664c2603336E57B271c5C0b26F421741e481"),
            quoter: address!("3d4e44Eb1374240CE5F1B871ab261CD16335B76a"),
            fee_tiers,
        },
        "arbitrum" => NetworkConfig {
            id: "arbitrum".to_string(),
            name: "Arbitrum".to_string(),
            chain_id: 42161,
            rpc_url: "https://arb1.arbitrum.io/rpc".to_string(),
            explorer_url: "https://arbiscan.io".to_string(),
            native_symbol: "ETH".to_string(),
            wrapped_native: address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1"),
            quote_token: address!("af88d065e77c8cC2239327C5EDb3A432268e5831"),
            quote_symbol: "USDC".to_string(),
            quote_decimals: 6,
            router: address!("68b3465833fb72A70ecDF485E0e4C7bD8665Fc45"),
            quoter: address!("61fFE014bA17989E743c5F6cB21bF9697530B21e"),
            fee_tiers,
        },
        "optimism" => NetworkConfig {
            id: "optimism".to_string(),
            name: "Optimism".to_string(),
            chain_id: 10,
            rpc_url: "https://mainnet.optimism.io".to_string(),
            explorer_url: "https://optimistic.etherscan.io".to_string(),
            native_symbol: "ETH".to_string(),
            wrapped_native: address!("4200000000000000000000000000000000000006"),
            quote_token: address!("0b2C639c533813f4Aa9D7837CAf62653d097Ff85"),
            quote_symbol: "USDC".to_string(),
            quote_decimals: 6,
            router: address!("68b3465833fb72A70ecDF485E0e4C7bD8665Fc45"),
            quoter: address!("61fFE014bA17989E743c5F6cB21bF9697530B21e"),
            fee_tiers,
        },
        _ => return None,
    };
    Some(network)
}

/// Resolve the configured networks, applying `<ID>_*` environment overrides.
pub fn load_networks(ids: &[String], fee_tiers: &[u32]) -> Result<Vec<NetworkConfig>, BotError> {
    ids.iter()
        .map(|id| {
            let id = id.trim().to_lowercase();
            let mut network = preset(&id)
                .ok_or_else(|| BotError::InvalidConfig(format!("unknown network: {id}")))?;
            network.fee_tiers = fee_tiers.to_vec();
            apply_overrides(&mut network, |key| std::env::var(key).ok())?;
            Ok(network)
        })
        .collect()
}

fn apply_overrides(
    network: &mut NetworkConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), BotError> {
    let prefix = network.id.to_uppercase();
    let read = |suffix: &str| lookup(&format!("{prefix}_{suffix}"));
    let parse = |suffix: &str, value: String| {
        Address::from_str(value.trim()).map_err(|e| {
            BotError::InvalidConfig(format!("{prefix}_{suffix} is not an address: {e}"))
        })
    };

    if let Some(url) = read("RPC_URL") {
        network.rpc_url = url;
    }
    if let Some(value) = read("ROUTER") {
        network.router = parse("ROUTER", value)?;
    }
    if let Some(value) = read("QUOTER") {
        network.quoter = parse("QUOTER", value)?;
    }
    if let Some(value) = read("WRAPPED_NATIVE") {
        network.wrapped_native = parse("WRAPPED_NATIVE", value)?;
    }
    if let Some(value) = read("QUOTE_TOKEN") {
        network.quote_token = parse("QUOTE_TOKEN", value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn presets_exist_for_default_networks() {
        for id in ["base", "arbitrum", "optimism"] {
            let network = preset(id).unwrap();
            assert_eq!(network.id, id);
            assert_eq!(network.quote_decimals, 6);
        }
        assert!(preset("solana").is_none());
    }

    #[test]
    fn route_label_formats_fees() {
        let network = preset("base").unwrap();
        assert_eq!(network.route_label(500, 3000), "ETH->0.05%->USDC->0.3%->ETH");
        assert_eq!(network.route_label(100, 10000), "ETH->0.01%->USDC->1%->ETH");
    }

    #[test]
    fn overrides_replace_rpc_and_addresses() {
        let mut network = preset("base").unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("BASE_RPC_URL", "http://localhost:8545"),
            ("BASE_ROUTER", "0x1111111111111111111111111111111111111111"),
        ]);

        apply_overrides(&mut network, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(network.rpc_url, "http://localhost:8545");
        assert_eq!(network.router, Address::repeat_byte(0x11));
    }

    #[test]
    fn overrides_reject_bad_address() {
        let mut network = preset("base").unwrap();
        let result = apply_overrides(&mut network, |k| {
            (k == "BASE_QUOTER").then(|| "not-an-address".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn tx_url_joins_explorer() {
        let network = preset("arbitrum").unwrap();
        assert_eq!(network.tx_url("0xabc"), "https://arbiscan.io/tx/0xabc");
    }
}
