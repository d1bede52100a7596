//! Operator key handling.
//!
//! This module provides utilities for:
//! - Creating signers from private keys
//! - Deriving the operator wallet address
//! - Checking a configured address against the key

use std::str::FromStr;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use tracing::debug;

use crate::error::BotError;
use crate::utils::redact_address;

/// Create a LocalSigner from a hex-encoded private key.
///
/// The private key can be with or without the "0x" prefix.
pub fn create_signer(private_key: &str) -> Result<PrivateKeySigner, BotError> {
    let key = private_key.strip_prefix("0x").unwrap_or(private_key);
    let bytes = hex::decode(key)
        .map_err(|e| BotError::Signing(format!("Invalid private key hex: {}", e)))?;

    if bytes.len() != 32 {
        return Err(BotError::Signing(format!(
            "Private key must be 32 bytes, got {}",
            bytes.len()
        )));
    }

    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&bytes);

    PrivateKeySigner::from_bytes(&key_bytes.into())
        .map_err(|e| BotError::Signing(format!("Failed to create signer: {}", e)))
}

/// Get the wallet address from a private key.
pub fn address_from_private_key(private_key: &str) -> Result<Address, BotError> {
    Ok(create_signer(private_key)?.address())
}

/// Derive the operator address and check it against `expected`, if given.
pub fn wallet_address(private_key: &str, expected: Option<&str>) -> Result<Address, BotError> {
    let derived = address_from_private_key(private_key)?;

    if let Some(expected) = expected.map(str::trim).filter(|s| !s.is_empty()) {
        let expected = Address::from_str(expected)
            .map_err(|e| BotError::Signing(format!("Invalid WALLET_ADDRESS: {}", e)))?;
        if expected != derived {
            return Err(BotError::Signing(format!(
                "WALLET_ADDRESS {} does not match the private key ({})",
                redact_address(&expected),
                redact_address(&derived)
            )));
        }
    }

    debug!(wallet = %redact_address(&derived), "Wallet address resolved");
    Ok(derived)
}
