//! Unit conversion, redaction and process helpers.

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use tracing::info;

/// Decimals of every EVM native asset.
pub const NATIVE_DECIMALS: u8 = 18;

/// Convert a minor-unit amount into a display decimal.
///
/// Amounts that do not fit a `Decimal` saturate to `Decimal::MAX`.
pub fn format_units(amount: U256, decimals: u8) -> Decimal {
    let Ok(raw) = u128::try_from(amount) else {
        return Decimal::MAX;
    };
    let Ok(raw) = i128::try_from(raw) else {
        return Decimal::MAX;
    };
    Decimal::try_from_i128_with_scale(raw, u32::from(decimals)).unwrap_or(Decimal::MAX)
}

/// Convert a display decimal into minor units, truncating extra precision.
///
/// Returns `None` for negative values.
pub fn parse_units(value: Decimal, decimals: u8) -> Option<U256> {
    if value.is_sign_negative() {
        return None;
    }
    let mut scaled = value.trunc_with_scale(u32::from(decimals));
    scaled.rescale(u32::from(decimals));
    u128::try_from(scaled.mantissa()).ok().map(U256::from)
}

/// Signed difference `after - before` in display units.
pub fn signed_delta(after: U256, before: U256, decimals: u8) -> Decimal {
    if after >= before {
        format_units(after - before, decimals)
    } else {
        -format_units(before - after, decimals)
    }
}

/// Shorten an address for logs and public endpoints: `0x1234…abcd`.
pub fn redact_address(address: &Address) -> String {
    let full = format!("{address}");
    if full.len() <= 10 {
        return full;
    }
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}

/// Resolve when SIGINT or SIGTERM is received.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
