use axum::http::HeaderMap;
use chrono::{ DateTime, Utc };
use ethers::types::{ Address, Signature };
use std::str::FromStr;

use crate::chains::evm::wallet::normalize_address;
use crate::error::{ AppError, Result };

/// Header carrying the caller's connected wallet.
pub const WALLET_HEADER: &str = "x-wallet-address";
/// Personal-sign signature of `sign_in_message` by that wallet.
pub const SIGNATURE_HEADER: &str = "x-wallet-signature";
/// Unix seconds the message was signed at.
pub const TIMESTAMP_HEADER: &str = "x-wallet-timestamp";

/// How far the signed timestamp may drift from the server clock.
pub const SIGNATURE_MAX_AGE_SECS: i64 = 5 * 60;

/// What the wallet signs. `address` is the lower-cased form.
pub fn sign_in_message(address: &str, timestamp: i64) -> String {
    format!("Sign in to yield-bearer\nAddress: {}\nTimestamp: {}", address, timestamp)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// The caller's wallet, proven by a fresh signature. `None` when no wallet
/// header is sent; a wallet header without a valid signature is rejected.
pub fn authenticated_wallet(headers: &HeaderMap, now: DateTime<Utc>) -> Result<Option<String>> {
    let Some(address) = header(headers, WALLET_HEADER) else {
        return Ok(None);
    };
    let address = normalize_address(address)?;

    let signature = header(headers, SIGNATURE_HEADER).ok_or_else(||
        AppError::Unauthorized(format!("Missing {} header", SIGNATURE_HEADER))
    )?;
    let timestamp: i64 = header(headers, TIMESTAMP_HEADER)
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| AppError::Unauthorized(format!("Missing or invalid {} header", TIMESTAMP_HEADER)))?;

    if (now.timestamp() - timestamp).abs() > SIGNATURE_MAX_AGE_SECS {
        return Err(AppError::Unauthorized("Signature expired, sign in again".to_string()));
    }

    let signature = Signature::from_str(signature).map_err(|_|
        AppError::Unauthorized("Malformed wallet signature".to_string())
    )?;
    let expected: Address = address
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("Invalid address: {}", address)))?;

    let message = sign_in_message(&address, timestamp);
    signature.verify(message.as_str(), expected).map_err(|_| {
        tracing::warn!(%address, "Rejected wallet signature");
        AppError::Unauthorized("Wallet signature does not match the address".to_string())
    })?;

    Ok(Some(address))
}
