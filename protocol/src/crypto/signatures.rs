//! # Keyed Integrity Codes
//!
//! The gateway uses three SHA-256 constructions, all keyed by sandwiching the
//! data between the merchant's `HashKey` and `HashIV`, all rendered as
//! uppercase hex:
//!
//! | Name | Direction | Preimage |
//! |------|-----------|----------|
//! | `TradeSha` | outbound | `HashKey={key}&{ciphertext}&HashIV={iv}` |
//! | `CheckCode` | inbound | `HashIV={iv}&{canonical(Amt, MerchantID, MerchantOrderNo, TradeNo)}&HashKey={key}` |
//! | `CheckValue` | outbound (query) | `IV={iv}&Amt={amt}&MerchantID={id}&MerchantOrderNo={no}&Key={key}` |
//!
//! Note the key/IV order flips between `TradeSha` and `CheckCode`, and that
//! `CheckValue` uses a fixed literal field order instead of the canonical
//! encoder. All three are exactly what the gateway documents, quirks
//! included.

use serde::Serialize;
use tracing::warn;

use super::hash::sha256_upper_hex;
use super::keys::MerchantCredentials;
use crate::codec::canonical::{encode, EncodeError};
use crate::error::{GatewayError, Result};

/// Digest over the encrypted payload, proving we hold the key pair.
///
/// Sent alongside MPG forms as `TradeSha`.
pub fn trade_sha(ciphertext_hex: &str, credentials: &MerchantCredentials) -> String {
    let preimage = format!(
        "HashKey={}&{}&HashIV={}",
        credentials.hash_key(),
        ciphertext_hex,
        credentials.hash_iv()
    );
    sha256_upper_hex(preimage.as_bytes())
}

/// The four authoritative fields a result's `CheckCode` covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckCodeFields<'a> {
    #[serde(rename = "Amt")]
    pub amount: u64,
    #[serde(rename = "MerchantID")]
    pub merchant_id: &'a str,
    #[serde(rename = "MerchantOrderNo")]
    pub merchant_order_no: &'a str,
    #[serde(rename = "TradeNo")]
    pub trade_no: &'a str,
}

/// Recompute the `CheckCode` the gateway should have attached to a result.
pub fn check_code(
    fields: &CheckCodeFields<'_>,
    credentials: &MerchantCredentials,
) -> std::result::Result<String, EncodeError> {
    let query = check_code_query(fields)?;
    let preimage = format!(
        "HashIV={}&{}&HashKey={}",
        credentials.hash_iv(),
        query,
        credentials.hash_key()
    );
    Ok(sha256_upper_hex(preimage.as_bytes()))
}

/// Compare a gateway-supplied `CheckCode` against the locally computed one.
///
/// # Errors
///
/// [`GatewayError::ChecksumMismatch`] when they differ.
pub fn verify_check_code(
    fields: &CheckCodeFields<'_>,
    received: &str,
    credentials: &MerchantCredentials,
) -> Result<()> {
    let expected = check_code(fields, credentials)?;
    if expected != received.trim() {
        warn!(
            merchant_order_no = fields.merchant_order_no,
            trade_no = fields.trade_no,
            "check code mismatch"
        );
        return Err(GatewayError::ChecksumMismatch {
            merchant_order_no: fields.merchant_order_no.to_string(),
        });
    }
    Ok(())
}

/// `CheckValue` for the trade query endpoint.
pub fn check_value(
    amount: u64,
    merchant_order_no: &str,
    credentials: &MerchantCredentials,
) -> String {
    // Literal order, not sorted. The values are raw, not urlencoded: the
    // gateway hashes exactly this string.
    let preimage = format!(
        "IV={}&Amt={}&MerchantID={}&MerchantOrderNo={}&Key={}",
        credentials.hash_iv(),
        amount,
        credentials.merchant_id(),
        merchant_order_no,
        credentials.hash_key()
    );
    sha256_upper_hex(preimage.as_bytes())
}

/// The urlencoded form of the check-code preimage's middle section. Exposed
/// for diagnostics: comparing it against the gateway's documentation is the
/// fastest way to debug a mismatch.
pub fn check_code_query(fields: &CheckCodeFields<'_>) -> std::result::Result<String, EncodeError> {
    encode(fields)
}
