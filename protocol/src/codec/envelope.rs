//! # Request Envelope
//!
//! Sealing a request is always the same three steps: canonicalize the
//! record, encrypt the query string, sign the ciphertext. What differs per
//! endpoint is only the outer form the envelope is poured into.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::canonical;
use crate::config::{FIELD_MERCHANT_ID, FIELD_POS, FIELD_POST_DATA, RESPOND_TYPE_JSON};
use crate::crypto::encryption::{decrypt, encrypt};
use crate::crypto::keys::MerchantCredentials;
use crate::crypto::signatures::trade_sha;
use crate::error::{GatewayError, Result};
use crate::transport::FormData;

/// The encrypted-and-signed wire form of one request record.
///
/// Built once per outbound call. There's no way to change the ciphertext
/// after sealing; seal a new record instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    ciphertext_hex: String,
    signature: String,
}

impl Envelope {
    /// Canonicalize, encrypt and sign `record`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Encode`] if the record isn't flat, or
    /// [`GatewayError::Cipher`] for unusable key material.
    pub fn seal<T: Serialize + ?Sized>(record: &T, credentials: &MerchantCredentials) -> Result<Self> {
        let query = canonical::encode(record)?;
        let ciphertext_hex = encrypt(query.as_bytes(), credentials.key_bytes(), credentials.iv_bytes())?;
        let signature = trade_sha(&ciphertext_hex, credentials);

        debug!(
            merchant_id = credentials.merchant_id(),
            ciphertext_len = ciphertext_hex.len(),
            "sealed envelope"
        );

        Ok(Self {
            ciphertext_hex,
            signature,
        })
    }

    pub fn ciphertext_hex(&self) -> &str {
        &self.ciphertext_hex
    }

    /// `TradeSha` over the ciphertext.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The `{MerchantID_, PostData_}` form every API endpoint takes.
    pub fn into_post_form(self, merchant_id: &str) -> FormData {
        FormData::new()
            .with(FIELD_MERCHANT_ID, merchant_id)
            .with(FIELD_POST_DATA, self.ciphertext_hex)
    }

    /// Same as [`Envelope::into_post_form`] plus `Pos_=JSON`, which the
    /// charge endpoint needs to answer in JSON rather than a redirect.
    pub fn into_post_form_json(self, merchant_id: &str) -> FormData {
        self.into_post_form(merchant_id).with(FIELD_POS, RESPOND_TYPE_JSON)
    }
}

/// Decrypt a hex payload and return the plaintext as UTF-8.
///
/// # Errors
///
/// Cipher errors propagate as-is. Non-UTF-8 plaintext is a
/// [`GatewayError::MalformedResponse`].
pub fn open_text(ciphertext_hex: &str, credentials: &MerchantCredentials) -> Result<String> {
    let plaintext = decrypt(ciphertext_hex, credentials.key_bytes(), credentials.iv_bytes())?;
    String::from_utf8(plaintext)
        .map_err(|_| GatewayError::MalformedResponse("decrypted payload is not UTF-8".into()))
}

/// Decrypt a hex payload whose plaintext is JSON and decode it into `T`.
///
/// This is how MPG notifications (`TradeInfo`) come back.
pub fn open_json<T: DeserializeOwned>(ciphertext_hex: &str, credentials: &MerchantCredentials) -> Result<T> {
    let text = open_text(ciphertext_hex, credentials)?;
    serde_json::from_str(&text).map_err(|e| GatewayError::ResultShapeMismatch(e.to_string()))
}

/// Decrypt a payload whose plaintext is a canonical query string, back into
/// its `(key, value)` pairs. Used to inspect what was sent.
pub fn open_query(ciphertext_hex: &str, credentials: &MerchantCredentials) -> Result<Vec<(String, String)>> {
    let text = open_text(ciphertext_hex, credentials)?;
    Ok(url::form_urlencoded::parse(text.as_bytes())
        .into_owned()
        .collect())
}
