//! # Merchant Credentials
//!
//! A merchant talks to the gateway with three values: its `MerchantID`, a
//! `HashKey` and a `HashIV`. The key and IV double as the AES key/IV and as
//! the secret half of every SHA-256 signature, so they get the same care a
//! private key would.
//!
//! ## Security considerations
//!
//! - Key material is validated once, at construction. After that the
//!   credentials are immutable and only ever borrowed.
//! - `Debug` prints the merchant ID and nothing else. If you add logging that
//!   prints `hash_key()` or `hash_iv()`, you will be asked to leave.
//! - No `Serialize`. Credentials come from the caller's secret store and go
//!   back there; they don't travel through JSON.

use std::fmt;

use super::encryption::{validate_key_material, CipherError};

/// The `(identifier, key, iv)` triple issued by the gateway to one merchant.
#[derive(Clone, PartialEq, Eq)]
pub struct MerchantCredentials {
    merchant_id: String,
    hash_key: String,
    hash_iv: String,
}

impl MerchantCredentials {
    /// Build credentials, rejecting key/IV lengths the cipher can't use.
    ///
    /// # Errors
    ///
    /// [`CipherError::InvalidKeyMaterial`] if the key isn't 16, 24 or 32
    /// bytes or the IV isn't exactly one block.
    pub fn new(
        merchant_id: impl Into<String>,
        hash_key: impl Into<String>,
        hash_iv: impl Into<String>,
    ) -> Result<Self, CipherError> {
        let hash_key = hash_key.into();
        let hash_iv = hash_iv.into();
        validate_key_material(hash_key.as_bytes(), hash_iv.as_bytes())?;

        Ok(Self {
            merchant_id: merchant_id.into(),
            hash_key,
            hash_iv,
        })
    }

    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }

    pub fn hash_iv(&self) -> &str {
        &self.hash_iv
    }

    pub(crate) fn key_bytes(&self) -> &[u8] {
        self.hash_key.as_bytes()
    }

    pub(crate) fn iv_bytes(&self) -> &[u8] {
        self.hash_iv.as_bytes()
    }
}

impl fmt::Debug for MerchantCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Not even a prefix of the key. A partial leak is still a leak.
        write!(f, "MerchantCredentials(merchant_id={}, key=<redacted>)", self.merchant_id)
    }
}
