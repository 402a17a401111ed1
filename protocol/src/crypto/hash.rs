//! # Hashing Utilities
//!
//! SHA-256 is the only digest the gateway speaks, and it always wants the
//! result as uppercase hex. This module keeps the raw digest and the
//! rendered form side by side so nobody has to remember which one a given
//! field expects.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use newebpay_protocol::crypto::sha256;
///
/// let hash = sha256(b"newebpay");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 rendered as uppercase hex: the gateway's format for `TradeSha`,
/// `CheckValue` and `CheckCode`.
pub fn sha256_upper_hex(data: &[u8]) -> String {
    hex::encode_upper(sha256(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string. Everyone should have this memorized.
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(sha256(b"").as_slice(), expected.as_slice());
    }

    #[test]
    fn upper_hex_rendering() {
        let rendered = sha256_upper_hex(b"");
        assert_eq!(
            rendered,
            "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
        );
        assert_eq!(rendered.len(), 64);
    }

    #[test]
    fn sha256_deterministic() {
        assert_eq!(sha256(b"newebpay"), sha256(b"newebpay"));
        assert_ne!(sha256(b"newebpay"), sha256(b"Newebpay"));
    }
}
