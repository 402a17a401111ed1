//! # AES-CBC Envelope Cipher
//!
//! The gateway encrypts every mutating request with AES in cipher-block-
//! chaining mode, keyed by the merchant's `HashKey` and `HashIV`. The key
//! length picks the variant (16 → AES-128, 24 → AES-192, 32 → AES-256) and
//! the IV is always one block.
//!
//! ## Padding
//!
//! PKCS#7: every pad byte holds the number of pad bytes. A plaintext that is
//! already block-aligned gets a whole extra block, otherwise the receiver
//! could not tell padding from data.
//!
//! Unpadding is strict. The last byte `p` must be in `1..=BLOCK_SIZE`, must
//! not exceed the buffer, and the last `p` bytes must all equal `p`. CBC has
//! no authentication tag, so the padding check is the only structural sanity
//! check we get on inbound ciphertext. We don't get to be lenient about it.
//!
//! ## Wire format
//!
//! Ciphertext travels as lowercase hex. Decoding accepts either case.

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use thiserror::Error;

use crate::config::{BLOCK_SIZE, SUPPORTED_KEY_LENGTHS};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes192CbcEnc = cbc::Encryptor<Aes192>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes192CbcDec = cbc::Decryptor<Aes192>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Errors from the envelope cipher.
///
/// None of these carry key bytes or plaintext. Lengths are fine to report;
/// contents are not.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    #[error("invalid key material: key is {key_len} bytes (expected 16, 24 or 32), iv is {iv_len} bytes (expected 16)")]
    InvalidKeyMaterial { key_len: usize, iv_len: usize },

    #[error("ciphertext is not valid hex")]
    InvalidEncoding,

    #[error("ciphertext length {len} is not a multiple of the 16-byte block size")]
    InvalidBlockAlignment { len: usize },

    #[error("invalid padding")]
    InvalidPadding,
}

/// Reject key/IV pairs the cipher can't use, before touching any data.
pub fn validate_key_material(key: &[u8], iv: &[u8]) -> Result<(), CipherError> {
    if !SUPPORTED_KEY_LENGTHS.contains(&key.len()) || iv.len() != BLOCK_SIZE {
        return Err(CipherError::InvalidKeyMaterial {
            key_len: key.len(),
            iv_len: iv.len(),
        });
    }
    Ok(())
}

/// Encrypt `plaintext` and return the ciphertext as lowercase hex.
///
/// # Example
///
/// ```
/// use newebpay_protocol::crypto::encryption::{decrypt, encrypt};
///
/// let key = b"0123456789abcdef0123456789abcdef";
/// let iv = b"fedcba9876543210";
///
/// let sealed = encrypt(b"Amt=100&MerchantOrderNo=A1", key, iv).unwrap();
/// assert_eq!(sealed.len() % 32, 0); // hex of whole 16-byte blocks
/// assert_eq!(decrypt(&sealed, key, iv).unwrap(), b"Amt=100&MerchantOrderNo=A1");
/// ```
pub fn encrypt(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<String, CipherError> {
    Ok(hex::encode(encrypt_bytes(plaintext, key, iv)?))
}

/// Encrypt into raw ciphertext bytes (PKCS#7 padded).
pub fn encrypt_bytes(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CipherError> {
    validate_key_material(key, iv)?;

    match key.len() {
        16 => seal::<Aes128CbcEnc>(plaintext, key, iv),
        24 => seal::<Aes192CbcEnc>(plaintext, key, iv),
        _ => seal::<Aes256CbcEnc>(plaintext, key, iv),
    }
}

/// Decrypt a hex ciphertext produced by [`encrypt`] (or by the gateway).
///
/// # Errors
///
/// - [`CipherError::InvalidKeyMaterial`]: checked first.
/// - [`CipherError::InvalidEncoding`]: not hex.
/// - [`CipherError::InvalidBlockAlignment`]: not whole blocks.
/// - [`CipherError::InvalidPadding`]: wrong key, wrong IV, or tampering.
pub fn decrypt(ciphertext_hex: &str, key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CipherError> {
    validate_key_material(key, iv)?;
    let ciphertext = hex::decode(ciphertext_hex.trim()).map_err(|_| CipherError::InvalidEncoding)?;
    decrypt_bytes(&ciphertext, key, iv)
}

/// Decrypt raw ciphertext bytes and strip the padding.
pub fn decrypt_bytes(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CipherError> {
    validate_key_material(key, iv)?;

    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CipherError::InvalidBlockAlignment {
            len: ciphertext.len(),
        });
    }

    let mut padded = match key.len() {
        16 => open::<Aes128CbcDec>(ciphertext, key, iv)?,
        24 => open::<Aes192CbcDec>(ciphertext, key, iv)?,
        _ => open::<Aes256CbcDec>(ciphertext, key, iv)?,
    };

    let len = unpadded_len(&padded)?;
    padded.truncate(len);
    Ok(padded)
}

fn seal<E: KeyIvInit + BlockEncryptMut>(
    plaintext: &[u8],
    key: &[u8],
    iv: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let cipher = E::new_from_slices(key, iv).map_err(|_| CipherError::InvalidKeyMaterial {
        key_len: key.len(),
        iv_len: iv.len(),
    })?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

// Padding is checked by hand afterwards so that every failure maps to the
// same error, whichever rule it broke.
fn open<D: KeyIvInit + BlockDecryptMut>(
    ciphertext: &[u8],
    key: &[u8],
    iv: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let cipher = D::new_from_slices(key, iv).map_err(|_| CipherError::InvalidKeyMaterial {
        key_len: key.len(),
        iv_len: iv.len(),
    })?;
    cipher
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| CipherError::InvalidPadding)
}

/// Length of `data` once its PKCS#7 padding is removed.
pub fn unpadded_len(data: &[u8]) -> Result<usize, CipherError> {
    let Some(&last) = data.last() else {
        return Err(CipherError::InvalidPadding);
    };

    let pad_len = last as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > data.len() {
        return Err(CipherError::InvalidPadding);
    }

    let body_len = data.len() - pad_len;
    if data[body_len..].iter().any(|&b| b != last) {
        return Err(CipherError::InvalidPadding);
    }

    Ok(body_len)
}
