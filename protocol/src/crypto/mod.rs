//! # Cryptographic Primitives for the Gateway
//!
//! Everything the gateway asks of us cryptographically lives here:
//!
//! - **AES-CBC** with PKCS#7 padding for the `TradeInfo` / `PostData_`
//!   payloads. The key length picks AES-128, -192 or -256.
//! - **SHA-256** for the three keyed integrity codes (`TradeSha`,
//!   `CheckCode`, `CheckValue`).
//!
//! CBC without a MAC is not what anyone would pick today. The gateway picked
//! it, so we implement it exactly and keep the sharp edges (strict padding
//! checks, fixed IV) contained in [`encryption`].
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. The block cipher and the mode come from RustCrypto's `aes` and
//! `cbc` crates; the digest from `sha2`. This module only arranges bytes the
//! way the gateway expects them.

pub mod encryption;
pub mod hash;
pub mod keys;
pub mod signatures;

pub use encryption::{decrypt, encrypt, CipherError};
pub use hash::{sha256, sha256_upper_hex};
pub use keys::MerchantCredentials;
pub use signatures::{check_code, check_value, trade_sha, verify_check_code, CheckCodeFields};
