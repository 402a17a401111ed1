//! Error types for the gateway client.
//!
//! Every operation that can fail returns a [`GatewayError`]. Lower layers
//! keep their own narrow enums ([`CipherError`], [`EncodeError`],
//! [`TransportError`]) and convert upward through `?`.
//!
//! Two kinds of failure are kept apart on purpose. A [`GatewayError::Transport`]
//! means we don't know what the gateway did. A [`GatewayError::RemoteRejected`]
//! means the gateway answered and said no, which is an ordinary outcome.

use thiserror::Error;

use crate::codec::canonical::EncodeError;
use crate::crypto::encryption::CipherError;
use crate::transport::TransportError;

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Key material, hex, block alignment or padding problem.
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// A request record could not be flattened into a query string.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The request never produced a usable HTTP response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body was not the `{Status, Message, Result}` wrapper.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The `Result` slot didn't have the shape the operation expects.
    #[error("result shape mismatch: {0}")]
    ResultShapeMismatch(String),

    /// A check code recomputed locally disagrees with the one the gateway
    /// sent. Treat it as tampering or corruption.
    #[error("check code mismatch for order {merchant_order_no}")]
    ChecksumMismatch { merchant_order_no: String },

    /// The trade's `CloseStatus` is not one of the four known states.
    #[error("invalid close status: {0:?}")]
    InvalidCloseStatus(String),

    /// The reconciliation target is above what the card holder authorized.
    #[error("target amount {requested} exceeds authorized amount {authorized}")]
    AmountExceedsAuthorization { requested: u64, authorized: u64 },

    /// The gateway answered with a status other than `SUCCESS`.
    #[error("gateway rejected request: {status}: {message}")]
    RemoteRejected { status: String, message: String },

    /// A result field couldn't be parsed (dates, card expiry, amounts).
    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

impl GatewayError {
    /// True when the gateway gave a definite answer, as opposed to a local
    /// or transport failure.
    pub fn is_remote_rejection(&self) -> bool {
        matches!(self, GatewayError::RemoteRejected { .. })
    }
}
