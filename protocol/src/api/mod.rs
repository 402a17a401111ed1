//! # Operation Schemas
//!
//! One module per gateway endpoint. Each holds the request record that gets
//! canonicalized and sealed, plus the typed result its response projects
//! into. Field names on the wire are the gateway's PascalCase ones; in Rust
//! they're snake_case with a `#[serde(rename)]`.

pub mod cancel;
pub mod charge;
pub mod close;
pub mod mpg;
pub mod query;

use chrono::{DateTime, Utc};

use crate::crypto::keys::MerchantCredentials;
use crate::crypto::signatures::{verify_check_code, CheckCodeFields};
use crate::error::{GatewayError, Result};

pub use cancel::CancelAuthorizationRequest;
pub use charge::{ChargeOutcome, ChargeRequest, ChargeResult, ThreeDSecureChallenge, TokenCharge};
pub use close::{CloseKind, CloseRequest, CreditCardBehaviorResult};
pub use mpg::{BindingRequest, CardBinding, MpgForm, MpgNotification, MpgTradeInfo, MpgTradeResult};
pub use query::{CloseStatus, QueryTradeInfoRequest, TradeSnapshot};

/// A result that carries a gateway `CheckCode` over its authoritative
/// fields.
pub trait CheckCoded {
    fn check_code_fields(&self) -> CheckCodeFields<'_>;

    /// The code the gateway attached, if any.
    fn received_check_code(&self) -> Option<&str>;

    /// Verify the attached code.
    ///
    /// # Errors
    ///
    /// [`GatewayError::ChecksumMismatch`] when the code is missing or wrong.
    fn verify_check_code(&self, credentials: &MerchantCredentials) -> Result<()> {
        let fields = self.check_code_fields();
        match self.received_check_code() {
            Some(code) if !code.is_empty() => verify_check_code(&fields, code, credentials),
            _ => Err(GatewayError::ChecksumMismatch {
                merchant_order_no: fields.merchant_order_no.to_string(),
            }),
        }
    }

    /// Verify only if the gateway sent a code. Some endpoints omit it on
    /// some outcomes, and that's not tampering.
    fn verify_check_code_if_present(&self, credentials: &MerchantCredentials) -> Result<()> {
        match self.received_check_code() {
            Some(code) if !code.is_empty() => self.verify_check_code(credentials),
            _ => Ok(()),
        }
    }
}

/// `TimeStamp` field: Unix seconds, as a decimal string.
pub(crate) fn unix_timestamp(at: DateTime<Utc>) -> String {
    at.timestamp().to_string()
}
