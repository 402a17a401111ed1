//! Capture and refund, plus their cancellations (`/API/CreditCard/Close`).
//!
//! One endpoint, four behaviors, selected by `CloseType` and `Cancel`:
//!
//! | Code | Behavior | `CloseType` | `Cancel` |
//! |------|----------|-------------|----------|
//! | B031 | capture | 1 | 0 |
//! | B032 | refund | 2 | 0 |
//! | B033 | cancel pending capture | 1 | 1 |
//! | B034 | cancel pending refund | 2 | 1 |

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{unix_timestamp, CheckCoded};
use crate::config::{INDEX_BY_MERCHANT_ORDER_NO, RESPOND_TYPE_JSON, VERSION_CREDIT_CARD_CLOSE};
use crate::crypto::signatures::CheckCodeFields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseKind {
    Capture,
    Refund,
    CancelCapture,
    CancelRefund,
}

impl CloseKind {
    /// The gateway's behavior code, handy in logs.
    pub fn code(self) -> &'static str {
        match self {
            Self::Capture => "B031",
            Self::Refund => "B032",
            Self::CancelCapture => "B033",
            Self::CancelRefund => "B034",
        }
    }

    pub fn close_type(self) -> u8 {
        match self {
            Self::Capture | Self::CancelCapture => 1,
            Self::Refund | Self::CancelRefund => 2,
        }
    }

    pub fn cancel(self) -> u8 {
        match self {
            Self::Capture | Self::Refund => 0,
            Self::CancelCapture | Self::CancelRefund => 1,
        }
    }
}

impl fmt::Display for CloseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Capture => "capture",
            Self::Refund => "refund",
            Self::CancelCapture => "cancel-capture",
            Self::CancelRefund => "cancel-refund",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// Record sealed into `PostData_` for the close endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseRequest {
    #[serde(rename = "RespondType")]
    pub respond_type: &'static str,
    #[serde(rename = "Version")]
    pub version: &'static str,
    #[serde(rename = "Amt")]
    pub amount: u64,
    #[serde(rename = "MerchantOrderNo")]
    pub merchant_order_no: String,
    #[serde(rename = "TimeStamp")]
    pub timestamp: String,
    #[serde(rename = "IndexType")]
    pub index_type: u8,
    #[serde(rename = "TradeNo", skip_serializing_if = "Option::is_none")]
    pub trade_no: Option<String>,
    #[serde(rename = "CloseType")]
    pub close_type: u8,
    #[serde(rename = "Cancel")]
    pub cancel: u8,
}

impl CloseRequest {
    pub fn new(
        kind: CloseKind,
        merchant_order_no: impl Into<String>,
        amount: u64,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            respond_type: RESPOND_TYPE_JSON,
            version: VERSION_CREDIT_CARD_CLOSE,
            amount,
            merchant_order_no: merchant_order_no.into(),
            timestamp: unix_timestamp(requested_at),
            index_type: INDEX_BY_MERCHANT_ORDER_NO,
            trade_no: None,
            close_type: kind.close_type(),
            cancel: kind.cancel(),
        }
    }
}

/// Result of every close and cancel operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCardBehaviorResult {
    #[serde(rename = "MerchantID")]
    pub merchant_id: String,
    #[serde(rename = "TradeNo")]
    pub trade_no: String,
    #[serde(rename = "Amt")]
    pub amount: u64,
    #[serde(rename = "MerchantOrderNo")]
    pub merchant_order_no: String,
    #[serde(rename = "CheckCode", default, skip_serializing_if = "Option::is_none")]
    pub check_code: Option<String>,
}

impl CheckCoded for CreditCardBehaviorResult {
    fn check_code_fields(&self) -> CheckCodeFields<'_> {
        CheckCodeFields {
            amount: self.amount,
            merchant_id: &self.merchant_id,
            merchant_order_no: &self.merchant_order_no,
            trade_no: &self.trade_no,
        }
    }

    fn received_check_code(&self) -> Option<&str> {
        self.check_code.as_deref()
    }
}
