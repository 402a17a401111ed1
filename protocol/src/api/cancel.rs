//! Authorization cancel (`/API/CreditCard/Cancel`): release the hold on an
//! uncaptured trade. The amount must equal the authorized amount.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::unix_timestamp;
use crate::config::{INDEX_BY_MERCHANT_ORDER_NO, RESPOND_TYPE_JSON, VERSION_CREDIT_CARD_CANCEL};

/// Record sealed into `PostData_`. The result is a
/// [`CreditCardBehaviorResult`](super::CreditCardBehaviorResult).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelAuthorizationRequest {
    #[serde(rename = "RespondType")]
    pub respond_type: &'static str,
    #[serde(rename = "Version")]
    pub version: &'static str,
    #[serde(rename = "Amt")]
    pub amount: u64,
    #[serde(rename = "MerchantOrderNo")]
    pub merchant_order_no: String,
    #[serde(rename = "TradeNo", skip_serializing_if = "Option::is_none")]
    pub trade_no: Option<String>,
    #[serde(rename = "IndexType")]
    pub index_type: u8,
    #[serde(rename = "TimeStamp")]
    pub timestamp: String,
}

impl CancelAuthorizationRequest {
    pub fn new(merchant_order_no: impl Into<String>, amount: u64, requested_at: DateTime<Utc>) -> Self {
        Self {
            respond_type: RESPOND_TYPE_JSON,
            version: VERSION_CREDIT_CARD_CANCEL,
            amount,
            merchant_order_no: merchant_order_no.into(),
            trade_no: None,
            index_type: INDEX_BY_MERCHANT_ORDER_NO,
            timestamp: unix_timestamp(requested_at),
        }
    }
}
