//! Trade query (`/API/QueryTradeInfo`).
//!
//! The only endpoint that isn't an envelope: the request is a plain form,
//! authenticated by a `CheckValue` digest instead of encryption. Its result
//! is the [`TradeSnapshot`] the settlement engine decides on.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{unix_timestamp, CheckCoded};
use crate::config::{RESPOND_TYPE_JSON, VERSION_QUERY_TRADE_INFO};
use crate::crypto::keys::MerchantCredentials;
use crate::crypto::signatures::{check_value, CheckCodeFields};
use crate::error::{GatewayError, Result};
use crate::transport::FormData;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A query for one trade, addressed by merchant order number and amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTradeInfoRequest {
    pub merchant_order_no: String,
    pub amount: u64,
    /// `Composite` for composite-merchant trades. Left out when `None`.
    pub gateway: Option<String>,
    pub requested_at: DateTime<Utc>,
}

impl QueryTradeInfoRequest {
    pub fn new(merchant_order_no: impl Into<String>, amount: u64, requested_at: DateTime<Utc>) -> Self {
        Self {
            merchant_order_no: merchant_order_no.into(),
            amount,
            gateway: None,
            requested_at,
        }
    }

    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = Some(gateway.into());
        self
    }

    /// The plain form, `CheckValue` included.
    pub fn to_form(&self, credentials: &MerchantCredentials) -> FormData {
        let mut form = FormData::new()
            .with("MerchantID", credentials.merchant_id())
            .with("Version", VERSION_QUERY_TRADE_INFO)
            .with("RespondType", RESPOND_TYPE_JSON)
            .with(
                "CheckValue",
                check_value(self.amount, &self.merchant_order_no, credentials),
            )
            .with("TimeStamp", unix_timestamp(self.requested_at))
            .with("MerchantOrderNo", self.merchant_order_no.as_str())
            .with("Amt", self.amount.to_string());
        if let Some(gateway) = &self.gateway {
            form.push("Gateway", gateway.as_str());
        }
        form
    }
}

// ---------------------------------------------------------------------------
// CloseStatus
// ---------------------------------------------------------------------------

/// Capture state of an authorization, as reported in `CloseStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseStatus {
    /// `0`: authorized, nothing captured yet.
    Uncaptured,
    /// `1`: a capture was requested but hasn't been sent to the bank.
    CapturePending,
    /// `2`: the capture is with the bank.
    CaptureProcessing,
    /// `3`: captured.
    Captured,
}

impl CloseStatus {
    pub fn code(self) -> &'static str {
        match self {
            Self::Uncaptured => "0",
            Self::CapturePending => "1",
            Self::CaptureProcessing => "2",
            Self::Captured => "3",
        }
    }
}

impl FromStr for CloseStatus {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "0" => Ok(Self::Uncaptured),
            "1" => Ok(Self::CapturePending),
            "2" => Ok(Self::CaptureProcessing),
            "3" => Ok(Self::Captured),
            other => Err(GatewayError::InvalidCloseStatus(other.to_string())),
        }
    }
}

impl fmt::Display for CloseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uncaptured => "uncaptured",
            Self::CapturePending => "capture-pending",
            Self::CaptureProcessing => "capture-processing",
            Self::Captured => "captured",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// TradeSnapshot
// ---------------------------------------------------------------------------

/// A point-in-time read of one trade. Never cache it: the next mutating
/// call may already find the trade in a different state.
///
/// Only `Amt` is numeric on the wire; the gateway sends everything else as
/// strings, including `CloseAmt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeSnapshot {
    #[serde(rename = "MerchantID")]
    pub merchant_id: String,
    /// Authorized amount.
    #[serde(rename = "Amt")]
    pub amount: u64,
    #[serde(rename = "TradeNo")]
    pub trade_no: String,
    #[serde(rename = "MerchantOrderNo")]
    pub merchant_order_no: String,
    #[serde(rename = "TradeStatus")]
    pub trade_status: String,
    #[serde(rename = "PaymentType")]
    pub payment_type: String,
    #[serde(rename = "CreateTime")]
    pub create_time: String,
    #[serde(rename = "PayTime")]
    pub pay_time: String,
    #[serde(rename = "CheckCode")]
    pub check_code: String,
    #[serde(rename = "FundTime")]
    pub fund_time: String,
    #[serde(rename = "ShopMerchantID")]
    pub shop_merchant_id: String,
    #[serde(rename = "RespondCode")]
    pub respond_code: String,
    #[serde(rename = "Auth")]
    pub auth: String,
    #[serde(rename = "ECI")]
    pub eci: String,
    #[serde(rename = "CloseAmt")]
    pub close_amt: String,
    #[serde(rename = "CloseStatus")]
    pub close_status: String,
    #[serde(rename = "BackBalance")]
    pub back_balance: String,
    #[serde(rename = "BackStatus")]
    pub back_status: String,
    #[serde(rename = "RespondMsg")]
    pub respond_msg: String,
    #[serde(rename = "Inst")]
    pub inst: String,
    #[serde(rename = "InstFirst")]
    pub inst_first: String,
    #[serde(rename = "InstEach")]
    pub inst_each: String,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: String,
    #[serde(rename = "Card6No")]
    pub card6_no: String,
    #[serde(rename = "Card4No")]
    pub card4_no: String,
    #[serde(rename = "AuthBank")]
    pub auth_bank: String,
}

impl TradeSnapshot {
    /// Parse `CloseStatus`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::InvalidCloseStatus`] for anything but `0`..=`3`.
    pub fn close_status(&self) -> Result<CloseStatus> {
        self.close_status.parse()
    }

    /// Captured amount. An empty `CloseAmt` means nothing was captured.
    pub fn close_amount(&self) -> Result<u64> {
        parse_amount("CloseAmt", &self.close_amt)
    }

    /// Refundable balance. Empty means none.
    pub fn back_balance(&self) -> Result<u64> {
        parse_amount("BackBalance", &self.back_balance)
    }
}

fn parse_amount(field: &'static str, raw: &str) -> Result<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse().map_err(|_| GatewayError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

impl CheckCoded for TradeSnapshot {
    fn check_code_fields(&self) -> CheckCodeFields<'_> {
        CheckCodeFields {
            amount: self.amount,
            merchant_id: &self.merchant_id,
            merchant_order_no: &self.merchant_order_no,
            trade_no: &self.trade_no,
        }
    }

    fn received_check_code(&self) -> Option<&str> {
        Some(self.check_code.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::sha256_upper_hex;
    use chrono::TimeZone;

    fn creds() -> MerchantCredentials {
        MerchantCredentials::new(
            "MS12345678",
            "abcdefghijklmnopqrstuvwxyz123456",
            "1234567890abcdef",
        )
        .unwrap()
    }

    #[test]
    fn query_form_fields() {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let form = QueryTradeInfoRequest::new("ORDER-1", 1000, at).to_form(&creds());

        assert_eq!(form.get("MerchantID"), Some("MS12345678"));
        assert_eq!(form.get("Version"), Some("1.3"));
        assert_eq!(form.get("RespondType"), Some("JSON"));
        assert_eq!(form.get("TimeStamp"), Some("1700000000"));
        assert_eq!(form.get("MerchantOrderNo"), Some("ORDER-1"));
        assert_eq!(form.get("Amt"), Some("1000"));
        assert_eq!(form.get("Gateway"), None);

        let expected = sha256_upper_hex(
            b"IV=1234567890abcdef&Amt=1000&MerchantID=MS12345678\
              &MerchantOrderNo=ORDER-1&Key=abcdefghijklmnopqrstuvwxyz123456",
        );
        assert_eq!(form.get("CheckValue"), Some(expected.as_str()));
    }

    #[test]
    fn gateway_field_only_when_set() {
        let at = Utc.timestamp_opt(0, 0).unwrap();
        let form = QueryTradeInfoRequest::new("ORDER-1", 1, at)
            .with_gateway("Composite")
            .to_form(&creds());
        assert_eq!(form.get("Gateway"), Some("Composite"));
    }

    #[test]
    fn close_status_parsing() {
        assert_eq!("0".parse::<CloseStatus>().unwrap(), CloseStatus::Uncaptured);
        assert_eq!("1".parse::<CloseStatus>().unwrap(), CloseStatus::CapturePending);
        assert_eq!("2".parse::<CloseStatus>().unwrap(), CloseStatus::CaptureProcessing);
        assert_eq!("3".parse::<CloseStatus>().unwrap(), CloseStatus::Captured);

        for bad in ["9", "", "01", "captured"] {
            assert!(matches!(
                bad.parse::<CloseStatus>(),
                Err(GatewayError::InvalidCloseStatus(_))
            ));
        }
        assert_eq!(CloseStatus::CapturePending.code(), "1");
    }

    #[test]
    fn snapshot_from_gateway_json() {
        let snapshot: TradeSnapshot = serde_json::from_str(
            r#"{
                "MerchantID": "MS12345678",
                "Amt": 1000,
                "TradeNo": "24010112345678",
                "MerchantOrderNo": "ORDER-1",
                "TradeStatus": "1",
                "PaymentType": "CREDIT",
                "CloseAmt": "1000",
                "CloseStatus": "3",
                "BackBalance": "1000",
                "Card6No": "400022",
                "Card4No": "1111"
            }"#,
        )
        .unwrap();

        assert_eq!(snapshot.amount, 1000);
        assert_eq!(snapshot.close_status().unwrap(), CloseStatus::Captured);
        assert_eq!(snapshot.close_amount().unwrap(), 1000);
        assert_eq!(snapshot.back_balance().unwrap(), 1000);
        assert_eq!(snapshot.pay_time, "");
    }

    #[test]
    fn amount_fields() {
        let mut snapshot = TradeSnapshot::default();
        assert_eq!(snapshot.close_amount().unwrap(), 0);

        snapshot.close_amt = "abc".into();
        assert!(matches!(
            snapshot.close_amount(),
            Err(GatewayError::InvalidField { field: "CloseAmt", .. })
        ));
    }
}
