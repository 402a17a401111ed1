//! Token charge (`/API/CreditCard`): charge a card previously bound through
//! the MPG flow, by its `TokenValue` / `TokenTerm` pair.
//!
//! With `P3D=0` the gateway charges straight away and answers with a
//! [`ChargeResult`]. With `P3D=1` it answers `3dVerify` and the `Result` is
//! an HTML page the card holder must be shown; the outcome then arrives at
//! `NotifyURL` later.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::{unix_timestamp, CheckCoded};
use crate::codec::response::GatewayReply;
use crate::config::{GATEWAY_UTC_OFFSET_SECS, VERSION_CREDIT_CARD};
use crate::crypto::signatures::CheckCodeFields;
use crate::error::{GatewayError, Result};

/// Callback URLs for a 3-D Secure charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreeDSecureUrls {
    pub notify_url: String,
    pub return_url: String,
}

/// What to charge, before it becomes a wire record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCharge {
    pub merchant_order_no: String,
    pub amount: u64,
    pub prod_desc: String,
    pub payer_email: String,
    pub token_value: String,
    pub token_term: String,
    /// `Some` asks for a 3-D Secure challenge.
    pub three_d_secure: Option<ThreeDSecureUrls>,
}

impl TokenCharge {
    pub fn to_request(&self, requested_at: DateTime<Utc>) -> ChargeRequest {
        let (p3d, notify_url, return_url) = match &self.three_d_secure {
            Some(urls) => ("1", urls.notify_url.clone(), urls.return_url.clone()),
            None => ("0", String::new(), String::new()),
        };

        ChargeRequest {
            timestamp: unix_timestamp(requested_at),
            version: VERSION_CREDIT_CARD,
            p3d,
            use_for: 0,
            notify_url,
            return_url,
            merchant_order_no: self.merchant_order_no.clone(),
            amount: self.amount,
            prod_desc: self.prod_desc.clone(),
            payer_email: self.payer_email.clone(),
            inst: "0",
            token_value: self.token_value.clone(),
            token_term: self.token_term.clone(),
            token_switch: "on",
        }
    }
}

/// Record sealed into `PostData_`. The URL fields are sent even when empty;
/// the gateway expects them present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeRequest {
    #[serde(rename = "TimeStamp")]
    pub timestamp: String,
    #[serde(rename = "Version")]
    pub version: &'static str,
    #[serde(rename = "P3D")]
    pub p3d: &'static str,
    /// 0 = web, 1 = app, 2 = periodic.
    #[serde(rename = "UseFor")]
    pub use_for: u8,
    #[serde(rename = "NotifyURL")]
    pub notify_url: String,
    #[serde(rename = "ReturnURL")]
    pub return_url: String,
    #[serde(rename = "MerchantOrderNo")]
    pub merchant_order_no: String,
    #[serde(rename = "Amt")]
    pub amount: u64,
    #[serde(rename = "ProdDesc")]
    pub prod_desc: String,
    #[serde(rename = "PayerEmail")]
    pub payer_email: String,
    #[serde(rename = "Inst")]
    pub inst: &'static str,
    #[serde(rename = "TokenValue")]
    pub token_value: String,
    #[serde(rename = "TokenTerm")]
    pub token_term: String,
    #[serde(rename = "TokenSwitch")]
    pub token_switch: &'static str,
}

/// Result of a charge that completed without 3-D Secure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargeResult {
    #[serde(rename = "MerchantID")]
    pub merchant_id: String,
    #[serde(rename = "Amt")]
    pub amount: u64,
    #[serde(rename = "TradeNo")]
    pub trade_no: String,
    #[serde(rename = "MerchantOrderNo")]
    pub merchant_order_no: String,
    #[serde(rename = "RespondCode")]
    pub respond_code: String,
    #[serde(rename = "AuthBank")]
    pub auth_bank: String,
    #[serde(rename = "Auth")]
    pub auth: String,
    /// `YYYYMMDD`, Taipei time.
    #[serde(rename = "AuthDate")]
    pub auth_date: String,
    /// `HHMMSS`, Taipei time.
    #[serde(rename = "AuthTime")]
    pub auth_time: String,
    #[serde(rename = "Card6No")]
    pub card6_no: String,
    #[serde(rename = "Card4No")]
    pub card4_no: String,
    #[serde(rename = "Exp")]
    pub exp: String,
    #[serde(rename = "Inst")]
    pub inst: u32,
    #[serde(rename = "InstFirst")]
    pub inst_first: u64,
    #[serde(rename = "InstEach")]
    pub inst_each: u64,
    #[serde(rename = "ECI")]
    pub eci: String,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: String,
    #[serde(rename = "IP", skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(rename = "EscrowBank")]
    pub escrow_bank: String,
    #[serde(rename = "CheckCode")]
    pub check_code: String,
    #[serde(rename = "TokenLife")]
    pub token_life: String,
    #[serde(rename = "TokenUseStatus")]
    pub token_use_status: u8,
}

impl ChargeResult {
    /// `AuthDate` + `AuthTime` as a UTC instant.
    pub fn transacted_at(&self) -> Result<DateTime<Utc>> {
        let raw = format!("{}{}", self.auth_date, self.auth_time);
        parse_gateway_local(&raw, "%Y%m%d%H%M%S").ok_or(GatewayError::InvalidField {
            field: "AuthDate/AuthTime",
            value: raw,
        })
    }
}

/// Interpret a Taipei wall-clock string in `format` as a UTC instant.
pub(crate) fn parse_gateway_local(raw: &str, format: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, format).ok()?;
    let offset = FixedOffset::east_opt(GATEWAY_UTC_OFFSET_SECS)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
}

impl CheckCoded for ChargeResult {
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

/// The 3-D Secure interstitial. Serve `html` to the card holder as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreeDSecureChallenge {
    pub html: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChargeOutcome {
    /// The gateway answered with a final status (success or not).
    Completed(GatewayReply<ChargeResult>),
    /// The card holder has to go through 3-D Secure first.
    Challenge(ThreeDSecureChallenge),
}
