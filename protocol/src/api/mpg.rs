//! # MPG Card Binding
//!
//! Binding a card goes through the hosted payment page (MPG) rather than
//! the API: we build an encrypted `TradeInfo`, the caller renders it as an
//! auto-submitting form pointed at `/MPG/mpg_gateway`, and the card holder
//! pays a token amount of 1. The gateway later posts the outcome back as
//! another `TradeInfo` ciphertext, which [`MpgNotification::decrypt`] opens.
//!
//! A successful binding yields the `TokenValue` used for later
//! [token charges](super::charge).

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rand::distributions::{Alphanumeric, DistString};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::charge::parse_gateway_local;
use super::unix_timestamp;
use crate::codec::envelope::{open_json, Envelope};
use crate::config::{
    BINDING_ORDER_PREFIX, MPG_ENCRYPT_TYPE, RESPOND_TYPE_JSON, STATUS_SUCCESS, TOKEN_TERM_LENGTH,
    VERSION_MPG,
};
use crate::crypto::keys::MerchantCredentials;
use crate::error::{GatewayError, Result};
use crate::transport::FormData;

/// Item description shown on the binding page.
pub const BINDING_ITEM_DESC: &str = "綁定信用卡";

/// Explains to the card holder that the 1-unit binding charge is refunded.
pub const BINDING_ORDER_COMMENT: &str = "此為信用卡綁定交易，完成後將會刷退綁定交易的 1 元";

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Everything the caller decides about a binding page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingRequest {
    pub email: String,
    /// Ties the resulting token to the payer. See [`new_token_term`].
    pub token_term: String,
    pub return_url: String,
    pub notify_url: String,
    pub client_back_url: String,
    /// `YYYY-MM-DD`. Defaults to the card's own expiry when absent.
    pub token_life: Option<String>,
}

impl BindingRequest {
    /// Build the `TradeInfo` record. `merchant_order_no` should come from
    /// [`new_binding_order_no`] so the notification is recognisable.
    pub fn to_trade_info(
        &self,
        merchant_id: &str,
        merchant_order_no: impl Into<String>,
        requested_at: DateTime<Utc>,
    ) -> MpgTradeInfo {
        MpgTradeInfo {
            merchant_id: merchant_id.to_string(),
            respond_type: RESPOND_TYPE_JSON,
            timestamp: unix_timestamp(requested_at),
            version: VERSION_MPG,
            lang_type: "zh-tw",
            merchant_order_no: merchant_order_no.into(),
            amount: 1,
            item_desc: BINDING_ITEM_DESC.to_string(),
            return_url: self.return_url.clone(),
            notify_url: self.notify_url.clone(),
            client_back_url: self.client_back_url.clone(),
            email: self.email.clone(),
            email_modify: 0,
            credit_ae_agreement: 0,
            inst_flag: "0",
            order_comment: BINDING_ORDER_COMMENT.to_string(),
            credit_agreement: 1,
            token_term: self.token_term.clone(),
            token_life: self.token_life.clone(),
            use_for: 0,
        }
    }
}

/// The record encrypted into `TradeInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MpgTradeInfo {
    #[serde(rename = "MerchantID")]
    pub merchant_id: String,
    #[serde(rename = "RespondType")]
    pub respond_type: &'static str,
    #[serde(rename = "TimeStamp")]
    pub timestamp: String,
    #[serde(rename = "Version")]
    pub version: &'static str,
    #[serde(rename = "LangType")]
    pub lang_type: &'static str,
    #[serde(rename = "MerchantOrderNo")]
    pub merchant_order_no: String,
    #[serde(rename = "Amt")]
    pub amount: u64,
    #[serde(rename = "ItemDesc")]
    pub item_desc: String,
    #[serde(rename = "ReturnURL")]
    pub return_url: String,
    #[serde(rename = "NotifyURL")]
    pub notify_url: String,
    #[serde(rename = "ClientBackURL")]
    pub client_back_url: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "EmailModify")]
    pub email_modify: u8,
    #[serde(rename = "CREDITAEAGREEMENT")]
    pub credit_ae_agreement: u8,
    #[serde(rename = "InstFlag")]
    pub inst_flag: &'static str,
    #[serde(rename = "OrderComment")]
    pub order_comment: String,
    #[serde(rename = "CREDITAGREEMENT")]
    pub credit_agreement: u8,
    #[serde(rename = "TokenTerm")]
    pub token_term: String,
    #[serde(rename = "TokenLife", skip_serializing_if = "Option::is_none")]
    pub token_life: Option<String>,
    #[serde(rename = "UseFor")]
    pub use_for: u8,
}

/// The redirect form: rendered by the caller, posted by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpgForm {
    #[serde(rename = "MerchantID")]
    pub merchant_id: String,
    #[serde(rename = "TradeInfo")]
    pub trade_info: String,
    #[serde(rename = "TradeSha")]
    pub trade_sha: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "EncryptType")]
    pub encrypt_type: String,
}

impl MpgForm {
    /// Seal `trade_info` and wrap it with its `TradeSha`.
    pub fn seal(trade_info: &MpgTradeInfo, credentials: &MerchantCredentials) -> Result<Self> {
        let envelope = Envelope::seal(trade_info, credentials)?;
        Ok(Self {
            merchant_id: credentials.merchant_id().to_string(),
            trade_info: envelope.ciphertext_hex().to_string(),
            trade_sha: envelope.signature().to_string(),
            version: VERSION_MPG.to_string(),
            encrypt_type: MPG_ENCRYPT_TYPE.to_string(),
        })
    }

    pub fn to_form(&self) -> FormData {
        FormData::new()
            .with("MerchantID", self.merchant_id.as_str())
            .with("TradeInfo", self.trade_info.as_str())
            .with("TradeSha", self.trade_sha.as_str())
            .with("Version", self.version.as_str())
            .with("EncryptType", self.encrypt_type.as_str())
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Decrypted payment notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpgNotification {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "Result", default)]
    pub result: Option<MpgTradeResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpgTradeResult {
    #[serde(rename = "MerchantID")]
    pub merchant_id: String,
    #[serde(rename = "Amt")]
    pub amount: u64,
    #[serde(rename = "TradeNo")]
    pub trade_no: String,
    #[serde(rename = "MerchantOrderNo")]
    pub merchant_order_no: String,
    #[serde(rename = "PaymentType")]
    pub payment_type: String,
    #[serde(rename = "RespondType")]
    pub respond_type: String,
    /// `YYYY-MM-DD HH:MM:SS`, Taipei time.
    #[serde(rename = "PayTime")]
    pub pay_time: String,
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "EscrowBank")]
    pub escrow_bank: String,
    #[serde(rename = "AuthBank")]
    pub auth_bank: String,
    #[serde(rename = "RespondCode")]
    pub respond_code: String,
    #[serde(rename = "Auth")]
    pub auth: String,
    #[serde(rename = "Card6No")]
    pub card6_no: String,
    #[serde(rename = "Card4No")]
    pub card4_no: String,
    /// `YYMM`.
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
    /// 1 = first binding, 2 = charged with a bound card, 3 = unbound.
    #[serde(rename = "TokenUseStatus")]
    pub token_use_status: u8,
    #[serde(rename = "TokenValue")]
    pub token_value: String,
    #[serde(rename = "TokenLife")]
    pub token_life: String,
}

/// What a successful binding leaves us to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardBinding {
    pub token_value: String,
    pub expires_on: NaiveDate,
    pub card6_no: String,
    pub card4_no: String,
}

impl MpgNotification {
    /// Open a `TradeInfo` ciphertext posted back by the gateway.
    pub fn decrypt(trade_info_hex: &str, credentials: &MerchantCredentials) -> Result<Self> {
        open_json(trade_info_hex, credentials)
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    pub fn result(&self) -> Result<&MpgTradeResult> {
        self.result
            .as_ref()
            .ok_or_else(|| GatewayError::ResultShapeMismatch("notification has no result".into()))
    }

    pub fn merchant_order_no(&self) -> Option<&str> {
        self.result.as_ref().map(|r| r.merchant_order_no.as_str())
    }

    /// Whether this notification is for a card-binding trade rather than a
    /// purchase.
    pub fn is_card_binding(&self) -> bool {
        self.merchant_order_no()
            .is_some_and(|no| no.starts_with(BINDING_ORDER_PREFIX))
    }

    /// Card expiry as the last calendar day of its month.
    pub fn card_expiry_last_day(&self) -> Result<NaiveDate> {
        last_day_of_expiry(&self.result()?.exp)
    }

    /// `PayTime` as a UTC instant.
    pub fn paid_at(&self) -> Result<DateTime<Utc>> {
        let raw = &self.result()?.pay_time;
        parse_gateway_local(raw, "%Y-%m-%d %H:%M:%S").ok_or_else(|| GatewayError::InvalidField {
            field: "PayTime",
            value: raw.clone(),
        })
    }

    /// Token and card details to store after a successful binding.
    pub fn card_binding(&self) -> Result<CardBinding> {
        let result = self.result()?;
        Ok(CardBinding {
            token_value: result.token_value.clone(),
            expires_on: last_day_of_expiry(&result.exp)?,
            card6_no: result.card6_no.clone(),
            card4_no: result.card4_no.clone(),
        })
    }
}

/// `YYMM` to the last day of that month, 20YY.
pub fn last_day_of_expiry(exp: &str) -> Result<NaiveDate> {
    let invalid = || GatewayError::InvalidField {
        field: "Exp",
        value: exp.to_string(),
    };

    if exp.len() != 4 || !exp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let year: i32 = 2000 + exp[..2].parse::<i32>().map_err(|_| invalid())?;
    let month: u32 = exp[2..].parse().map_err(|_| invalid())?;

    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), month + 1, 1)
    }
    .ok_or_else(invalid)?;

    next_month.pred_opt().ok_or_else(invalid)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A fresh random `TokenTerm`: 20 characters from `[0-9A-Za-z]`.
pub fn new_token_term() -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), TOKEN_TERM_LENGTH)
}

/// A merchant order number for a binding trade: prefix, UTC timestamp down
/// to the second, then four random digits to separate same-second calls.
/// 22 characters, inside the gateway's 30-character limit.
pub fn new_binding_order_no(now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!(
        "{}{}{:04}",
        BINDING_ORDER_PREFIX,
        now.format("%Y%m%d%H%M%S"),
        suffix
    )
}
