//! # Gateway Configuration & Constants
//!
//! Every magic string the gateway expects lives here. If you're hardcoding a
//! version number or a form field name somewhere else, you're doing it wrong.
//!
//! The endpoint set is chosen by [`Environment`] and carried around in an
//! explicit [`GatewayConfig`] value. Nothing in this crate reads process
//! environment variables; that's the binary's job.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Production host. Mistakes here cost real money.
pub const PRODUCTION_BASE_URL: &str = "https://core.newebpay.com";

/// Sandbox host. Same API surface, test cards only.
pub const SANDBOX_BASE_URL: &str = "https://ccore.newebpay.com";

pub const PATH_MPG_GATEWAY: &str = "/MPG/mpg_gateway";
pub const PATH_CREDIT_CARD: &str = "/API/CreditCard";
pub const PATH_CREDIT_CARD_CANCEL: &str = "/API/CreditCard/Cancel";
pub const PATH_CREDIT_CARD_CLOSE: &str = "/API/CreditCard/Close";
pub const PATH_QUERY_TRADE_INFO: &str = "/API/QueryTradeInfo";

// ---------------------------------------------------------------------------
// Cipher Parameters
// ---------------------------------------------------------------------------

/// AES block size in bytes. The IV must be exactly this long, and padded
/// plaintext is always a multiple of it.
pub const BLOCK_SIZE: usize = 16;

/// Key lengths the block cipher accepts: AES-128, AES-192, AES-256.
/// Anything else is a configuration error, not something to pad or truncate.
pub const SUPPORTED_KEY_LENGTHS: [usize; 3] = [16, 24, 32];

// ---------------------------------------------------------------------------
// Wire Literals
// ---------------------------------------------------------------------------

/// The one status literal that means "it worked".
pub const STATUS_SUCCESS: &str = "SUCCESS";

/// Status returned by a token charge that needs a 3-D Secure interstitial.
/// The `Result` slot then carries literal HTML instead of structured data.
pub const STATUS_3D_VERIFY: &str = "3dVerify";

/// Response format hint. We only ever speak JSON.
pub const RESPOND_TYPE_JSON: &str = "JSON";

/// Form field carrying the merchant identifier on envelope requests.
pub const FIELD_MERCHANT_ID: &str = "MerchantID_";

/// Form field carrying the hex ciphertext on envelope requests.
pub const FIELD_POST_DATA: &str = "PostData_";

/// Response format field, only sent by the token charge endpoint.
pub const FIELD_POS: &str = "Pos_";

/// API versions, per endpoint. The gateway rejects requests that claim the
/// wrong one, so these are pinned rather than configurable.
pub const VERSION_CREDIT_CARD_CLOSE: &str = "1.0";
pub const VERSION_CREDIT_CARD_CANCEL: &str = "1.0";
pub const VERSION_CREDIT_CARD: &str = "2.1";
pub const VERSION_QUERY_TRADE_INFO: &str = "1.3";
pub const VERSION_MPG: &str = "2.1";

/// `EncryptType` advertised on MPG forms: 0 = AES-CBC.
pub const MPG_ENCRYPT_TYPE: &str = "0";

/// `IndexType` 1 = address the trade by merchant order number.
pub const INDEX_BY_MERCHANT_ORDER_NO: u8 = 1;

/// Wall-clock times in results (`AuthDate`, `PayTime`) are Taipei local
/// time, which has no DST.
pub const GATEWAY_UTC_OFFSET_SECS: i32 = 8 * 3600;

// ---------------------------------------------------------------------------
// Card Binding
// ---------------------------------------------------------------------------

/// Merchant order numbers for card-binding trades start with this, so that
/// notifications can be told apart from real purchases.
pub const BINDING_ORDER_PREFIX: &str = "BIND";

/// Token terms are 20 alphanumeric characters.
pub const TOKEN_TERM_LENGTH: usize = 20;

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Which gateway deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Sandbox,
}

impl Environment {
    /// Parse an environment selector. Only `"production"` (case-insensitive)
    /// selects production; every other value falls back to the sandbox.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "production" => Environment::Production,
            _ => Environment::Sandbox,
        }
    }

    /// Base URL of this deployment.
    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_BASE_URL,
            Environment::Sandbox => SANDBOX_BASE_URL,
        }
    }
}

/// Fully resolved endpoint URLs for one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub mpg_gateway: String,
    pub credit_card: String,
    pub credit_card_cancel: String,
    pub credit_card_close: String,
    pub query_trade_info: String,
}

impl Endpoints {
    /// Build the endpoint set rooted at `base_url` (no trailing slash).
    pub fn with_base(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            mpg_gateway: format!("{base}{PATH_MPG_GATEWAY}"),
            credit_card: format!("{base}{PATH_CREDIT_CARD}"),
            credit_card_cancel: format!("{base}{PATH_CREDIT_CARD_CANCEL}"),
            credit_card_close: format!("{base}{PATH_CREDIT_CARD_CLOSE}"),
            query_trade_info: format!("{base}{PATH_QUERY_TRADE_INFO}"),
        }
    }
}

/// Explicit client configuration, passed in at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub endpoints: Endpoints,
}

impl GatewayConfig {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            endpoints: Endpoints::with_base(environment.base_url()),
        }
    }

    pub fn production() -> Self {
        Self::new(Environment::Production)
    }

    pub fn sandbox() -> Self {
        Self::new(Environment::Sandbox)
    }

    /// Keep the environment label but send every request to `base_url`.
    /// Handy for pointing the client at a local stub.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.endpoints = Endpoints::with_base(base_url);
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::sandbox()
    }
}
