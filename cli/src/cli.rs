//! # CLI Interface
//!
//! Argument structure for `newebpay`, via `clap` derive. Offline tools
//! (`encrypt`, `decrypt`, `check-code`) need only credentials. The live
//! commands (`query`, `retain`) also pick an environment.

use clap::{Args, Parser, Subcommand};

use newebpay_protocol::crypto::CipherError;
use newebpay_protocol::{Environment, GatewayConfig, MerchantCredentials};

/// NewebPay credit-card gateway tools.
///
/// Seals and opens envelopes with a merchant's HashKey/HashIV, recomputes
/// CheckCodes, queries trades and reconciles their captured amount.
#[derive(Parser, Debug)]
#[command(
    name = "newebpay",
    about = "NewebPay credit-card gateway tools",
    version,
    propagate_version = true
)]
pub struct NewebpayCli {
    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, global = true, env = "NEWEBPAY_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "NEWEBPAY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Canonicalize `key=value` fields, encrypt them, print ciphertext and TradeSha.
    Encrypt(EncryptArgs),
    /// Decrypt a hex ciphertext and print the plaintext.
    Decrypt(DecryptArgs),
    /// Compute the CheckCode for a result.
    CheckCode(CheckCodeArgs),
    /// Query a trade and print its snapshot as JSON.
    Query(QueryArgs),
    /// Query a trade, then capture, refund or cancel until it settles at `--amount`.
    Retain(RetainArgs),
    /// Print version information and exit.
    Version,
}

// ---------------------------------------------------------------------------
// Shared argument groups
// ---------------------------------------------------------------------------

/// Merchant identity and envelope key material.
#[derive(Args, Debug, Clone)]
pub struct CredentialArgs {
    #[arg(long, env = "NEWEBPAY_MERCHANT_ID")]
    pub merchant_id: String,

    /// 16, 24 or 32 characters.
    #[arg(long, env = "NEWEBPAY_HASH_KEY", hide_env_values = true)]
    pub hash_key: String,

    /// Exactly 16 characters.
    #[arg(long, env = "NEWEBPAY_HASH_IV", hide_env_values = true)]
    pub hash_iv: String,
}

impl CredentialArgs {
    pub fn to_credentials(&self) -> Result<MerchantCredentials, CipherError> {
        MerchantCredentials::new(&self.merchant_id, &self.hash_key, &self.hash_iv)
    }
}

/// Which deployment to talk to.
#[derive(Args, Debug, Clone)]
pub struct EndpointArgs {
    /// `production`, or anything else for the sandbox.
    #[arg(long = "env", env = "NEWEBPAY_ENV", default_value = "sandbox")]
    pub environment: String,

    /// Override the base URL (e.g. a local mock). Paths are appended to it.
    #[arg(long, env = "NEWEBPAY_BASE_URL")]
    pub base_url: Option<String>,

    /// Whole-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl EndpointArgs {
    pub fn to_config(&self) -> GatewayConfig {
        let config = GatewayConfig::new(Environment::from_str_lossy(&self.environment));
        match &self.base_url {
            Some(base) => config.with_base_url(base),
            None => config,
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand arguments
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct EncryptArgs {
    #[command(flatten)]
    pub credentials: CredentialArgs,

    /// Record fields as `Key=Value`. Order doesn't matter; keys are sorted.
    #[arg(required = true, value_parser = parse_key_value)]
    pub fields: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct DecryptArgs {
    #[command(flatten)]
    pub credentials: CredentialArgs,

    /// Hex ciphertext, e.g. a `TradeInfo` notification.
    pub ciphertext: String,

    /// Parse the plaintext as JSON and pretty-print it.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CheckCodeArgs {
    #[command(flatten)]
    pub credentials: CredentialArgs,

    #[arg(long)]
    pub amount: u64,

    #[arg(long)]
    pub order_no: String,

    #[arg(long)]
    pub trade_no: String,

    /// Also print the hashed field section (no key material), to compare
    /// against the gateway's documentation.
    #[arg(long)]
    pub explain: bool,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(flatten)]
    pub credentials: CredentialArgs,

    #[command(flatten)]
    pub endpoint: EndpointArgs,

    #[arg(long)]
    pub order_no: String,

    /// The trade's authorized amount.
    #[arg(long)]
    pub amount: u64,

    /// Payment channel filter sent as `Gateway` (omitted when unset).
    #[arg(long)]
    pub gateway: Option<String>,
}

#[derive(Args, Debug)]
pub struct RetainArgs {
    #[command(flatten)]
    pub credentials: CredentialArgs,

    #[command(flatten)]
    pub endpoint: EndpointArgs,

    #[arg(long)]
    pub order_no: String,

    /// The trade's authorized amount, used to query it.
    #[arg(long)]
    pub authorized: u64,

    /// Amount that should end up captured. `0` releases or refunds everything.
    #[arg(long)]
    pub amount: u64,

    /// Print the plan without executing it.
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
    if key.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}
