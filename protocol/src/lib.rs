// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # NewebPay Protocol Core Library
//!
//! A client-side integration layer for the NewebPay credit-card gateway:
//! it builds encrypted, signed requests, unwraps the gateway's replies, and
//! reconciles a trade's captured amount toward a target.
//!
//! The gateway's security model is a shared-secret envelope. Every mutating
//! request is a canonical query string, AES-CBC encrypted under the
//! merchant's `HashKey`/`HashIV`, hex encoded, and (for the hosted payment
//! page) signed with a SHA-256 `TradeSha`. Results that matter carry a
//! `CheckCode` we recompute and compare.
//!
//! ## Architecture
//!
//! - **config** -- Environments, endpoint URLs and every wire literal.
//! - **crypto** -- AES-CBC envelope cipher, SHA-256 integrity codes,
//!   merchant credentials.
//! - **codec** -- Canonical query encoding, request envelopes, the
//!   `{Status, Message, Result}` response wrapper.
//! - **api** -- Request records and typed results, one module per endpoint.
//! - **transport** -- The form-POST seam, with a `reqwest` implementation.
//! - **client** -- One async method per gateway operation.
//! - **settlement** -- The retain/refund decision procedure and its executor.
//!
//! ## What this crate is not
//!
//! It keeps no state. It doesn't retry, doesn't persist, and can't make a
//! multi-step reconciliation atomic. The caller owns all of that, and should
//! query again after any failure before deciding what to do next.
//!
//! ## Design Philosophy
//!
//! 1. Crypto and encoding errors always propagate. We never continue with
//!    ciphertext we couldn't validate.
//! 2. A gateway "no" is a value, not a crash. Transport failures are errors.
//! 3. Credentials never reach a log line.
//! 4. If it touches money, it has tests. Plural.

pub mod api;
pub mod client;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod settlement;
pub mod transport;

pub use client::GatewayClient;
pub use config::{Environment, GatewayConfig};
pub use crypto::MerchantCredentials;
pub use error::{GatewayError, Result};
pub use settlement::{RetainOutcome, SettlementAction, SettlementPlan};
