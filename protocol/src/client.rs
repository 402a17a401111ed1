//! # Gateway Client
//!
//! Ties the pieces together: build the record, seal it, post it, unwrap the
//! answer, check the `CheckCode`. One method per gateway operation.
//!
//! The client holds no per-merchant state. Credentials are passed into
//! every call, so one client serves any number of merchants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::api::cancel::CancelAuthorizationRequest;
use crate::api::charge::{ChargeOutcome, ChargeResult, ThreeDSecureChallenge, TokenCharge};
use crate::api::close::{CloseKind, CloseRequest};
use crate::api::mpg::{BindingRequest, MpgForm};
use crate::api::query::{QueryTradeInfoRequest, TradeSnapshot};
use crate::api::CheckCoded;
use crate::codec::envelope::Envelope;
use crate::codec::response::{GatewayReply, GatewayResponse, GatewayStatus};
use crate::config::GatewayConfig;
use crate::crypto::keys::MerchantCredentials;
use crate::error::{GatewayError, Result};
use crate::settlement::{self, BehaviorReply, RetainOutcome, SettlementAction, SettlementGateway};
use crate::transport::{FormData, Transport};

/// Client for one gateway deployment, over any [`Transport`].
#[derive(Debug, Clone)]
pub struct GatewayClient<T> {
    config: GatewayConfig,
    transport: T,
}

impl<T: Transport> GatewayClient<T> {
    pub fn new(config: GatewayConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -----------------------------------------------------------------------
    // Close endpoint
    // -----------------------------------------------------------------------

    /// Capture `amount` of an authorized trade (B031).
    pub async fn capture(
        &self,
        credentials: &MerchantCredentials,
        merchant_order_no: &str,
        amount: u64,
        requested_at: DateTime<Utc>,
    ) -> Result<BehaviorReply> {
        self.close(CloseKind::Capture, credentials, merchant_order_no, amount, requested_at)
            .await
    }

    /// Refund `amount` of a captured trade (B032).
    pub async fn refund(
        &self,
        credentials: &MerchantCredentials,
        merchant_order_no: &str,
        amount: u64,
        requested_at: DateTime<Utc>,
    ) -> Result<BehaviorReply> {
        self.close(CloseKind::Refund, credentials, merchant_order_no, amount, requested_at)
            .await
    }

    /// Withdraw a capture that hasn't reached the bank yet (B033).
    pub async fn cancel_pending_capture(
        &self,
        credentials: &MerchantCredentials,
        merchant_order_no: &str,
        amount: u64,
        requested_at: DateTime<Utc>,
    ) -> Result<BehaviorReply> {
        self.close(CloseKind::CancelCapture, credentials, merchant_order_no, amount, requested_at)
            .await
    }

    /// Withdraw a refund that hasn't reached the bank yet (B034).
    pub async fn cancel_pending_refund(
        &self,
        credentials: &MerchantCredentials,
        merchant_order_no: &str,
        amount: u64,
        requested_at: DateTime<Utc>,
    ) -> Result<BehaviorReply> {
        self.close(CloseKind::CancelRefund, credentials, merchant_order_no, amount, requested_at)
            .await
    }

    async fn close(
        &self,
        kind: CloseKind,
        credentials: &MerchantCredentials,
        merchant_order_no: &str,
        amount: u64,
        requested_at: DateTime<Utc>,
    ) -> Result<BehaviorReply> {
        debug!(
            operation = kind.code(),
            endpoint = %self.config.endpoints.credit_card_close,
            merchant_order_no,
            amount,
            "close request"
        );
        let record = CloseRequest::new(kind, merchant_order_no, amount, requested_at);
        let form = Envelope::seal(&record, credentials)?.into_post_form(credentials.merchant_id());
        self.send_checked(&self.config.endpoints.credit_card_close, &form, credentials)
            .await
    }

    // -----------------------------------------------------------------------
    // Cancel endpoint
    // -----------------------------------------------------------------------

    /// Release the authorization hold. `amount` must be the authorized
    /// amount.
    pub async fn cancel_authorization(
        &self,
        credentials: &MerchantCredentials,
        merchant_order_no: &str,
        amount: u64,
        requested_at: DateTime<Utc>,
    ) -> Result<BehaviorReply> {
        debug!(
            operation = "cancel-authorization",
            endpoint = %self.config.endpoints.credit_card_cancel,
            merchant_order_no,
            amount,
            "cancel request"
        );
        let record = CancelAuthorizationRequest::new(merchant_order_no, amount, requested_at);
        let form = Envelope::seal(&record, credentials)?.into_post_form(credentials.merchant_id());
        self.send_checked(&self.config.endpoints.credit_card_cancel, &form, credentials)
            .await
    }

    // -----------------------------------------------------------------------
    // Query
    // -----------------------------------------------------------------------

    /// Fetch a fresh [`TradeSnapshot`].
    ///
    /// # Errors
    ///
    /// [`GatewayError::RemoteRejected`](crate::GatewayError::RemoteRejected)
    /// when the gateway can't find the trade, and
    /// [`GatewayError::ChecksumMismatch`](crate::GatewayError::ChecksumMismatch)
    /// when the snapshot's `CheckCode` doesn't verify.
    pub async fn query_trade_info(
        &self,
        credentials: &MerchantCredentials,
        request: &QueryTradeInfoRequest,
    ) -> Result<TradeSnapshot> {
        debug!(
            operation = "query",
            endpoint = %self.config.endpoints.query_trade_info,
            merchant_order_no = %request.merchant_order_no,
            "query request"
        );
        let form = request.to_form(credentials);
        let reply: GatewayReply<TradeSnapshot> = self
            .send_checked(&self.config.endpoints.query_trade_info, &form, credentials)
            .await?;
        reply.into_result()
    }

    // -----------------------------------------------------------------------
    // Token charge
    // -----------------------------------------------------------------------

    /// Charge a bound card.
    ///
    /// # Errors
    ///
    /// [`GatewayError::RemoteRejected`](crate::GatewayError::RemoteRejected)
    /// when a 3-D Secure charge comes back with anything but the challenge,
    /// `SUCCESS` included.
    /// A declined non-3-D Secure charge is a
    /// [`ChargeOutcome::Completed`] reply with its status.
    pub async fn charge_token(
        &self,
        credentials: &MerchantCredentials,
        charge: &TokenCharge,
        requested_at: DateTime<Utc>,
    ) -> Result<ChargeOutcome> {
        debug!(
            operation = "charge",
            endpoint = %self.config.endpoints.credit_card,
            merchant_order_no = %charge.merchant_order_no,
            amount = charge.amount,
            three_d_secure = charge.three_d_secure.is_some(),
            "charge request"
        );
        let record = charge.to_request(requested_at);
        let form =
            Envelope::seal(&record, credentials)?.into_post_form_json(credentials.merchant_id());

        let body = self
            .transport
            .post_form(&self.config.endpoints.credit_card, &form)
            .await?;
        let response = GatewayResponse::parse(&body)?;

        if response.status() == GatewayStatus::ThreeDVerify {
            let html = response.markup()?.to_string();
            return Ok(ChargeOutcome::Challenge(ThreeDSecureChallenge { html }));
        }
        // A 3-D Secure charge answers with the challenge or not at all.
        if charge.three_d_secure.is_some() {
            warn!(status = %response.status, message = %response.message, "3-D Secure charge refused");
            return Err(GatewayError::RemoteRejected {
                status: response.status,
                message: response.message,
            });
        }

        let reply: GatewayReply<ChargeResult> = response.reply()?;
        verify_reply(&reply, credentials)?;
        Ok(ChargeOutcome::Completed(reply))
    }

    // -----------------------------------------------------------------------
    // MPG
    // -----------------------------------------------------------------------

    /// Sealed card-binding form. Render it as a form posting to
    /// [`mpg_gateway_url`](Self::mpg_gateway_url).
    pub fn binding_form(
        &self,
        credentials: &MerchantCredentials,
        binding: &BindingRequest,
        merchant_order_no: &str,
        requested_at: DateTime<Utc>,
    ) -> Result<MpgForm> {
        debug!(
            operation = "card-binding",
            endpoint = %self.config.endpoints.mpg_gateway,
            merchant_order_no,
            "binding form"
        );
        let trade_info = binding.to_trade_info(credentials.merchant_id(), merchant_order_no, requested_at);
        MpgForm::seal(&trade_info, credentials)
    }

    pub fn mpg_gateway_url(&self) -> &str {
        &self.config.endpoints.mpg_gateway
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    /// Reconcile an already-queried trade to `target`.
    pub async fn retain(
        &self,
        credentials: &MerchantCredentials,
        snapshot: &TradeSnapshot,
        target: u64,
        requested_at: DateTime<Utc>,
    ) -> Result<RetainOutcome> {
        settlement::retain(self, credentials, snapshot, target, requested_at).await
    }

    /// Query the trade, then reconcile it to `target`.
    pub async fn query_and_retain(
        &self,
        credentials: &MerchantCredentials,
        query: &QueryTradeInfoRequest,
        target: u64,
    ) -> Result<(TradeSnapshot, RetainOutcome)> {
        let snapshot = self.query_trade_info(credentials, query).await?;
        let outcome = self
            .retain(credentials, &snapshot, target, query.requested_at)
            .await?;
        Ok((snapshot, outcome))
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    async fn send_checked<R>(
        &self,
        url: &str,
        form: &FormData,
        credentials: &MerchantCredentials,
    ) -> Result<GatewayReply<R>>
    where
        R: DeserializeOwned + CheckCoded,
    {
        let body = self.transport.post_form(url, form).await?;
        let reply: GatewayReply<R> = GatewayResponse::parse(&body)?.reply()?;
        verify_reply(&reply, credentials)?;
        Ok(reply)
    }
}

fn verify_reply<R: CheckCoded>(reply: &GatewayReply<R>, credentials: &MerchantCredentials) -> Result<()> {
    if !reply.is_success() {
        warn!(status = %reply.status, message = %reply.message, "gateway returned non-success status");
        return Ok(());
    }
    match &reply.result {
        Some(result) => result.verify_check_code_if_present(credentials),
        None => Ok(()),
    }
}

#[async_trait]
impl<T: Transport> SettlementGateway for GatewayClient<T> {
    async fn execute(
        &self,
        credentials: &MerchantCredentials,
        merchant_order_no: &str,
        action: SettlementAction,
        requested_at: DateTime<Utc>,
    ) -> Result<BehaviorReply> {
        match action {
            SettlementAction::Capture { amount } => {
                self.capture(credentials, merchant_order_no, amount, requested_at).await
            }
            SettlementAction::Refund { amount } => {
                self.refund(credentials, merchant_order_no, amount, requested_at).await
            }
            SettlementAction::CancelPendingCapture { amount } => {
                self.cancel_pending_capture(credentials, merchant_order_no, amount, requested_at)
                    .await
            }
            SettlementAction::CancelAuthorization { amount } => {
                self.cancel_authorization(credentials, merchant_order_no, amount, requested_at)
                    .await
            }
        }
    }
}
