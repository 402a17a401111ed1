//! # Settlement Reconciliation
//!
//! Given a freshly queried [`TradeSnapshot`] and a target amount, work out
//! which capture / cancel / refund calls bring the trade there, then drive
//! them one at a time.
//!
//! ## Decision table
//!
//! Pre-flight, before any remote call:
//!
//! 1. **target > authorized** -- rejected with
//!    [`GatewayError::AmountExceedsAuthorization`].
//! 2. **target == authorized** -- nothing to do.
//! 3. **unknown `CloseStatus`** -- rejected with
//!    [`GatewayError::InvalidCloseStatus`].
//!
//! Then, by close status:
//!
//! | Status | target > 0 | target == 0 |
//! |--------|------------|-------------|
//! | uncaptured | capture `target` | cancel authorization for the full amount |
//! | capture pending | cancel pending capture, then as uncaptured | same |
//! | capture processing / captured | refund `authorized - target` | refund everything |
//!
//! ## Partial failure
//!
//! The steps are causally ordered and nothing here is transactional. A
//! transport or protocol error aborts immediately and propagates. A step the
//! gateway answers with a non-`SUCCESS` status halts the sequence: that
//! reply is returned as the outcome and no further step runs. Either way the
//! trade may be left in between states; query it again before resuming.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::api::close::CreditCardBehaviorResult;
use crate::api::query::{CloseStatus, TradeSnapshot};
use crate::codec::response::GatewayReply;
use crate::crypto::keys::MerchantCredentials;
use crate::error::{GatewayError, Result};

pub type BehaviorReply = GatewayReply<CreditCardBehaviorResult>;

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// One remote call the engine can issue. Amounts are in the smallest
/// currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettlementAction {
    Capture { amount: u64 },
    CancelAuthorization { amount: u64 },
    CancelPendingCapture { amount: u64 },
    Refund { amount: u64 },
}

impl SettlementAction {
    pub fn amount(self) -> u64 {
        match self {
            Self::Capture { amount }
            | Self::CancelAuthorization { amount }
            | Self::CancelPendingCapture { amount }
            | Self::Refund { amount } => amount,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Capture { .. } => "capture",
            Self::CancelAuthorization { .. } => "cancel-authorization",
            Self::CancelPendingCapture { .. } => "cancel-pending-capture",
            Self::Refund { .. } => "refund",
        }
    }
}

/// The ordered calls needed to move one trade to its target amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPlan {
    pub merchant_order_no: String,
    pub authorized: u64,
    pub target: u64,
    /// `None` when the plan is empty because nothing needs to change.
    pub close_status: Option<CloseStatus>,
    pub steps: Vec<SettlementAction>,
}

impl SettlementPlan {
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Decide what to do, without doing it.
///
/// # Errors
///
/// [`GatewayError::AmountExceedsAuthorization`] or
/// [`GatewayError::InvalidCloseStatus`], per the pre-flight rules above.
pub fn plan_retention(snapshot: &TradeSnapshot, target: u64) -> Result<SettlementPlan> {
    let authorized = snapshot.amount;
    let mut plan = SettlementPlan {
        merchant_order_no: snapshot.merchant_order_no.clone(),
        authorized,
        target,
        close_status: None,
        steps: Vec::new(),
    };

    if target > authorized {
        return Err(GatewayError::AmountExceedsAuthorization {
            requested: target,
            authorized,
        });
    }
    if target == authorized {
        return Ok(plan);
    }

    let status = snapshot.close_status()?;
    plan.close_status = Some(status);

    let release_or_capture = if target > 0 {
        SettlementAction::Capture { amount: target }
    } else {
        SettlementAction::CancelAuthorization { amount: authorized }
    };

    plan.steps = match status {
        CloseStatus::Uncaptured => vec![release_or_capture],
        CloseStatus::CapturePending => vec![
            SettlementAction::CancelPendingCapture { amount: authorized },
            release_or_capture,
        ],
        CloseStatus::CaptureProcessing | CloseStatus::Captured => vec![SettlementAction::Refund {
            amount: authorized - target,
        }],
    };

    Ok(plan)
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Whatever can carry out a [`SettlementAction`] against the gateway.
/// [`GatewayClient`](crate::client::GatewayClient) is the real one.
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    /// Issue one call. A reply with a non-`SUCCESS` status is `Ok`; only
    /// transport, codec and integrity failures are `Err`.
    async fn execute(
        &self,
        credentials: &MerchantCredentials,
        merchant_order_no: &str,
        action: SettlementAction,
        requested_at: DateTime<Utc>,
    ) -> Result<BehaviorReply>;
}

/// A step that ran, with the gateway's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementStep {
    pub action: SettlementAction,
    pub reply: BehaviorReply,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetainOutcome {
    /// Already at the target; no call was made.
    Unchanged,
    /// Every planned step succeeded.
    Completed { steps: Vec<SettlementStep> },
    /// A step came back non-`SUCCESS` and the rest were skipped. The last
    /// entry in `steps` is that step.
    Halted {
        steps: Vec<SettlementStep>,
        skipped: Vec<SettlementAction>,
    },
}

impl RetainOutcome {
    pub fn steps(&self) -> &[SettlementStep] {
        match self {
            Self::Unchanged => &[],
            Self::Completed { steps } | Self::Halted { steps, .. } => steps,
        }
    }

    /// The reply of the last call made, which is the overall result.
    pub fn final_reply(&self) -> Option<&BehaviorReply> {
        self.steps().last().map(|step| &step.reply)
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Unchanged | Self::Completed { .. })
    }
}

/// Run a plan step by step.
pub async fn execute_plan<G>(
    gateway: &G,
    credentials: &MerchantCredentials,
    plan: &SettlementPlan,
    requested_at: DateTime<Utc>,
) -> Result<RetainOutcome>
where
    G: SettlementGateway + ?Sized,
{
    if plan.is_noop() {
        info!(
            merchant_order_no = %plan.merchant_order_no,
            amount = plan.target,
            "trade already at target amount"
        );
        return Ok(RetainOutcome::Unchanged);
    }

    let mut steps = Vec::with_capacity(plan.steps.len());
    for (index, &action) in plan.steps.iter().enumerate() {
        info!(
            merchant_order_no = %plan.merchant_order_no,
            action = action.name(),
            amount = action.amount(),
            step = index + 1,
            of = plan.steps.len(),
            "settlement step"
        );

        let reply = gateway
            .execute(credentials, &plan.merchant_order_no, action, requested_at)
            .await?;
        let succeeded = reply.is_success();
        if !succeeded {
            warn!(
                merchant_order_no = %plan.merchant_order_no,
                action = action.name(),
                status = %reply.status,
                message = %reply.message,
                "settlement halted"
            );
        }
        steps.push(SettlementStep { action, reply });

        if !succeeded {
            return Ok(RetainOutcome::Halted {
                steps,
                skipped: plan.steps[index + 1..].to_vec(),
            });
        }
    }

    Ok(RetainOutcome::Completed { steps })
}

/// Bring the trade in `snapshot` to `target`.
///
/// `snapshot` must be fresh. Validation runs before any remote call.
pub async fn retain<G>(
    gateway: &G,
    credentials: &MerchantCredentials,
    snapshot: &TradeSnapshot,
    target: u64,
    requested_at: DateTime<Utc>,
) -> Result<RetainOutcome>
where
    G: SettlementGateway + ?Sized,
{
    let plan = plan_retention(snapshot, target)?;
    execute_plan(gateway, credentials, &plan, requested_at).await
}

/// Give everything back: [`retain`] with a target of zero.
pub async fn refund_all<G>(
    gateway: &G,
    credentials: &MerchantCredentials,
    snapshot: &TradeSnapshot,
    requested_at: DateTime<Utc>,
) -> Result<RetainOutcome>
where
    G: SettlementGateway + ?Sized,
{
    retain(gateway, credentials, snapshot, 0, requested_at).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers from a queue and remembers what it was asked.
    struct FakeGateway {
        replies: Mutex<VecDeque<Result<BehaviorReply>>>,
        calls: Mutex<Vec<SettlementAction>>,
    }

    impl FakeGateway {
        fn new(replies: Vec<Result<BehaviorReply>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn always_ok() -> Self {
            Self::new((0..4).map(|_| Ok(ok())).collect())
        }

        fn calls(&self) -> Vec<SettlementAction> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SettlementGateway for FakeGateway {
        async fn execute(
            &self,
            _credentials: &MerchantCredentials,
            _merchant_order_no: &str,
            action: SettlementAction,
            _requested_at: DateTime<Utc>,
        ) -> Result<BehaviorReply> {
            self.calls.lock().unwrap().push(action);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted reply left")
        }
    }

    fn ok() -> BehaviorReply {
        GatewayReply {
            status: "SUCCESS".into(),
            message: "ok".into(),
            result: None,
        }
    }

    fn rejected(code: &str) -> BehaviorReply {
        GatewayReply {
            status: code.into(),
            message: "rejected".into(),
            result: None,
        }
    }

    fn snapshot(amount: u64, close_status: &str) -> TradeSnapshot {
        TradeSnapshot {
            merchant_id: "MS1".into(),
            amount,
            merchant_order_no: "ORDER-1".into(),
            close_status: close_status.into(),
            ..Default::default()
        }
    }

    fn creds() -> MerchantCredentials {
        MerchantCredentials::new("MS1", "k".repeat(32), "i".repeat(16)).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    // -- planning ----------------------------------------------------------

    #[test]
    fn plan_captured_partial_refund() {
        let plan = plan_retention(&snapshot(1000, "2"), 400).unwrap();
        assert_eq!(plan.steps, vec![SettlementAction::Refund { amount: 600 }]);
        assert_eq!(plan.close_status, Some(CloseStatus::CaptureProcessing));

        let plan = plan_retention(&snapshot(1000, "3"), 0).unwrap();
        assert_eq!(plan.steps, vec![SettlementAction::Refund { amount: 1000 }]);
    }

    #[test]
    fn plan_uncaptured() {
        let plan = plan_retention(&snapshot(1000, "0"), 700).unwrap();
        assert_eq!(plan.steps, vec![SettlementAction::Capture { amount: 700 }]);

        let plan = plan_retention(&snapshot(1000, "0"), 0).unwrap();
        assert_eq!(plan.steps, vec![SettlementAction::CancelAuthorization { amount: 1000 }]);
    }

    #[test]
    fn plan_capture_pending_cancels_first() {
        let plan = plan_retention(&snapshot(1000, "1"), 300).unwrap();
        assert_eq!(
            plan.steps,
            vec![
                SettlementAction::CancelPendingCapture { amount: 1000 },
                SettlementAction::Capture { amount: 300 },
            ]
        );

        let plan = plan_retention(&snapshot(1000, "1"), 0).unwrap();
        assert_eq!(
            plan.steps,
            vec![
                SettlementAction::CancelPendingCapture { amount: 1000 },
                SettlementAction::CancelAuthorization { amount: 1000 },
            ]
        );
    }

    #[test]
    fn plan_equal_target_is_noop_for_any_status() {
        for status in ["0", "1", "2", "3", "9", ""] {
            let plan = plan_retention(&snapshot(1000, status), 1000).unwrap();
            assert!(plan.is_noop(), "status {status:?}");
        }
    }

    #[test]
    fn plan_rejects_unknown_status() {
        let err = plan_retention(&snapshot(1000, "9"), 500).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidCloseStatus(ref s) if s == "9"));
    }

    #[test]
    fn plan_rejects_target_above_authorization() {
        let err = plan_retention(&snapshot(1000, "9"), 1001).unwrap_err();
        assert!(matches!(
            err,
            GatewayError::AmountExceedsAuthorization {
                requested: 1001,
                authorized: 1000
            }
        ));
    }

    // -- execution ---------------------------------------------------------

    #[tokio::test]
    async fn equal_target_makes_no_calls() {
        let gateway = FakeGateway::always_ok();
        let outcome = retain(&gateway, &creds(), &snapshot(1000, "3"), 1000, now())
            .await
            .unwrap();
        assert_eq!(outcome, RetainOutcome::Unchanged);
        assert!(outcome.is_settled());
        assert!(outcome.final_reply().is_none());
        assert!(gateway.calls().is_empty());
    }

    // An uncaptured 1000 trade retained at 1000 is left alone: the equality
    // check runs before the status branch, so no capture is issued even
    // though nothing has been captured yet.
    #[tokio::test]
    async fn uncaptured_equal_target_is_noop() {
        let plan = plan_retention(&snapshot(1000, "0"), 1000).unwrap();
        assert!(plan.is_noop());
        assert_eq!(plan.close_status, None);

        let gateway = FakeGateway::always_ok();
        let outcome = retain(&gateway, &creds(), &snapshot(1000, "0"), 1000, now())
            .await
            .unwrap();
        assert_eq!(outcome, RetainOutcome::Unchanged);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_status_makes_no_calls() {
        let gateway = FakeGateway::always_ok();
        let err = retain(&gateway, &creds(), &snapshot(1000, "9"), 0, now())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidCloseStatus(_)));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn over_authorization_makes_no_calls() {
        let gateway = FakeGateway::always_ok();
        let err = retain(&gateway, &creds(), &snapshot(1000, "0"), 5000, now())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AmountExceedsAuthorization { .. }));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn pending_cancel_success_falls_through_to_capture() {
        let gateway = FakeGateway::always_ok();
        let outcome = retain(&gateway, &creds(), &snapshot(1000, "1"), 300, now())
            .await
            .unwrap();

        assert!(matches!(outcome, RetainOutcome::Completed { .. }));
        assert_eq!(
            gateway.calls(),
            vec![
                SettlementAction::CancelPendingCapture { amount: 1000 },
                SettlementAction::Capture { amount: 300 },
            ]
        );
        assert_eq!(outcome.steps().len(), 2);
        assert!(outcome.final_reply().unwrap().is_success());
    }

    #[tokio::test]
    async fn pending_cancel_rejection_halts() {
        let gateway = FakeGateway::new(vec![Ok(rejected("TRA20001")), Ok(ok())]);
        let outcome = retain(&gateway, &creds(), &snapshot(1000, "1"), 300, now())
            .await
            .unwrap();

        match &outcome {
            RetainOutcome::Halted { steps, skipped } => {
                assert_eq!(steps.len(), 1);
                assert_eq!(steps[0].reply.status, "TRA20001");
                assert_eq!(skipped, &vec![SettlementAction::Capture { amount: 300 }]);
            }
            other => panic!("expected halt, got {other:?}"),
        }
        assert!(!outcome.is_settled());
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn pending_cancel_transport_error_propagates() {
        let gateway = FakeGateway::new(vec![Err(TransportError::Request("reset".into()).into())]);
        let err = retain(&gateway, &creds(), &snapshot(1000, "1"), 0, now())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn refund_all_on_captured_trade() {
        let gateway = FakeGateway::always_ok();
        let outcome = refund_all(&gateway, &creds(), &snapshot(1000, "3"), now())
            .await
            .unwrap();
        assert_eq!(gateway.calls(), vec![SettlementAction::Refund { amount: 1000 }]);
        assert!(outcome.is_settled());
    }

    #[tokio::test]
    async fn single_step_rejection_is_halted_outcome() {
        let gateway = FakeGateway::new(vec![Ok(rejected("TRA10036"))]);
        let outcome = retain(&gateway, &creds(), &snapshot(1000, "2"), 400, now())
            .await
            .unwrap();
        assert!(matches!(outcome, RetainOutcome::Halted { ref skipped, .. } if skipped.is_empty()));
        assert_eq!(outcome.final_reply().unwrap().status, "TRA10036");
    }

    #[test]
    fn action_accessors() {
        let action = SettlementAction::CancelPendingCapture { amount: 5 };
        assert_eq!(action.amount(), 5);
        assert_eq!(action.name(), "cancel-pending-capture");
    }
}
