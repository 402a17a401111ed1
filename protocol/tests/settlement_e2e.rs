//! End-to-end tests for the gateway client and the settlement engine.
//!
//! Every test drives the real client (sealing, posting, unwrapping, check
//! code verification) against a scripted transport that records each form
//! it receives. Encrypted forms are opened again with the merchant's keys so
//! the tests can assert on what the gateway would actually have seen.

use std::collections::VecDeque;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::json;

use async_trait::async_trait;
use newebpay_protocol::api::charge::{ChargeOutcome, ThreeDSecureUrls, TokenCharge};
use newebpay_protocol::api::query::QueryTradeInfoRequest;
use newebpay_protocol::codec::envelope::open_query;
use newebpay_protocol::crypto::signatures::{check_code, CheckCodeFields};
use newebpay_protocol::transport::{FormData, Transport, TransportError};
use newebpay_protocol::{
    GatewayClient, GatewayConfig, GatewayError, MerchantCredentials, RetainOutcome,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const MERCHANT_ID: &str = "MS12345678";
const ORDER_NO: &str = "ORDER-1";
const BASE_URL: &str = "https://gateway.test";

/// One recorded request.
#[derive(Debug, Clone)]
struct Sent {
    url: String,
    form: FormData,
}

/// Replays canned bodies in order and records what was posted.
struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<String, TransportError>>>,
    sent: Mutex<Vec<Sent>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<Result<String, TransportError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_form(&self, url: &str, form: &FormData) -> Result<String, TransportError> {
        self.sent.lock().push(Sent {
            url: url.to_string(),
            form: form.clone(),
        });
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("no scripted reply".into())))
    }
}

fn creds() -> MerchantCredentials {
    MerchantCredentials::new(
        MERCHANT_ID,
        "abcdefghijklmnopqrstuvwxyz123456",
        "1234567890abcdef",
    )
    .unwrap()
}

fn client(replies: Vec<Result<String, TransportError>>) -> GatewayClient<ScriptedTransport> {
    GatewayClient::new(
        GatewayConfig::sandbox().with_base_url(BASE_URL),
        ScriptedTransport::new(replies),
    )
}

fn signed_code(amount: u64, trade_no: &str) -> String {
    check_code(
        &CheckCodeFields {
            amount,
            merchant_id: MERCHANT_ID,
            merchant_order_no: ORDER_NO,
            trade_no,
        },
        &creds(),
    )
    .unwrap()
}

/// A successful close/cancel reply with a valid check code.
fn behavior_ok(amount: u64) -> Result<String, TransportError> {
    Ok(json!({
        "Status": "SUCCESS",
        "Message": "ok",
        "Result": {
            "MerchantID": MERCHANT_ID,
            "TradeNo": "24010112345678",
            "Amt": amount,
            "MerchantOrderNo": ORDER_NO,
            "CheckCode": signed_code(amount, "24010112345678"),
        }
    })
    .to_string())
}

fn rejected(status: &str, message: &str) -> Result<String, TransportError> {
    Ok(json!({"Status": status, "Message": message, "Result": []}).to_string())
}

fn query_ok(amount: u64, close_status: &str) -> Result<String, TransportError> {
    let close_amt = if close_status == "3" {
        amount.to_string()
    } else {
        String::new()
    };
    Ok(json!({
        "Status": "SUCCESS",
        "Message": "查詢成功",
        "Result": {
            "MerchantID": MERCHANT_ID,
            "Amt": amount,
            "TradeNo": "24010112345678",
            "MerchantOrderNo": ORDER_NO,
            "TradeStatus": "1",
            "PaymentType": "CREDIT",
            "CheckCode": signed_code(amount, "24010112345678"),
            "CloseAmt": close_amt,
            "CloseStatus": close_status,
        }
    })
    .to_string())
}

/// Decrypt `PostData_` and return `(key, value)` pairs.
fn post_data(sent: &Sent) -> Vec<(String, String)> {
    let hex = sent.form.get("PostData_").expect("envelope form");
    open_query(hex, &creds()).unwrap()
}

fn field<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn query() -> QueryTradeInfoRequest {
    QueryTradeInfoRequest::new(ORDER_NO, 1000, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
}

// ---------------------------------------------------------------------------
// Reconciliation decision table
// ---------------------------------------------------------------------------

#[tokio::test]
async fn captured_trade_partially_refunded() {
    let client = client(vec![query_ok(1000, "2"), behavior_ok(600)]);
    let (snapshot, outcome) = client.query_and_retain(&creds(), &query(), 400).await.unwrap();

    assert_eq!(snapshot.amount, 1000);
    assert!(matches!(outcome, RetainOutcome::Completed { .. }));

    let sent = client.transport().sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].url, "https://gateway.test/API/CreditCard/Close");
    assert_eq!(sent[1].form.get("MerchantID_"), Some(MERCHANT_ID));

    let pairs = post_data(&sent[1]);
    assert_eq!(field(&pairs, "Amt"), Some("600"));
    assert_eq!(field(&pairs, "CloseType"), Some("2"));
    assert_eq!(field(&pairs, "Cancel"), Some("0"));
    assert_eq!(field(&pairs, "MerchantOrderNo"), Some(ORDER_NO));
    assert_eq!(field(&pairs, "TimeStamp"), Some("1700000000"));
}

#[tokio::test]
async fn uncaptured_trade_captured_in_part() {
    let client = client(vec![query_ok(1000, "0"), behavior_ok(700)]);
    client.query_and_retain(&creds(), &query(), 700).await.unwrap();

    let sent = client.transport().sent();
    assert_eq!(sent.len(), 2);
    let pairs = post_data(&sent[1]);
    assert_eq!(field(&pairs, "Amt"), Some("700"));
    assert_eq!(field(&pairs, "CloseType"), Some("1"));
    assert_eq!(field(&pairs, "Cancel"), Some("0"));
}

#[tokio::test]
async fn uncaptured_trade_released_when_target_is_zero() {
    let client = client(vec![query_ok(1000, "0"), behavior_ok(1000)]);
    client.query_and_retain(&creds(), &query(), 0).await.unwrap();

    let sent = client.transport().sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].url, "https://gateway.test/API/CreditCard/Cancel");
    let pairs = post_data(&sent[1]);
    assert_eq!(field(&pairs, "Amt"), Some("1000"));
    assert_eq!(field(&pairs, "IndexType"), Some("1"));
    assert_eq!(field(&pairs, "TradeNo"), None);
}

#[tokio::test]
async fn equal_target_issues_no_mutating_call() {
    for status in ["0", "1", "2", "3"] {
        let client = client(vec![query_ok(1000, status)]);
        let (_, outcome) = client.query_and_retain(&creds(), &query(), 1000).await.unwrap();
        assert_eq!(outcome, RetainOutcome::Unchanged);
        assert_eq!(client.transport().sent().len(), 1, "status {status}");
    }
}

#[tokio::test]
async fn invalid_close_status_issues_no_mutating_call() {
    let client = client(vec![query_ok(1000, "9")]);
    let err = client.query_and_retain(&creds(), &query(), 400).await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidCloseStatus(ref s) if s == "9"));
    assert_eq!(client.transport().sent().len(), 1);
}

#[tokio::test]
async fn target_above_authorization_issues_no_mutating_call() {
    let client = client(vec![query_ok(1000, "0")]);
    let err = client.query_and_retain(&creds(), &query(), 1500).await.unwrap_err();
    assert!(matches!(
        err,
        GatewayError::AmountExceedsAuthorization {
            requested: 1500,
            authorized: 1000
        }
    ));
    assert_eq!(client.transport().sent().len(), 1);
}

// ---------------------------------------------------------------------------
// Capture pending
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pending_capture_cancelled_then_recaptured() {
    let client = client(vec![query_ok(1000, "1"), behavior_ok(1000), behavior_ok(300)]);
    let (_, outcome) = client.query_and_retain(&creds(), &query(), 300).await.unwrap();
    assert_eq!(outcome.steps().len(), 2);

    let sent = client.transport().sent();
    assert_eq!(sent.len(), 3);

    let cancel = post_data(&sent[1]);
    assert_eq!(field(&cancel, "CloseType"), Some("1"));
    assert_eq!(field(&cancel, "Cancel"), Some("1"));
    assert_eq!(field(&cancel, "Amt"), Some("1000"));

    let capture = post_data(&sent[2]);
    assert_eq!(field(&capture, "Cancel"), Some("0"));
    assert_eq!(field(&capture, "Amt"), Some("300"));
}

#[tokio::test]
async fn pending_capture_rejection_stops_the_sequence() {
    let client = client(vec![
        query_ok(1000, "1"),
        rejected("TRA20001", "請款已送出"),
        behavior_ok(300),
    ]);
    let (_, outcome) = client.query_and_retain(&creds(), &query(), 300).await.unwrap();

    let reply = outcome.final_reply().unwrap();
    assert_eq!(reply.status, "TRA20001");
    assert_eq!(reply.message, "請款已送出");
    assert!(!outcome.is_settled());
    assert_eq!(client.transport().sent().len(), 2);
}

#[tokio::test]
async fn pending_capture_transport_failure_propagates() {
    let client = client(vec![
        query_ok(1000, "1"),
        Err(TransportError::UnexpectedStatus { status: 502 }),
    ]);
    let err = client.query_and_retain(&creds(), &query(), 0).await.unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Transport(TransportError::UnexpectedStatus { status: 502 })
    ));
    assert_eq!(client.transport().sent().len(), 2);
}

// ---------------------------------------------------------------------------
// Integrity and unwrapping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tampered_check_code_is_rejected() {
    let tampered = Ok(json!({
        "Status": "SUCCESS",
        "Message": "ok",
        "Result": {
            "MerchantID": MERCHANT_ID,
            "TradeNo": "24010112345678",
            "Amt": 9999,
            "MerchantOrderNo": ORDER_NO,
            "CheckCode": signed_code(600, "24010112345678"),
        }
    })
    .to_string());
    let client = client(vec![tampered]);
    let err = client
        .refund(&creds(), ORDER_NO, 600, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::ChecksumMismatch { .. }));
}

#[tokio::test]
async fn query_rejection_is_remote_rejected() {
    let client = client(vec![rejected("TRA10001", "查無此交易")]);
    let err = client.query_trade_info(&creds(), &query()).await.unwrap_err();
    assert!(err.is_remote_rejection());

    let sent = client.transport().sent();
    assert_eq!(sent[0].url, "https://gateway.test/API/QueryTradeInfo");
    assert_eq!(sent[0].form.get("Version"), Some("1.3"));
    assert!(sent[0].form.get("CheckValue").is_some());
    assert!(sent[0].form.get("PostData_").is_none());
}

#[tokio::test]
async fn garbage_body_is_malformed_response() {
    let client = client(vec![Ok("<html>maintenance</html>".into())]);
    let err = client
        .capture(&creds(), ORDER_NO, 100, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::MalformedResponse(_)));
}

#[tokio::test]
async fn cancel_pending_refund_uses_b034_flags() {
    let client = client(vec![behavior_ok(200)]);
    let reply = client
        .cancel_pending_refund(&creds(), ORDER_NO, 200, Utc::now())
        .await
        .unwrap();
    assert!(reply.is_success());
    assert_eq!(reply.into_result().unwrap().amount, 200);

    let pairs = post_data(&client.transport().sent()[0]);
    assert_eq!(field(&pairs, "CloseType"), Some("2"));
    assert_eq!(field(&pairs, "Cancel"), Some("1"));
}

// ---------------------------------------------------------------------------
// Token charge
// ---------------------------------------------------------------------------

fn token_charge() -> TokenCharge {
    TokenCharge {
        merchant_order_no: ORDER_NO.into(),
        amount: 1000,
        prod_desc: "deposit".into(),
        payer_email: "payer@example.com".into(),
        token_value: "TOKEN".into(),
        token_term: "abcDEF1234567890wxyz".into(),
        three_d_secure: None,
    }
}

#[tokio::test]
async fn token_charge_completes() {
    let body = json!({
        "Status": "SUCCESS",
        "Message": "授權成功",
        "Result": {
            "MerchantID": MERCHANT_ID,
            "Amt": 1000,
            "TradeNo": "24010112345678",
            "MerchantOrderNo": ORDER_NO,
            "AuthDate": "20240101",
            "AuthTime": "120000",
            "Inst": 0,
            "CheckCode": signed_code(1000, "24010112345678"),
        }
    })
    .to_string();
    let client = client(vec![Ok(body)]);

    let outcome = client
        .charge_token(&creds(), &token_charge(), Utc::now())
        .await
        .unwrap();
    let ChargeOutcome::Completed(reply) = outcome else {
        panic!("expected a completed charge");
    };
    let result = reply.into_result().unwrap();
    assert_eq!(
        result.transacted_at().unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap()
    );

    let sent = client.transport().sent();
    assert_eq!(sent[0].url, "https://gateway.test/API/CreditCard");
    assert_eq!(sent[0].form.get("Pos_"), Some("JSON"));
    let pairs = post_data(&sent[0]);
    assert_eq!(field(&pairs, "P3D"), Some("0"));
    assert_eq!(field(&pairs, "TokenSwitch"), Some("on"));
}

#[tokio::test]
async fn token_charge_three_d_secure_returns_markup() {
    let body = json!({
        "Status": "3dVerify",
        "Message": "",
        "Result": "<form action=\"https://acs.example\"></form>",
    })
    .to_string();
    let client = client(vec![Ok(body)]);

    let outcome = client
        .charge_token(&creds(), &token_charge(), Utc::now())
        .await
        .unwrap();
    match outcome {
        ChargeOutcome::Challenge(challenge) => {
            assert!(challenge.html.starts_with("<form"));
        }
        other => panic!("expected a challenge, got {other:?}"),
    }
}

fn three_d_secure_charge() -> TokenCharge {
    TokenCharge {
        three_d_secure: Some(ThreeDSecureUrls {
            notify_url: "https://shop.test/notify".into(),
            return_url: "https://shop.test/return".into(),
        }),
        ..token_charge()
    }
}

#[tokio::test]
async fn three_d_secure_charge_declined_is_remote_rejected() {
    let client = client(vec![rejected("TRA10001", "card declined")]);

    let err = client
        .charge_token(&creds(), &three_d_secure_charge(), Utc::now())
        .await
        .unwrap_err();
    assert!(err.is_remote_rejection());
    assert!(matches!(
        err,
        GatewayError::RemoteRejected { ref status, ref message }
            if status == "TRA10001" && message == "card declined"
    ));

    let pairs = post_data(&client.transport().sent()[0]);
    assert_eq!(field(&pairs, "P3D"), Some("1"));
}

#[tokio::test]
async fn three_d_secure_charge_without_challenge_is_remote_rejected() {
    let body = json!({ "Status": "SUCCESS", "Message": "", "Result": {} }).to_string();
    let client = client(vec![Ok(body)]);

    let err = client
        .charge_token(&creds(), &three_d_secure_charge(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::RemoteRejected { ref status, .. } if status == "SUCCESS"));
}

#[tokio::test]
async fn declined_charge_carries_no_result() {
    let client = client(vec![rejected("TRA10001", "card declined")]);

    let outcome = client
        .charge_token(&creds(), &token_charge(), Utc::now())
        .await
        .unwrap();
    let ChargeOutcome::Completed(reply) = outcome else {
        panic!("expected a completed reply");
    };
    assert!(!reply.is_success());
    assert_eq!(reply.status, "TRA10001");
    assert_eq!(reply.result, None);
}
