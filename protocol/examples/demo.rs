//! Offline walkthrough of the gateway client against a simulated gateway.
//!
//! Seals a binding form, then reconciles two trades through the full
//! client stack (envelope, transport, unwrapper, CheckCode verification,
//! settlement engine). The simulated gateway decrypts every request with
//! the same credentials and keeps a tiny ledger, so no network is needed.
//!
//! Run with:
//!   cargo run --example demo

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;

use newebpay_protocol::api::mpg::{new_binding_order_no, new_token_term, BindingRequest};
use newebpay_protocol::api::QueryTradeInfoRequest;
use newebpay_protocol::codec::envelope::open_query;
use newebpay_protocol::config::{FIELD_POST_DATA, PATH_CREDIT_CARD_CANCEL, PATH_CREDIT_CARD_CLOSE};
use newebpay_protocol::crypto::{check_code, CheckCodeFields};
use newebpay_protocol::settlement::refund_all;
use newebpay_protocol::transport::{FormData, Transport, TransportError};
use newebpay_protocol::{GatewayClient, GatewayConfig, MerchantCredentials, RetainOutcome};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

const MERCHANT_ID: &str = "MS12345678";

// ---------------------------------------------------------------------------
// Simulated gateway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Trade {
    authorized: u64,
    close_status: u8,
    close_amt: u64,
    trade_no: String,
}

struct SimulatedGateway {
    credentials: MerchantCredentials,
    trades: Mutex<HashMap<String, Trade>>,
}

impl SimulatedGateway {
    fn new(credentials: MerchantCredentials) -> Self {
        Self {
            credentials,
            trades: Mutex::new(HashMap::new()),
        }
    }

    fn open(&self, order_no: &str, trade_no: &str, authorized: u64, close_status: u8, close_amt: u64) {
        self.trades.lock().insert(
            order_no.to_string(),
            Trade {
                authorized,
                close_status,
                close_amt,
                trade_no: trade_no.to_string(),
            },
        );
    }

    fn check_code(&self, amount: u64, order_no: &str, trade_no: &str) -> String {
        let fields = CheckCodeFields {
            amount,
            merchant_id: MERCHANT_ID,
            merchant_order_no: order_no,
            trade_no,
        };
        check_code(&fields, &self.credentials).unwrap_or_default()
    }

    fn query(&self, form: &FormData) -> serde_json::Value {
        let order_no = form.get("MerchantOrderNo").unwrap_or_default();
        let trades = self.trades.lock();
        let Some(trade) = trades.get(order_no) else {
            return json!({ "Status": "TRA10021", "Message": "trade not found", "Result": [] });
        };
        json!({
            "Status": "SUCCESS",
            "Message": "query ok",
            "Result": {
                "MerchantID": MERCHANT_ID,
                "Amt": trade.authorized,
                "TradeNo": trade.trade_no,
                "MerchantOrderNo": order_no,
                "TradeStatus": "1",
                "PaymentType": "CREDIT",
                "CloseAmt": trade.close_amt.to_string(),
                "CloseStatus": trade.close_status.to_string(),
                "CheckCode": self.check_code(trade.authorized, order_no, &trade.trade_no),
            }
        })
    }

    fn behave(&self, path_cancel: bool, form: &FormData) -> Result<serde_json::Value, TransportError> {
        let post_data = form.get(FIELD_POST_DATA).unwrap_or_default();
        let fields: HashMap<String, String> = open_query(post_data, &self.credentials)
            .map_err(|e| TransportError::Request(e.to_string()))?
            .into_iter()
            .collect();
        let field = |name: &str| fields.get(name).map(String::as_str).unwrap_or_default();
        let amount: u64 = field("Amt").parse().unwrap_or_default();
        let order_no = field("MerchantOrderNo").to_string();

        let mut trades = self.trades.lock();
        let Some(trade) = trades.get_mut(&order_no) else {
            return Ok(json!({ "Status": "TRA10021", "Message": "trade not found", "Result": {} }));
        };

        match (path_cancel, field("CloseType"), field("Cancel")) {
            (true, _, _) => trade.close_amt = 0,
            (false, "1", "0") => {
                trade.close_status = 1;
                trade.close_amt = amount;
            }
            (false, "1", "1") => {
                trade.close_status = 0;
                trade.close_amt = 0;
            }
            (false, "2", "0") => trade.close_amt = trade.close_amt.saturating_sub(amount),
            _ => return Ok(json!({ "Status": "TRA10099", "Message": "unsupported", "Result": {} })),
        }

        Ok(json!({
            "Status": "SUCCESS",
            "Message": "ok",
            "Result": {
                "MerchantID": MERCHANT_ID,
                "TradeNo": trade.trade_no,
                "Amt": amount,
                "MerchantOrderNo": order_no,
                "CheckCode": self.check_code(amount, &order_no, &trade.trade_no),
            }
        }))
    }
}

#[async_trait]
impl Transport for SimulatedGateway {
    async fn post_form(&self, url: &str, form: &FormData) -> Result<String, TransportError> {
        let reply = if url.ends_with(PATH_CREDIT_CARD_CLOSE) {
            self.behave(false, form)?
        } else if url.ends_with(PATH_CREDIT_CARD_CANCEL) {
            self.behave(true, form)?
        } else {
            self.query(form)
        };
        Ok(reply.to_string())
    }
}

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn section(title: &str) {
    println!();
    println!("{BOLD}{CYAN}== {title}{RESET}");
}

fn print_outcome(outcome: &RetainOutcome) {
    if outcome.steps().is_empty() {
        println!("  {DIM}no call needed{RESET}");
    }
    for step in outcome.steps() {
        let color = if step.reply.is_success() { GREEN } else { YELLOW };
        println!(
            "  {color}{:<24}{RESET} amount={:<6} status={}",
            step.action.name(),
            step.action.amount(),
            step.reply.status
        );
    }
    println!("  settled: {}", outcome.is_settled());
}

// ---------------------------------------------------------------------------
// Walkthrough
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> newebpay_protocol::Result<()> {
    let credentials =
        MerchantCredentials::new(MERCHANT_ID, "abcdefghijklmnopqrstuvwxyz123456", "1234567890abcdef")?;
    let gateway = SimulatedGateway::new(credentials.clone());
    let client = GatewayClient::new(
        GatewayConfig::sandbox().with_base_url("https://gateway.local"),
        gateway,
    );
    let now = Utc::now();

    section("Card binding form");
    let binding = BindingRequest {
        email: "payer@example.com".to_string(),
        token_term: new_token_term(),
        return_url: "https://shop.example.com/return".to_string(),
        notify_url: "https://shop.example.com/notify".to_string(),
        client_back_url: "https://shop.example.com/".to_string(),
        token_life: None,
    };
    let order_no = new_binding_order_no(now);
    let form = client.binding_form(&credentials, &binding, &order_no, now)?;
    println!("  post to   {}", client.mpg_gateway_url());
    println!("  order     {order_no}");
    println!("  TradeSha  {}", form.trade_sha);
    println!("  TradeInfo {DIM}{}...{RESET}", &form.trade_info[..32.min(form.trade_info.len())]);

    section("Uncaptured 1000, keep 700");
    client.transport().open("ORDER-A", "24010100000001", 1000, 0, 0);
    let query = QueryTradeInfoRequest::new("ORDER-A", 1000, now);
    let (_, outcome) = client.query_and_retain(&credentials, &query, 700).await?;
    print_outcome(&outcome);

    section("Capture pending, change mind to 600");
    let (_, outcome) = client.query_and_retain(&credentials, &query, 600).await?;
    print_outcome(&outcome);

    section("Captured 1000, give everything back");
    client.transport().open("ORDER-B", "24010100000002", 1000, 3, 1000);
    let query = QueryTradeInfoRequest::new("ORDER-B", 1000, now);
    let snapshot = client.query_trade_info(&credentials, &query).await?;
    let outcome = refund_all(&client, &credentials, &snapshot, now).await?;
    print_outcome(&outcome);

    section("Already at target");
    client.transport().open("ORDER-C", "24010100000003", 500, 3, 500);
    let query = QueryTradeInfoRequest::new("ORDER-C", 500, now);
    let (_, outcome) = client.query_and_retain(&credentials, &query, 500).await?;
    print_outcome(&outcome);

    println!();
    Ok(())
}
