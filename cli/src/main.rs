// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # newebpay
//!
//! Entry point for the `newebpay` binary. Parses arguments, initializes
//! logging, and runs one subcommand:
//!
//! - `encrypt`    seal `key=value` fields, print ciphertext and TradeSha
//! - `decrypt`    open a hex ciphertext
//! - `check-code` recompute a result's CheckCode
//! - `query`      fetch a trade snapshot
//! - `retain`     reconcile a trade to a target amount
//! - `version`    print build version information
//!
//! Results go to stdout. Logs go to stderr.

mod cli;
mod logging;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde_json::{json, Value};

use newebpay_protocol::api::QueryTradeInfoRequest;
use newebpay_protocol::codec::envelope::{open_text, Envelope};
use newebpay_protocol::crypto::signatures::check_code_query;
use newebpay_protocol::crypto::{check_code, CheckCodeFields};
use newebpay_protocol::settlement::{plan_retention, SettlementStep};
use newebpay_protocol::transport::HttpTransport;
use newebpay_protocol::{GatewayClient, RetainOutcome, SettlementPlan};

use cli::{Commands, NewebpayCli};
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = NewebpayCli::parse();
    logging::init_logging(&cli.log_level, LogFormat::from_str_lossy(&cli.log_format));

    match cli.command {
        Commands::Encrypt(args) => encrypt(args),
        Commands::Decrypt(args) => decrypt(args),
        Commands::CheckCode(args) => compute_check_code(args),
        Commands::Query(args) => query(args).await,
        Commands::Retain(args) => retain(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Offline tools
// ---------------------------------------------------------------------------

fn encrypt(args: cli::EncryptArgs) -> Result<()> {
    let credentials = args
        .credentials
        .to_credentials()
        .context("invalid merchant credentials")?;
    let record: BTreeMap<String, String> = args.fields.into_iter().collect();

    let envelope = Envelope::seal(&record, &credentials).context("failed to seal record")?;
    println!("TradeInfo {}", envelope.ciphertext_hex());
    println!("TradeSha  {}", envelope.signature());
    Ok(())
}

fn decrypt(args: cli::DecryptArgs) -> Result<()> {
    let credentials = args
        .credentials
        .to_credentials()
        .context("invalid merchant credentials")?;
    let plaintext = open_text(args.ciphertext.trim(), &credentials)
        .context("failed to decrypt ciphertext")?;

    if args.json {
        let value: Value =
            serde_json::from_str(&plaintext).context("plaintext is not JSON")?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{plaintext}");
    }
    Ok(())
}

fn compute_check_code(args: cli::CheckCodeArgs) -> Result<()> {
    let credentials = args
        .credentials
        .to_credentials()
        .context("invalid merchant credentials")?;
    let fields = CheckCodeFields {
        amount: args.amount,
        merchant_id: credentials.merchant_id(),
        merchant_order_no: &args.order_no,
        trade_no: &args.trade_no,
    };
    if args.explain {
        println!("fields    {}", check_code_query(&fields)?);
        println!("preimage  HashIV=<iv>&<fields>&HashKey=<key>");
    }
    println!("{}", check_code(&fields, &credentials)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Live commands
// ---------------------------------------------------------------------------

fn client(endpoint: &cli::EndpointArgs) -> Result<GatewayClient<HttpTransport>> {
    let config = endpoint.to_config();
    let transport = HttpTransport::with_timeout(Duration::from_secs(endpoint.timeout_secs))
        .context("failed to build HTTP client")?;
    tracing::info!(
        environment = ?config.environment,
        endpoint = %config.endpoints.query_trade_info,
        "gateway client ready"
    );
    Ok(GatewayClient::new(config, transport))
}

async fn query(args: cli::QueryArgs) -> Result<()> {
    let credentials = args
        .credentials
        .to_credentials()
        .context("invalid merchant credentials")?;
    let client = client(&args.endpoint)?;

    let mut request = QueryTradeInfoRequest::new(&args.order_no, args.amount, Utc::now());
    if let Some(gateway) = args.gateway {
        request = request.with_gateway(gateway);
    }

    let snapshot = client
        .query_trade_info(&credentials, &request)
        .await
        .with_context(|| format!("query failed for order {}", args.order_no))?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn retain(args: cli::RetainArgs) -> Result<()> {
    let credentials = args
        .credentials
        .to_credentials()
        .context("invalid merchant credentials")?;
    let client = client(&args.endpoint)?;
    let request = QueryTradeInfoRequest::new(&args.order_no, args.authorized, Utc::now());

    if args.dry_run {
        let snapshot = client
            .query_trade_info(&credentials, &request)
            .await
            .with_context(|| format!("query failed for order {}", args.order_no))?;
        let plan = plan_retention(&snapshot, args.amount)?;
        println!("{}", serde_json::to_string_pretty(&plan_json(&plan))?);
        return Ok(());
    }

    let (snapshot, outcome) = client
        .query_and_retain(&credentials, &request, args.amount)
        .await
        .with_context(|| format!("reconciliation failed for order {}", args.order_no))?;

    let report = json!({
        "merchant_order_no": snapshot.merchant_order_no,
        "authorized": snapshot.amount,
        "close_status": snapshot.close_status,
        "target": args.amount,
        "outcome": outcome_json(&outcome),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !outcome.is_settled() {
        anyhow::bail!(
            "order {} did not settle; query it again before retrying",
            args.order_no
        );
    }
    Ok(())
}

fn plan_json(plan: &SettlementPlan) -> Value {
    json!({
        "merchant_order_no": plan.merchant_order_no,
        "authorized": plan.authorized,
        "target": plan.target,
        "close_status": plan.close_status.map(|status| status.to_string()),
        "steps": plan
            .steps
            .iter()
            .map(|action| json!({ "action": action.name(), "amount": action.amount() }))
            .collect::<Vec<_>>(),
    })
}

fn outcome_json(outcome: &RetainOutcome) -> Value {
    let steps: Vec<Value> = outcome.steps().iter().map(step_json).collect();
    match outcome {
        RetainOutcome::Unchanged => json!({ "result": "unchanged" }),
        RetainOutcome::Completed { .. } => json!({ "result": "completed", "steps": steps }),
        RetainOutcome::Halted { skipped, .. } => json!({
            "result": "halted",
            "steps": steps,
            "skipped": skipped
                .iter()
                .map(|action| json!({ "action": action.name(), "amount": action.amount() }))
                .collect::<Vec<_>>(),
        }),
    }
}

fn step_json(step: &SettlementStep) -> Value {
    json!({
        "action": step.action.name(),
        "amount": step.action.amount(),
        "status": step.reply.status,
        "message": step.reply.message,
        "trade_no": step.reply.result.as_ref().map(|result| result.trade_no.clone()),
    })
}

/// Prints version information to stdout.
fn print_version() {
    println!("newebpay {}", env!("CARGO_PKG_VERSION"));
    println!("close     v{}", newebpay_protocol::config::VERSION_CREDIT_CARD_CLOSE);
    println!("query     v{}", newebpay_protocol::config::VERSION_QUERY_TRADE_INFO);
    println!("mpg       v{}", newebpay_protocol::config::VERSION_MPG);
}
