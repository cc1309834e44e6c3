//! # banquet-ledger CLI
//!
//! Operator entry point. Opens the ledger database, runs one command and
//! exits.
//!
//! ```text
//! banquet-ledger [--config ledger.toml] [--db ledger.db] <COMMAND>
//!
//!   record      append a payment and mirror it
//!   collect     move money from a payee's pending into a mode bucket
//!   report      ledger screen with FY table
//!   pending     pending per payee
//!   check       bookings whose advances disagree with the ledger
//!   import      merge a CSV into the month documents
//!   export      write every entry to CSV
//!   drain-outbox replay queued mirrors once
//!   status      outbox health
//!   estimate    totals for a booking JSON file
//!   words       amount in Indian words
//!   allocate    next serial of a counter
//! ```
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages
//! - Default: `info,banquet=debug,sqlx=warn`, written to stderr

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use banquet_core::words::money_in_words;
use banquet_core::{Approval, Booking, Money, PaymentFor, PaymentMode, SerialCounter};
use banquet_ledger::bookings::estimate;
use banquet_ledger::{LedgerConfig, LedgerEngine, PaymentDraft, PaymentTarget};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "banquet-ledger")]
#[command(about = "Booking estimates and money-receipt ledger")]
struct Cli {
    /// Config file (defaults to ledger.toml in the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append a payment to the ledger and mirror it
    Record {
        #[arg(long, value_parser = parse_money)]
        amount: Money,
        /// Cash, Card, Cheque or a bank account name
        #[arg(long)]
        mode: String,
        #[arg(long = "for", value_parser = parse_payment_for)]
        payment_for: PaymentFor,
        /// Receipt date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        receiver: String,
        #[arg(long)]
        cash_to: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, value_parser = parse_approval, default_value = "Accepted")]
        approval: Approval,
        /// Attach as an advance to this booking (needs --source-doc)
        #[arg(long, requires = "source_doc", conflicts_with = "refund")]
        booking: Option<String>,
        /// Month document holding the booking, e.g. Oct2025
        #[arg(long)]
        source_doc: Option<String>,
        /// Attach as a refund to this cancelled booking
        #[arg(long)]
        refund: Option<String>,
    },

    /// Collect from a payee's pending into a mode bucket
    Collect {
        payee: String,
        #[arg(value_parser = parse_money)]
        amount: Money,
        #[arg(long, default_value = "Cash")]
        mode: String,
    },

    /// Print the ledger report as JSON
    Report {
        /// Earlier entries fold into the opening balance
        #[arg(long)]
        from: Option<NaiveDate>,
    },

    /// Pending amounts, for one payee or all
    Pending {
        #[arg(long)]
        payee: Option<String>,
    },

    /// List bookings whose advances disagree with the ledger
    Check,

    /// Merge a CSV export into the ledger
    Import { file: PathBuf },

    /// Export every ledger entry to CSV
    Export { file: PathBuf },

    /// Replay queued mirrors once
    DrainOutbox,

    /// Outbox health
    Status,

    /// Compute totals for a booking JSON file without saving it
    Estimate { file: PathBuf },

    /// Spell an amount in Indian words
    Words {
        #[arg(value_parser = parse_money)]
        amount: Money,
    },

    /// Allocate the next serial of a counter (moneyReceipt, cashMoneyReceipt,
    /// refundMoneyReceipt, globalEvents)
    Allocate { counter: SerialCounter },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Commands that never touch the database.
    match &cli.command {
        Command::Words { amount } => {
            println!("{}", money_in_words(*amount)?);
            return Ok(());
        }
        Command::Estimate { file } => {
            let config = load_config(&cli)?;
            let booking = read_booking(file)?;
            print_json(&estimate(&booking, config.grand_total_policy()))?;
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(&cli)?;
    let mut engine = LedgerEngine::open(config).await?;
    let result = run(&engine, cli.command).await;
    engine.shutdown().await?;
    result
}

async fn run(engine: &LedgerEngine, command: Command) -> Result<()> {
    match command {
        Command::Record {
            amount,
            mode,
            payment_for,
            date,
            receiver,
            cash_to,
            description,
            approval,
            booking,
            source_doc,
            refund,
        } => {
            let mut draft = PaymentDraft::new(amount, PaymentMode::parse(&mode), payment_for, date, receiver)
                .description(description)
                .approval(approval);
            if let Some(payee) = cash_to {
                draft = draft.cash_to(payee);
            }
            let target = match (booking, source_doc, refund) {
                (Some(booking_id), Some(source_doc), None) => PaymentTarget::Advance { source_doc, booking_id },
                (None, _, Some(booking_id)) => PaymentTarget::Refund { booking_id },
                (None, None, None) => PaymentTarget::Standalone,
                _ => bail!("--booking needs --source-doc and cannot be combined with --refund"),
            };

            let outcome = engine.writer().record_payment(draft, target).await?;
            info!(sl_no = outcome.sl_no(), month = %outcome.month, "Payment recorded");
            print_json(&outcome)
        }
        Command::Collect { payee, amount, mode } => {
            let outcome = engine.collections().collect(&payee, amount, &mode).await?;
            print_json(&outcome)
        }
        Command::Report { from } => print_json(&engine.reporter().report(from).await?),
        Command::Pending { payee: Some(payee) } => print_json(&engine.reporter().payee_pending(&payee).await?),
        Command::Pending { payee: None } => print_json(&engine.reporter().pending_all().await?),
        Command::Check => print_json(&engine.reporter().inconsistent_bookings().await?),
        Command::Import { file } => print_json(&engine.transfer().import_path(&file).await?),
        Command::Export { file } => {
            let rows = engine.transfer().export_path(&file).await?;
            println!("Exported {rows} entries to {}", file.display());
            Ok(())
        }
        Command::DrainOutbox => {
            let summary = banquet_ledger::drain_pending(engine.database(), &engine.config().outbox).await?;
            print_json(&summary)
        }
        Command::Status => print_json(&engine.status().await?),
        Command::Allocate { counter } => {
            println!("{}", engine.writer().allocate_serial(counter).await?);
            Ok(())
        }
        Command::Words { .. } | Command::Estimate { .. } => Ok(()),
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Initializes the tracing subscriber for structured logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,banquet=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<LedgerConfig> {
    let mut config = LedgerConfig::load(cli.config.clone()).context("Failed to load configuration")?;
    if let Some(path) = &cli.db {
        config.database.path = path.clone();
    }
    Ok(config)
}

fn read_booking(path: &Path) -> Result<Booking> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not a booking document", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_money(value: &str) -> Result<Money, String> {
    Money::parse_strict(value).ok_or_else(|| format!("'{value}' is not an amount"))
}

fn parse_payment_for(value: &str) -> Result<PaymentFor, String> {
    PaymentFor::parse(value).ok_or_else(|| format!("'{value}' is neither Credit nor Debit"))
}

fn parse_approval(value: &str) -> Result<Approval, String> {
    Approval::parse(value).ok_or_else(|| format!("'{value}' is not an approval state"))
}
