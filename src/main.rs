//! Deposit Allocator CLI
//!
//! Reads accounts and ledger from CSV files, previews or applies deposits,
//! and adjusts account data. Every command answers with a JSON envelope on
//! stdout (`--format csv` writes the data rows as CSV instead).
//!
//! # Usage
//!
//! ```bash
//! deposit-allocator --accounts accounts.csv calculate 1500
//! deposit-allocator --accounts accounts.csv deposit 1500 --target 40817-002
//! deposit-allocator update-account 40817-002 300 -120.50
//! ```
//!
//! # Environment Variables
//!
//! - `ALLOCATOR_ACCOUNTS`, `ALLOCATOR_LEDGER`, `ALLOCATOR_MAX_ATTEMPTS`: defaults
//!   for the matching flags
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity

use clap::{Args, Parser, Subcommand, ValueEnum};
use deposit_allocator::response::write_csv_rows;
use deposit_allocator::{
    ApplierConfig, CsvBook, Decimal4, DepositApplier, EngineError, Response, Result,
};
use log::error;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "deposit-allocator")]
#[command(about = "Distributes deposits across sub-accounts and keeps a transaction ledger")]
struct Cli {
    /// Accounts CSV file.
    #[arg(long, env = "ALLOCATOR_ACCOUNTS", default_value = "accounts.csv")]
    accounts: PathBuf,

    /// Ledger CSV file, created on first write.
    #[arg(long, env = "ALLOCATOR_LEDGER", default_value = "ledger.csv")]
    ledger: PathBuf,

    /// Attempts per deposit or update before giving up.
    #[arg(long, env = "ALLOCATOR_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List accounts, main first.
    Accounts,

    /// List ledger entries, most recent first.
    Transactions {
        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Only entries for this account.
        #[arg(long)]
        account: Option<String>,
    },

    /// Preview a deposit without writing anything.
    Calculate(DepositArgs),

    /// Apply a deposit and record it in the ledger.
    Deposit(DepositArgs),

    /// Set an account's monthly fee and balance.
    UpdateAccount {
        account_number: String,

        #[arg(allow_negative_numbers = true)]
        monthly_fee: String,

        #[arg(allow_negative_numbers = true)]
        balance: String,
    },
}

#[derive(Args, Debug)]
struct DepositArgs {
    #[arg(allow_negative_numbers = true)]
    amount: String,

    /// Route the whole deposit to this account.
    #[arg(long)]
    target: Option<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = run(cli) {
        error!("{}", e);
        report_failure(format, &e);
        process::exit(1);
    }
}

fn report_failure(format: OutputFormat, err: &EngineError) {
    match format {
        OutputFormat::Json => {
            if Response::<()>::from(err).write_json(io::stdout().lock()).is_err() {
                eprintln!("Error: {}", err);
            }
        }
        OutputFormat::Csv => eprintln!("Error: {}", err),
    }
}

fn run(cli: Cli) -> Result<()> {
    let book = CsvBook::open(&cli.accounts, &cli.ledger)?;
    let applier = DepositApplier::with_config(
        book,
        ApplierConfig {
            max_attempts: cli.max_attempts,
            ..ApplierConfig::default()
        },
    );

    match cli.command {
        Command::Accounts => {
            let accounts = applier.accounts()?;
            output(cli.format, Response::ok(&accounts), &accounts)
        }
        Command::Transactions { limit, account } => {
            let entries = match account {
                Some(account) => applier.account_transactions(&account, limit)?,
                None => applier.transactions(limit)?,
            };
            output(cli.format, Response::ok(&entries), &entries)
        }
        Command::Calculate(args) => {
            let amount = parse_decimal("amount", &args.amount)?;
            let distribution = applier.preview(amount, args.target.as_deref())?;
            output(cli.format, Response::ok(&distribution), &distribution)
        }
        Command::Deposit(args) => {
            let amount = parse_decimal("amount", &args.amount)?;
            let outcome = applier.apply(amount, args.target.as_deref())?;
            let message = if outcome.applied {
                "Deposit applied"
            } else {
                "Deposit credited no account; nothing was written"
            };
            output(
                cli.format,
                Response::ok_with_message(&outcome, message),
                &outcome.distribution,
            )
        }
        Command::UpdateAccount {
            account_number,
            monthly_fee,
            balance,
        } => {
            let monthly_fee = parse_decimal("monthly fee", &monthly_fee)?;
            let balance = parse_decimal("balance", &balance)?;
            let entry = applier.update_account_data(&account_number, monthly_fee, balance)?;
            output(
                cli.format,
                Response::ok_with_message(&entry, "Account data updated"),
                entry.as_slice(),
            )
        }
    }
}

/// Parses a command-line amount. A bad value surfaces as `InvalidNumber` in
/// the response envelope.
fn parse_decimal(field: &str, raw: &str) -> Result<Decimal4> {
    Decimal4::from_str(raw).map_err(|_| EngineError::InvalidNumber {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

fn output<T: Serialize, R: Serialize>(
    format: OutputFormat,
    response: Response<T>,
    rows: &[R],
) -> Result<()> {
    let stdout = io::stdout();
    let handle = stdout.lock();
    match format {
        OutputFormat::Json => response.write_json(handle),
        OutputFormat::Csv => write_csv_rows(rows, handle),
    }
}
