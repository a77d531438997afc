//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use treasury_core::models::Direction;

/// Treasury - Bank statement reconciliation for a nonprofit treasurer
#[derive(Parser)]
#[command(name = "treasury")]
#[command(about = "Reconcile bank statements into the treasury ledger", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "treasury.db", global = true)]
    pub db: PathBuf,

    /// Reference data file (categories, cost centers, accounts, members)
    ///
    /// Falls back to $TREASURY_CONFIG, then ~/.config/treasury/config.toml,
    /// then the built-in lists.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the ledger database
    Init,

    /// Import a bank statement (OFX, PDF, CSV or XLSX)
    ///
    /// Without --assign, prints the staged rows and their options. With
    /// --assign, commits the batch; rows not assigned stay "Ignorar".
    Import {
        /// Statement file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Account the rows are booked against (defaults to the first account)
        #[arg(short, long)]
        account: Option<String>,

        /// Year for PDF lines that only carry day and month
        #[arg(long)]
        year: Option<i32>,

        /// Number of rows to review (defaults to the configured review limit)
        #[arg(long)]
        limit: Option<usize>,

        /// Classify a row, e.g. --assign "0=Mensalidade:Joel Silva"
        #[arg(long = "assign", value_name = "IDX=CATEGORY[:COUNTERPARTY]")]
        assign: Vec<String>,

        /// Override a row's cost center, e.g. --cost-center "1=Administrativo"
        #[arg(long = "cost-center", value_name = "IDX=COST_CENTER")]
        cost_center: Vec<String>,
    },

    /// List ledger entries
    Ledger {
        /// Number of most recent entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Write every entry as CSV to this file instead
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record a manual entry
    Add {
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// credit (entrada) or debit (saída)
        #[arg(long)]
        direction: Direction,

        #[arg(long)]
        category: String,

        /// Unsigned amount, e.g. 150.00
        #[arg(long)]
        amount: Decimal,

        #[arg(long, default_value = "")]
        description: String,

        /// Member name (defaults to N/A)
        #[arg(long)]
        counterparty: Option<String>,

        #[arg(long)]
        account: Option<String>,

        #[arg(long)]
        cost_center: Option<String>,
    },

    /// Ledger reports
    Report {
        #[command(subcommand)]
        report: ReportType,
    },

    /// Export receipt rows for credit entries as CSV
    Receipts {
        /// Entry ids (comma-separated); all credits when omitted
        #[arg(long, value_delimiter = ',')]
        ids: Vec<i64>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage members
    Members {
        #[command(subcommand)]
        action: Option<MembersAction>,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

/// Optional date bounds for reports
#[derive(Args, Clone, Default)]
pub struct PeriodArgs {
    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

#[derive(Subcommand)]
pub enum ReportType {
    /// Total credits, debits and balance
    Balance {
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Balance per account
    Accounts {
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Totals per category
    Categories {
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Totals per cost center
    CostCenters {
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Everything a member gave or received
    Member {
        name: String,

        #[command(flatten)]
        period: PeriodArgs,
    },
}

#[derive(Subcommand)]
pub enum MembersAction {
    /// List members
    List,
    /// Add a member
    Add {
        name: String,

        #[arg(long, default_value = "")]
        phone: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long, default_value = "Ativo")]
        status: String,
    },
    /// Change a member's details or name (ledger entries keep the old name)
    Update {
        name: String,

        /// New name
        #[arg(long)]
        rename: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        status: Option<String>,
    },
    /// Remove a member (ledger entries naming them are kept)
    Remove { name: String },
}
