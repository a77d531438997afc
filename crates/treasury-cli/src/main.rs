//! Treasury CLI - Bank statement reconciliation for a nonprofit treasurer
//!
//! Usage:
//!   treasury init                                  Initialize database
//!   treasury import --file extrato.ofx             Preview staged rows
//!   treasury import --file extrato.ofx --assign 0=Mensalidade
//!   treasury report balance                        Show totals
//!   treasury serve --port 3000                     Start web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;
use commands::MemberChanges;
use treasury_core::{models::Counterparty, models::Member, ManualEntry};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, config),
        Commands::Import {
            file,
            account,
            year,
            limit,
            assign,
            cost_center,
        } => {
            let mut session = commands::open_session(&cli.db, config)?;
            commands::cmd_import(
                &mut session,
                &file,
                account,
                year,
                limit,
                &assign,
                &cost_center,
            )
            .map(|_| ())
        }
        Commands::Ledger { limit, output } => {
            let session = commands::open_session(&cli.db, config)?;
            match output {
                Some(path) => commands::cmd_ledger_export(&session, &path),
                None => commands::cmd_ledger(&session, limit),
            }
        }
        Commands::Add {
            date,
            direction,
            category,
            amount,
            description,
            counterparty,
            account,
            cost_center,
        } => {
            let mut session = commands::open_session(&cli.db, config)?;
            let entry = ManualEntry {
                date,
                direction,
                category,
                amount,
                description,
                counterparty: counterparty
                    .as_deref()
                    .map(Counterparty::from_label)
                    .unwrap_or_default(),
                account,
                cost_center,
            };
            commands::cmd_add(&mut session, entry)
        }
        Commands::Report { report } => {
            let session = commands::open_session(&cli.db, config)?;
            match report {
                ReportType::Balance { period } => {
                    commands::cmd_report_balance(&session, period.from, period.to)
                }
                ReportType::Accounts { period } => {
                    commands::cmd_report_accounts(&session, period.from, period.to)
                }
                ReportType::Categories { period } => {
                    commands::cmd_report_categories(&session, period.from, period.to)
                }
                ReportType::CostCenters { period } => {
                    commands::cmd_report_cost_centers(&session, period.from, period.to)
                }
                ReportType::Member { name, period } => {
                    commands::cmd_report_member(&session, &name, period.from, period.to)
                }
            }
        }
        Commands::Receipts { ids, output } => {
            let session = commands::open_session(&cli.db, config)?;
            let ids = if ids.is_empty() { None } else { Some(ids.as_slice()) };
            commands::cmd_receipts(&session, ids, output.as_deref())
        }
        Commands::Members { action } => {
            let mut session = commands::open_session(&cli.db, config)?;
            match action {
                None | Some(MembersAction::List) => commands::cmd_members_list(&session),
                Some(MembersAction::Add {
                    name,
                    phone,
                    email,
                    status,
                }) => {
                    let member = Member {
                        name,
                        phone,
                        status,
                        email,
                    };
                    commands::cmd_members_add(&mut session, member)
                }
                Some(MembersAction::Update {
                    name,
                    rename,
                    phone,
                    email,
                    status,
                }) => {
                    let changes = MemberChanges {
                        rename,
                        phone,
                        email,
                        status,
                    };
                    commands::cmd_members_update(&mut session, &name, changes)
                }
                Some(MembersAction::Remove { name }) => {
                    commands::cmd_members_remove(&mut session, &name)
                }
            }
        }
        Commands::Serve { port, host } => commands::cmd_serve(&cli.db, config, &host, port).await,
    }
}
