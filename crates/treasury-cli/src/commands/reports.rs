//! Report command implementations

use std::fs::File;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use treasury_core::{
    export::write_receipt_rows_csv,
    models::{Direction, LedgerEntry},
    reports::{
        account_balances, balance_summary, category_summary, cost_center_summary,
        filter_by_period, member_history, receipt_rows, BalanceSummary,
    },
    LedgerStore, Session,
};

use super::{format_amount, truncate};

fn entries_in_period<S: LedgerStore>(
    session: &Session<S>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<LedgerEntry>> {
    let entries = session.ledger()?;
    Ok(filter_by_period(&entries, from, to))
}

fn period_label(from: Option<NaiveDate>, to: Option<NaiveDate>) -> String {
    match (from, to) {
        (None, None) => "all time".to_string(),
        (Some(from), None) => format!("from {}", from.format("%d/%m/%Y")),
        (None, Some(to)) => format!("until {}", to.format("%d/%m/%Y")),
        (Some(from), Some(to)) => {
            format!("{} to {}", from.format("%d/%m/%Y"), to.format("%d/%m/%Y"))
        }
    }
}

fn print_totals(totals: &BalanceSummary) {
    println!("   Entradas: {:>14}", format_amount(Direction::Credit, totals.credits));
    println!("   Saídas:   {:>14}", format_amount(Direction::Debit, totals.debits));
    println!("   Saldo:    {:>14.2}", totals.balance);
}

pub fn cmd_report_balance<S: LedgerStore>(
    session: &Session<S>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let entries = entries_in_period(session, from, to)?;

    println!();
    println!("📊 Balance ({})", period_label(from, to));
    println!("   ─────────────────────────────────────────────────────────────");
    print_totals(&balance_summary(&entries));
    Ok(())
}

pub fn cmd_report_accounts<S: LedgerStore>(
    session: &Session<S>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let entries = entries_in_period(session, from, to)?;
    let balances = account_balances(&entries, &session.reference().accounts);

    println!();
    println!("🏦 Accounts ({})", period_label(from, to));
    println!("   ─────────────────────────────────────────────────────────────");
    for balance in balances {
        println!(
            "   {:<30} │ {:>12.2} in │ {:>12.2} out │ {:>12.2}",
            truncate(&balance.account, 30),
            balance.totals.credits,
            balance.totals.debits,
            balance.totals.balance
        );
    }
    Ok(())
}

pub fn cmd_report_categories<S: LedgerStore>(
    session: &Session<S>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let entries = entries_in_period(session, from, to)?;
    let totals = category_summary(&entries);

    println!();
    println!("🏷️  Categories ({})", period_label(from, to));
    println!("   ─────────────────────────────────────────────────────────────");
    if totals.is_empty() {
        println!("   No entries in period.");
    }
    for total in totals {
        println!(
            "   {:<30} │ {:>12} │ {} entr(ies)",
            truncate(&total.category, 30),
            format_amount(total.direction, total.total),
            total.count
        );
    }
    Ok(())
}

pub fn cmd_report_cost_centers<S: LedgerStore>(
    session: &Session<S>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let entries = entries_in_period(session, from, to)?;
    let totals = cost_center_summary(&entries, &session.reference().default_cost_center);

    println!();
    println!("🏢 Cost centers ({})", period_label(from, to));
    println!("   ─────────────────────────────────────────────────────────────");
    for total in totals {
        println!(
            "   {:<30} │ {:>12} │ {} entr(ies)",
            truncate(&total.cost_center, 30),
            format_amount(total.direction, total.total),
            total.count
        );
    }
    Ok(())
}

pub fn cmd_report_member<S: LedgerStore>(
    session: &Session<S>,
    name: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let entries = entries_in_period(session, from, to)?;
    let history = member_history(&entries, name);

    println!();
    println!("👤 {} ({})", history.name, period_label(from, to));
    println!("   ─────────────────────────────────────────────────────────────");
    if history.entries.is_empty() {
        println!("   No entries for this member.");
        return Ok(());
    }
    for entry in &history.entries {
        println!(
            "   [{}] {} │ {:>12} │ {}",
            entry.id,
            entry.date.format("%d/%m/%Y"),
            format_amount(entry.direction, entry.amount),
            truncate(&entry.category, 30)
        );
    }
    println!();
    print_totals(&history.totals);
    Ok(())
}

/// Write receipt rows as CSV to `output`, or stdout
pub fn cmd_receipts<S: LedgerStore>(
    session: &Session<S>,
    ids: Option<&[i64]>,
    output: Option<&Path>,
) -> Result<()> {
    let entries = session.ledger()?;
    let rows = receipt_rows(&entries, ids);

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_receipt_rows_csv(file, &rows)?;
            println!("✅ Wrote {} receipt row(s) to {}", rows.len(), path.display());
        }
        None => write_receipt_rows_csv(io::stdout().lock(), &rows)?,
    }

    Ok(())
}
