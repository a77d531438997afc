//! Statement import command
//!
//! One invocation is one reconciliation run: the statement is staged, shown
//! (preview) or classified from `--assign` flags and committed.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use treasury_core::{
    Assignment, CommitSummary, ImportSettings, LedgerStore, ReconciliationRun, Session,
};

use super::{format_amount, truncate};

/// Parse `IDX=CATEGORY[:COUNTERPARTY]`
pub fn parse_assignment(arg: &str) -> Result<(usize, Assignment)> {
    let (index, choice) = arg
        .split_once('=')
        .with_context(|| {
            format!("Invalid assignment '{}' (use IDX=CATEGORY[:COUNTERPARTY])", arg)
        })?;
    let index: usize = index
        .trim()
        .parse()
        .with_context(|| format!("Invalid row index in '{}'", arg))?;

    let assignment = match choice.split_once(':') {
        Some((category, counterparty)) => {
            Assignment::category(category.trim()).with_counterparty(counterparty.trim())
        }
        None => Assignment::category(choice.trim()),
    };
    Ok((index, assignment))
}

/// Parse `IDX=COST_CENTER`
pub fn parse_cost_center(arg: &str) -> Result<(usize, String)> {
    let (index, cost_center) = arg
        .split_once('=')
        .with_context(|| format!("Invalid cost center '{}' (use IDX=COST_CENTER)", arg))?;
    let index: usize = index
        .trim()
        .parse()
        .with_context(|| format!("Invalid row index in '{}'", arg))?;
    Ok((index, cost_center.trim().to_string()))
}

/// Stage a statement, then either preview it or commit the given assignments
///
/// Returns the commit summary when something was committed.
#[allow(clippy::too_many_arguments)]
pub fn cmd_import<S: LedgerStore>(
    session: &mut Session<S>,
    file: &Path,
    account: Option<String>,
    year: Option<i32>,
    limit: Option<usize>,
    assign: &[String],
    cost_center: &[String],
) -> Result<Option<CommitSummary>> {
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", file.display()))?;

    println!("📂 Importing {}...", file.display());

    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let defaults = &session.reference().import;
    let settings = ImportSettings {
        review_limit: limit.unwrap_or(defaults.review_limit),
        assumed_year: year.or(defaults.assumed_year),
    };
    if settings.review_limit == 0 {
        bail!("--limit must be at least 1");
    }

    let mut run = session
        .stage_with(file_name, &bytes, account, &settings)
        .context("Failed to stage statement")?;

    if assign.is_empty() {
        if !cost_center.is_empty() {
            bail!("--cost-center needs at least one --assign");
        }
        print_preview(&run)?;
        return Ok(None);
    }

    let mut assignments: BTreeMap<usize, Assignment> = BTreeMap::new();
    for arg in assign {
        let (index, assignment) = parse_assignment(arg)?;
        if assignments.insert(index, assignment).is_some() {
            bail!("Row {} assigned more than once", index);
        }
    }
    for arg in cost_center {
        let (index, cc) = parse_cost_center(arg)?;
        let assignment = assignments
            .get_mut(&index)
            .with_context(|| format!("--cost-center for row {} which has no --assign", index))?;
        assignment.cost_center = Some(cc);
    }

    for (index, assignment) in assignments {
        run.assign(index, assignment)
            .with_context(|| format!("Cannot classify row {}", index))?;
    }

    print_skipped(&run);

    let summary = session.confirm(run).context("Failed to commit batch")?;
    print_summary(&summary);

    Ok(Some(summary))
}

fn print_preview(run: &ReconciliationRun) -> Result<()> {
    let sheet = run.sheet();

    println!();
    println!(
        "📋 Staged rows ({}, account: {})",
        run.format(),
        run.account.as_deref().unwrap_or("-")
    );
    if run.is_low_confidence() {
        println!("   ⚠️  Rows read from PDF text: check dates and amounts against the statement");
    }
    println!("   ─────────────────────────────────────────────────────────────");

    if sheet.is_empty() {
        println!("   No rows staged.");
    }

    for row in sheet.rows() {
        println!(
            "   [{}] {} │ {:>12} │ {}",
            row.index,
            row.staged.date.format("%d/%m/%Y"),
            format_amount(row.direction, row.staged.amount.abs()),
            truncate(&row.staged.description, 40)
        );
        println!(
            "        categories: {}",
            sheet.category_options(row.index)?.join(", ")
        );
    }

    if sheet.truncated() > 0 {
        println!(
            "   … {} more row(s) not shown (raise --limit to review them)",
            sheet.truncated()
        );
    }

    println!();
    println!("   Members: {}", sheet.counterparty_options().join(", "));
    println!("   Cost centers: {}", sheet.cost_center_options().join(", "));

    print_skipped(run);

    println!();
    println!("Commit with: treasury import --file <file> --assign IDX=CATEGORY[:MEMBER] ...");
    Ok(())
}

fn print_skipped(run: &ReconciliationRun) {
    let skipped = run.skipped();
    if skipped.is_empty() {
        return;
    }
    println!();
    println!("   ⚠️  {} line(s) skipped:", skipped.len());
    for skip in skipped {
        println!("      {}: {}", skip.location, skip.reason);
    }
}

fn print_summary(summary: &CommitSummary) {
    println!();
    println!("✅ Committed {} entr(ies)", summary.committed.len());
    if !summary.committed.is_empty() {
        let ids: Vec<String> = summary.committed_ids().iter().map(i64::to_string).collect();
        println!("   Ids: {}", ids.join(", "));
    }
    println!("   Ignored: {}", summary.ignored);
    if summary.possible_duplicates > 0 {
        println!(
            "   ⚠️  {} possible duplicate(s): the same movement from the same file is already in the ledger",
            summary.possible_duplicates
        );
    }
}
