//! Ledger, manual entry and member command implementations

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use treasury_core::{export::write_entries_csv, models::Member, LedgerStore, ManualEntry, Session};

use super::{format_amount, truncate};

pub fn cmd_ledger<S: LedgerStore>(session: &Session<S>, limit: usize) -> Result<()> {
    let entries = session.ledger()?;

    if entries.is_empty() {
        println!("No ledger entries yet. Import a statement with:");
        println!("  treasury import --file extrato.ofx");
        return Ok(());
    }

    println!();
    println!("📒 Ledger ({} entries)", entries.len());
    println!("   ─────────────────────────────────────────────────────────────");

    let skip = entries.len().saturating_sub(limit);
    for entry in &entries[skip..] {
        println!(
            "   [{}] {} │ {:>12} │ {:<20} │ {:<16} │ {}",
            entry.id,
            entry.date.format("%d/%m/%Y"),
            format_amount(entry.direction, entry.amount),
            truncate(&entry.category, 20),
            truncate(entry.counterparty.label(), 16),
            truncate(&entry.description, 30)
        );
    }

    Ok(())
}

/// Write every ledger entry as CSV
pub fn cmd_ledger_export<S: LedgerStore>(session: &Session<S>, output: &Path) -> Result<()> {
    let entries = session.ledger()?;
    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    write_entries_csv(file, &entries)?;
    println!("✅ Exported {} entries to {}", entries.len(), output.display());
    Ok(())
}

pub fn cmd_add<S: LedgerStore>(session: &mut Session<S>, entry: ManualEntry) -> Result<()> {
    let entry = session
        .record_manual(entry)
        .context("Failed to record entry")?;

    println!(
        "✅ Recorded entry {}: {} {} ({})",
        entry.id,
        entry.date.format("%d/%m/%Y"),
        format_amount(entry.direction, entry.amount),
        entry.category
    );
    Ok(())
}

pub fn cmd_members_list<S: LedgerStore>(session: &Session<S>) -> Result<()> {
    let members = session.members();

    if members.is_empty() {
        println!("No members registered. Add one with:");
        println!("  treasury members add \"Name\" --phone 5595900000000");
        return Ok(());
    }

    println!();
    println!("👥 Members ({})", members.len());
    println!("   ─────────────────────────────────────────────────────────────");
    for member in members {
        println!(
            "   {:<30} │ {:<15} │ {:<8} │ {}",
            truncate(&member.name, 30),
            member.phone,
            member.status,
            member.email.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

pub fn cmd_members_add<S: LedgerStore>(session: &mut Session<S>, member: Member) -> Result<()> {
    let name = member.name.clone();
    session.add_member(member).context("Failed to add member")?;
    println!("✅ Added member {}", name);
    Ok(())
}

/// Fields to change on an existing member
#[derive(Debug, Default)]
pub struct MemberChanges {
    pub rename: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
}

pub fn cmd_members_update<S: LedgerStore>(
    session: &mut Session<S>,
    name: &str,
    changes: MemberChanges,
) -> Result<()> {
    let mut member = session
        .reference()
        .find_member(name)
        .cloned()
        .with_context(|| format!("Member '{}' not found", name))?;

    if let Some(new_name) = changes.rename {
        member.name = new_name;
    }
    if let Some(phone) = changes.phone {
        member.phone = phone;
    }
    if let Some(email) = changes.email {
        member.email = if email.is_empty() { None } else { Some(email) };
    }
    if let Some(status) = changes.status {
        member.status = status;
    }

    let new_name = member.name.clone();
    session
        .update_member(name, member)
        .context("Failed to update member")?;
    if new_name == name {
        println!("✅ Updated member {}", name);
    } else {
        println!(
            "✅ Renamed member {} to {} (ledger entries keep the old name)",
            name, new_name
        );
    }
    Ok(())
}

pub fn cmd_members_remove<S: LedgerStore>(session: &mut Session<S>, name: &str) -> Result<()> {
    let member = session.remove_member(name).context("Failed to remove member")?;
    println!("🗑️  Removed member {} (ledger entries keep the name)", member.name);
    Ok(())
}
