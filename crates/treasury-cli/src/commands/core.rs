//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_reference` - Reference data from the resolved config file
//! - `open_session` - Session over the SQLite ledger
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use treasury_core::{Database, ReferenceData, Session, SqliteLedger};

pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

pub fn load_reference(config: Option<&Path>) -> Result<ReferenceData> {
    ReferenceData::load_resolved(config).context("Failed to load reference data")
}

pub fn open_session(db_path: &Path, config: Option<&Path>) -> Result<Session<SqliteLedger>> {
    let db = open_db(db_path)?;
    let reference = load_reference(config)?;
    debug!(db = %db_path.display(), accounts = reference.accounts.len(), "Opening session");
    Session::new(SqliteLedger::new(db), reference).context("Failed to start session")
}

pub fn cmd_init(db_path: &Path, config: Option<&Path>) -> Result<()> {
    println!("🔧 Initializing ledger at {}...", db_path.display());

    let session = open_session(db_path, config)?;
    let reference = session.reference();

    println!("   Accounts: {}", reference.accounts.join(", "));
    println!(
        "   Categories: {} credit, {} debit",
        reference.credit_categories.len(),
        reference.debit_categories.len()
    );
    println!("   Members: {}", session.members().len());

    println!("✅ Ledger initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Preview a statement: treasury import --file extrato.ofx");
    println!("  2. Classify and commit: treasury import --file extrato.ofx --assign 0=Mensalidade");
    println!("  3. Start web UI: treasury serve");

    Ok(())
}
