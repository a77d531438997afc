//! Treasury Core Library
//!
//! Shared functionality for the treasury bookkeeping tool:
//! - Statement ingestion for OFX, text-layout PDF, CSV and XLSX exports
//! - Classification of staged bank movements against configured categories
//! - Ledger commit with pluggable stores (in-memory and SQLite)
//! - Reference data (categories, cost centers, accounts, members) from TOML
//! - Reports and receipt rows for the PDF-rendering collaborators

pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod ingest;
pub mod ledger;
pub mod models;
pub mod reports;
pub mod session;

pub use classify::{Assignment, ClassificationSheet, SheetRow};
pub use config::{ImportSettings, ReferenceData};
pub use db::Database;
pub use error::{Error, Result};
pub use ingest::{ingest, IngestOptions, IngestReport, SkippedRow, StagedRow, StatementFormat};
pub use ledger::{
    commit_batch, record_manual, CommitSummary, LedgerStore, ManualEntry, MemoryLedger,
    SqliteLedger,
};
pub use session::{ReconciliationRun, Session};
