//! Ledger stores and the commit path
//!
//! - `memory` - `MemoryLedger`, the session-local store
//! - `sqlite` - `SqliteLedger`, backed by `Database`
//!
//! Both assign ids as `count + 1` at append time. Imports are never
//! deduplicated: re-importing a statement appends the same movements again.
//! Each imported entry does carry a fingerprint so possible duplicates can be
//! reported.

mod memory;
mod sqlite;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::ReferenceData;
use crate::error::{Error, Result};
use crate::models::{
    CategoryChoice, ClassifiedTransaction, Counterparty, Direction, LedgerEntry, Member,
    NewLedgerEntry, Provenance, StagedTransaction,
};

pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;

/// Append-only storage for ledger entries
pub trait LedgerStore {
    /// Number of committed entries
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Append one entry, assigning `id = len + 1`
    fn append(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry>;

    /// Append several entries in order; ids are consecutive
    fn append_batch(&mut self, entries: Vec<NewLedgerEntry>) -> Result<Vec<LedgerEntry>> {
        entries.into_iter().map(|entry| self.append(entry)).collect()
    }

    /// Every entry in id order
    fn entries(&self) -> Result<Vec<LedgerEntry>>;

    fn get(&self, id: i64) -> Result<Option<LedgerEntry>>;

    /// Whether an imported entry with this fingerprint exists
    fn contains_fingerprint(&self, fingerprint: &str) -> Result<bool>;

    /// Member list kept by the store, if it keeps one
    fn load_members(&self) -> Result<Option<Vec<Member>>> {
        Ok(None)
    }

    fn save_member(&mut self, _member: &Member) -> Result<()> {
        Ok(())
    }

    fn delete_member(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    /// Replace the member stored as `name`, possibly under a new name
    fn update_member(&mut self, _name: &str, _member: &Member) -> Result<()> {
        Ok(())
    }
}

/// Fingerprint of an imported movement: date, signed amount, description and
/// the hash of the file it came from
pub fn fingerprint(staged: &StagedTransaction, source_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(staged.date.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(staged.amount.normalize().to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(staged.description.as_bytes());
    hasher.update(b"|");
    hasher.update(source_hash.as_bytes());
    hex::encode(hasher.finalize())
}

/// Outcome of committing one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub committed: Vec<LedgerEntry>,
    /// Rows left as "Ignorar"
    pub ignored: usize,
    /// Committed rows whose fingerprint was already in the ledger
    pub possible_duplicates: usize,
}

impl CommitSummary {
    pub fn committed_ids(&self) -> Vec<i64> {
        self.committed.iter().map(|e| e.id).collect()
    }
}

/// Commit a classified batch
///
/// Rows classified as `Ignore` are dropped. Every other row is appended as an
/// `Auto` entry with the unsigned amount; categories and counterparties are
/// not re-checked against the current configuration.
pub fn commit_batch<S: LedgerStore + ?Sized>(
    store: &mut S,
    batch: Vec<ClassifiedTransaction>,
    source_hash: &str,
) -> Result<CommitSummary> {
    let mut ignored = 0;
    let mut possible_duplicates = 0;
    let mut pending = Vec::new();

    for row in batch {
        let CategoryChoice::Named(category) = row.category else {
            ignored += 1;
            continue;
        };

        let print = fingerprint(&row.staged, source_hash);
        if store.contains_fingerprint(&print)? {
            possible_duplicates += 1;
            debug!(
                date = %row.staged.date,
                amount = %row.staged.amount,
                "Possible duplicate import"
            );
        }

        pending.push(NewLedgerEntry {
            date: row.staged.date,
            direction: row.direction,
            account: row.account,
            category,
            cost_center: row.cost_center,
            description: row.staged.description,
            amount: row.staged.amount.abs(),
            counterparty: row.counterparty,
            provenance: Provenance::Auto,
            fingerprint: Some(print),
        });
    }

    let committed = if pending.is_empty() {
        Vec::new()
    } else {
        store.append_batch(pending)?
    };

    info!(
        committed = committed.len(),
        ignored,
        possible_duplicates,
        "Committed reconciliation batch"
    );

    Ok(CommitSummary {
        committed,
        ignored,
        possible_duplicates,
    })
}

/// A movement typed in by hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualEntry {
    pub date: NaiveDate,
    pub direction: Direction,
    pub category: String,
    /// Unsigned; must be positive
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub counterparty: Counterparty,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub cost_center: Option<String>,
}

/// Validate and append a manual entry
///
/// Unlike imports, manual entries are checked at entry time: the amount must
/// be positive and the category must belong to the direction's list.
pub fn record_manual<S: LedgerStore + ?Sized>(
    store: &mut S,
    reference: &ReferenceData,
    entry: ManualEntry,
) -> Result<LedgerEntry> {
    if entry.amount <= Decimal::ZERO {
        return Err(Error::InvalidData(format!(
            "amount must be positive, got {}",
            entry.amount
        )));
    }
    if !reference.is_category(entry.direction, &entry.category) {
        return Err(Error::InvalidData(format!(
            "'{}' is not a {} category",
            entry.category, entry.direction
        )));
    }
    if let Some(account) = &entry.account {
        if !reference.accounts.contains(account) {
            return Err(Error::InvalidData(format!("unknown account '{}'", account)));
        }
    }
    if let Some(cost_center) = &entry.cost_center {
        if !reference.cost_centers.contains(cost_center) {
            return Err(Error::InvalidData(format!(
                "unknown cost center '{}'",
                cost_center
            )));
        }
    }

    let appended = store.append(NewLedgerEntry {
        date: entry.date,
        direction: entry.direction,
        account: entry.account,
        category: entry.category,
        cost_center: entry
            .cost_center
            .or_else(|| Some(reference.default_cost_center.clone())),
        description: entry.description,
        amount: entry.amount,
        counterparty: entry.counterparty,
        provenance: Provenance::Manual,
        fingerprint: None,
    })?;

    info!(id = appended.id, direction = %appended.direction, "Recorded manual entry");
    Ok(appended)
}
