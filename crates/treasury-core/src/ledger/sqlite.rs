use super::LedgerStore;
use crate::db::Database;
use crate::error::Result;
use crate::models::{LedgerEntry, Member, NewLedgerEntry};

/// Durable ledger on SQLite
///
/// Batches are appended in one database transaction.
#[derive(Clone)]
pub struct SqliteLedger {
    db: Database,
}

impl SqliteLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open (or create) the ledger database at `path`
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self::new(Database::new(path)?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl LedgerStore for SqliteLedger {
    fn len(&self) -> Result<usize> {
        Ok(self.db.count_entries()? as usize)
    }

    fn append(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry> {
        self.db.insert_entry(&entry)
    }

    fn append_batch(&mut self, entries: Vec<NewLedgerEntry>) -> Result<Vec<LedgerEntry>> {
        self.db.insert_entries(&entries)
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>> {
        self.db.list_entries()
    }

    fn get(&self, id: i64) -> Result<Option<LedgerEntry>> {
        self.db.get_entry(id)
    }

    fn contains_fingerprint(&self, fingerprint: &str) -> Result<bool> {
        self.db.fingerprint_exists(fingerprint)
    }

    fn load_members(&self) -> Result<Option<Vec<Member>>> {
        Ok(Some(self.db.list_members()?))
    }

    fn save_member(&mut self, member: &Member) -> Result<()> {
        self.db.upsert_member(member)
    }

    fn delete_member(&mut self, name: &str) -> Result<()> {
        self.db.delete_member(name)
    }

    fn update_member(&mut self, name: &str, member: &Member) -> Result<()> {
        if member.name == name {
            self.db.upsert_member(member)
        } else {
            self.db.rename_member(name, member)
        }
    }
}
