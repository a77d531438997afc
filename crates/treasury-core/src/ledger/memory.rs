use std::collections::HashSet;

use super::LedgerStore;
use crate::error::Result;
use crate::models::{LedgerEntry, NewLedgerEntry};

/// Session-local ledger; gone when the session ends
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    entries: Vec<LedgerEntry>,
    fingerprints: HashSet<String>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedger {
    fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }

    fn append(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry> {
        let id = self.entries.len() as i64 + 1;
        if let Some(print) = &entry.fingerprint {
            self.fingerprints.insert(print.clone());
        }
        let entry = LedgerEntry::from_new(id, entry);
        self.entries.push(entry.clone());
        Ok(entry)
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>> {
        Ok(self.entries.clone())
    }

    fn get(&self, id: i64) -> Result<Option<LedgerEntry>> {
        Ok(self.entries.iter().find(|e| e.id == id).cloned())
    }

    fn contains_fingerprint(&self, fingerprint: &str) -> Result<bool> {
        Ok(self.fingerprints.contains(fingerprint))
    }
}
