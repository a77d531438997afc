//! Ledger entry operations

use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension};
use rust_decimal::Decimal;

use super::Database;
use crate::error::Result;
use crate::models::{Counterparty, LedgerEntry, NewLedgerEntry};

const ENTRY_COLUMNS: &str = "id, date, direction, account, category, cost_center, description,
                             amount, counterparty, provenance, fingerprint";

fn conversion_error(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, message.into())
}

fn insert_entry_on(conn: &rusqlite::Connection, entry: &NewLedgerEntry) -> Result<LedgerEntry> {
    // Ids are count + 1, re-read for every append
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM ledger_entries", [], |row| row.get(0))?;
    let id = count + 1;

    let counterparty = match &entry.counterparty {
        Counterparty::Unidentified => None,
        Counterparty::Named(name) => Some(name.as_str()),
    };

    conn.execute(
        r#"
        INSERT INTO ledger_entries (id, date, direction, account, category, cost_center, description, amount, counterparty, provenance, fingerprint)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            id,
            entry.date.to_string(),
            entry.direction.as_str(),
            entry.account,
            entry.category,
            entry.cost_center,
            entry.description,
            entry.amount.to_string(),
            counterparty,
            entry.provenance.as_str(),
            entry.fingerprint,
        ],
    )?;

    Ok(LedgerEntry::from_new(id, entry.clone()))
}

impl Database {
    /// Append one entry
    pub fn insert_entry(&self, entry: &NewLedgerEntry) -> Result<LedgerEntry> {
        let conn = self.conn()?;
        insert_entry_on(&conn, entry)
    }

    /// Append a batch inside one transaction; either all entries land or none
    pub fn insert_entries(&self, entries: &[NewLedgerEntry]) -> Result<Vec<LedgerEntry>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut inserted = Vec::with_capacity(entries.len());
        for entry in entries {
            inserted.push(insert_entry_on(&tx, entry)?);
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Helper to convert a row to LedgerEntry
    /// Column order: id, date, direction, account, category, cost_center, description,
    ///               amount, counterparty, provenance, fingerprint
    pub(crate) fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<LedgerEntry> {
        let date_str: String = row.get(1)?;
        let direction_str: String = row.get(2)?;
        let amount_str: String = row.get(7)?;
        let counterparty: Option<String> = row.get(8)?;
        let provenance_str: String = row.get(9)?;

        Ok(LedgerEntry {
            id: row.get(0)?,
            date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                .map_err(|e| conversion_error(1, e.to_string()))?,
            direction: direction_str.parse().map_err(|e| conversion_error(2, e))?,
            account: row.get(3)?,
            category: row.get(4)?,
            cost_center: row.get(5)?,
            description: row.get(6)?,
            amount: Decimal::from_str(&amount_str)
                .map_err(|e| conversion_error(7, e.to_string()))?,
            counterparty: Counterparty::from_label(counterparty.as_deref().unwrap_or_default()),
            provenance: provenance_str.parse().map_err(|e| conversion_error(9, e))?,
            fingerprint: row.get(10)?,
        })
    }

    /// Count ledger entries
    pub fn count_entries(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM ledger_entries", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All entries in id order
    pub fn list_entries(&self) -> Result<Vec<LedgerEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ledger_entries ORDER BY id",
            ENTRY_COLUMNS
        ))?;

        let entries = stmt
            .query_map([], |row| Self::row_to_entry(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Get a single entry by id
    pub fn get_entry(&self, id: i64) -> Result<Option<LedgerEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ledger_entries WHERE id = ?",
            ENTRY_COLUMNS
        ))?;

        let entry = stmt
            .query_row(params![id], |row| Self::row_to_entry(row))
            .optional()?;
        Ok(entry)
    }

    /// Whether an imported entry with this fingerprint already exists
    pub fn fingerprint_exists(&self, fingerprint: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM ledger_entries WHERE fingerprint = ? LIMIT 1",
                params![fingerprint],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
