//! CSV export of ledger entries and receipt rows
//!
//! The receipt CSV is what the document renderer consumes; column names follow
//! the organization's spreadsheets.

use std::io::Write;

use csv::Writer;

use crate::error::Result;
use crate::models::{Direction, LedgerEntry, ReceiptRow};

const RECEIPT_HEADERS: [&str; 7] = ["ID", "Data", "Categoria", "Descrição", "Valor", "Membro", "Conta"];

const ENTRY_HEADERS: [&str; 11] = [
    "ID",
    "Data",
    "Tipo",
    "Conta",
    "Categoria",
    "Centro_Custo",
    "Descrição",
    "Valor",
    "Membro",
    "Conciliado",
    "Fingerprint",
];

fn format_date(date: &chrono::NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Write receipt rows as CSV
pub fn write_receipt_rows_csv<W: Write>(writer: W, rows: &[ReceiptRow]) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(RECEIPT_HEADERS)?;

    for row in rows {
        wtr.write_record([
            row.id.to_string(),
            format_date(&row.date),
            row.category.clone(),
            row.description.clone(),
            format!("{:.2}", row.amount),
            row.counterparty.clone(),
            row.account.clone(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write ledger entries as CSV, direction spelled the way the treasurer reads it
pub fn write_entries_csv<W: Write>(writer: W, entries: &[LedgerEntry]) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(ENTRY_HEADERS)?;

    for entry in entries {
        let direction = match entry.direction {
            Direction::Credit => "Entrada",
            Direction::Debit => "Saída",
        };
        wtr.write_record([
            entry.id.to_string(),
            format_date(&entry.date),
            direction.to_string(),
            entry.account.clone().unwrap_or_default(),
            entry.category.clone(),
            entry.cost_center.clone().unwrap_or_default(),
            entry.description.clone(),
            format!("{:.2}", entry.amount),
            entry.counterparty.label().to_string(),
            entry.provenance.to_string(),
            entry.fingerprint.clone().unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
