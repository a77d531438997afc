//! CSV and XLSX statements
//!
//! Rows are loaded without checking the schema. The `Data`, `Valor` and
//! `Descrição` columns are only looked up when a row is turned into a staged
//! transaction, so a file with the wrong columns loads fine and fails later.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::str::FromStr;

use calamine::{Data, Reader, Xlsx};
use chrono::{Days, NaiveDate};
use csv::ReaderBuilder;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::StagedTransaction;

pub const DATE_COLUMN: &str = "Data";
pub const AMOUNT_COLUMN: &str = "Valor";
pub const DESCRIPTION_COLUMN: &str = "Descrição";

/// One spreadsheet cell, as loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    fn from_text(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }

    fn as_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Date(d) => d.format("%d/%m/%Y").to_string(),
        }
    }
}

/// A CSV/XLSX row keyed by header name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularRow {
    /// 1-based row number in the source, counting the header
    pub row: usize,
    pub values: BTreeMap<String, Cell>,
}

/// Header match that ignores case and the cedilla/tilde in "Descrição"
fn column_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace('ç', "c")
        .replace('ã', "a")
}

impl TabularRow {
    pub fn get(&self, column: &str) -> Option<&Cell> {
        let wanted = column_key(column);
        self.values
            .iter()
            .find(|(name, _)| column_key(name) == wanted)
            .map(|(_, cell)| cell)
    }

    fn require(&self, column: &str) -> Result<&Cell> {
        self.get(column)
            .ok_or_else(|| Error::MissingColumn(column.to_string()))
    }

    /// Read the expected columns and type the row
    pub fn to_staged(&self) -> Result<StagedTransaction> {
        let date_cell = self.require(DATE_COLUMN)?;
        let amount_cell = self.require(AMOUNT_COLUMN)?;
        let description_cell = self.require(DESCRIPTION_COLUMN)?;

        let date = match date_cell {
            Cell::Date(d) => Some(*d),
            Cell::Text(s) => parse_date(s),
            Cell::Number(n) => excel_serial_to_date(*n),
            Cell::Empty => None,
        }
        .ok_or_else(|| {
            Error::InvalidData(format!(
                "row {}: invalid date '{}'",
                self.row,
                date_cell.as_text()
            ))
        })?;

        let amount = match amount_cell {
            Cell::Number(n) => Decimal::from_f64(*n),
            Cell::Text(s) => parse_amount(s),
            _ => None,
        }
        .ok_or_else(|| {
            Error::InvalidData(format!(
                "row {}: invalid amount '{}'",
                self.row,
                amount_cell.as_text()
            ))
        })?;

        Ok(StagedTransaction {
            date,
            description: description_cell.as_text(),
            amount,
        })
    }
}

/// Parse a statement date: `DD/MM/YYYY`, `DD/MM/YY`, `YYYY-MM-DD` or `DD-MM-YYYY`.
/// A trailing time component is ignored.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let date_part = s.split(|c: char| c == ' ' || c == 'T').next().unwrap_or(s);

    // %Y happily reads "24" as year 24, so short years are routed first
    if let Some((_, year)) = date_part.rsplit_once('/') {
        if year.len() == 2 {
            return NaiveDate::parse_from_str(date_part, "%d/%m/%y").ok();
        }
    }

    ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Parse an amount written either way round: `1.234,56`, `1234,56`, `1234.56`.
/// Accepts an `R$` prefix and accounting parentheses for negatives.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let mut cleaned: String = s
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let negative = cleaned.starts_with('(') && cleaned.ends_with(')');
    if negative {
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }
    let cleaned = cleaned.trim_start_matches("R$");
    if cleaned.is_empty() {
        return None;
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    let normalized = match (last_comma, last_dot) {
        // Comma is the decimal separator
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), None) => cleaned.replace(',', "."),
        // Dot is the decimal separator
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        _ => cleaned.to_string(),
    };

    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

/// Excel serial day (1900 date system) to a date
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    // `as` saturates, and out-of-range day counts come back as `None`
    base.checked_add_days(Days::new(serial.floor() as u64))
}

fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}

/// Brazilian exports often use `;` because `,` is the decimal separator
fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}

/// Load a CSV statement, one `TabularRow` per record
pub fn read_csv(bytes: &[u8]) -> Result<Vec<TabularRow>> {
    let text = decode_text(bytes);
    let delimiter = detect_delimiter(&text);

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let record = result?;
        let values = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cell = record.get(i).map(Cell::from_text).unwrap_or(Cell::Empty);
                (header.clone(), cell)
            })
            .collect();
        rows.push(TabularRow {
            row: index + 2,
            values,
        });
    }

    debug!(
        rows = rows.len(),
        delimiter = %(delimiter as char),
        "Loaded CSV statement"
    );
    Ok(rows)
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::from_text(s),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(Cell::Date)
            .unwrap_or(Cell::Number(dt.as_f64())),
        Data::DateTimeIso(s) => parse_date(s)
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::from_text(s)),
        Data::DurationIso(s) => Cell::from_text(s),
        Data::Error(e) => Cell::Text(format!("#{:?}", e)),
    }
}

/// Load the first worksheet of an XLSX statement
pub fn read_xlsx(bytes: &[u8]) -> Result<Vec<TabularRow>> {
    let mut workbook =
        Xlsx::new(Cursor::new(bytes.to_vec())).map_err(calamine::Error::from)?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::InvalidData("workbook has no sheets".into()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(calamine::Error::from)?;

    let (start_row, _) = range.start().unwrap_or((0, 0));
    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| data_to_cell(cell).as_text())
        .collect();

    let mut rows = Vec::new();
    for (index, cells) in sheet_rows.enumerate() {
        if cells.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let values = headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !header.is_empty())
            .map(|(i, header)| {
                let cell = cells.get(i).map(data_to_cell).unwrap_or(Cell::Empty);
                (header.clone(), cell)
            })
            .collect();
        rows.push(TabularRow {
            row: start_row as usize + index + 2,
            values,
        });
    }

    debug!(sheet = %sheet_name, rows = rows.len(), "Loaded XLSX statement");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_csv_comma() {
        let csv = "Data,Descrição,Valor\n15/03/2024,Pix Recebido,100.00\n16/03/2024,Energia,-40.00\n";
        let rows = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);

        let tx = rows[1].to_staged().unwrap();
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2024, 3, 16).unwrap());
        assert_eq!(tx.description, "Energia");
        assert_eq!(tx.amount, Decimal::new(-4000, 2));
    }

    #[test]
    fn test_read_csv_semicolon_and_decimal_comma() {
        let csv = "Data;Descrição;Valor\n15/03/2024;Bazar;1.234,56\n";
        let rows = read_csv(csv.as_bytes()).unwrap();
        let tx = rows[0].to_staged().unwrap();
        assert_eq!(tx.amount, Decimal::new(123456, 2));
        assert_eq!(tx.description, "Bazar");
    }

    #[test]
    fn test_read_csv_latin1_header() {
        // "Descrição" in Windows-1252
        let mut bytes = b"Data;Descri\xE7\xE3o;Valor\n".to_vec();
        bytes.extend_from_slice(b"01/02/2024;Cantina;25,00\n");
        let rows = read_csv(&bytes).unwrap();
        let tx = rows[0].to_staged().unwrap();
        assert_eq!(tx.description, "Cantina");
    }

    #[test]
    fn test_unaccented_description_header() {
        let csv = "data,descricao,valor\n2024-03-15,Livros,30\n";
        let rows = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].to_staged().unwrap().description, "Livros");
    }

    #[test]
    fn test_missing_column_fails_on_read() {
        let csv = "Date,Description,Amount\n2024-03-15,Livros,30\n";
        let rows = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(matches!(rows[0].to_staged(), Err(Error::MissingColumn(c)) if c == "Data"));
    }

    #[test]
    fn test_invalid_amount_names_the_row() {
        let csv = "Data,Descrição,Valor\n15/03/2024,Pix,abc\n";
        let rows = read_csv(csv.as_bytes()).unwrap();
        match rows[0].to_staged() {
            Err(Error::InvalidData(msg)) => assert!(msg.contains("row 2")),
            other => panic!("expected InvalidData, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15);
        assert_eq!(parse_date("15/03/2024"), expected);
        assert_eq!(parse_date("15/03/24"), expected);
        assert_eq!(parse_date("2024-03-15"), expected);
        assert_eq!(parse_date("15-03-2024"), expected);
        assert_eq!(parse_date("2024-03-15 00:00:00"), expected);
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("ontem"), None);
    }

    #[test]
    fn test_parse_amount_formats() {
        assert_eq!(parse_amount("1.234,56"), Some(Decimal::new(123456, 2)));
        assert_eq!(parse_amount("1234,56"), Some(Decimal::new(123456, 2)));
        assert_eq!(parse_amount("1234.56"), Some(Decimal::new(123456, 2)));
        assert_eq!(parse_amount("1,234.56"), Some(Decimal::new(123456, 2)));
        assert_eq!(parse_amount("R$ 50,00"), Some(Decimal::new(5000, 2)));
        assert_eq!(parse_amount("-40"), Some(Decimal::new(-40, 0)));
        assert_eq!(parse_amount("(40,00)"), Some(Decimal::new(-4000, 2)));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_excel_serial_dates() {
        assert_eq!(
            excel_serial_to_date(45366.0),
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
        assert_eq!(excel_serial_to_date(0.0), None);
    }

    #[test]
    fn test_serial_out_of_range_is_an_invalid_row() {
        assert_eq!(excel_serial_to_date(1e20), None);
        assert_eq!(excel_serial_to_date(f64::MAX), None);

        let row = TabularRow {
            row: 7,
            values: BTreeMap::from([
                ("Data".to_string(), Cell::Number(1e20)),
                ("Valor".to_string(), Cell::Number(10.0)),
                ("Descrição".to_string(), Cell::Text("Bazar".into())),
            ]),
        };
        let err = row.to_staged().unwrap_err();
        assert!(
            matches!(err, Error::InvalidData(ref msg) if msg.starts_with("row 7: invalid date"))
        );
    }

    #[test]
    fn test_read_xlsx_statement() {
        let rows = read_xlsx(include_bytes!("../../tests/fixtures/extrato.xlsx")).unwrap();

        // Header on sheet row 2, blank sheet row 5 dropped
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().map(|r| r.row).collect::<Vec<_>>(), vec![3, 4, 6]);

        // Date-formatted cell
        let march_15 = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(rows[0].get("Data"), Some(&Cell::Date(march_15)));
        let first = rows[0].to_staged().unwrap();
        assert_eq!(first.description, "PIX RECEBIDO JOEL");
        assert_eq!(first.amount, Decimal::new(1505, 1));

        // Text date
        let second = rows[1].to_staged().unwrap();
        assert_eq!(second.date, NaiveDate::from_ymd_opt(2024, 3, 16).unwrap());
        assert_eq!(second.amount, Decimal::new(-5, 0));

        // Text amount with decimal comma
        let third = rows[2].to_staged().unwrap();
        assert_eq!(third.date, NaiveDate::from_ymd_opt(2024, 3, 17).unwrap());
        assert_eq!(third.amount, Decimal::new(-4000, 2));
    }

    #[test]
    fn test_read_xlsx_missing_column_fails_per_row() {
        let rows =
            read_xlsx(include_bytes!("../../tests/fixtures/extrato_sem_descricao.xlsx")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row, 2);
        assert!(matches!(
            rows[0].to_staged(),
            Err(Error::MissingColumn(ref c)) if c == "Descrição"
        ));
    }

    #[test]
    fn test_read_xlsx_rejects_garbage() {
        assert!(read_xlsx(b"definitely not a zip").is_err());
    }
}
