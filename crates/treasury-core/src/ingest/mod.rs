//! Statement ingestion
//!
//! Turns one uploaded statement file into staged transactions. Formats differ in
//! how much they validate:
//! - `ofx` - structured; malformed XML fails the whole file
//! - `pdf` - text-layout heuristic; unmatched lines are skipped with a diagnostic
//! - `tabular` - CSV/XLSX rows loaded as-is; columns are checked only when read

mod ofx;
mod pdf;
mod tabular;

use std::path::Path;

use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::StagedTransaction;

pub use ofx::parse_ofx;
pub use pdf::{parse_pdf_pages, parse_pdf_statement, parse_statement_line, PageSource, PdfDocument};
pub use tabular::{parse_amount, parse_date, read_csv, read_xlsx, Cell, TabularRow};

/// Statement file formats, detected from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementFormat {
    Ofx,
    Pdf,
    Xlsx,
    Csv,
}

impl StatementFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ofx => "ofx",
            Self::Pdf => "pdf",
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }

    /// Detect the format from a file name's extension (no content sniffing)
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
        ext.parse().map_err(Error::UnsupportedFormat)
    }

    /// Whether rows from this format should be treated as lower confidence
    pub fn is_heuristic(&self) -> bool {
        matches!(self, Self::Pdf)
    }
}

impl std::str::FromStr for StatementFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ofx" => Ok(Self::Ofx),
            "pdf" => Ok(Self::Pdf),
            "xlsx" => Ok(Self::Xlsx),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("Unknown statement format: {}", s)),
        }
    }
}

impl std::fmt::Display for StatementFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options that affect how statements are read
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Year given to PDF lines, which only carry day and month.
    /// `None` uses the current calendar year, which is wrong for statements
    /// that cross a year boundary.
    pub assumed_year: Option<i32>,
}

impl IngestOptions {
    pub fn with_year(year: i32) -> Self {
        Self {
            assumed_year: Some(year),
        }
    }

    pub fn year(&self) -> i32 {
        self.assumed_year.unwrap_or_else(|| Local::now().year())
    }
}

/// A source row that was dropped, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// Where the row came from, e.g. "page 2, line 14" or "transaction 3"
    pub location: String,
    pub reason: String,
}

impl SkippedRow {
    pub fn new(location: impl Into<String>, reason: impl Into<String>) -> Self {
        let skipped = Self {
            location: location.into(),
            reason: reason.into(),
        };
        debug!(location = %skipped.location, reason = %skipped.reason, "Skipped statement row");
        skipped
    }
}

/// One row produced by ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StagedRow {
    /// Already typed (OFX, PDF)
    Parsed(StagedTransaction),
    /// Loaded without schema validation (CSV, XLSX)
    Tabular(TabularRow),
}

impl StagedRow {
    /// Type the row, reading the expected columns for tabular rows
    pub fn to_staged(&self) -> Result<StagedTransaction> {
        match self {
            Self::Parsed(tx) => Ok(tx.clone()),
            Self::Tabular(row) => row.to_staged(),
        }
    }

    /// Source location for diagnostics; `position` is the 0-based row index
    /// within the report
    pub fn location(&self, position: usize) -> String {
        match self {
            Self::Parsed(_) => format!("row {}", position + 1),
            Self::Tabular(row) => format!("row {}", row.row),
        }
    }
}

/// Result of ingesting one statement file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub format: StatementFormat,
    pub rows: Vec<StagedRow>,
    pub skipped: Vec<SkippedRow>,
    /// SHA-256 of the uploaded bytes
    pub source_hash: String,
}

impl IngestReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Hash the raw statement bytes
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Ingest one statement file of the given format
///
/// Only whole-file structural failures are returned as errors; row-level
/// problems end up in `IngestReport::skipped`.
pub fn ingest(
    format: StatementFormat,
    bytes: &[u8],
    options: &IngestOptions,
) -> Result<IngestReport> {
    let source_hash = hash_bytes(bytes);

    let (rows, skipped): (Vec<StagedRow>, Vec<SkippedRow>) = match format {
        StatementFormat::Ofx => {
            let (transactions, skipped) = parse_ofx(bytes).inspect_err(|e| {
                warn!(error = %e, "OFX statement rejected");
            })?;
            (transactions.into_iter().map(StagedRow::Parsed).collect(), skipped)
        }
        StatementFormat::Pdf => {
            let document = PdfDocument::from_bytes(bytes);
            let (transactions, skipped) = parse_pdf_statement(&document, options.year());
            (transactions.into_iter().map(StagedRow::Parsed).collect(), skipped)
        }
        StatementFormat::Csv => {
            let rows = read_csv(bytes)?;
            (rows.into_iter().map(StagedRow::Tabular).collect(), Vec::new())
        }
        StatementFormat::Xlsx => {
            let rows = read_xlsx(bytes)?;
            (rows.into_iter().map(StagedRow::Tabular).collect(), Vec::new())
        }
    };

    debug!(
        format = %format,
        rows = rows.len(),
        skipped = skipped.len(),
        "Ingested statement"
    );

    Ok(IngestReport {
        format,
        rows,
        skipped,
        source_hash,
    })
}

/// Ingest a statement from disk, detecting the format from its extension
pub fn ingest_file(path: impl AsRef<Path>, options: &IngestOptions) -> Result<IngestReport> {
    let path = path.as_ref();
    let format = StatementFormat::from_path(path)?;
    let bytes = std::fs::read(path)?;
    ingest(format, &bytes, options)
}
