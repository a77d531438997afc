//! Text-layout PDF statements
//!
//! Best-effort: each line of page text is matched against
//! `DD/MM <description> <amount>`. Statement lines carry no year, so the caller
//! supplies one (see `IngestOptions::assumed_year`). Rows from this parser are
//! lower confidence than OFX or spreadsheet rows.

use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use lopdf::Document;
use pdf_extract::PlainTextOutput;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::SkippedRow;
use crate::error::{Error, Result};
use crate::models::StagedTransaction;

fn line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\d{2}/\d{2})\s+(.+?)\s+(-?[\d.,]+)\s*$").expect("statement line regex")
    })
}

/// Something that yields the text of a PDF, one page at a time
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Extract the text of page `index` (0-based)
    fn page_text(&self, index: usize) -> Result<String>;
}

/// A PDF loaded from memory
///
/// The document is parsed once by `lopdf`; `pdf-extract` renders the text of
/// one page per `page_text` call, so a broken page does not hide the others.
pub struct PdfDocument {
    document: std::result::Result<Document, String>,
    pages: Vec<u32>,
}

impl PdfDocument {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match load_document(bytes) {
            Ok(document) => {
                let pages = document.get_pages().keys().copied().collect();
                Self {
                    document: Ok(document),
                    pages,
                }
            }
            Err(e) => {
                warn!(error = %e, "PDF could not be loaded");
                Self {
                    document: Err(e),
                    pages: Vec::new(),
                }
            }
        }
    }
}

fn load_document(bytes: &[u8]) -> std::result::Result<Document, String> {
    let mut document = Document::load_mem(bytes).map_err(|e| e.to_string())?;
    if document.is_encrypted() {
        // Bank exports are sometimes encrypted with an empty user password
        document
            .decrypt("")
            .map_err(|e| format!("encrypted document: {}", e))?;
    }
    Ok(document)
}

impl PageSource for PdfDocument {
    fn page_count(&self) -> usize {
        match &self.document {
            Ok(_) => self.pages.len(),
            // Surface the failure as the first page
            Err(_) => 1,
        }
    }

    fn page_text(&self, index: usize) -> Result<String> {
        let document = self.document.as_ref().map_err(|e| Error::Pdf(e.clone()))?;
        let page_num = *self
            .pages
            .get(index)
            .ok_or_else(|| Error::Pdf(format!("page {} out of range", index + 1)))?;

        let mut text = String::new();
        // pdf-extract panics on some malformed page trees (missing MediaBox)
        let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut output = PlainTextOutput::new(&mut text);
            pdf_extract::output_doc_page(document, &mut output, page_num)
        }));
        match extracted {
            Ok(Ok(())) => Ok(text),
            Ok(Err(e)) => Err(Error::Pdf(e.to_string())),
            Err(_) => Err(Error::Pdf(format!("page {} could not be rendered", page_num))),
        }
    }
}

/// Convert a Brazilian-format amount (`1.234,56`, `-40,00`) to a decimal
fn parse_statement_amount(raw: &str) -> Option<Decimal> {
    let cleaned = raw.replace('.', "").replace(',', ".");
    Decimal::from_str(&cleaned).ok()
}

/// Parse one line of statement text
///
/// Returns `Ok(None)` for lines that are not transactions at all, and an error
/// reason for lines that look like transactions but carry an impossible date or
/// an unreadable amount.
pub fn parse_statement_line(
    line: &str,
    year: i32,
) -> std::result::Result<Option<StagedTransaction>, String> {
    let Some(caps) = line_re().captures(line) else {
        return Ok(None);
    };

    let day_month = &caps[1];
    let description = caps[2].trim().to_string();
    let amount_text = &caps[3];

    let date = NaiveDate::parse_from_str(&format!("{}/{}", day_month, year), "%d/%m/%Y")
        .map_err(|_| format!("invalid date {}/{}", day_month, year))?;
    let amount = parse_statement_amount(amount_text)
        .ok_or_else(|| format!("invalid amount {}", amount_text))?;

    Ok(Some(StagedTransaction {
        date,
        description,
        amount,
    }))
}

/// Parse already-extracted page texts
pub fn parse_pdf_pages<S: AsRef<str>>(
    pages: &[S],
    year: i32,
) -> (Vec<StagedTransaction>, Vec<SkippedRow>) {
    let mut transactions = Vec::new();
    let mut skipped = Vec::new();
    for (index, text) in pages.iter().enumerate() {
        parse_page(index, text.as_ref(), year, &mut transactions, &mut skipped);
    }
    (transactions, skipped)
}

fn parse_page(
    index: usize,
    text: &str,
    year: i32,
    transactions: &mut Vec<StagedTransaction>,
    skipped: &mut Vec<SkippedRow>,
) {
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let location = format!("page {}, line {}", index + 1, line_no + 1);
        match parse_statement_line(line, year) {
            Ok(Some(tx)) => transactions.push(tx),
            Ok(None) => skipped.push(SkippedRow::new(location, "no date/amount pattern")),
            Err(reason) => skipped.push(SkippedRow::new(location, reason)),
        }
    }
}

/// Parse every page of a PDF statement
///
/// A page that fails to extract stops the walk; transactions from earlier
/// pages are kept and the failure is reported as a skipped row.
pub fn parse_pdf_statement(
    source: &impl PageSource,
    year: i32,
) -> (Vec<StagedTransaction>, Vec<SkippedRow>) {
    let mut transactions = Vec::new();
    let mut skipped = Vec::new();

    for index in 0..source.page_count() {
        match source.page_text(index) {
            Ok(text) => parse_page(index, &text, year, &mut transactions, &mut skipped),
            Err(e) => {
                warn!(page = index + 1, error = %e, "Stopping PDF ingestion at unreadable page");
                skipped.push(SkippedRow::new(
                    format!("page {}", index + 1),
                    format!("text extraction failed: {}", e),
                ));
                break;
            }
        }
    }

    debug!(
        pages = source.page_count(),
        transactions = transactions.len(),
        "Parsed PDF statement"
    );
    (transactions, skipped)
}
