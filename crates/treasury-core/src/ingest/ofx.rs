//! OFX statement parser
//!
//! Accepts both SGML (OFX 1.x) and XML (OFX 2.x) exports. SGML is normalized into
//! well-formed XML first: the header block is dropped, leaf elements are closed
//! and stray ampersands are escaped. Exports that omit the ledger balance get a
//! zero-balance placeholder so the structural check below still passes.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use tracing::debug;

use super::SkippedRow;
use crate::error::{Error, Result};
use crate::models::StagedTransaction;

/// Placeholder inserted when an export has no `<LEDGERBAL>` section
const LEDGER_BALANCE_PLACEHOLDER: &str =
    "<LEDGERBAL><BALAMT>0</BALAMT><DTASOF>20240101000000</DTASOF></LEDGERBAL>";

fn leaf_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([A-Za-z0-9.]+)>([^<]*)").expect("leaf regex"))
}

fn ampersand_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&(#[0-9]+;|#x[0-9A-Fa-f]+;|[A-Za-z]+;)?").expect("ampersand regex")
    })
}

/// Decode raw bytes, falling back to Windows-1252 (a superset of Latin-1)
fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}

/// Close SGML leaf elements (`<TRNAMT>-40.00` becomes `<TRNAMT>-40.00</TRNAMT>`)
fn close_leaf_elements(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + body.len() / 4);
    let mut last = 0;

    for caps in leaf_re().captures_iter(body) {
        let (Some(whole), Some(tag), Some(text)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let end = whole.end();
        out.push_str(&body[last..end]);
        last = end;

        if text.as_str().trim().is_empty() {
            continue;
        }
        let closing = format!("</{}>", tag.as_str());
        if !body[end..].starts_with(&closing) {
            out.push_str(&closing);
        }
    }

    out.push_str(&body[last..]);
    out
}

/// Escape ampersands that do not start an entity or character reference
fn escape_stray_ampersands(body: &str) -> String {
    ampersand_re()
        .replace_all(body, |caps: &Captures| match caps.get(1) {
            Some(reference) => format!("&{}", reference.as_str()),
            None => "&amp;".to_string(),
        })
        .into_owned()
}

/// Insert a zero ledger balance if the export has none
fn ensure_ledger_balance(doc: String) -> String {
    if doc.contains("<LEDGERBAL>") {
        return doc;
    }
    if doc.contains("</STMTRS>") {
        debug!("OFX has no LEDGERBAL; inserting placeholder before </STMTRS>");
        doc.replace(
            "</STMTRS>",
            &format!("{}</STMTRS>", LEDGER_BALANCE_PLACEHOLDER),
        )
    } else if doc.contains("</BANKTRANLIST>") {
        debug!("OFX has no LEDGERBAL; inserting placeholder after </BANKTRANLIST>");
        doc.replace(
            "</BANKTRANLIST>",
            &format!("</BANKTRANLIST>{}", LEDGER_BALANCE_PLACEHOLDER),
        )
    } else {
        doc
    }
}

/// Turn raw OFX bytes into a well-formed XML document rooted at `<OFX>`
pub(crate) fn normalize(bytes: &[u8]) -> Result<String> {
    let text = decode(bytes);
    let start = text
        .find("<OFX>")
        .ok_or_else(|| Error::Ofx("no <OFX> root element".into()))?;
    let body = &text[start..];

    let body = close_leaf_elements(body);
    let body = escape_stray_ampersands(&body);
    Ok(ensure_ledger_balance(body))
}

/// OFX dates look like `20240315`, `20240315120000` or `20240315120000[-3:BRT]`
fn parse_ofx_date(s: &str) -> Option<NaiveDate> {
    let digits = s.trim().get(..8)?;
    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

fn parse_ofx_amount(s: &str) -> Option<Decimal> {
    let cleaned = s.trim().replace(',', ".");
    Decimal::from_str(&cleaned).ok()
}

fn resolve_reference(name: &[u8]) -> Option<char> {
    match name {
        b"amp" => Some('&'),
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        _ => {
            let name = std::str::from_utf8(name).ok()?;
            let code = if let Some(hex) = name.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

/// A collected field, `None` when it is missing or blank
fn trimmed(field: Option<String>) -> Option<String> {
    field
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Fields collected while inside one `<STMTTRN>`
#[derive(Default)]
struct TransactionFields {
    posted: Option<String>,
    amount: Option<String>,
    memo: Option<String>,
    name: Option<String>,
}

impl TransactionFields {
    fn field_mut(&mut self, tag: &str) -> Option<&mut Option<String>> {
        match tag {
            "DTPOSTED" => Some(&mut self.posted),
            "TRNAMT" => Some(&mut self.amount),
            "MEMO" => Some(&mut self.memo),
            "NAME" => Some(&mut self.name),
            _ => None,
        }
    }

    fn into_staged(self) -> std::result::Result<StagedTransaction, String> {
        let posted = trimmed(self.posted).ok_or("missing DTPOSTED")?;
        let date =
            parse_ofx_date(&posted).ok_or_else(|| format!("invalid DTPOSTED: {}", posted))?;
        let amount_str = trimmed(self.amount).ok_or("missing TRNAMT")?;
        let amount = parse_ofx_amount(&amount_str)
            .ok_or_else(|| format!("invalid TRNAMT: {}", amount_str))?;
        let description = trimmed(self.memo)
            .or_else(|| trimmed(self.name))
            .unwrap_or_default();

        Ok(StagedTransaction {
            date,
            description,
            amount,
        })
    }
}

/// Parse an OFX statement into staged transactions
///
/// Malformed documents fail as a whole; individual transactions with an
/// unreadable date or amount are skipped.
pub fn parse_ofx(bytes: &[u8]) -> Result<(Vec<StagedTransaction>, Vec<SkippedRow>)> {
    let doc = normalize(bytes)?;

    // Text is split around entity references, so whitespace is kept here and
    // trimmed once the field is complete
    let mut reader = Reader::from_str(&doc);
    reader.config_mut().trim_text(false);

    let mut transactions = Vec::new();
    let mut skipped = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<TransactionFields> = None;
    let mut statement_has_balance: Option<bool> = None;
    let mut statements = 0usize;
    let mut transaction_index = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::Ofx(format!(
                "malformed XML at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_uppercase();
                match tag.as_str() {
                    "STMTRS" | "CCSTMTRS" => statement_has_balance = Some(false),
                    "LEDGERBAL" => {
                        if let Some(has) = statement_has_balance.as_mut() {
                            *has = true;
                        }
                    }
                    "STMTTRN" => current = Some(TransactionFields::default()),
                    _ => {}
                }
                stack.push(tag);
            }
            Event::End(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_uppercase();
                match stack.pop() {
                    Some(open) if open == tag => {}
                    Some(open) => {
                        return Err(Error::Ofx(format!(
                            "mismatched closing tag </{}> for <{}>",
                            tag, open
                        )))
                    }
                    None => return Err(Error::Ofx(format!("unexpected closing tag </{}>", tag))),
                }
                match tag.as_str() {
                    "STMTRS" | "CCSTMTRS" => {
                        if statement_has_balance.take() != Some(true) {
                            return Err(Error::Ofx(format!("<{}> without <LEDGERBAL>", tag)));
                        }
                        statements += 1;
                    }
                    "STMTTRN" => {
                        transaction_index += 1;
                        if let Some(fields) = current.take() {
                            match fields.into_staged() {
                                Ok(tx) => transactions.push(tx),
                                Err(reason) => skipped.push(SkippedRow::new(
                                    format!("transaction {}", transaction_index),
                                    reason,
                                )),
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if let (Some(fields), Some(tag)) = (current.as_mut(), stack.last()) {
                    if let Some(slot) = fields.field_mut(tag) {
                        slot.get_or_insert_with(String::new)
                            .push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
            }
            Event::GeneralRef(e) => {
                if let (Some(fields), Some(tag)) = (current.as_mut(), stack.last()) {
                    if let Some(slot) = fields.field_mut(tag) {
                        if let Some(c) = resolve_reference(e.as_ref()) {
                            slot.get_or_insert_with(String::new).push(c);
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::Ofx(format!("unclosed element <{}>", open)));
    }

    debug!(
        statements,
        transactions = transactions.len(),
        skipped = skipped.len(),
        "Parsed OFX statement"
    );
    Ok((transactions, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SGML_HEADER: &str = "OFXHEADER:100\nDATA:OFXSGML\nVERSION:102\nSECURITY:NONE\nENCODING:USASCII\nCHARSET:1252\nCOMPRESSION:NONE\nOLDFILEUID:NONE\nNEWFILEUID:NONE\n\n";

    fn sgml_statement(balance: &str) -> String {
        format!(
            "{}<OFX>\n<BANKMSGSRSV1>\n<STMTTRNRS>\n<TRNUID>1\n<STMTRS>\n<CURDEF>BRL\n<BANKTRANLIST>\n<DTSTART>20240301\n<DTEND>20240331\n<STMTTRN>\n<TRNTYPE>CREDIT\n<DTPOSTED>20240315120000[-3:BRT]\n<TRNAMT>100.00\n<FITID>A1\n<MEMO>Pix Recebido Joel\n</STMTTRN>\n<STMTTRN>\n<TRNTYPE>DEBIT\n<DTPOSTED>20240320\n<TRNAMT>-40.00\n<FITID>A2\n<MEMO>Conta de Energia\n</STMTTRN>\n</BANKTRANLIST>\n{}</STMTRS>\n</STMTTRNRS>\n</BANKMSGSRSV1>\n</OFX>\n",
            SGML_HEADER, balance
        )
    }

    #[test]
    fn test_parse_sgml_statement() {
        let doc = sgml_statement("<LEDGERBAL>\n<BALAMT>560.00\n<DTASOF>20240331\n</LEDGERBAL>\n");
        let (transactions, skipped) = parse_ofx(doc.as_bytes()).unwrap();

        assert!(skipped.is_empty());
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(transactions[0].amount, Decimal::new(10000, 2));
        assert_eq!(transactions[0].description, "Pix Recebido Joel");
        assert_eq!(transactions[1].amount, Decimal::new(-4000, 2));
        assert_eq!(transactions[1].description, "Conta de Energia");
    }

    #[test]
    fn test_missing_balance_matches_zero_balance() {
        let without = sgml_statement("");
        let with_zero = sgml_statement(
            "<LEDGERBAL><BALAMT>0</BALAMT><DTASOF>20240101000000</DTASOF></LEDGERBAL>",
        );

        let (a, _) = parse_ofx(without.as_bytes()).expect("missing balance must not fail");
        let (b, _) = parse_ofx(with_zero.as_bytes()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_placeholder_after_banktranlist() {
        let doc = "<OFX><CREDITCARDMSGSRSV1><CCSTMTTRNRS><CCSTMTRS><BANKTRANLIST><STMTTRN><DTPOSTED>20240102</DTPOSTED><TRNAMT>-12.5</TRNAMT><MEMO>Padaria</MEMO></STMTTRN></BANKTRANLIST></CCSTMTRS></CCSTMTTRNRS></CREDITCARDMSGSRSV1></OFX>";
        let normalized = normalize(doc.as_bytes()).unwrap();
        assert!(normalized.contains("</BANKTRANLIST><LEDGERBAL>"));

        let (transactions, _) = parse_ofx(doc.as_bytes()).unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].amount, Decimal::new(-125, 1));
    }

    #[test]
    fn test_malformed_xml_fails_whole_file() {
        let doc = "<OFX><BANKMSGSRSV1><STMTRS><BANKTRANLIST><STMTTRN><DTPOSTED>20240102</DTPOSTED><TRNAMT>5</TRNAMT></STMTTRN></STMTRS></OFX>";
        let result = parse_ofx(doc.as_bytes());
        assert!(matches!(result, Err(Error::Ofx(_))));
    }

    #[test]
    fn test_missing_ofx_root() {
        let result = parse_ofx(b"Data,Valor\n01/01/2024,10");
        assert!(matches!(result, Err(Error::Ofx(_))));
    }

    #[test]
    fn test_statement_without_balance_is_rejected() {
        let doc = "<OFX><STMTRS><STMTTRN><DTPOSTED>20240102</DTPOSTED><TRNAMT>5</TRNAMT></STMTTRN></STMTRS></OFX>";
        // No LEDGERBAL anywhere: the placeholder goes before </STMTRS>
        assert!(parse_ofx(doc.as_bytes()).is_ok());

        // One statement has a balance, so nothing is inserted for the other
        let doc = "<OFX><STMTRS><LEDGERBAL><BALAMT>1</BALAMT></LEDGERBAL></STMTRS><STMTRS></STMTRS></OFX>";
        assert!(matches!(parse_ofx(doc.as_bytes()), Err(Error::Ofx(_))));
    }

    #[test]
    fn test_bad_transaction_is_skipped() {
        let doc = sgml_statement("").replace("<TRNAMT>-40.00", "<TRNAMT>abc");
        let (transactions, skipped) = parse_ofx(doc.as_bytes()).unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].location, "transaction 2");
        assert!(skipped[0].reason.contains("TRNAMT"));
    }

    #[test]
    fn test_memo_falls_back_to_name() {
        let doc = sgml_statement("").replace("<MEMO>Conta de Energia\n", "<NAME>CIA ENERGIA\n");
        let (transactions, _) = parse_ofx(doc.as_bytes()).unwrap();
        assert_eq!(transactions[1].description, "CIA ENERGIA");
    }

    #[test]
    fn test_stray_ampersand_in_memo() {
        let doc = sgml_statement("").replace("Conta de Energia", "Agua & Esgoto");
        let (transactions, _) = parse_ofx(doc.as_bytes()).unwrap();
        assert_eq!(transactions[1].description, "Agua & Esgoto");
    }

    #[test]
    fn test_escaped_characters_keep_surrounding_spaces() {
        let doc = "<OFX><STMTRS><BANKTRANLIST><STMTTRN><DTPOSTED>20240102</DTPOSTED><TRNAMT>-12.50</TRNAMT><MEMO> Agua &amp; Esgoto &lt;Mar&gt; </MEMO></STMTTRN></BANKTRANLIST><LEDGERBAL><BALAMT>0</BALAMT></LEDGERBAL></STMTRS></OFX>";
        let (transactions, _) = parse_ofx(doc.as_bytes()).unwrap();
        assert_eq!(transactions[0].description, "Agua & Esgoto <Mar>");
    }

    #[test]
    fn test_blank_memo_falls_back_to_name() {
        let doc = "<OFX><STMTRS><BANKTRANLIST><STMTTRN><DTPOSTED>20240102</DTPOSTED><TRNAMT>-40.00</TRNAMT><MEMO>  </MEMO><NAME>CIA ENERGIA</NAME></STMTTRN></BANKTRANLIST><LEDGERBAL><BALAMT>0</BALAMT></LEDGERBAL></STMTRS></OFX>";
        let (transactions, _) = parse_ofx(doc.as_bytes()).unwrap();
        assert_eq!(transactions[0].description, "CIA ENERGIA");
    }

    #[test]
    fn test_latin1_memo() {
        let mut bytes = sgml_statement("")
            .replace("Conta de Energia", "Doacao X")
            .into_bytes();
        // 'c' in "Doacao" becomes Latin-1 'ç' (0xE7), which is invalid UTF-8
        let pos = bytes.windows(6).position(|w| w == b"Doacao").unwrap();
        bytes[pos + 3] = 0xE7;
        let (transactions, _) = parse_ofx(&bytes).unwrap();
        assert_eq!(transactions[1].description, "Doaçao X");
    }

    #[test]
    fn test_close_leaf_elements_leaves_xml_untouched() {
        let xml = "<OFX><STMTTRN><TRNAMT>1.00</TRNAMT></STMTTRN></OFX>";
        assert_eq!(close_leaf_elements(xml), xml);
    }

    #[test]
    fn test_parse_ofx_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15);
        assert_eq!(parse_ofx_date("20240315"), expected);
        assert_eq!(parse_ofx_date("20240315120000"), expected);
        assert_eq!(parse_ofx_date("20240315120000[-3:BRT]"), expected);
        assert_eq!(parse_ofx_date("2024"), None);
    }
}
