//! Classification of staged statement rows
//!
//! Every row starts as "Ignorar" / "N/A" and only changes through an explicit
//! `assign`. Nothing here touches the ledger; `finish` hands the whole batch
//! over for commit.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ReferenceData;
use crate::error::{Error, Result};
use crate::ingest::{IngestReport, SkippedRow};
use crate::models::{
    CategoryChoice, ClassifiedTransaction, Counterparty, Direction, StagedTransaction,
    IGNORE_LABEL, UNIDENTIFIED_LABEL,
};

/// The treasurer's choice for one row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(default)]
    pub category: CategoryChoice,
    #[serde(default)]
    pub counterparty: Counterparty,
    /// Overrides the default cost center
    #[serde(default)]
    pub cost_center: Option<String>,
    /// Overrides the run's account
    #[serde(default)]
    pub account: Option<String>,
}

impl Assignment {
    pub fn category(label: &str) -> Self {
        Self {
            category: CategoryChoice::from_label(label),
            ..Default::default()
        }
    }

    pub fn with_counterparty(mut self, label: &str) -> Self {
        self.counterparty = Counterparty::from_label(label);
        self
    }

    pub fn with_cost_center(mut self, cost_center: &str) -> Self {
        self.cost_center = Some(cost_center.to_string());
        self
    }
}

/// One row under review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetRow {
    /// Position in the sheet (0-based)
    pub index: usize,
    pub staged: StagedTransaction,
    /// Fixed when the row is staged
    pub direction: Direction,
    pub category: CategoryChoice,
    pub counterparty: Counterparty,
    pub account: Option<String>,
    pub cost_center: Option<String>,
}

impl SheetRow {
    fn into_classified(self) -> ClassifiedTransaction {
        ClassifiedTransaction {
            staged: self.staged,
            direction: self.direction,
            category: self.category,
            counterparty: self.counterparty,
            account: self.account,
            cost_center: self.cost_center,
        }
    }
}

/// Rows from one statement awaiting classification
#[derive(Debug, Clone)]
pub struct ClassificationSheet {
    rows: Vec<SheetRow>,
    skipped: Vec<SkippedRow>,
    truncated: usize,
    // Options as they were when the sheet was created
    reference: ReferenceData,
}

impl ClassificationSheet {
    /// Build a sheet from the first `review_limit` rows of a report
    ///
    /// Tabular rows are typed here. A missing column fails the whole sheet;
    /// an unreadable value only skips that row.
    pub fn new(
        report: &IngestReport,
        reference: &ReferenceData,
        review_limit: usize,
    ) -> Result<Self> {
        let mut rows = Vec::new();
        let mut skipped = Vec::new();

        for (position, staged_row) in report.rows.iter().take(review_limit).enumerate() {
            match staged_row.to_staged() {
                Ok(staged) => {
                    let direction = staged.direction();
                    rows.push(SheetRow {
                        index: rows.len(),
                        staged,
                        direction,
                        category: CategoryChoice::Ignore,
                        counterparty: Counterparty::Unidentified,
                        account: None,
                        cost_center: Some(reference.default_cost_center.clone()),
                    });
                }
                Err(Error::InvalidData(reason)) => {
                    skipped.push(SkippedRow::new(staged_row.location(position), reason));
                }
                Err(e) => return Err(e),
            }
        }

        let truncated = report.rows.len().saturating_sub(review_limit);
        debug!(
            rows = rows.len(),
            skipped = skipped.len(),
            truncated,
            "Created classification sheet"
        );

        Ok(Self {
            rows,
            skipped,
            truncated,
            reference: reference.clone(),
        })
    }

    /// Set the account every row is booked against
    pub fn with_account(mut self, account: Option<String>) -> Self {
        for row in &mut self.rows {
            row.account = account.clone();
        }
        self
    }

    pub fn rows(&self) -> &[SheetRow] {
        &self.rows
    }

    pub fn skipped(&self) -> &[SkippedRow] {
        &self.skipped
    }

    /// Statement rows beyond the review limit
    pub fn truncated(&self) -> usize {
        self.truncated
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows that will be committed as things stand
    pub fn accepted_count(&self) -> usize {
        self.rows.iter().filter(|r| !r.category.is_ignore()).count()
    }

    fn row(&self, index: usize) -> Result<&SheetRow> {
        self.rows.get(index).ok_or_else(|| {
            Error::InvalidData(format!(
                "row {} out of range (sheet has {} rows)",
                index,
                self.rows.len()
            ))
        })
    }

    /// "Ignorar" followed by the categories for the row's direction
    pub fn category_options(&self, index: usize) -> Result<Vec<String>> {
        let row = self.row(index)?;
        let mut options = vec![IGNORE_LABEL.to_string()];
        options.extend(self.reference.categories_for(row.direction).iter().cloned());
        Ok(options)
    }

    /// "N/A" followed by every member name
    pub fn counterparty_options(&self) -> Vec<String> {
        let mut options = vec![UNIDENTIFIED_LABEL.to_string()];
        options.extend(self.reference.members.iter().map(|m| m.name.clone()));
        options
    }

    pub fn cost_center_options(&self) -> &[String] {
        &self.reference.cost_centers
    }

    pub fn account_options(&self) -> &[String] {
        &self.reference.accounts
    }

    /// Record a choice for one row; only offered values are accepted
    pub fn assign(&mut self, index: usize, assignment: Assignment) -> Result<()> {
        let direction = self.row(index)?.direction;

        if let CategoryChoice::Named(name) = &assignment.category {
            if !self.reference.is_category(direction, name) {
                return Err(Error::InvalidData(format!(
                    "'{}' is not a {} category",
                    name, direction
                )));
            }
        }
        if let Counterparty::Named(name) = &assignment.counterparty {
            if self.reference.find_member(name).is_none() {
                return Err(Error::InvalidData(format!("unknown counterparty '{}'", name)));
            }
        }
        if let Some(cost_center) = &assignment.cost_center {
            if !self.reference.cost_centers.contains(cost_center) {
                return Err(Error::InvalidData(format!(
                    "unknown cost center '{}'",
                    cost_center
                )));
            }
        }
        if let Some(account) = &assignment.account {
            if !self.reference.accounts.contains(account) {
                return Err(Error::InvalidData(format!("unknown account '{}'", account)));
            }
        }

        let row = &mut self.rows[index];
        row.category = assignment.category;
        row.counterparty = assignment.counterparty;
        if let Some(cost_center) = assignment.cost_center {
            row.cost_center = Some(cost_center);
        }
        if let Some(account) = assignment.account {
            row.account = Some(account);
        }
        Ok(())
    }

    /// The whole batch, ignored rows included
    pub fn finish(self) -> Vec<ClassifiedTransaction> {
        self.rows.into_iter().map(SheetRow::into_classified).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ingest, IngestOptions, StagedRow, StatementFormat};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn report(amounts: &[i64]) -> IngestReport {
        let rows = amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| {
                StagedRow::Parsed(StagedTransaction {
                    date: NaiveDate::from_ymd_opt(2024, 3, 1 + i as u32).unwrap(),
                    description: format!("mov {}", i),
                    amount: Decimal::new(*amount, 0),
                })
            })
            .collect();
        IngestReport {
            format: StatementFormat::Ofx,
            rows,
            skipped: Vec::new(),
            source_hash: "abc".into(),
        }
    }

    #[test]
    fn test_rows_default_to_ignore() {
        let sheet =
            ClassificationSheet::new(&report(&[100, -40]), &ReferenceData::default(), 10).unwrap();
        assert_eq!(sheet.len(), 2);
        for row in sheet.rows() {
            assert!(row.category.is_ignore());
            assert_eq!(row.counterparty, Counterparty::Unidentified);
            assert_eq!(row.cost_center.as_deref(), Some("Geral"));
        }
        assert_eq!(sheet.accepted_count(), 0);
    }

    #[test]
    fn test_options_follow_direction() {
        let sheet =
            ClassificationSheet::new(&report(&[100, -40]), &ReferenceData::default(), 10).unwrap();

        let credit = sheet.category_options(0).unwrap();
        assert_eq!(credit[0], "Ignorar");
        assert!(credit.contains(&"Mensalidade".to_string()));
        assert!(!credit.contains(&"Energia".to_string()));

        let debit = sheet.category_options(1).unwrap();
        assert_eq!(debit[0], "Ignorar");
        assert!(debit.contains(&"Energia".to_string()));

        let counterparties = sheet.counterparty_options();
        assert_eq!(counterparties[0], "N/A");
        assert!(counterparties.contains(&"Joel Silva".to_string()));
    }

    #[test]
    fn test_zero_amount_is_debit() {
        let sheet = ClassificationSheet::new(&report(&[0]), &ReferenceData::default(), 10).unwrap();
        assert_eq!(sheet.rows()[0].direction, Direction::Debit);
    }

    #[test]
    fn test_review_limit_truncates() {
        let sheet =
            ClassificationSheet::new(&report(&[1; 12]), &ReferenceData::default(), 10).unwrap();
        assert_eq!(sheet.len(), 10);
        assert_eq!(sheet.truncated(), 2);
    }

    #[test]
    fn test_assign_validates_against_offered_options() {
        let mut sheet =
            ClassificationSheet::new(&report(&[100, -40]), &ReferenceData::default(), 10).unwrap();

        // Debit category on a credit row
        assert!(matches!(
            sheet.assign(0, Assignment::category("Energia")),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            sheet.assign(0, Assignment::category("Mensalidade").with_counterparty("Fulano")),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            sheet.assign(5, Assignment::category("Mensalidade")),
            Err(Error::InvalidData(_))
        ));

        sheet
            .assign(
                0,
                Assignment::category("Mensalidade")
                    .with_counterparty("Joel Silva")
                    .with_cost_center("Administrativo"),
            )
            .unwrap();
        let row = &sheet.rows()[0];
        assert_eq!(row.category, CategoryChoice::Named("Mensalidade".into()));
        assert_eq!(row.counterparty, Counterparty::Named("Joel Silva".into()));
        assert_eq!(row.cost_center.as_deref(), Some("Administrativo"));
        assert_eq!(sheet.accepted_count(), 1);
    }

    #[test]
    fn test_assign_back_to_ignore() {
        let mut sheet =
            ClassificationSheet::new(&report(&[100]), &ReferenceData::default(), 10).unwrap();
        sheet.assign(0, Assignment::category("Bazar")).unwrap();
        sheet.assign(0, Assignment::category("Ignorar")).unwrap();
        assert_eq!(sheet.accepted_count(), 0);
    }

    #[test]
    fn test_tabular_rows_typed_at_sheet_creation() {
        let csv = "Data,Descrição,Valor\n15/03/2024,Pix,100\n16/03/2024,Ruim,abc\n";
        let report =
            ingest(StatementFormat::Csv, csv.as_bytes(), &IngestOptions::default()).unwrap();
        let sheet = ClassificationSheet::new(&report, &ReferenceData::default(), 10).unwrap();
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet.skipped().len(), 1);
        // CSV line 3, counting the header, in both the location and the reason
        assert_eq!(sheet.skipped()[0].location, "row 3");
        assert!(sheet.skipped()[0].reason.starts_with("row 3:"));
    }

    #[test]
    fn test_missing_column_fails_sheet() {
        let csv = "Data,Descrição\n15/03/2024,Pix\n";
        let report =
            ingest(StatementFormat::Csv, csv.as_bytes(), &IngestOptions::default()).unwrap();
        let result = ClassificationSheet::new(&report, &ReferenceData::default(), 10);
        assert!(matches!(result, Err(Error::MissingColumn(_))));
    }

    #[test]
    fn test_with_account_and_finish() {
        let sheet = ClassificationSheet::new(&report(&[100, -40]), &ReferenceData::default(), 10)
            .unwrap()
            .with_account(Some("Conta Corrente (Banco)".into()));
        let batch = sheet.finish();
        assert_eq!(batch.len(), 2);
        assert!(batch
            .iter()
            .all(|tx| tx.account.as_deref() == Some("Conta Corrente (Banco)")));
    }
}
