//! Application state for one treasurer session
//!
//! A `Session` owns the ledger store and the reference data. Statements go
//! through `stage` (ingest + classification sheet) and `confirm` (commit).
//! Dropping a `ReconciliationRun` instead of confirming it abandons the run.

use tracing::{debug, info};

use crate::classify::{Assignment, ClassificationSheet};
use crate::config::{ImportSettings, ReferenceData};
use crate::error::{Error, Result};
use crate::ingest::{ingest, IngestReport, SkippedRow, StatementFormat};
use crate::ledger::{commit_batch, record_manual, CommitSummary, LedgerStore, ManualEntry};
use crate::models::{LedgerEntry, Member, UNIDENTIFIED_LABEL};

/// One upload-classify-commit cycle over a single statement file
#[derive(Debug, Clone)]
pub struct ReconciliationRun {
    pub file_name: String,
    pub account: Option<String>,
    report: IngestReport,
    sheet: ClassificationSheet,
}

impl ReconciliationRun {
    pub fn report(&self) -> &IngestReport {
        &self.report
    }

    pub fn sheet(&self) -> &ClassificationSheet {
        &self.sheet
    }

    pub fn format(&self) -> StatementFormat {
        self.report.format
    }

    /// Rows came from the PDF text heuristic
    pub fn is_low_confidence(&self) -> bool {
        self.report.format.is_heuristic()
    }

    /// Skips from ingestion followed by skips from classification
    pub fn skipped(&self) -> Vec<SkippedRow> {
        self.report
            .skipped
            .iter()
            .chain(self.sheet.skipped())
            .cloned()
            .collect()
    }

    pub fn assign(&mut self, index: usize, assignment: Assignment) -> Result<()> {
        self.sheet.assign(index, assignment)
    }
}

/// Treasurer session over a ledger store
pub struct Session<S: LedgerStore> {
    store: S,
    reference: ReferenceData,
}

impl<S: LedgerStore> Session<S> {
    /// Start a session
    ///
    /// Stores that keep a member list are seeded from the reference data when
    /// empty, and otherwise win over it.
    pub fn new(mut store: S, mut reference: ReferenceData) -> Result<Self> {
        if let Some(stored) = store.load_members()? {
            if stored.is_empty() {
                for member in &reference.members {
                    store.save_member(member)?;
                }
                debug!(members = reference.members.len(), "Seeded member list");
            } else {
                reference.members = stored;
            }
        }
        Ok(Self { store, reference })
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every committed entry, in id order
    pub fn ledger(&self) -> Result<Vec<LedgerEntry>> {
        self.store.entries()
    }

    /// Ingest a statement and open a classification sheet for it
    pub fn stage(
        &self,
        file_name: &str,
        bytes: &[u8],
        account: Option<String>,
    ) -> Result<ReconciliationRun> {
        self.stage_with(file_name, bytes, account, &self.reference.import)
    }

    /// Like `stage`, with explicit import settings (year override, review limit)
    pub fn stage_with(
        &self,
        file_name: &str,
        bytes: &[u8],
        account: Option<String>,
        settings: &ImportSettings,
    ) -> Result<ReconciliationRun> {
        let format = StatementFormat::from_path(file_name)?;

        let account = match account {
            Some(account) if !self.reference.accounts.contains(&account) => {
                return Err(Error::InvalidData(format!("unknown account '{}'", account)));
            }
            Some(account) => Some(account),
            None => self.reference.default_account().map(str::to_string),
        };

        let report = ingest(format, bytes, &settings.ingest_options())?;
        let sheet = ClassificationSheet::new(&report, &self.reference, settings.review_limit)?
            .with_account(account.clone());

        info!(
            file = %file_name,
            format = %format,
            rows = sheet.len(),
            skipped = report.skipped_count() + sheet.skipped().len(),
            truncated = sheet.truncated(),
            "Staged statement"
        );

        Ok(ReconciliationRun {
            file_name: file_name.to_string(),
            account,
            report,
            sheet,
        })
    }

    /// Commit a run; the run is consumed either way
    pub fn confirm(&mut self, run: ReconciliationRun) -> Result<CommitSummary> {
        let source_hash = run.report.source_hash.clone();
        commit_batch(&mut self.store, run.sheet.finish(), &source_hash)
    }

    pub fn record_manual(&mut self, entry: ManualEntry) -> Result<LedgerEntry> {
        record_manual(&mut self.store, &self.reference, entry)
    }

    pub fn members(&self) -> &[Member] {
        &self.reference.members
    }

    fn check_member_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidData("member name must not be empty".into()));
        }
        if name.eq_ignore_ascii_case(UNIDENTIFIED_LABEL) {
            return Err(Error::InvalidData(format!(
                "'{}' is reserved for unidentified counterparties",
                UNIDENTIFIED_LABEL
            )));
        }
        Ok(())
    }

    pub fn add_member(&mut self, member: Member) -> Result<()> {
        Self::check_member_name(&member.name)?;
        if self.reference.find_member(&member.name).is_some() {
            return Err(Error::InvalidData(format!(
                "member '{}' already exists",
                member.name
            )));
        }
        self.store.save_member(&member)?;
        info!(name = %member.name, "Added member");
        self.reference.members.push(member);
        Ok(())
    }

    /// Replace a member's details; renaming does not touch existing entries
    pub fn update_member(&mut self, name: &str, member: Member) -> Result<()> {
        Self::check_member_name(&member.name)?;
        let position = self
            .reference
            .members
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| Error::NotFound(format!("member '{}'", name)))?;
        if member.name != name && self.reference.find_member(&member.name).is_some() {
            return Err(Error::InvalidData(format!(
                "member '{}' already exists",
                member.name
            )));
        }

        self.store.update_member(name, &member)?;
        self.reference.members[position] = member;
        Ok(())
    }

    /// Remove a member; ledger entries naming them are kept
    pub fn remove_member(&mut self, name: &str) -> Result<Member> {
        let position = self
            .reference
            .members
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| Error::NotFound(format!("member '{}'", name)))?;
        self.store.delete_member(name)?;
        info!(name = %name, "Removed member");
        Ok(self.reference.members.remove(position))
    }
}
