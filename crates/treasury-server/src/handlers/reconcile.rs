//! Reconciliation run handlers: upload, classify, confirm, abandon

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{AppError, AppState, MAX_UPLOAD_SIZE};
use treasury_core::{
    Assignment, CommitSummary, ReconciliationRun, SheetRow, SkippedRow, StatementFormat,
};

/// A sheet row with the categories it may take
#[derive(Serialize)]
pub struct RowView {
    #[serde(flatten)]
    pub row: SheetRow,
    pub category_options: Vec<String>,
}

/// Current state of a reconciliation run
#[derive(Serialize)]
pub struct RunResponse {
    pub id: u64,
    pub file_name: String,
    pub format: StatementFormat,
    pub account: Option<String>,
    /// Rows came from PDF text and need a closer look
    pub low_confidence: bool,
    pub rows: Vec<RowView>,
    pub skipped: Vec<SkippedRow>,
    /// Rows past the review limit
    pub truncated: usize,
    pub counterparty_options: Vec<String>,
    pub cost_center_options: Vec<String>,
    pub account_options: Vec<String>,
}

impl RunResponse {
    fn build(id: u64, run: &ReconciliationRun) -> Result<Self, AppError> {
        let sheet = run.sheet();
        let rows = sheet
            .rows()
            .iter()
            .map(|row| {
                Ok(RowView {
                    category_options: sheet.category_options(row.index)?,
                    row: row.clone(),
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(Self {
            id,
            file_name: run.file_name.clone(),
            format: run.format(),
            account: run.account.clone(),
            low_confidence: run.is_low_confidence(),
            rows,
            skipped: run.skipped(),
            truncated: sheet.truncated(),
            counterparty_options: sheet.counterparty_options(),
            cost_center_options: sheet.cost_center_options().to_vec(),
            account_options: sheet.account_options().to_vec(),
        })
    }
}

/// POST /api/reconcile - Upload a statement and open a run
///
/// Expects multipart form with:
/// - file: statement (.ofx, .pdf, .csv, .xlsx; required, max 10MB)
/// - account: account to book the rows against (optional)
pub async fn upload_statement(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<RunResponse>), AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut account: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::bad_request("File field has no file name"))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read file data"))?;

                if bytes.len() > MAX_UPLOAD_SIZE {
                    return Err(AppError::bad_request(&format!(
                        "File too large. Maximum size is {} MB",
                        MAX_UPLOAD_SIZE / 1024 / 1024
                    )));
                }

                file = Some((file_name, bytes.to_vec()));
            }
            "account" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read account"))?;
                if !value.is_empty() {
                    account = Some(value);
                }
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| AppError::bad_request("Missing file field"))?;

    let run = {
        let session = state.session()?;
        session.stage(&file_name, &bytes, account).map_err(|e| {
            warn!(file = %file_name, error = %e, "Statement rejected");
            e
        })?
    };

    let id = state.open_run(run)?;
    let runs = state.runs()?;
    let run = runs
        .get(&id)
        .ok_or_else(|| AppError::internal("Run disappeared after staging"))?;

    Ok((StatusCode::CREATED, Json(RunResponse::build(id, run)?)))
}

/// GET /api/reconcile/:id
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<RunResponse>, AppError> {
    let runs = state.runs()?;
    let run = runs
        .get(&id)
        .ok_or_else(|| AppError::not_found("Reconciliation run not found"))?;
    Ok(Json(RunResponse::build(id, run)?))
}

/// PUT /api/reconcile/:id/rows/:index - Classify one row
pub async fn assign_row(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(u64, usize)>,
    Json(assignment): Json<Assignment>,
) -> Result<Json<RowView>, AppError> {
    let mut runs = state.runs()?;
    let run = runs
        .get_mut(&id)
        .ok_or_else(|| AppError::not_found("Reconciliation run not found"))?;

    run.assign(index, assignment)?;

    let sheet = run.sheet();
    Ok(Json(RowView {
        row: sheet.rows()[index].clone(),
        category_options: sheet.category_options(index)?,
    }))
}

/// POST /api/reconcile/:id/confirm - Commit the run to the ledger
///
/// The run is closed whether or not the commit succeeds.
pub async fn confirm_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<CommitSummary>, AppError> {
    let run = state
        .runs()?
        .remove(&id)
        .ok_or_else(|| AppError::not_found("Reconciliation run not found"))?;

    let file_name = run.file_name.clone();
    let summary = state.session()?.confirm(run)?;

    info!(
        run = id,
        file = %file_name,
        committed = summary.committed.len(),
        ignored = summary.ignored,
        "Run confirmed"
    );

    Ok(Json(summary))
}

/// DELETE /api/reconcile/:id - Abandon a run without committing
pub async fn abandon_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    state
        .runs()?
        .remove(&id)
        .ok_or_else(|| AppError::not_found("Reconciliation run not found"))?;
    info!(run = id, "Run abandoned");
    Ok(StatusCode::NO_CONTENT)
}
