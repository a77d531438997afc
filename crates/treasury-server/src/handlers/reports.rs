//! Report handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::parse_date_param;
use crate::{AppError, AppState};
use treasury_core::{
    export::write_receipt_rows_csv,
    models::LedgerEntry,
    reports::{
        account_balances, balance_summary, category_summary, filter_by_period, receipt_rows,
        AccountBalance, BalanceSummary, CategoryTotal,
    },
};

/// Query parameters shared by period reports
#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

fn entries_in_period(state: &AppState, params: &PeriodQuery) -> Result<Vec<LedgerEntry>, AppError> {
    let from = parse_date_param(params.from.as_deref(), "from")?;
    let to = parse_date_param(params.to.as_deref(), "to")?;
    let entries = state.session()?.ledger()?;
    Ok(filter_by_period(&entries, from, to))
}

#[derive(Serialize)]
pub struct BalanceReport {
    #[serde(flatten)]
    pub totals: BalanceSummary,
    pub accounts: Vec<AccountBalance>,
}

/// GET /api/reports/balance - Totals and per-account balances
pub async fn report_balance(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PeriodQuery>,
) -> Result<Json<BalanceReport>, AppError> {
    let entries = entries_in_period(&state, &params)?;
    let accounts = state.session()?.reference().accounts.clone();

    Ok(Json(BalanceReport {
        totals: balance_summary(&entries),
        accounts: account_balances(&entries, &accounts),
    }))
}

/// GET /api/reports/categories
pub async fn report_categories(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PeriodQuery>,
) -> Result<Json<Vec<CategoryTotal>>, AppError> {
    let entries = entries_in_period(&state, &params)?;
    Ok(Json(category_summary(&entries)))
}

#[derive(Debug, Deserialize)]
pub struct ReceiptsQuery {
    /// Comma-separated entry ids; all credits when absent
    pub ids: Option<String>,
    /// `json` (default) or `csv`
    pub format: Option<String>,
}

/// GET /api/receipts - Receipt rows for credit entries
pub async fn list_receipts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReceiptsQuery>,
) -> Result<Response, AppError> {
    let ids = params
        .ids
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.split(',')
                .map(|id| id.trim().parse::<i64>())
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()
        .map_err(|_| AppError::bad_request("Invalid ids (use comma-separated integers)"))?;

    let entries = state.session()?.ledger()?;
    let rows = receipt_rows(&entries, ids.as_deref());

    match params.format.as_deref() {
        None | Some("json") => Ok(Json(rows).into_response()),
        Some("csv") => {
            let mut out = Vec::new();
            write_receipt_rows_csv(&mut out, &rows)?;
            Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], out).into_response())
        }
        Some(other) => Err(AppError::bad_request(&format!(
            "Unknown format '{}' (use json or csv)",
            other
        ))),
    }
}
