//! Ledger, member and configuration handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::parse_date_param;
use crate::{AppError, AppState};
use treasury_core::{
    models::{LedgerEntry, Member},
    reports::filter_by_period,
    ManualEntry, ReferenceData,
};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub entries: usize,
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, AppError> {
    let entries = state.session()?.ledger()?.len();
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        entries,
    }))
}

/// GET /api/config - Categories, cost centers, accounts and members in use
pub async fn get_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReferenceData>, AppError> {
    Ok(Json(state.session()?.reference().clone()))
}

/// GET /api/members
pub async fn list_members(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Member>>, AppError> {
    Ok(Json(state.session()?.members().to_vec()))
}

/// PUT /api/members/:name - Replace a member's details, possibly renaming them
pub async fn update_member(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(member): Json<Member>,
) -> Result<Json<Member>, AppError> {
    state.session()?.update_member(&name, member.clone())?;
    info!(from = %name, to = %member.name, "Member updated");
    Ok(Json(member))
}

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Most recent N entries
    pub limit: Option<usize>,
}

/// GET /api/ledger - Committed entries in id order
pub async fn list_ledger(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LedgerQuery>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    let from = parse_date_param(params.from.as_deref(), "from")?;
    let to = parse_date_param(params.to.as_deref(), "to")?;

    let entries = state.session()?.ledger()?;
    let mut entries = filter_by_period(&entries, from, to);

    if let Some(limit) = params.limit {
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
    }

    Ok(Json(entries))
}

/// POST /api/ledger - Record a manual entry
pub async fn create_manual_entry(
    State(state): State<Arc<AppState>>,
    Json(entry): Json<ManualEntry>,
) -> Result<(StatusCode, Json<LedgerEntry>), AppError> {
    let entry = state.session()?.record_manual(entry)?;
    info!(id = entry.id, category = %entry.category, "Manual entry recorded");
    Ok((StatusCode::CREATED, Json(entry)))
}
