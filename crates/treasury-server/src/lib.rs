//! Treasury Web Server
//!
//! Axum-based REST API for the treasury bookkeeping tool.
//!
//! A statement upload opens a reconciliation run; rows are classified one
//! request at a time and the run is committed (or abandoned) as a whole.
//! Every request that touches the ledger goes through the session lock, so
//! commits are serialised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use treasury_core::{Database, ReconciliationRun, ReferenceData, Session, SqliteLedger};

mod handlers;

/// Maximum statement upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Runs left open when a page is closed are never confirmed or deleted; past
/// this many the oldest are dropped
pub const MAX_OPEN_RUNS: usize = 16;

/// Shared application state
pub struct AppState {
    /// Ledger store and reference data
    pub session: Mutex<Session<SqliteLedger>>,
    /// Open reconciliation runs by id
    pub runs: Mutex<HashMap<u64, ReconciliationRun>>,
    pub next_run: AtomicU64,
    pub(crate) max_open_runs: usize,
}

impl AppState {
    pub fn new(session: Session<SqliteLedger>) -> Self {
        Self {
            session: Mutex::new(session),
            runs: Mutex::new(HashMap::new()),
            next_run: AtomicU64::new(1),
            max_open_runs: MAX_OPEN_RUNS,
        }
    }

    pub(crate) fn session(&self) -> Result<MutexGuard<'_, Session<SqliteLedger>>, AppError> {
        self.session
            .lock()
            .map_err(|_| AppError::internal("Session lock poisoned"))
    }

    pub(crate) fn runs(&self) -> Result<MutexGuard<'_, HashMap<u64, ReconciliationRun>>, AppError> {
        self.runs
            .lock()
            .map_err(|_| AppError::internal("Run table lock poisoned"))
    }

    /// Park a staged run and hand back its id
    ///
    /// Ids only grow, so the smallest id is the oldest run.
    pub(crate) fn open_run(&self, run: ReconciliationRun) -> Result<u64, AppError> {
        let id = self.next_run.fetch_add(1, Ordering::SeqCst);
        let mut runs = self.runs()?;
        while runs.len() >= self.max_open_runs.max(1) {
            let Some(oldest) = runs.keys().min().copied() else {
                break;
            };
            if let Some(evicted) = runs.remove(&oldest) {
                warn!(id = oldest, file = %evicted.file_name, "Dropping oldest open run");
            }
        }
        runs.insert(id, run);
        Ok(id)
    }
}

/// Create the application router
pub fn create_router(session: Session<SqliteLedger>) -> Router {
    let state = Arc::new(AppState::new(session));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/members", get(handlers::list_members))
        .route("/members/:name", put(handlers::update_member))
        // Reconciliation runs
        .route("/reconcile", post(handlers::upload_statement))
        .route(
            "/reconcile/:id",
            get(handlers::get_run).delete(handlers::abandon_run),
        )
        .route("/reconcile/:id/rows/:index", put(handlers::assign_row))
        .route("/reconcile/:id/confirm", post(handlers::confirm_run))
        // Ledger
        .route(
            "/ledger",
            get(handlers::list_ledger).post(handlers::create_manual_entry),
        )
        // Reports
        .route("/reports/balance", get(handlers::report_balance))
        .route("/reports/categories", get(handlers::report_categories))
        .route("/receipts", get(handlers::list_receipts));

    // Same-origin only
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        // Multipart framing adds a little on top of the file itself
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE + 64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the server
pub async fn serve(
    db: Database,
    reference: ReferenceData,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    let session = Session::new(SqliteLedger::new(db), reference)?;
    let app = create_router(session);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        use treasury_core::Error as CoreError;

        let err = err.into();
        let status = match err.downcast_ref::<CoreError>() {
            Some(
                CoreError::InvalidData(_)
                | CoreError::MissingColumn(_)
                | CoreError::Ofx(_)
                | CoreError::Pdf(_)
                | CoreError::UnsupportedFormat(_)
                | CoreError::Csv(_)
                | CoreError::Spreadsheet(_),
            ) => StatusCode::BAD_REQUEST,
            Some(CoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            Self {
                status,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(err),
            }
        } else {
            Self {
                status,
                message: err.to_string(),
                internal: None,
            }
        }
    }
}
