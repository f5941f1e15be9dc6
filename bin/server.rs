// Trial Entry Merge - Web Server
// REST API with Axum: duplicate review list + batch merge

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use trial_merge::{
    open_database, BatchRunner, DuplicateDetector, DuplicateEntryRecord, InputError,
    MergeOptions, MergeRequest, MergeSummary, ServerConfig, SqliteStore,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    options: MergeOptions,
}

impl AppState {
    fn lock_db(&self) -> Result<MutexGuard<'_, Connection>, Response> {
        self.db.lock().map_err(|_| {
            error!("database mutex poisoned");
            internal_error("database connection unavailable".to_string())
        })
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse {
            success: false,
            data: (),
            error: Some(message),
        }),
    )
        .into_response()
}

fn bad_request(error: InputError) -> Response {
    warn!(error = %error, "merge request rejected");
    (StatusCode::BAD_REQUEST, Json(MergeSummary::rejected(&error))).into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/trials/:trial_id/duplicates - Review list for the merge screen
async fn get_duplicates(
    State(state): State<AppState>,
    Path(trial_id): Path<String>,
) -> Response {
    let conn = match state.lock_db() {
        Ok(conn) => conn,
        Err(response) => return response,
    };

    let detector = DuplicateDetector {
        normalize_keys: state.options.normalize_group_keys,
    };

    match detector.find_candidates(&conn, &trial_id) {
        Ok(records) => {
            (StatusCode::OK, Json(ApiResponse::<Vec<DuplicateEntryRecord>>::ok(records))).into_response()
        }
        Err(e) => {
            error!(trial = %trial_id, error = %e, "duplicate detection failed");
            internal_error(e.to_string())
        }
    }
}

/// POST /api/merge-duplicates - Merge every group in the request
async fn merge_duplicates(
    State(state): State<AppState>,
    payload: Result<Json<MergeRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return bad_request(InputError::MalformedBody(rejection.body_text())),
    };

    if let Err(e) = request.validate() {
        return bad_request(e);
    }

    let conn = match state.lock_db() {
        Ok(conn) => conn,
        Err(response) => return response,
    };

    let store = match &state.options.audit_actor {
        Some(actor) => SqliteStore::with_audit(&conn, actor),
        None => SqliteStore::new(&conn),
    };

    let summary = BatchRunner::new(&store, state.options.clone()).run(&request);

    (StatusCode::OK, Json(summary)).into_response()
}

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/trials/:trial_id/duplicates", get(get_duplicates))
        .route("/merge-duplicates", post(merge_duplicates))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    let conn = open_database(&config.db_path)?;
    info!(path = %config.db_path.display(), "database opened");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        options: config.merge.clone(),
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "server running");

    axum::serve(listener, app(state))
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}
