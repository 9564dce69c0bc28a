// src/main.rs
//
// HTTP surface of the reporting engine. Each report handler resolves the
// caller's tenant snapshot and identity from headers, validates the body
// into typed params, resolves scope once, and hands off to the matching
// pure aggregator.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::env;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod export;
mod heatmap;
mod model;
mod period;
mod pivot;
mod scoping;
mod summary;

#[cfg(test)]
mod report_tests;

use export::{export_response, ExportError, ExportRequest};
use heatmap::{build_heatmap, HeatmapRequest, HeatmapResponse};
use model::{
    Identity, InMemorySnapshotStore, ReportError, SnapshotError, SnapshotStore, TenantSnapshot,
};
use pivot::{build_pivot, PivotRequest, PivotResponse};
use scoping::{require_approval_authority, resolve_scope};
use summary::{summarize, SummaryRequest, SummaryResponse};

// --- Configuration ---

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

fn bind_addr() -> String {
    env::var("FIELDTRACK_BIND").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
}

// --- Error Handling ---

#[derive(Error, Debug)]
enum AppError {
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("missing or invalid {0} header")]
    BadHeader(&'static str),
    #[error("export rendering failed: {0}")]
    Export(#[from] ExportError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Report(ReportError::Validation(errors)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors })),
            )
                .into_response(),
            AppError::Report(ReportError::Forbidden(message)) => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": message }))).into_response()
            }
            AppError::Snapshot(SnapshotError::UnknownTenant(tenant_id)) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("unknown tenant: {tenant_id}") })),
            )
                .into_response(),
            AppError::BadHeader(header) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("missing or invalid {header} header") })),
            )
                .into_response(),
            AppError::Export(e) => {
                error!("export failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "export rendering failed" })),
                )
                    .into_response()
            }
        }
    }
}

// --- Application State & Request Context ---

#[derive(Clone)]
struct AppState {
    store: Arc<dyn SnapshotStore>,
}

/// Tenant and caller context carried in `x-tenant-id` / `x-user-id`
/// headers by the session layer in front of this service.
async fn request_context(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(Arc<TenantSnapshot>, Identity), AppError> {
    let tenant_id = headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::BadHeader("x-tenant-id"))?;
    let user_id: u64 = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or(AppError::BadHeader("x-user-id"))?;

    let snapshot = state.store.snapshot(tenant_id).await?;
    let identity = snapshot
        .identity(user_id)
        .cloned()
        .ok_or_else(|| ReportError::Forbidden(format!("unknown user {user_id}")))?;
    Ok((snapshot, identity))
}

// --- Handlers ---

async fn summary_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SummaryRequest>,
) -> Result<Json<SummaryResponse>, AppError> {
    let (snapshot, identity) = request_context(&state, &headers).await?;
    let params = request.validate()?;
    let scope = resolve_scope(&identity, &snapshot, params.user_id)?;
    Ok(Json(summarize(&snapshot, &scope, &params)))
}

async fn pivot_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PivotRequest>,
) -> Result<Json<PivotResponse>, AppError> {
    let (snapshot, identity) = request_context(&state, &headers).await?;
    let params = request.validate()?;
    let scope = resolve_scope(&identity, &snapshot, params.user_filter)?;
    Ok(Json(build_pivot(&snapshot, &scope, &params)))
}

async fn heatmap_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<HeatmapRequest>,
) -> Result<Json<HeatmapResponse>, AppError> {
    let (snapshot, identity) = request_context(&state, &headers).await?;
    require_approval_authority(&identity)?;
    let params = request.validate()?;
    let scope = resolve_scope(&identity, &snapshot, None)?;
    Ok(Json(build_heatmap(&snapshot, &scope, &params)))
}

async fn export_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ExportRequest>,
) -> Result<Response, AppError> {
    let (snapshot, identity) = request_context(&state, &headers).await?;
    let plan = request.validate()?;
    let scope = resolve_scope(&identity, &snapshot, plan.user_filter)?;
    Ok(export_response(&snapshot, &scope, &plan)?)
}

async fn status() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": env!("CARGO_PKG_NAME") }))
}

// --- Startup ---

fn app(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/api/reports/summary", post(summary_report))
        .route("/api/reports/pivot", post(pivot_report))
        .route("/api/reports/heatmap", post(heatmap_report))
        .route("/api/reports/export", post(export_report))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let state = AppState {
        store: Arc::new(InMemorySnapshotStore::with_demo_tenant()),
    };

    let addr = bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("reporting service listening on {addr}");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
