//! # REST API for the data-entry shell
//!
//! JSON endpoints a form front end uses to save, edit, delete, list and search
//! quality records and to trigger the spreadsheet export.

use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use shared::{
    DeleteRecordResponse, ExportRequest, QualityForm, RecordListResponse, SaveRecordResponse,
    SearchCriteria, UpdateRecordResponse,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::domain::QualityService;
use crate::error::StorageError;
use crate::export::ExportService;

/// Application state holding the services the handlers call
#[derive(Clone)]
pub struct AppState {
    pub quality_service: QualityService,
    pub export_service: ExportService,
}

impl AppState {
    pub fn new(quality_service: QualityService, export_service: ExportService) -> Self {
        Self {
            quality_service,
            export_service,
        }
    }
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router {
    // CORS setup to allow a local front end to make requests
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("http://localhost:8080"))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/options", get(get_form_options))
        .route("/records", get(list_records).post(create_record))
        .route("/records/search", post(search_records))
        .route(
            "/records/:id",
            get(get_record).put(update_record).delete(delete_record),
        )
        .route("/export", post(export_report));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

fn storage_failure(context: &str, e: StorageError) -> axum::response::Response {
    error!("{}: {:?}", context, e);
    (StatusCode::INTERNAL_SERVER_ERROR, context.to_string()).into_response()
}

/// GET /api/options
pub async fn get_form_options(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.quality_service.form_options())
}

/// GET /api/records
pub async fn list_records(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/records");

    match state.quality_service.list().await {
        Ok(records) => (StatusCode::OK, Json(RecordListResponse::from(records))).into_response(),
        Err(e) => storage_failure("Error listing records", e),
    }
}

/// POST /api/records
pub async fn create_record(
    State(state): State<AppState>,
    Json(form): Json<QualityForm>,
) -> impl IntoResponse {
    info!("POST /api/records - color_code: {}", form.color_code);

    match state.quality_service.save(form).await {
        Ok(id) => (StatusCode::CREATED, Json(SaveRecordResponse { id })).into_response(),
        Err(e) => storage_failure("Failed to save record", e),
    }
}

/// GET /api/records/:id
pub async fn get_record(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    info!("GET /api/records/{}", id);

    match state.quality_service.get(id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Record not found").into_response(),
        Err(e) => storage_failure("Error retrieving record", e),
    }
}

/// PUT /api/records/:id
pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<QualityForm>,
) -> impl IntoResponse {
    info!("PUT /api/records/{}", id);

    match state.quality_service.update(id, form).await {
        Ok(updated) => (StatusCode::OK, Json(UpdateRecordResponse { id, updated })).into_response(),
        Err(e) => storage_failure("Failed to update record", e),
    }
}

/// DELETE /api/records/:id
pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    info!("DELETE /api/records/{}", id);

    match state.quality_service.delete(id).await {
        Ok(deleted) => (StatusCode::OK, Json(DeleteRecordResponse { id, deleted })).into_response(),
        Err(e) => storage_failure("Failed to delete record", e),
    }
}

/// POST /api/records/search
pub async fn search_records(
    State(state): State<AppState>,
    Json(criteria): Json<SearchCriteria>,
) -> impl IntoResponse {
    info!("POST /api/records/search - criteria: {:?}", criteria);

    match state.quality_service.search(&criteria).await {
        Ok(records) => (StatusCode::OK, Json(RecordListResponse::from(records))).into_response(),
        Err(StorageError::InvalidCriteria(reason)) => {
            warn!("Rejected search criteria: {}", reason);
            (StatusCode::BAD_REQUEST, reason).into_response()
        }
        Err(e) => storage_failure("Error searching records", e),
    }
}

/// POST /api/export
pub async fn export_report(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> impl IntoResponse {
    info!("POST /api/export - path: {:?}", request.path);

    // Caller-named reports stay inside the configured export directory
    let requested = request.path.as_deref().filter(|p| !p.trim().is_empty());
    let path = match requested.map(|p| state.export_service.resolve_requested_path(p)) {
        Some(Ok(path)) => Some(path),
        Some(Err(e)) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        None => None,
    };

    match state.export_service.export(path.as_deref()).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => {
            error!("❌ Failed to export report: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to export report: {}", e),
            )
                .into_response()
        }
    }
}
