use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{
    DepartmentEntry, DepartmentId, KpiId, LocationEntry, LocationId, ManagerId,
    MeasurementSource, Month, ThresholdId,
};
use super::evaluation::ThresholdDraft;
use super::import::{import_template, ImportError};
use super::repository::{BonusRepository, RepositoryError};
use super::service::{BonusService, BonusServiceError};

/// Router exposing measurement entry, the evaluation passes and the rollups.
pub fn bonus_router<R>(service: Arc<BonusService<R>>) -> Router
where
    R: BonusRepository + 'static,
{
    Router::new()
        .route("/api/v1/kpis", get(kpis_handler::<R>))
        .route(
            "/api/v1/kpis/:kpi_id/thresholds",
            get(thresholds_handler::<R>).post(add_threshold_handler::<R>),
        )
        .route(
            "/api/v1/thresholds/:threshold_id",
            delete(delete_threshold_handler::<R>).put(update_threshold_handler::<R>),
        )
        .route("/api/v1/months", get(months_handler::<R>))
        .route(
            "/api/v1/measurements/locations",
            post(record_location_handler::<R>),
        )
        .route(
            "/api/v1/measurements/departments",
            post(record_department_handler::<R>),
        )
        .route(
            "/api/v1/months/:month/measurements",
            get(measurements_handler::<R>),
        )
        .route(
            "/api/v1/months/:month/locations/:location_id/measurements",
            delete(withdraw_location_handler::<R>),
        )
        .route(
            "/api/v1/months/:month/evaluate",
            post(evaluate_handler::<R>),
        )
        .route(
            "/api/v1/months/:month/summarize",
            post(summarize_handler::<R>),
        )
        .route(
            "/api/v1/months/:month/recalculate",
            post(recalculate_handler::<R>),
        )
        .route(
            "/api/v1/months/:month/evaluations",
            get(evaluations_handler::<R>),
        )
        .route(
            "/api/v1/months/:month/summaries",
            get(summaries_handler::<R>),
        )
        .route(
            "/api/v1/months/:month/managers/:manager_id/rollup",
            get(rollup_handler::<R>),
        )
        .route("/api/v1/months/:month/rollups", get(rollups_handler::<R>))
        .route(
            "/api/v1/months/:month/comparison",
            get(comparison_handler::<R>),
        )
        .route("/api/v1/import", post(import_handler::<R>))
        .route("/api/v1/import/template", get(template_handler))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct KpiListQuery {
    #[serde(default)]
    include_inactive: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LocationQuery {
    location_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DepartmentQuery {
    department_id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ComparisonQuery {
    kpi_id: Option<u64>,
}

pub(crate) async fn kpis_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Query(query): Query<KpiListQuery>,
) -> Response
where
    R: BonusRepository + 'static,
{
    match service.kpis(query.include_inactive) {
        Ok(kpis) => (StatusCode::OK, Json(kpis)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn thresholds_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Path(kpi_id): Path<u64>,
) -> Response
where
    R: BonusRepository + 'static,
{
    match service.thresholds(KpiId(kpi_id)) {
        Ok(rules) => (StatusCode::OK, Json(rules)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn add_threshold_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Path(kpi_id): Path<u64>,
    Json(draft): Json<ThresholdDraft>,
) -> Response
where
    R: BonusRepository + 'static,
{
    match service.add_threshold(KpiId(kpi_id), draft) {
        Ok(rule) => (StatusCode::CREATED, Json(rule)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn update_threshold_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Path(threshold_id): Path<u64>,
    Json(draft): Json<ThresholdDraft>,
) -> Response
where
    R: BonusRepository + 'static,
{
    match service.update_threshold(ThresholdId(threshold_id), draft) {
        Ok(rule) => (StatusCode::OK, Json(rule)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn delete_threshold_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Path(threshold_id): Path<u64>,
) -> Response
where
    R: BonusRepository + 'static,
{
    match service.delete_threshold(ThresholdId(threshold_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn months_handler<R>(State(service): State<Arc<BonusService<R>>>) -> Response
where
    R: BonusRepository + 'static,
{
    match service.months_with_data() {
        Ok(months) => (StatusCode::OK, Json(months)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn record_location_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Json(entry): Json<LocationEntry>,
) -> Response
where
    R: BonusRepository + 'static,
{
    match service.record_location_measurement(entry, MeasurementSource::Manual) {
        Ok(measurement) => (StatusCode::OK, Json(measurement)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn record_department_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Json(entry): Json<DepartmentEntry>,
) -> Response
where
    R: BonusRepository + 'static,
{
    match service.record_department_measurement(entry, MeasurementSource::Manual) {
        Ok(measurement) => (StatusCode::OK, Json(measurement)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn measurements_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Path(month): Path<String>,
    Query(query): Query<LocationQuery>,
) -> Response
where
    R: BonusRepository + 'static,
{
    let month = match parse_month(&month) {
        Ok(month) => month,
        Err(response) => return response,
    };
    let locations = service.location_measurements(month, query.location_id.map(LocationId));
    let departments = service.department_measurements(month, None);
    match (locations, departments) {
        (Ok(locations), Ok(departments)) => {
            let payload = json!({
                "month": month,
                "locations": locations,
                "departments": departments,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        (Err(err), _) | (_, Err(err)) => service_error_response(err),
    }
}

pub(crate) async fn withdraw_location_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Path((month, location_id)): Path<(String, u64)>,
) -> Response
where
    R: BonusRepository + 'static,
{
    let month = match parse_month(&month) {
        Ok(month) => month,
        Err(response) => return response,
    };
    match service.withdraw_location_month(month, LocationId(location_id)) {
        Ok(withdrawal) => (StatusCode::OK, Json(withdrawal)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn evaluate_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Path(month): Path<String>,
    Query(query): Query<LocationQuery>,
) -> Response
where
    R: BonusRepository + 'static,
{
    let month = match parse_month(&month) {
        Ok(month) => month,
        Err(response) => return response,
    };
    match service.evaluate_month(month, query.location_id.map(LocationId)) {
        Ok(run) => (StatusCode::OK, Json(run)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn summarize_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Path(month): Path<String>,
) -> Response
where
    R: BonusRepository + 'static,
{
    let month = match parse_month(&month) {
        Ok(month) => month,
        Err(response) => return response,
    };
    match service.summarize_month(month) {
        Ok(run) => (StatusCode::OK, Json(run)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn recalculate_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Path(month): Path<String>,
) -> Response
where
    R: BonusRepository + 'static,
{
    let month = match parse_month(&month) {
        Ok(month) => month,
        Err(response) => return response,
    };
    match service.recalculate(month) {
        Ok(run) => (StatusCode::OK, Json(run)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn evaluations_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Path(month): Path<String>,
    Query(query): Query<LocationQuery>,
) -> Response
where
    R: BonusRepository + 'static,
{
    let month = match parse_month(&month) {
        Ok(month) => month,
        Err(response) => return response,
    };
    match service.evaluations(month, query.location_id.map(LocationId)) {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn summaries_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Path(month): Path<String>,
    Query(query): Query<DepartmentQuery>,
) -> Response
where
    R: BonusRepository + 'static,
{
    let month = match parse_month(&month) {
        Ok(month) => month,
        Err(response) => return response,
    };
    match service.summaries(Some(month), query.department_id.map(DepartmentId)) {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn rollup_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Path((month, manager_id)): Path<(String, u64)>,
) -> Response
where
    R: BonusRepository + 'static,
{
    let month = match parse_month(&month) {
        Ok(month) => month,
        Err(response) => return response,
    };
    match service.rollup(month, ManagerId(manager_id)) {
        Ok(rollup) => (StatusCode::OK, Json(rollup)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn rollups_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Path(month): Path<String>,
) -> Response
where
    R: BonusRepository + 'static,
{
    let month = match parse_month(&month) {
        Ok(month) => month,
        Err(response) => return response,
    };
    match service.rollups(month) {
        Ok(rollups) => (StatusCode::OK, Json(rollups)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn comparison_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    Path(month): Path<String>,
    Query(query): Query<ComparisonQuery>,
) -> Response
where
    R: BonusRepository + 'static,
{
    let month = match parse_month(&month) {
        Ok(month) => month,
        Err(response) => return response,
    };
    match service.comparison(month, query.kpi_id.map(KpiId)) {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn import_handler<R>(
    State(service): State<Arc<BonusService<R>>>,
    body: String,
) -> Response
where
    R: BonusRepository + 'static,
{
    match service.import_csv(body.as_bytes()) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => import_error_response(err),
    }
}

pub(crate) async fn template_handler() -> Response {
    match import_template() {
        Ok(template) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            template,
        )
            .into_response(),
        Err(err) => import_error_response(err),
    }
}

fn parse_month(raw: &str) -> Result<Month, Response> {
    raw.parse::<Month>().map_err(|err| {
        let payload = json!({
            "error": err.to_string(),
        });
        (StatusCode::BAD_REQUEST, Json(payload)).into_response()
    })
}

pub(crate) fn service_error_status(err: &BonusServiceError) -> StatusCode {
    match err {
        BonusServiceError::Inactive { .. } | BonusServiceError::Invalid { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        BonusServiceError::NoChanges => StatusCode::BAD_REQUEST,
        BonusServiceError::DepartmentInUse { .. } => StatusCode::CONFLICT,
        BonusServiceError::Repository(RepositoryError::Conflict { .. }) => StatusCode::CONFLICT,
        BonusServiceError::Repository(RepositoryError::NotFound { .. }) => StatusCode::NOT_FOUND,
        BonusServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn service_error_response(err: BonusServiceError) -> Response {
    let status = service_error_status(&err);
    if status.is_server_error() {
        error!(error = %err, "bonus request failed");
    }
    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}

fn import_error_response(err: ImportError) -> Response {
    let status = match &err {
        ImportError::Csv(_) | ImportError::MissingColumns(_) => StatusCode::BAD_REQUEST,
        ImportError::Io(_) | ImportError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %err, "CSV import failed");
    }
    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}
