//! REST surface for the quote → job → work order pipeline.
//!
//! Routes (all JSON, tenant resolved from the `X-Tenant-Id` header):
//! - `POST   /api/v1/quotes`                             — create a draft quote
//! - `GET    /api/v1/quotes/{id}`                        — fetch a quote
//! - `GET    /api/v1/quotes/{id}/allowed-statuses`       — legal next statuses
//! - `POST   /api/v1/quotes/{id}/status`                 — status transition
//! - `POST   /api/v1/quotes/{id}/line-items`             — append a line item
//! - `DELETE /api/v1/quotes/{id}/line-items/{index}`     — remove by index
//! - `POST   /api/v1/quotes/{id}/labor-items`            — append a labor item
//! - `DELETE /api/v1/quotes/{id}/labor-items/{index}`    — remove by index
//! - `POST   /api/v1/quotes/{id}/recalculate`            — rederive totals
//! - `POST   /api/v1/quotes/{id}/create-job`             — promote to job
//! - `GET    /api/v1/jobs/{id}`                          — fetch a job
//! - `GET    /api/v1/jobs/{id}/allowed-statuses`
//! - `POST   /api/v1/jobs/{id}/status`
//! - `POST   /api/v1/jobs/{id}/assign-installer`         — capacity-gated
//! - `GET    /api/v1/installers/{id}/availability?date=YYYY-MM-DD`
//! - `POST   /api/v1/work-orders/generate`               — snapshot from job
//! - `GET    /api/v1/work-orders/{id}`
//! - `GET    /api/v1/work-orders/{id}/allowed-statuses`
//! - `POST   /api/v1/work-orders/{id}/status`

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use fieldline_core::availability::{evaluate, AvailabilityReport, CapacityCaps};
use fieldline_core::domain::installer::{Installer, InstallerId};
use fieldline_core::domain::job::{Job, JobId, JobStatus};
use fieldline_core::domain::quote::{
    LaborItem, LineItem, LineItemDraft, LineItemKind, Quote, QuoteId, QuoteStatus,
};
use fieldline_core::domain::work_order::{ContactInfo, WorkOrder, WorkOrderId, WorkOrderStatus};
use fieldline_core::domain::{HomeownerId, LeadId, TenantId};
use fieldline_core::errors::DomainError;
use fieldline_core::pipeline::{job_from_quote, work_order_from_job};
use fieldline_core::pricing::QuoteTotals;
use fieldline_db::repositories::{
    InstallerRepository, JobRepository, QuoteRepository, RepositoryError, SqlInstallerRepository,
    SqlJobRepository, SqlQuoteRepository, SqlWorkOrderRepository, WorkOrderRepository,
};
use fieldline_db::DbPool;

pub const TENANT_HEADER: &str = "x-tenant-id";

#[derive(Clone)]
pub struct ApiState {
    pub quotes: Arc<dyn QuoteRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub work_orders: Arc<dyn WorkOrderRepository>,
    pub installers: Arc<dyn InstallerRepository>,
}

impl ApiState {
    pub fn from_pool(pool: DbPool) -> Self {
        Self {
            quotes: Arc::new(SqlQuoteRepository::new(pool.clone())),
            jobs: Arc::new(SqlJobRepository::new(pool.clone())),
            work_orders: Arc::new(SqlWorkOrderRepository::new(pool.clone())),
            installers: Arc::new(SqlInstallerRepository::new(pool)),
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/quotes", post(create_quote))
        .route("/api/v1/quotes/{id}", get(get_quote))
        .route("/api/v1/quotes/{id}/allowed-statuses", get(quote_allowed_statuses))
        .route("/api/v1/quotes/{id}/status", post(set_quote_status))
        .route("/api/v1/quotes/{id}/line-items", post(add_line_item))
        .route("/api/v1/quotes/{id}/line-items/{index}", delete(remove_line_item))
        .route("/api/v1/quotes/{id}/labor-items", post(add_labor_item))
        .route("/api/v1/quotes/{id}/labor-items/{index}", delete(remove_labor_item))
        .route("/api/v1/quotes/{id}/recalculate", post(recalculate_quote))
        .route("/api/v1/quotes/{id}/create-job", post(create_job))
        .route("/api/v1/jobs/{id}", get(get_job))
        .route("/api/v1/jobs/{id}/allowed-statuses", get(job_allowed_statuses))
        .route("/api/v1/jobs/{id}/status", post(set_job_status))
        .route("/api/v1/jobs/{id}/assign-installer", post(assign_installer))
        .route("/api/v1/installers/{id}/availability", get(installer_availability))
        .route("/api/v1/work-orders/generate", post(generate_work_order))
        .route("/api/v1/work-orders/{id}", get(get_work_order))
        .route("/api/v1/work-orders/{id}/allowed-statuses", get(work_order_allowed_statuses))
        .route("/api/v1/work-orders/{id}/status", post(set_work_order_status))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    NotFound { entity: &'static str, id: String },
    Domain(DomainError),
    AlreadyExists { entity: &'static str, detail: String },
    Conflict(String),
    BadRequest(String),
    Storage(String),
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        Self::Domain(error)
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::AlreadyExists { entity, detail } => {
                Self::AlreadyExists { entity, detail }
            }
            RepositoryError::Conflict { detail, .. } => Self::Conflict(detail),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, detail) = match &self {
            Self::NotFound { entity, id } => {
                (StatusCode::NOT_FOUND, "not_found", format!("{entity} {id} not found"))
            }
            Self::Domain(error) => {
                let code = match error {
                    DomainError::InvalidQuoteTransition { .. }
                    | DomainError::InvalidJobTransition { .. }
                    | DomainError::InvalidWorkOrderTransition { .. } => "invalid_transition",
                    DomainError::QuoteLocked { .. } => "quote_locked",
                    DomainError::InstallerUnavailable { .. } => "installer_unavailable",
                    DomainError::Validation(_) => "validation",
                };
                let status = if matches!(error, DomainError::InstallerUnavailable { .. }) {
                    StatusCode::CONFLICT
                } else {
                    StatusCode::UNPROCESSABLE_ENTITY
                };
                (status, code, error.to_string())
            }
            Self::AlreadyExists { entity, detail } => {
                let code = match *entity {
                    "job" => "job_already_exists",
                    "work_order" => "work_order_already_exists",
                    "quote" => "quote_already_exists",
                    "installer" => "installer_already_exists",
                    _ => "already_exists",
                };
                (StatusCode::CONFLICT, code, detail.clone())
            }
            Self::Conflict(detail) => (StatusCode::CONFLICT, "conflict", detail.clone()),
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, "bad_request", detail.clone()),
            Self::Storage(detail) => {
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", detail.clone())
            }
        };

        (status, Json(serde_json::json!({ "error": code, "detail": detail }))).into_response()
    }
}

fn tenant_from(headers: &HeaderMap) -> Result<TenantId, ApiError> {
    let value = headers
        .get(TENANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("missing {TENANT_HEADER} header")))?;
    Ok(TenantId(value.to_string()))
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

async fn load_quote(
    state: &ApiState,
    tenant: &TenantId,
    id: &str,
) -> Result<Quote, ApiError> {
    state
        .quotes
        .find_by_id(tenant, &QuoteId(id.to_string()))
        .await?
        .ok_or_else(|| ApiError::NotFound { entity: "quote", id: id.to_string() })
}

async fn load_job(state: &ApiState, tenant: &TenantId, id: &str) -> Result<Job, ApiError> {
    state
        .jobs
        .find_by_id(tenant, &JobId(id.to_string()))
        .await?
        .ok_or_else(|| ApiError::NotFound { entity: "job", id: id.to_string() })
}

async fn load_work_order(
    state: &ApiState,
    tenant: &TenantId,
    id: &str,
) -> Result<WorkOrder, ApiError> {
    state
        .work_orders
        .find_by_id(tenant, &WorkOrderId(id.to_string()))
        .await?
        .ok_or_else(|| ApiError::NotFound { entity: "work order", id: id.to_string() })
}

async fn load_installer(
    state: &ApiState,
    tenant: &TenantId,
    id: &str,
) -> Result<Installer, ApiError> {
    state
        .installers
        .find_by_id(tenant, &InstallerId(id.to_string()))
        .await?
        .ok_or_else(|| ApiError::NotFound { entity: "installer", id: id.to_string() })
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateQuoteRequest {
    pub tax_rate: Decimal,
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub homeowner_id: Option<String>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub internal_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    pub kind: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    #[serde(default)]
    pub product_ref: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub finish: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LaborItemRequest {
    pub description: String,
    pub hours: Decimal,
    pub hourly_rate: Decimal,
    #[serde(default)]
    pub installer_id: Option<String>,
    #[serde(default)]
    pub installer_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignInstallerRequest {
    pub installer_id: String,
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateWorkOrderRequest {
    pub job_id: String,
    #[serde(default)]
    pub homeowner_info: Option<ContactInfo>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AllowedStatusesResponse {
    pub status: &'static str,
    pub allowed_statuses: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ItemAddedResponse {
    pub index: usize,
    pub quote: Quote,
}

// ---------------------------------------------------------------------------
// Quote handlers
// ---------------------------------------------------------------------------

pub async fn create_quote(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<CreateQuoteRequest>,
) -> Result<(StatusCode, Json<Quote>), ApiError> {
    let tenant = tenant_from(&headers)?;

    let mut quote = Quote::new(QuoteId(new_id()), tenant, request.tax_rate)?;
    quote.lead_id = request.lead_id.map(LeadId);
    quote.homeowner_id = request.homeowner_id.map(HomeownerId);
    quote.valid_until = request.valid_until;
    quote.internal_notes = request.internal_notes;

    state.quotes.insert(&quote).await?;
    info!(
        event_name = "pipeline.quote.created",
        quote_id = %quote.id.0,
        tenant_id = %quote.tenant_id.0,
        "draft quote created"
    );
    Ok((StatusCode::CREATED, Json(quote)))
}

pub async fn get_quote(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Quote>, ApiError> {
    let tenant = tenant_from(&headers)?;
    Ok(Json(load_quote(&state, &tenant, &id).await?))
}

pub async fn quote_allowed_statuses(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AllowedStatusesResponse>, ApiError> {
    let tenant = tenant_from(&headers)?;
    let quote = load_quote(&state, &tenant, &id).await?;
    Ok(Json(AllowedStatusesResponse {
        status: quote.status.as_str(),
        allowed_statuses: quote.allowed_statuses().iter().map(QuoteStatus::as_str).collect(),
    }))
}

pub async fn set_quote_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Quote>, ApiError> {
    let tenant = tenant_from(&headers)?;
    let next = QuoteStatus::parse(&request.status).ok_or_else(|| {
        ApiError::Domain(DomainError::Validation(format!(
            "unknown quote status `{}`",
            request.status
        )))
    })?;

    let mut quote = load_quote(&state, &tenant, &id).await?;
    let from = quote.status;
    quote.transition_to(next)?;
    state.quotes.update(&mut quote).await?;

    info!(
        event_name = "pipeline.quote.status_changed",
        quote_id = %quote.id.0,
        from = from.as_str(),
        to = next.as_str(),
        "quote status changed"
    );
    Ok(Json(quote))
}

pub async fn add_line_item(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<LineItemRequest>,
) -> Result<(StatusCode, Json<ItemAddedResponse>), ApiError> {
    let tenant = tenant_from(&headers)?;
    let kind = LineItemKind::parse(&request.kind).ok_or_else(|| {
        ApiError::Domain(DomainError::Validation(format!(
            "unknown line item kind `{}`",
            request.kind
        )))
    })?;
    let item = LineItem::new(
        kind,
        request.description,
        request.quantity,
        request.unit,
        request.unit_price,
        LineItemDraft {
            product_ref: request.product_ref,
            style: request.style,
            color: request.color,
            finish: request.finish,
        },
    )?;

    let mut quote = load_quote(&state, &tenant, &id).await?;
    let index = quote.add_line_item(item)?;
    state.quotes.update(&mut quote).await?;
    Ok((StatusCode::CREATED, Json(ItemAddedResponse { index, quote })))
}

pub async fn remove_line_item(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Json<Quote>, ApiError> {
    let tenant = tenant_from(&headers)?;
    let mut quote = load_quote(&state, &tenant, &id).await?;
    quote.remove_line_item(index)?;
    state.quotes.update(&mut quote).await?;
    Ok(Json(quote))
}

pub async fn add_labor_item(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<LaborItemRequest>,
) -> Result<(StatusCode, Json<ItemAddedResponse>), ApiError> {
    let tenant = tenant_from(&headers)?;
    let item = LaborItem::new(
        request.description,
        request.hours,
        request.hourly_rate,
        request.installer_id.map(InstallerId),
        request.installer_name,
    )?;

    let mut quote = load_quote(&state, &tenant, &id).await?;
    let index = quote.add_labor_item(item)?;
    state.quotes.update(&mut quote).await?;
    Ok((StatusCode::CREATED, Json(ItemAddedResponse { index, quote })))
}

pub async fn remove_labor_item(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((id, index)): Path<(String, usize)>,
) -> Result<Json<Quote>, ApiError> {
    let tenant = tenant_from(&headers)?;
    let mut quote = load_quote(&state, &tenant, &id).await?;
    quote.remove_labor_item(index)?;
    state.quotes.update(&mut quote).await?;
    Ok(Json(quote))
}

pub async fn recalculate_quote(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<QuoteTotals>, ApiError> {
    let tenant = tenant_from(&headers)?;
    let mut quote = load_quote(&state, &tenant, &id).await?;
    let totals = quote.recalculate().clone();
    state.quotes.update(&mut quote).await?;
    Ok(Json(totals))
}

pub async fn create_job(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let tenant = tenant_from(&headers)?;
    let quote = load_quote(&state, &tenant, &id).await?;

    let job = job_from_quote(&quote, JobId(new_id()), Utc::now())?;
    state.jobs.insert(&job).await?;

    info!(
        event_name = "pipeline.job.created",
        job_id = %job.id.0,
        quote_id = %quote.id.0,
        "job created from approved quote"
    );
    Ok((StatusCode::CREATED, Json(job)))
}

// ---------------------------------------------------------------------------
// Job handlers
// ---------------------------------------------------------------------------

pub async fn get_job(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let tenant = tenant_from(&headers)?;
    Ok(Json(load_job(&state, &tenant, &id).await?))
}

pub async fn job_allowed_statuses(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AllowedStatusesResponse>, ApiError> {
    let tenant = tenant_from(&headers)?;
    let job = load_job(&state, &tenant, &id).await?;
    Ok(Json(AllowedStatusesResponse {
        status: job.status.as_str(),
        allowed_statuses: job.allowed_statuses().iter().map(JobStatus::as_str).collect(),
    }))
}

pub async fn set_job_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Job>, ApiError> {
    let tenant = tenant_from(&headers)?;
    let next = JobStatus::parse(&request.status).ok_or_else(|| {
        ApiError::Domain(DomainError::Validation(format!(
            "unknown job status `{}`",
            request.status
        )))
    })?;

    let mut job = load_job(&state, &tenant, &id).await?;
    let from = job.status;
    job.transition_to(next)?;
    state.jobs.update(&mut job).await?;

    info!(
        event_name = "pipeline.job.status_changed",
        job_id = %job.id.0,
        from = from.as_str(),
        to = next.as_str(),
        "job status changed"
    );
    Ok(Json(job))
}

pub async fn assign_installer(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<AssignInstallerRequest>,
) -> Result<Json<Job>, ApiError> {
    let tenant = tenant_from(&headers)?;
    let mut job = load_job(&state, &tenant, &id).await?;
    if !job.can_assign_installer() {
        return Err(DomainError::Validation(format!(
            "installer cannot be assigned while job is {}",
            job.status.as_str()
        ))
        .into());
    }

    let installer = load_installer(&state, &tenant, &request.installer_id).await?;
    if !installer.status.is_assignable() {
        return Err(DomainError::InstallerUnavailable {
            installer_id: installer.id.clone(),
            reason: format!("installer is {}", installer.status.as_str()),
        }
        .into());
    }

    let target_date = request
        .scheduled_date
        .or(job.scheduled_date)
        .unwrap_or_else(|| Utc::now().date_naive());
    let counts = state.jobs.capacity_counts(&tenant, &installer.id, target_date).await?;
    let report = evaluate(
        CapacityCaps {
            max_jobs_per_day: installer.max_jobs_per_day,
            max_jobs_per_week: installer.max_jobs_per_week,
        },
        counts,
    );
    if !report.available {
        return Err(DomainError::InstallerUnavailable {
            installer_id: installer.id.clone(),
            reason: report.message,
        }
        .into());
    }

    job.assign_installer(installer.id.clone())?;
    if request.scheduled_date.is_some() {
        job.scheduled_date = request.scheduled_date;
    }
    state.jobs.update(&mut job).await?;

    info!(
        event_name = "pipeline.job.installer_assigned",
        job_id = %job.id.0,
        installer_id = %installer.id.0,
        scheduled_date = %target_date,
        "installer assigned to job"
    );
    Ok(Json(job))
}

// ---------------------------------------------------------------------------
// Installer handlers
// ---------------------------------------------------------------------------

pub async fn installer_availability(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityReport>, ApiError> {
    let tenant = tenant_from(&headers)?;
    let installer = load_installer(&state, &tenant, &id).await?;

    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let counts = state.jobs.capacity_counts(&tenant, &installer.id, date).await?;
    let mut report = evaluate(
        CapacityCaps {
            max_jobs_per_day: installer.max_jobs_per_day,
            max_jobs_per_week: installer.max_jobs_per_week,
        },
        counts,
    );
    if !installer.status.is_assignable() {
        report.available = false;
        report.message = format!("installer is {}", installer.status.as_str());
    }
    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// Work order handlers
// ---------------------------------------------------------------------------

pub async fn generate_work_order(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<GenerateWorkOrderRequest>,
) -> Result<(StatusCode, Json<WorkOrder>), ApiError> {
    let tenant = tenant_from(&headers)?;
    let job = load_job(&state, &tenant, &request.job_id).await?;
    let quote = load_quote(&state, &tenant, &job.quote_id.0).await?;

    let installer_info = match &job.installer_id {
        Some(installer_id) => state
            .installers
            .find_by_id(&tenant, installer_id)
            .await?
            .map(|installer| ContactInfo {
                name: Some(installer.name),
                phone: installer.phone,
                email: installer.email,
                address: None,
            })
            .unwrap_or_default(),
        None => ContactInfo::default(),
    };

    let mut work_order = work_order_from_job(
        &job,
        &quote,
        WorkOrderId(new_id()),
        request.homeowner_info.unwrap_or_default(),
        installer_info,
        Utc::now(),
    )?;
    work_order.special_instructions = request.special_instructions;

    state.work_orders.insert(&work_order).await?;

    info!(
        event_name = "pipeline.work_order.generated",
        work_order_id = %work_order.id.0,
        job_id = %job.id.0,
        materials = work_order.materials_snapshot.len(),
        "work order generated from job"
    );
    Ok((StatusCode::CREATED, Json(work_order)))
}

pub async fn get_work_order(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<WorkOrder>, ApiError> {
    let tenant = tenant_from(&headers)?;
    Ok(Json(load_work_order(&state, &tenant, &id).await?))
}

pub async fn work_order_allowed_statuses(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AllowedStatusesResponse>, ApiError> {
    let tenant = tenant_from(&headers)?;
    let work_order = load_work_order(&state, &tenant, &id).await?;
    Ok(Json(AllowedStatusesResponse {
        status: work_order.status.as_str(),
        allowed_statuses: work_order
            .allowed_statuses()
            .iter()
            .map(WorkOrderStatus::as_str)
            .collect(),
    }))
}

pub async fn set_work_order_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<WorkOrder>, ApiError> {
    let tenant = tenant_from(&headers)?;
    let next = WorkOrderStatus::parse(&request.status).ok_or_else(|| {
        ApiError::Domain(DomainError::Validation(format!(
            "unknown work order status `{}`",
            request.status
        )))
    })?;

    let mut work_order = load_work_order(&state, &tenant, &id).await?;
    let from = work_order.status;
    work_order.transition_to(next)?;
    state.work_orders.update(&mut work_order).await?;

    info!(
        event_name = "pipeline.work_order.status_changed",
        work_order_id = %work_order.id.0,
        from = from.as_str(),
        to = next.as_str(),
        "work order status changed"
    );
    Ok(Json(work_order))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, Request, StatusCode};
    use axum::response::IntoResponse;
    use axum::Json;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use rust_decimal::Decimal;
    use tower::util::ServiceExt;

    use fieldline_core::domain::installer::{Installer, InstallerId, InstallerStatus};
    use fieldline_core::domain::job::JobStatus;
    use fieldline_core::domain::quote::QuoteStatus;
    use fieldline_core::domain::work_order::WorkOrderStatus;
    use fieldline_core::domain::TenantId;
    use fieldline_db::repositories::{
        InMemoryInstallerRepository, InMemoryJobRepository, InMemoryQuoteRepository,
        InMemoryWorkOrderRepository, InstallerRepository,
    };

    use super::*;

    const TENANT: &str = "tn-api";

    fn memory_state() -> ApiState {
        ApiState {
            quotes: Arc::new(InMemoryQuoteRepository::default()),
            jobs: Arc::new(InMemoryJobRepository::default()),
            work_orders: Arc::new(InMemoryWorkOrderRepository::default()),
            installers: Arc::new(InMemoryInstallerRepository::default()),
        }
    }

    fn tenant_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-id", TENANT.parse().expect("valid header value"));
        headers
    }

    fn installer(id: &str, status: InstallerStatus, per_day: u32, per_week: u32) -> Installer {
        Installer {
            id: InstallerId(id.into()),
            tenant_id: TenantId(TENANT.into()),
            name: "Rivera Flooring Crew".into(),
            status,
            phone: Some("555-0101".into()),
            email: None,
            max_jobs_per_day: per_day,
            max_jobs_per_week: per_week,
        }
    }

    async fn draft_quote(state: &ApiState) -> Quote {
        let (status, Json(quote)) = create_quote(
            State(state.clone()),
            tenant_headers(),
            Json(CreateQuoteRequest {
                tax_rate: Decimal::new(8, 2),
                lead_id: None,
                homeowner_id: Some("ho-1".into()),
                valid_until: None,
                internal_notes: None,
            }),
        )
        .await
        .expect("create quote");
        assert_eq!(status, StatusCode::CREATED);
        quote
    }

    async fn priced_quote(state: &ApiState) -> Quote {
        let quote = draft_quote(state).await;
        add_line_item(
            State(state.clone()),
            tenant_headers(),
            Path(quote.id.0.clone()),
            Json(LineItemRequest {
                kind: "material".into(),
                description: "oak flooring".into(),
                quantity: Decimal::from(10),
                unit: "sq_ft".into(),
                unit_price: Decimal::new(2_500, 2),
                product_ref: Some("OAK-12".into()),
                style: None,
                color: None,
                finish: None,
            }),
        )
        .await
        .expect("add line item");
        add_labor_item(
            State(state.clone()),
            tenant_headers(),
            Path(quote.id.0.clone()),
            Json(LaborItemRequest {
                description: "install flooring".into(),
                hours: Decimal::from(4),
                hourly_rate: Decimal::new(6_000, 2),
                installer_id: None,
                installer_name: Some("A. Mason".into()),
            }),
        )
        .await
        .expect("add labor item");

        let Json(quote) = get_quote(State(state.clone()), tenant_headers(), Path(quote.id.0))
            .await
            .expect("reload quote");
        quote
    }

    async fn approved_quote(state: &ApiState) -> Quote {
        let quote = priced_quote(state).await;
        for next in ["sent", "approved"] {
            set_quote_status(
                State(state.clone()),
                tenant_headers(),
                Path(quote.id.0.clone()),
                Json(StatusRequest { status: next.into() }),
            )
            .await
            .expect("status transition");
        }
        let Json(quote) = get_quote(State(state.clone()), tenant_headers(), Path(quote.id.0))
            .await
            .expect("reload quote");
        quote
    }

    fn response_status(error: ApiError) -> StatusCode {
        error.into_response().status()
    }

    async fn response_error(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("read body").to_bytes();
        let body = serde_json::from_slice(&bytes).expect("error body is JSON");
        (status, body)
    }

    #[tokio::test]
    async fn missing_tenant_header_is_rejected() {
        let state = memory_state();
        let error = get_quote(State(state), HeaderMap::new(), Path("qt-1".into()))
            .await
            .expect_err("no tenant header");
        assert_eq!(response_status(error), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_quote_returns_not_found() {
        let state = memory_state();
        let error = get_quote(State(state), tenant_headers(), Path("qt-missing".into()))
            .await
            .expect_err("unknown id");
        assert_eq!(response_status(error), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn line_items_drive_totals() {
        let state = memory_state();
        let quote = priced_quote(&state).await;

        assert_eq!(quote.totals.materials_subtotal, Decimal::new(25_000, 2));
        assert_eq!(quote.totals.labor_subtotal, Decimal::new(24_000, 2));
        assert_eq!(quote.totals.tax_amount, Decimal::new(3_920, 2));
        assert_eq!(quote.totals.total_price, Decimal::new(52_920, 2));

        let Json(totals) =
            recalculate_quote(State(state.clone()), tenant_headers(), Path(quote.id.0))
                .await
                .expect("recalculate");
        assert_eq!(totals, quote.totals, "recalculation is idempotent");
    }

    #[tokio::test]
    async fn illegal_transition_maps_to_unprocessable() {
        let state = memory_state();
        let quote = draft_quote(&state).await;

        let error = set_quote_status(
            State(state.clone()),
            tenant_headers(),
            Path(quote.id.0.clone()),
            Json(StatusRequest { status: "approved".into() }),
        )
        .await
        .expect_err("draft cannot jump to approved");
        assert_eq!(response_status(error), StatusCode::UNPROCESSABLE_ENTITY);

        let Json(unchanged) = get_quote(State(state), tenant_headers(), Path(quote.id.0))
            .await
            .expect("reload quote");
        assert_eq!(unchanged.status, QuoteStatus::Draft, "failed transition left no trace");
    }

    #[tokio::test]
    async fn unknown_status_code_maps_to_unprocessable() {
        let state = memory_state();
        let quote = draft_quote(&state).await;

        let error = set_quote_status(
            State(state),
            tenant_headers(),
            Path(quote.id.0),
            Json(StatusRequest { status: "finalized".into() }),
        )
        .await
        .expect_err("unknown status code");
        assert_eq!(response_status(error), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn locked_ledger_maps_to_unprocessable() {
        let state = memory_state();
        let quote = approved_quote(&state).await;

        let error = add_line_item(
            State(state),
            tenant_headers(),
            Path(quote.id.0),
            Json(LineItemRequest {
                kind: "material".into(),
                description: "late add".into(),
                quantity: Decimal::ONE,
                unit: "ea".into(),
                unit_price: Decimal::ONE,
                product_ref: None,
                style: None,
                color: None,
                finish: None,
            }),
        )
        .await
        .expect_err("approved ledger is locked");
        assert_eq!(response_status(error), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn promotion_chain_is_idempotent_end_to_end() {
        let state = memory_state();
        state
            .installers
            .insert(&installer("in-1", InstallerStatus::Active, 2, 10))
            .await
            .expect("seed installer");

        let quote = approved_quote(&state).await;

        let (created, Json(job)) =
            create_job(State(state.clone()), tenant_headers(), Path(quote.id.0.clone()))
                .await
                .expect("first promotion");
        assert_eq!(created, StatusCode::CREATED);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.quote_id, quote.id);

        let error = create_job(State(state.clone()), tenant_headers(), Path(quote.id.0.clone()))
            .await
            .expect_err("second promotion conflicts");
        let (status, body) = response_error(error).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "job_already_exists");

        let Json(job) = assign_installer(
            State(state.clone()),
            tenant_headers(),
            Path(job.id.0.clone()),
            Json(AssignInstallerRequest {
                installer_id: "in-1".into(),
                scheduled_date: Some(Utc::now().date_naive()),
            }),
        )
        .await
        .expect("assign installer");
        assert_eq!(job.installer_id, Some(InstallerId("in-1".into())));

        let (generated, Json(order)) = generate_work_order(
            State(state.clone()),
            tenant_headers(),
            Json(GenerateWorkOrderRequest {
                job_id: job.id.0.clone(),
                homeowner_info: None,
                special_instructions: Some("gate code 4411".into()),
            }),
        )
        .await
        .expect("first generation");
        assert_eq!(generated, StatusCode::CREATED);
        assert_eq!(order.status, WorkOrderStatus::Created);
        assert_eq!(order.materials_snapshot.len(), 1);
        assert_eq!(order.labor_instructions.len(), 1);
        assert_eq!(order.installer_info.name.as_deref(), Some("Rivera Flooring Crew"));
        assert_eq!(order.special_instructions.as_deref(), Some("gate code 4411"));

        let error = generate_work_order(
            State(state.clone()),
            tenant_headers(),
            Json(GenerateWorkOrderRequest {
                job_id: job.id.0.clone(),
                homeowner_info: None,
                special_instructions: None,
            }),
        )
        .await
        .expect_err("second generation conflicts");
        let (status, body) = response_error(error).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "work_order_already_exists");

        let Json(order) = set_work_order_status(
            State(state),
            tenant_headers(),
            Path(order.id.0),
            Json(StatusRequest { status: "sent".into() }),
        )
        .await
        .expect("created -> sent");
        assert_eq!(order.status, WorkOrderStatus::Sent);
    }

    #[tokio::test]
    async fn create_job_requires_approved_quote() {
        let state = memory_state();
        let quote = draft_quote(&state).await;

        let error = create_job(State(state), tenant_headers(), Path(quote.id.0))
            .await
            .expect_err("draft quote cannot spawn a job");
        assert_eq!(response_status(error), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn inactive_installer_assignment_conflicts() {
        let state = memory_state();
        state
            .installers
            .insert(&installer("in-idle", InstallerStatus::Inactive, 2, 10))
            .await
            .expect("seed installer");

        let quote = approved_quote(&state).await;
        let (_, Json(job)) = create_job(State(state.clone()), tenant_headers(), Path(quote.id.0))
            .await
            .expect("promote");

        let error = assign_installer(
            State(state),
            tenant_headers(),
            Path(job.id.0),
            Json(AssignInstallerRequest { installer_id: "in-idle".into(), scheduled_date: None }),
        )
        .await
        .expect_err("inactive installer");
        assert_eq!(response_status(error), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn capacity_exhaustion_blocks_assignment_and_shows_in_availability() {
        let state = memory_state();
        state
            .installers
            .insert(&installer("in-full", InstallerStatus::Active, 1, 10))
            .await
            .expect("seed installer");

        let today = Utc::now().date_naive();

        // Fill the installer's single daily slot.
        let first = approved_quote(&state).await;
        let (_, Json(job)) =
            create_job(State(state.clone()), tenant_headers(), Path(first.id.0))
                .await
                .expect("promote first");
        assign_installer(
            State(state.clone()),
            tenant_headers(),
            Path(job.id.0),
            Json(AssignInstallerRequest {
                installer_id: "in-full".into(),
                scheduled_date: Some(today),
            }),
        )
        .await
        .expect("first assignment fits");

        let second = approved_quote(&state).await;
        let (_, Json(job)) =
            create_job(State(state.clone()), tenant_headers(), Path(second.id.0))
                .await
                .expect("promote second");
        let error = assign_installer(
            State(state.clone()),
            tenant_headers(),
            Path(job.id.0),
            Json(AssignInstallerRequest {
                installer_id: "in-full".into(),
                scheduled_date: Some(today),
            }),
        )
        .await
        .expect_err("daily cap reached");
        assert_eq!(response_status(error), StatusCode::CONFLICT);

        let Json(report) = installer_availability(
            State(state),
            tenant_headers(),
            Path("in-full".into()),
            Query(AvailabilityQuery { date: Some(today) }),
        )
        .await
        .expect("availability report");
        assert!(!report.available);
        assert_eq!(report.current_jobs_today, 1);
        assert!(report.message.contains("daily capacity reached"));
    }

    #[tokio::test]
    async fn in_progress_job_rejects_reassignment() {
        let state = memory_state();
        state
            .installers
            .insert(&installer("in-1", InstallerStatus::Active, 2, 10))
            .await
            .expect("seed installer");

        let quote = approved_quote(&state).await;
        let (_, Json(job)) = create_job(State(state.clone()), tenant_headers(), Path(quote.id.0))
            .await
            .expect("promote");

        for next in ["scheduled", "in_progress"] {
            set_job_status(
                State(state.clone()),
                tenant_headers(),
                Path(job.id.0.clone()),
                Json(StatusRequest { status: next.into() }),
            )
            .await
            .expect("job transition");
        }

        let error = assign_installer(
            State(state),
            tenant_headers(),
            Path(job.id.0),
            Json(AssignInstallerRequest { installer_id: "in-1".into(), scheduled_date: None }),
        )
        .await
        .expect_err("in-progress job is locked for reassignment");
        assert_eq!(response_status(error), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn router_serves_error_bodies() {
        let app = router(memory_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/quotes/qt-missing")
                    .header("x-tenant-id", TENANT)
                    .body(Body::empty())
                    .expect("valid request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.expect("read body").to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("error body is JSON");
        assert_eq!(body["error"], "not_found");
        assert!(body["detail"].as_str().is_some_and(|detail| detail.contains("qt-missing")));
    }
}
