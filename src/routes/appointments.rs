use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::db::models::Appointment;
use crate::error::{AppError, AppResult};
use crate::services::appointments::{AppointmentService, BookingRequest, CancelActor};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create).get(list))
        .route("/:id", get(get_by_id))
        .route("/:id/confirm", post(confirm))
        .route("/:id/cancel", post(cancel))
        .route("/:id/reschedule", post(reschedule))
        .route("/:id/advance", post(advance))
        .route("/:id/rate", post(rate))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub date: Option<NaiveDate>,
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub actor: CancelActor,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub date: NaiveDate,
    pub slot_start: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub score: i64,
    pub comment: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Book a slot. On SLOT_UNAVAILABLE the caller must re-query availability
/// and retry with a different slot.
async fn create(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BookingRequest>,
) -> AppResult<Json<Appointment>> {
    let appointment = AppointmentService::create(&state, request).await?;
    Ok(Json(appointment))
}

/// List appointments for a date or a client (admin views)
async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Appointment>>> {
    match (query.date, query.client_id) {
        (Some(date), None) => Ok(Json(AppointmentService::list_for_date(&state, date).await?)),
        (None, Some(client_id)) => Ok(Json(
            AppointmentService::list_for_client(&state, &client_id).await?,
        )),
        _ => Err(AppError::BadRequest(
            "provide exactly one of `date` or `client_id`".to_string(),
        )),
    }
}

async fn get_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Appointment>> {
    let appointment = AppointmentService::get(&state, &id).await?;
    Ok(Json(appointment))
}

/// Admin confirms a pending appointment
async fn confirm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Appointment>> {
    let appointment = AppointmentService::confirm(&state, &id).await?;
    Ok(Json(appointment))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<CancelRequest>,
) -> AppResult<Json<Appointment>> {
    let appointment = AppointmentService::cancel(&state, &id, request.actor).await?;
    Ok(Json(appointment))
}

async fn reschedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<RescheduleRequest>,
) -> AppResult<Json<Appointment>> {
    let appointment =
        AppointmentService::reschedule(&state, &id, request.date, request.slot_start).await?;
    Ok(Json(appointment))
}

/// Advance confirmed -> in_progress -> completed
async fn advance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Appointment>> {
    let appointment = AppointmentService::advance(&state, &id).await?;
    Ok(Json(appointment))
}

/// One-time rating of a completed appointment
async fn rate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<RateRequest>,
) -> AppResult<Json<Appointment>> {
    let appointment =
        AppointmentService::rate(&state, &id, request.score, request.comment.as_deref()).await?;
    Ok(Json(appointment))
}
