use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::models::{ExceptionDay, WeeklyScheduleEntry, WeeklyScheduleUpdate};
use crate::error::AppResult;
use crate::services::schedule::ScheduleService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_week).put(replace_week))
        .route("/exceptions", get(list_exceptions).post(add_exception))
        .route("/exceptions/:date", delete(remove_exception))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReplaceWeekRequest {
    /// All seven entries, weekdays 0-6; partial weeks are rejected.
    pub entries: Vec<WeeklyScheduleUpdate>,
}

#[derive(Debug, Deserialize)]
pub struct AddExceptionRequest {
    pub date: NaiveDate,
    pub label: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Get the full weekly configuration
async fn get_week(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<WeeklyScheduleEntry>>> {
    let week = ScheduleService::get_week(&state).await?;
    Ok(Json(week))
}

/// Replace the full weekly configuration (all seven days at once)
async fn replace_week(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReplaceWeekRequest>,
) -> AppResult<Json<Vec<WeeklyScheduleEntry>>> {
    let week = ScheduleService::replace_week(&state, request.entries).await?;
    Ok(Json(week))
}

/// List upcoming exception days
async fn list_exceptions(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<ExceptionDay>>> {
    let exceptions = ScheduleService::list_exceptions(&state).await?;
    Ok(Json(exceptions))
}

/// Add a full-day closure
async fn add_exception(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddExceptionRequest>,
) -> AppResult<Json<ExceptionDay>> {
    let created = ScheduleService::add_exception(&state, request.date, &request.label).await?;
    Ok(Json(created))
}

/// Remove the closure for a date
async fn remove_exception(
    State(state): State<Arc<AppState>>,
    Path(date): Path<NaiveDate>,
) -> AppResult<Json<serde_json::Value>> {
    ScheduleService::remove_exception(&state, date).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
