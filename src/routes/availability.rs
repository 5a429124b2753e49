use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::AppResult;
use crate::services::availability::{AvailabilityService, DayAvailability, DaySummary};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/day/:date", get(day_view))
        .route("/month", get(month_summary))
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: i32,
    pub month: u32,
}

// ============================================================================
// Handlers
// ============================================================================

/// Per-slot availability for one date
async fn day_view(
    State(state): State<Arc<AppState>>,
    Path(date): Path<NaiveDate>,
) -> AppResult<Json<DayAvailability>> {
    let view = AvailabilityService::day_view(&state, date).await?;
    Ok(Json(view))
}

/// Calendar summary for one month (drives the color-coded grid)
async fn month_summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MonthQuery>,
) -> AppResult<Json<Vec<DaySummary>>> {
    let summary = AvailabilityService::month_summary(&state, query.year, query.month).await?;
    Ok(Json(summary))
}
