use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::models::AppointmentState;

/// Why a requested slot could not be booked. The UI needs the distinction:
/// a closed day is rendered differently from a fully booked one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotUnavailableReason {
    Closed,
    Past,
    Full,
    UnknownSlot,
}

impl SlotUnavailableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotUnavailableReason::Closed => "closed",
            SlotUnavailableReason::Past => "past",
            SlotUnavailableReason::Full => "full",
            SlotUnavailableReason::UnknownSlot => "unknown_slot",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Slot unavailable: {}", .0.as_str())]
    SlotUnavailable(SlotUnavailableReason),

    #[error("Invalid transition: cannot {action} an appointment in state {state}")]
    InvalidTransition {
        state: AppointmentState,
        action: &'static str,
    },

    #[error("Cancellation window expired: at least {hours}h notice required")]
    CancellationCutoff { hours: u32 },

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone(), None),
            AppError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
            ),
            AppError::SlotUnavailable(reason) => (
                StatusCode::CONFLICT,
                "SLOT_UNAVAILABLE",
                self.to_string(),
                Some(serde_json::json!({ "reason": reason.as_str() })),
            ),
            AppError::InvalidTransition { state, action } => (
                StatusCode::CONFLICT,
                "INVALID_TRANSITION",
                self.to_string(),
                Some(serde_json::json!({
                    "current_state": state.as_str(),
                    "action": action,
                })),
            ),
            AppError::CancellationCutoff { hours } => (
                StatusCode::CONFLICT,
                "CANCELLATION_CUTOFF",
                self.to_string(),
                Some(serde_json::json!({ "cutoff_hours": hours })),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    None,
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
