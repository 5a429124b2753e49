use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A named full-day closure (holiday, vacation) overriding the weekly
/// configuration. Identity is the date: one exception per calendar date.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExceptionDay {
    pub date: NaiveDate,
    pub label: String,
    pub created_at: NaiveDateTime,
}
