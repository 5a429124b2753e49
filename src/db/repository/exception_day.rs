use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::db::models::ExceptionDay;
use crate::error::{AppError, AppResult};

// ============================================================================
// Exception Day Repository
// ============================================================================

pub struct ExceptionDayRepository;

impl ExceptionDayRepository {
    pub async fn find_by_date(
        pool: &SqlitePool,
        date: NaiveDate,
    ) -> AppResult<Option<ExceptionDay>> {
        let row = sqlx::query_as::<_, ExceptionDay>(
            r#"
            SELECT date, label, created_at
            FROM exception_days
            WHERE date = ?
            "#,
        )
        .bind(date)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn create(
        pool: &SqlitePool,
        date: NaiveDate,
        label: &str,
    ) -> AppResult<ExceptionDay> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query_as::<_, ExceptionDay>(
            r#"
            INSERT INTO exception_days (date, label, created_at)
            VALUES (?, ?, ?)
            RETURNING date, label, created_at
            "#,
        )
        .bind(date)
        .bind(label)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Delete the exception for a date. Returns whether a row was removed.
    pub async fn delete(pool: &SqlitePool, date: NaiveDate) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM exception_days WHERE date = ?")
            .bind(date)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// List exceptions on or after `from`, soonest first.
    pub async fn list_from(pool: &SqlitePool, from: NaiveDate) -> AppResult<Vec<ExceptionDay>> {
        let rows = sqlx::query_as::<_, ExceptionDay>(
            r#"
            SELECT date, label, created_at
            FROM exception_days
            WHERE date >= ?
            ORDER BY date ASC
            "#,
        )
        .bind(from)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }
}
