use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::{WeeklyScheduleEntry, WeeklyScheduleUpdate};
use crate::error::{AppError, AppResult};

// ============================================================================
// Weekly Schedule Repository
// ============================================================================

pub struct ScheduleRepository;

impl ScheduleRepository {
    pub async fn get_week(pool: &SqlitePool) -> AppResult<Vec<WeeklyScheduleEntry>> {
        let rows = sqlx::query_as::<_, WeeklyScheduleEntry>(
            r#"
            SELECT
                weekday, active, open_time, close_time,
                break_start, break_end, slot_interval_minutes,
                capacity_per_slot, updated_at
            FROM weekly_schedule
            ORDER BY weekday ASC
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    pub async fn find_by_weekday(
        pool: &SqlitePool,
        weekday: i64,
    ) -> AppResult<Option<WeeklyScheduleEntry>> {
        let row = sqlx::query_as::<_, WeeklyScheduleEntry>(
            r#"
            SELECT
                weekday, active, open_time, close_time,
                break_start, break_end, slot_interval_minutes,
                capacity_per_slot, updated_at
            FROM weekly_schedule
            WHERE weekday = ?
            "#,
        )
        .bind(weekday)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn count(pool: &SqlitePool) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM weekly_schedule")
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(count)
    }

    /// Replace the whole week in a single transaction. Callers validate the
    /// entries first; this only guarantees the replacement is all-or-nothing
    /// so a day is never left half-configured.
    pub async fn replace_week(
        pool: &SqlitePool,
        entries: &[WeeklyScheduleUpdate],
    ) -> AppResult<Vec<WeeklyScheduleEntry>> {
        let now = Utc::now().naive_utc();

        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        sqlx::query("DELETE FROM weekly_schedule")
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO weekly_schedule (
                    weekday, active, open_time, close_time,
                    break_start, break_end, slot_interval_minutes,
                    capacity_per_slot, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(entry.weekday)
            .bind(entry.active)
            .bind(entry.open_time)
            .bind(entry.close_time)
            .bind(entry.break_start)
            .bind(entry.break_end)
            .bind(entry.slot_interval_minutes)
            .bind(entry.capacity_per_slot)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        }

        tx.commit().await.map_err(AppError::Database)?;

        Self::get_week(pool).await
    }
}
