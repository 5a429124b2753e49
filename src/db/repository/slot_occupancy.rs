use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::{AppError, AppResult};

/// Repository for the slot occupancy counters behind the capacity ledger.
///
/// Implementation notes:
/// - `reserve` is a single atomic upsert with a guarded `DO UPDATE .. WHERE
///   occupied < capacity`. Zero rows affected means the slot is full. There
///   is never a separate read-count-then-write step, so concurrent reservers
///   of the same slot cannot overshoot capacity.
/// - `release` decrements with an `occupied > 0` guard: releasing an already
///   empty slot is a no-op, not an error.
pub struct SlotOccupancyRepository;

impl SlotOccupancyRepository {
    /// Try to claim one unit of capacity at (date, slot_start).
    /// Returns `true` when the reservation was made, `false` when the slot
    /// already held `capacity` appointments.
    pub async fn reserve(
        pool: &SqlitePool,
        date: NaiveDate,
        slot_start: NaiveTime,
        capacity: i64,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            INSERT INTO slot_occupancy (date, slot_start, occupied, updated_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT (date, slot_start) DO UPDATE
            SET occupied = occupied + 1, updated_at = excluded.updated_at
            WHERE occupied < ?
            "#,
        )
        .bind(date)
        .bind(slot_start)
        .bind(now)
        .bind(capacity)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Give back one unit of capacity. Floored at zero.
    pub async fn release(
        pool: &SqlitePool,
        date: NaiveDate,
        slot_start: NaiveTime,
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE slot_occupancy
            SET occupied = occupied - 1, updated_at = ?
            WHERE date = ? AND slot_start = ? AND occupied > 0
            "#,
        )
        .bind(now)
        .bind(date)
        .bind(slot_start)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn occupancy(
        pool: &SqlitePool,
        date: NaiveDate,
        slot_start: NaiveTime,
    ) -> AppResult<i64> {
        let row = sqlx::query(
            r#"
            SELECT occupied
            FROM slot_occupancy
            WHERE date = ? AND slot_start = ?
            "#,
        )
        .bind(date)
        .bind(slot_start)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| r.get("occupied")).unwrap_or(0))
    }

    /// Occupancy counters for every tracked slot of one day.
    pub async fn day_occupancy(
        pool: &SqlitePool,
        date: NaiveDate,
    ) -> AppResult<Vec<(NaiveTime, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT slot_start, occupied
            FROM slot_occupancy
            WHERE date = ?
            ORDER BY slot_start ASC
            "#,
        )
        .bind(date)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("slot_start"), r.get("occupied")))
            .collect())
    }

    /// Occupancy counters for every tracked slot in `[from, to]`.
    pub async fn range_occupancy(
        pool: &SqlitePool,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<(NaiveDate, NaiveTime, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT date, slot_start, occupied
            FROM slot_occupancy
            WHERE date >= ? AND date <= ?
            ORDER BY date ASC, slot_start ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("date"), r.get("slot_start"), r.get("occupied")))
            .collect())
    }

    /// Drop counters for dates strictly before `date`. Past slots are never
    /// consulted by capacity queries, so the rows are dead weight.
    pub async fn purge_before(pool: &SqlitePool, date: NaiveDate) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM slot_occupancy WHERE date < ?")
            .bind(date)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}
