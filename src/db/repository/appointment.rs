use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{Appointment, AppointmentState, NewAppointment};
use crate::error::{AppError, AppResult};

const APPOINTMENT_COLUMNS: &str = r#"
    id, client_id, specialist_id, date, slot_start,
    services_json, state, rating, rating_comment,
    created_at, updated_at
"#;

// ============================================================================
// Appointment Repository
// ============================================================================

pub struct AppointmentRepository;

impl AppointmentRepository {
    pub async fn create(pool: &SqlitePool, new: NewAppointment) -> AppResult<Appointment> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            INSERT INTO appointments (
                id, client_id, specialist_id, date, slot_start,
                services_json, state, rating, rating_comment,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(&new.client_id)
        .bind(&new.specialist_id)
        .bind(new.date)
        .bind(new.slot_start)
        .bind(&new.services_json)
        .bind(AppointmentState::Pending)
        .bind(None::<i64>)
        .bind(None::<String>)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Appointment>> {
        let row = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointments
            WHERE id = ?
            "#
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn update_state(
        pool: &SqlitePool,
        id: &str,
        state: AppointmentState,
    ) -> AppResult<Appointment> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            UPDATE appointments
            SET state = ?, updated_at = ?
            WHERE id = ?
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(state)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Move an appointment to a new (date, slot_start) as part of a
    /// reschedule. The capacity bookkeeping around this is owned by the
    /// lifecycle manager; this is just the record mutation.
    pub async fn update_slot(
        pool: &SqlitePool,
        id: &str,
        date: NaiveDate,
        slot_start: NaiveTime,
        state: AppointmentState,
    ) -> AppResult<Appointment> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            UPDATE appointments
            SET date = ?, slot_start = ?, state = ?, updated_at = ?
            WHERE id = ?
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(date)
        .bind(slot_start)
        .bind(state)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn set_rating(
        pool: &SqlitePool,
        id: &str,
        rating: i64,
        comment: Option<&str>,
    ) -> AppResult<Appointment> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            UPDATE appointments
            SET rating = ?, rating_comment = ?, updated_at = ?
            WHERE id = ?
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(rating)
        .bind(comment)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn list_by_date(pool: &SqlitePool, date: NaiveDate) -> AppResult<Vec<Appointment>> {
        let rows = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointments
            WHERE date = ?
            ORDER BY slot_start ASC, created_at ASC
            "#
        ))
        .bind(date)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    pub async fn list_by_client(pool: &SqlitePool, client_id: &str) -> AppResult<Vec<Appointment>> {
        let rows = sqlx::query_as::<_, Appointment>(&format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointments
            WHERE client_id = ?
            ORDER BY date DESC, slot_start DESC
            "#
        ))
        .bind(client_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }
}
