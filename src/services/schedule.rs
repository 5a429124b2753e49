use chrono::NaiveDate;

use crate::db::models::{ExceptionDay, WeeklyScheduleEntry, WeeklyScheduleUpdate};
use crate::db::{ExceptionDayRepository, ScheduleRepository};
use crate::error::{AppError, AppResult};
use crate::AppState;

// ============================================================================
// Weekly Schedule Configuration & Exception Calendar
// ============================================================================

pub struct ScheduleService;

impl ScheduleService {
    pub async fn get_week(state: &AppState) -> AppResult<Vec<WeeklyScheduleEntry>> {
        ScheduleRepository::get_week(&state.db).await
    }

    /// Replace all seven weekly entries at once. Partial weeks are rejected
    /// up front so a day is never left half-configured; the repository does
    /// the swap in one transaction.
    pub async fn replace_week(
        state: &AppState,
        entries: Vec<WeeklyScheduleUpdate>,
    ) -> AppResult<Vec<WeeklyScheduleEntry>> {
        if entries.len() != 7 {
            return Err(AppError::Validation(format!(
                "expected exactly 7 weekday entries, got {}",
                entries.len()
            )));
        }

        let mut seen = [false; 7];
        for entry in &entries {
            entry.validate().map_err(AppError::Validation)?;
            let weekday = entry.weekday as usize;
            if seen[weekday] {
                return Err(AppError::Validation(format!(
                    "duplicate entry for weekday {}",
                    entry.weekday
                )));
            }
            seen[weekday] = true;
        }

        let replaced = ScheduleRepository::replace_week(&state.db, &entries).await?;
        tracing::info!("Weekly schedule replaced");

        Ok(replaced)
    }

    pub async fn list_exceptions(state: &AppState) -> AppResult<Vec<ExceptionDay>> {
        let today = crate::services::business_now(&state.config.scheduling).date();
        ExceptionDayRepository::list_from(&state.db, today).await
    }

    pub async fn add_exception(
        state: &AppState,
        date: NaiveDate,
        label: &str,
    ) -> AppResult<ExceptionDay> {
        let label = label.trim();
        if label.is_empty() {
            return Err(AppError::Validation(
                "exception label must not be empty".to_string(),
            ));
        }

        if ExceptionDayRepository::find_by_date(&state.db, date)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "an exception already exists for {date}"
            )));
        }

        let created = ExceptionDayRepository::create(&state.db, date, label).await?;
        tracing::info!("Exception day added: {} ({})", created.date, created.label);

        Ok(created)
    }

    pub async fn remove_exception(state: &AppState, date: NaiveDate) -> AppResult<()> {
        let removed = ExceptionDayRepository::delete(&state.db, date).await?;
        if !removed {
            return Err(AppError::NotFound(format!("no exception day on {date}")));
        }

        tracing::info!("Exception day removed: {}", date);
        Ok(())
    }
}
