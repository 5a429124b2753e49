use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::db::models::{ExceptionDay, WeeklyScheduleEntry};
use crate::db::{ExceptionDayRepository, ScheduleRepository};
use crate::error::{AppError, AppResult};
use crate::services::slots::{day_slots, ClosedReason, DaySlots, Slot};
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Past,
    Full,
    Available,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotView {
    pub start_time: NaiveTime,
    pub occupied: i64,
    pub total: i64,
    pub status: SlotStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub closed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_reason: Option<String>,
    pub slots: Vec<SlotView>,
}

/// One calendar day in the month summary; drives the color-coded grid.
#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub closed: bool,
    pub total_capacity: i64,
    pub occupied: i64,
    pub occupancy_percent: i64,
}

/// A slot is `past` when its start has elapsed in business-local time;
/// past overrides full.
fn classify(date: NaiveDate, start_time: NaiveTime, now: NaiveDateTime, occupied: i64, total: i64) -> SlotStatus {
    if date.and_time(start_time) <= now {
        SlotStatus::Past
    } else if occupied >= total {
        SlotStatus::Full
    } else {
        SlotStatus::Available
    }
}

fn closed_reason_label(reason: &ClosedReason) -> String {
    match reason {
        ClosedReason::Exception(label) => label.clone(),
        ClosedReason::Inactive => "not open on this weekday".to_string(),
    }
}

// ============================================================================
// Availability View Builder
// ============================================================================

/// Read-only composition of the slot generator and the capacity ledger.
/// Both views are current-snapshot only; they back UI polling and are called
/// far more often than anything writes.
pub struct AvailabilityService;

impl AvailabilityService {
    pub async fn day_view(state: &AppState, date: NaiveDate) -> AppResult<DayAvailability> {
        let exception = ExceptionDayRepository::find_by_date(&state.db, date).await?;
        let weekday = date.weekday().num_days_from_monday() as i64;
        let entry = ScheduleRepository::find_by_weekday(&state.db, weekday).await?;

        let slots = match day_slots(date, entry.as_ref(), exception.as_ref()) {
            DaySlots::Closed(reason) => {
                return Ok(DayAvailability {
                    date,
                    closed: true,
                    closed_reason: Some(closed_reason_label(&reason)),
                    slots: Vec::new(),
                });
            }
            DaySlots::Open(slots) => slots,
        };

        let occupancy = state.capacity.day_occupancy(date).await?;
        let now = crate::services::business_now(&state.config.scheduling);

        let views = slots
            .iter()
            .map(|slot| {
                let occupied = occupancy.get(&slot.start_time).copied().unwrap_or(0);
                SlotView {
                    start_time: slot.start_time,
                    occupied,
                    total: slot.capacity,
                    status: classify(date, slot.start_time, now, occupied, slot.capacity),
                }
            })
            .collect();

        Ok(DayAvailability {
            date,
            closed: false,
            closed_reason: None,
            slots: views,
        })
    }

    pub async fn month_summary(
        state: &AppState,
        year: i32,
        month: u32,
    ) -> AppResult<Vec<DaySummary>> {
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            AppError::Validation(format!("invalid month {year}-{month}"))
        })?;
        let last = last_day_of_month(first);

        let week: HashMap<i64, WeeklyScheduleEntry> = ScheduleRepository::get_week(&state.db)
            .await?
            .into_iter()
            .map(|entry| (entry.weekday, entry))
            .collect();

        let exceptions: HashMap<NaiveDate, ExceptionDay> =
            ExceptionDayRepository::list_from(&state.db, first)
                .await?
                .into_iter()
                .filter(|e| e.date <= last)
                .map(|e| (e.date, e))
                .collect();

        let occupancy = state.capacity.range_occupancy(first, last).await?;
        let now = crate::services::business_now(&state.config.scheduling);

        let mut summaries = Vec::with_capacity(last.day() as usize);
        let mut date = first;
        while date <= last {
            summaries.push(Self::summarize_day(
                date,
                week.get(&(date.weekday().num_days_from_monday() as i64)),
                exceptions.get(&date),
                &occupancy,
                now,
            ));
            date += Duration::days(1);
        }

        Ok(summaries)
    }

    /// Totals sum every non-past slot of the day; a fully elapsed or closed
    /// day reports zero capacity.
    fn summarize_day(
        date: NaiveDate,
        entry: Option<&WeeklyScheduleEntry>,
        exception: Option<&ExceptionDay>,
        occupancy: &HashMap<(NaiveDate, NaiveTime), i64>,
        now: NaiveDateTime,
    ) -> DaySummary {
        let slots: Vec<Slot> = match day_slots(date, entry, exception) {
            DaySlots::Closed(_) => {
                return DaySummary {
                    date,
                    closed: true,
                    total_capacity: 0,
                    occupied: 0,
                    occupancy_percent: 0,
                };
            }
            DaySlots::Open(slots) => slots,
        };

        let mut total_capacity = 0;
        let mut occupied = 0;
        for slot in slots {
            if date.and_time(slot.start_time) <= now {
                continue;
            }
            total_capacity += slot.capacity;
            occupied += occupancy
                .get(&(date, slot.start_time))
                .copied()
                .unwrap_or(0);
        }

        let occupancy_percent = if total_capacity > 0 {
            occupied * 100 / total_capacity
        } else {
            0
        };

        DaySummary {
            date,
            closed: false,
            total_capacity,
            occupied,
            occupancy_percent,
        }
    }
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    let (next_year, next_month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("first of next month is always valid")
        - Duration::days(1)
}
