use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Operating parameters for one weekday (0 = Monday .. 6 = Sunday).
/// The seven entries are only ever replaced together, never individually.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WeeklyScheduleEntry {
    pub weekday: i64,
    pub active: bool,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub break_start: NaiveTime,
    pub break_end: NaiveTime,
    pub slot_interval_minutes: i64,
    pub capacity_per_slot: i64,
    pub updated_at: NaiveDateTime,
}

/// Incoming form of a weekly entry (admin bulk replace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyScheduleUpdate {
    pub weekday: i64,
    pub active: bool,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub break_start: NaiveTime,
    pub break_end: NaiveTime,
    pub slot_interval_minutes: i64,
    pub capacity_per_slot: i64,
}

impl WeeklyScheduleUpdate {
    /// Check the per-day invariants, returning the specific rule violated.
    /// Time ordering is only enforced for active days; an inactive day's
    /// hours are never read.
    pub fn validate(&self) -> Result<(), String> {
        if !(0..=6).contains(&self.weekday) {
            return Err(format!("weekday must be 0-6, got {}", self.weekday));
        }
        if !self.active {
            return Ok(());
        }
        if self.slot_interval_minutes <= 0 {
            return Err(format!(
                "weekday {}: slot_interval_minutes must be positive",
                self.weekday
            ));
        }
        if self.capacity_per_slot < 1 {
            return Err(format!(
                "weekday {}: capacity_per_slot must be at least 1",
                self.weekday
            ));
        }
        if self.open_time >= self.break_start {
            return Err(format!(
                "weekday {}: open_time must be before break_start",
                self.weekday
            ));
        }
        if self.break_start > self.break_end {
            return Err(format!(
                "weekday {}: break_start must not be after break_end",
                self.weekday
            ));
        }
        if self.break_end >= self.close_time {
            return Err(format!(
                "weekday {}: break_end must be before close_time",
                self.weekday
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn entry() -> WeeklyScheduleUpdate {
        WeeklyScheduleUpdate {
            weekday: 0,
            active: true,
            open_time: t(9, 0),
            close_time: t(18, 0),
            break_start: t(13, 0),
            break_end: t(14, 0),
            slot_interval_minutes: 30,
            capacity_per_slot: 1,
        }
    }

    #[test]
    fn valid_entry_passes() {
        assert!(entry().validate().is_ok());
    }

    #[test]
    fn zero_length_break_is_allowed() {
        let mut e = entry();
        e.break_start = t(13, 0);
        e.break_end = t(13, 0);
        assert!(e.validate().is_ok());
    }

    #[test]
    fn inactive_day_skips_time_checks() {
        let mut e = entry();
        e.active = false;
        e.open_time = t(20, 0); // nonsensical ordering, but the day is off
        assert!(e.validate().is_ok());
    }

    #[test]
    fn rejects_break_outside_hours() {
        let mut e = entry();
        e.break_end = t(18, 0);
        let err = e.validate().unwrap_err();
        assert!(err.contains("break_end"));

        let mut e = entry();
        e.break_start = t(9, 0);
        assert!(e.validate().unwrap_err().contains("open_time"));
    }

    #[test]
    fn rejects_bad_interval_and_capacity() {
        let mut e = entry();
        e.slot_interval_minutes = 0;
        assert!(e.validate().unwrap_err().contains("slot_interval_minutes"));

        let mut e = entry();
        e.capacity_per_slot = 0;
        assert!(e.validate().unwrap_err().contains("capacity_per_slot"));
    }
}
