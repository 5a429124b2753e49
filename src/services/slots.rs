use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Serialize;

use crate::db::models::{ExceptionDay, WeeklyScheduleEntry};

/// A bookable start time on a given date. Derived, never persisted; capacity
/// is copied from the weekly entry at generation time, so a later
/// configuration change does not retroactively alter already-booked slots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub capacity: i64,
}

/// Why a day has no slots. The UI renders "closed" distinctly from a day
/// that is merely fully booked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosedReason {
    /// An exception day (holiday/vacation) with its label.
    Exception(String),
    /// The weekday is not active in the weekly configuration.
    Inactive,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DaySlots {
    Closed(ClosedReason),
    Open(Vec<Slot>),
}

/// Lazy, restartable sequence of slot start times for one weekly entry.
/// Pure function of its inputs; cloning restarts from the beginning.
#[derive(Debug, Clone)]
pub struct SlotIter {
    next: Option<NaiveTime>,
    close: NaiveTime,
    break_start: NaiveTime,
    break_end: NaiveTime,
    interval: Duration,
}

impl SlotIter {
    pub fn new(entry: &WeeklyScheduleEntry) -> Self {
        SlotIter {
            next: Some(entry.open_time),
            close: entry.close_time,
            break_start: entry.break_start,
            break_end: entry.break_end,
            interval: Duration::minutes(entry.slot_interval_minutes),
        }
    }

    /// A start is excluded when its interval [start, start+interval)
    /// overlaps the break window [break_start, break_end). A zero-length
    /// break overlaps nothing.
    fn overlaps_break(&self, start: NaiveTime) -> bool {
        let end = start + self.interval;
        start < self.break_end && end > self.break_start
    }
}

impl Iterator for SlotIter {
    type Item = NaiveTime;

    fn next(&mut self) -> Option<NaiveTime> {
        loop {
            let start = self.next?;

            // A start only counts if a full interval fits before close.
            if self.close.signed_duration_since(start) < self.interval {
                self.next = None;
                return None;
            }

            self.next = Some(start + self.interval);

            if !self.overlaps_break(start) {
                return Some(start);
            }
        }
    }
}

/// Generate the bookable slots for a date: empty (Closed) when the date has
/// an exception or the weekday entry is inactive, otherwise the ordered slot
/// list with the entry's per-slot capacity.
pub fn day_slots(
    date: NaiveDate,
    entry: Option<&WeeklyScheduleEntry>,
    exception: Option<&ExceptionDay>,
) -> DaySlots {
    if let Some(exception) = exception {
        return DaySlots::Closed(ClosedReason::Exception(exception.label.clone()));
    }

    let entry = match entry {
        Some(entry) if entry.active => entry,
        _ => return DaySlots::Closed(ClosedReason::Inactive),
    };

    let slots = SlotIter::new(entry)
        .map(|start_time| Slot {
            date,
            start_time,
            capacity: entry.capacity_per_slot,
        })
        .collect();

    DaySlots::Open(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn entry(
        open: NaiveTime,
        close: NaiveTime,
        break_start: NaiveTime,
        break_end: NaiveTime,
        interval: i64,
    ) -> WeeklyScheduleEntry {
        WeeklyScheduleEntry {
            weekday: 0,
            active: true,
            open_time: open,
            close_time: close,
            break_start,
            break_end,
            slot_interval_minutes: interval,
            capacity_per_slot: 2,
            updated_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn generates_reference_slot_sequence() {
        // open 09:00, close 13:00, break 11:00-11:30, interval 30min
        let e = entry(t(9, 0), t(13, 0), t(11, 0), t(11, 30), 30);
        let slots: Vec<NaiveTime> = SlotIter::new(&e).collect();
        assert_eq!(
            slots,
            vec![
                t(9, 0),
                t(9, 30),
                t(10, 0),
                t(10, 30),
                t(11, 30),
                t(12, 0),
                t(12, 30),
            ]
        );
    }

    #[test]
    fn zero_length_break_excludes_nothing() {
        let e = entry(t(9, 0), t(11, 0), t(10, 0), t(10, 0), 30);
        let slots: Vec<NaiveTime> = SlotIter::new(&e).collect();
        assert_eq!(slots, vec![t(9, 0), t(9, 30), t(10, 0), t(10, 30)]);
    }

    #[test]
    fn last_slot_must_fit_before_close() {
        // 45-minute slots in a 2h window with no effective break: only 09:00
        // and 09:45 fit, 10:30 would run past 11:00.
        let e = entry(t(9, 0), t(11, 0), t(9, 0), t(9, 0), 45);
        let slots: Vec<NaiveTime> = SlotIter::new(&e).collect();
        assert_eq!(slots, vec![t(9, 0), t(9, 45)]);
    }

    #[test]
    fn interval_longer_than_window_yields_nothing() {
        let e = entry(t(9, 0), t(10, 0), t(9, 0), t(9, 0), 120);
        assert_eq!(SlotIter::new(&e).count(), 0);
    }

    #[test]
    fn iterator_is_restartable() {
        let e = entry(t(9, 0), t(13, 0), t(11, 0), t(11, 30), 30);
        let iter = SlotIter::new(&e);
        let first: Vec<NaiveTime> = iter.clone().collect();
        let second: Vec<NaiveTime> = iter.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 7);
    }

    #[test]
    fn exception_day_closes_regardless_of_entry() {
        let e = entry(t(9, 0), t(13, 0), t(11, 0), t(11, 30), 30);
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let exception = ExceptionDay {
            date,
            label: "New Year".to_string(),
            created_at: Utc::now().naive_utc(),
        };

        let result = day_slots(date, Some(&e), Some(&exception));
        assert_eq!(
            result,
            DaySlots::Closed(ClosedReason::Exception("New Year".to_string()))
        );
    }

    #[test]
    fn inactive_weekday_is_closed_not_empty_open() {
        let mut e = entry(t(9, 0), t(13, 0), t(11, 0), t(11, 30), 30);
        e.active = false;
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();

        assert_eq!(
            day_slots(date, Some(&e), None),
            DaySlots::Closed(ClosedReason::Inactive)
        );
        assert_eq!(
            day_slots(date, None, None),
            DaySlots::Closed(ClosedReason::Inactive)
        );
    }

    #[test]
    fn open_day_copies_capacity_from_entry() {
        let e = entry(t(9, 0), t(13, 0), t(11, 0), t(11, 30), 30);
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();

        match day_slots(date, Some(&e), None) {
            DaySlots::Open(slots) => {
                assert_eq!(slots.len(), 7);
                assert!(slots.iter().all(|s| s.capacity == 2 && s.date == date));
            }
            DaySlots::Closed(_) => panic!("expected open day"),
        }
    }
}
