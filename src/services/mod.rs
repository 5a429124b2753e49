pub mod appointments;
pub mod availability;
pub mod capacity;
pub mod events;
pub mod init;
pub mod schedule;
pub mod slots;

use chrono::{Duration, NaiveDateTime, Utc};

use crate::config::SchedulingConfig;

/// Current wall-clock time in business-local terms. "Past slot" and
/// cancellation-cutoff checks are all evaluated against this.
pub fn business_now(config: &SchedulingConfig) -> NaiveDateTime {
    (Utc::now() + Duration::minutes(config.utc_offset_minutes as i64)).naive_utc()
}
