use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle state of an appointment. Stored as TEXT; all transitions go
/// through [`AppointmentState::apply`] so the legal moves live in one table
/// instead of scattered string checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AppointmentState {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

/// Events that drive the appointment state machine. `Begin`/`Finish` are the
/// two halves of the admin "advance" operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Confirm,
    Cancel,
    Reschedule,
    Begin,
    Finish,
}

impl AppointmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentState::Pending => "pending",
            AppointmentState::Confirmed => "confirmed",
            AppointmentState::InProgress => "in_progress",
            AppointmentState::Completed => "completed",
            AppointmentState::Cancelled => "cancelled",
        }
    }

    /// Whether an appointment in this state holds a slot in the capacity
    /// ledger. Cancelled and completed appointments do not.
    pub fn counts_against_capacity(&self) -> bool {
        matches!(
            self,
            AppointmentState::Pending | AppointmentState::Confirmed | AppointmentState::InProgress
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentState::Completed | AppointmentState::Cancelled
        )
    }

    /// The transition table. Returns the successor state, or `None` when the
    /// event is not legal from this state.
    pub fn apply(self, event: LifecycleEvent) -> Option<AppointmentState> {
        use AppointmentState::*;
        use LifecycleEvent::*;

        match (self, event) {
            (Pending, Confirm) => Some(Confirmed),
            (Pending, Cancel) => Some(Cancelled),
            (Pending, Reschedule) => Some(Pending),
            (Confirmed, Cancel) => Some(Cancelled),
            (Confirmed, Reschedule) => Some(Pending),
            (Confirmed, Begin) => Some(InProgress),
            (InProgress, Finish) => Some(Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for AppointmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One billed service on an appointment. `service_id` is an opaque foreign
/// key resolved by the catalog; name and price are captured at booking time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLine {
    pub service_id: String,
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub client_id: String,
    pub specialist_id: Option<String>,
    pub date: NaiveDate,
    pub slot_start: NaiveTime,
    /// Serialized `Vec<ServiceLine>`.
    pub services_json: String,
    pub state: AppointmentState,
    pub rating: Option<i64>,
    pub rating_comment: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Payload for inserting a new appointment; the repository assigns the id,
/// timestamps and the initial `pending` state.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub client_id: String,
    pub specialist_id: Option<String>,
    pub date: NaiveDate,
    pub slot_start: NaiveTime,
    pub services_json: String,
}

impl Appointment {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.slot_start)
    }

    pub fn service_lines(&self) -> Vec<ServiceLine> {
        serde_json::from_str(&self.services_json).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_through_the_machine() {
        let s = AppointmentState::Pending;
        let s = s.apply(LifecycleEvent::Confirm).unwrap();
        assert_eq!(s, AppointmentState::Confirmed);
        let s = s.apply(LifecycleEvent::Begin).unwrap();
        assert_eq!(s, AppointmentState::InProgress);
        let s = s.apply(LifecycleEvent::Finish).unwrap();
        assert_eq!(s, AppointmentState::Completed);
        assert!(s.is_terminal());
    }

    #[test]
    fn skipping_states_is_rejected() {
        // pending cannot begin or finish without confirmation
        assert!(AppointmentState::Pending
            .apply(LifecycleEvent::Begin)
            .is_none());
        assert!(AppointmentState::Pending
            .apply(LifecycleEvent::Finish)
            .is_none());
        assert!(AppointmentState::Confirmed
            .apply(LifecycleEvent::Finish)
            .is_none());
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for event in [
            LifecycleEvent::Confirm,
            LifecycleEvent::Cancel,
            LifecycleEvent::Reschedule,
            LifecycleEvent::Begin,
            LifecycleEvent::Finish,
        ] {
            assert!(AppointmentState::Completed.apply(event).is_none());
            assert!(AppointmentState::Cancelled.apply(event).is_none());
        }
    }

    #[test]
    fn reschedule_returns_to_pending() {
        assert_eq!(
            AppointmentState::Confirmed.apply(LifecycleEvent::Reschedule),
            Some(AppointmentState::Pending)
        );
        assert_eq!(
            AppointmentState::Pending.apply(LifecycleEvent::Reschedule),
            Some(AppointmentState::Pending)
        );
    }

    #[test]
    fn capacity_accounting_by_state() {
        assert!(AppointmentState::Pending.counts_against_capacity());
        assert!(AppointmentState::Confirmed.counts_against_capacity());
        assert!(AppointmentState::InProgress.counts_against_capacity());
        assert!(!AppointmentState::Completed.counts_against_capacity());
        assert!(!AppointmentState::Cancelled.counts_against_capacity());
    }
}
