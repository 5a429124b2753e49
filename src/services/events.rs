use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::db::models::{Appointment, AppointmentState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentEventKind {
    Created,
    Confirmed,
    Cancelled,
    Rescheduled,
    /// Fired when an appointment reaches `completed`; external payment
    /// reconciliation and loyalty accrual hang off this.
    Completed,
}

/// Summary emitted to the notification channel on lifecycle changes.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentEvent {
    pub event: AppointmentEventKind,
    pub appointment_id: String,
    pub client_id: String,
    pub specialist_id: Option<String>,
    pub date: NaiveDate,
    pub slot_start: NaiveTime,
    pub state: AppointmentState,
    pub emitted_at: NaiveDateTime,
}

impl AppointmentEvent {
    pub fn from_appointment(kind: AppointmentEventKind, appointment: &Appointment) -> Self {
        AppointmentEvent {
            event: kind,
            appointment_id: appointment.id.clone(),
            client_id: appointment.client_id.clone(),
            specialist_id: appointment.specialist_id.clone(),
            date: appointment.date,
            slot_start: appointment.slot_start,
            state: appointment.state,
            emitted_at: Utc::now().naive_utc(),
        }
    }
}

/// Fire-and-forget fan-out of appointment events over a broadcast channel.
/// Emission never fails the appointment operation: with no subscribers the
/// event is dropped and logged at debug.
#[derive(Clone)]
pub struct EventDispatcher {
    tx: broadcast::Sender<AppointmentEvent>,
}

impl EventDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        EventDispatcher { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppointmentEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, kind: AppointmentEventKind, appointment: &Appointment) {
        let event = AppointmentEvent::from_appointment(kind, appointment);
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::debug!(
                    "Dispatched {:?} event for appointment {} to {} subscriber(s)",
                    kind,
                    appointment.id,
                    receivers
                );
            }
            Err(_) => {
                tracing::debug!(
                    "No subscribers for {:?} event on appointment {}",
                    kind,
                    appointment.id
                );
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appointment() -> Appointment {
        Appointment {
            id: "a-1".to_string(),
            client_id: "c-1".to_string(),
            specialist_id: None,
            date: NaiveDate::from_ymd_opt(2026, 9, 7).unwrap(),
            slot_start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            services_json: "[]".to_string(),
            state: AppointmentState::Pending,
            rating: None,
            rating_comment: None,
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn subscribers_receive_emitted_events() {
        let dispatcher = EventDispatcher::new(8);
        let mut rx = dispatcher.subscribe();

        dispatcher.emit(AppointmentEventKind::Created, &appointment());

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event, AppointmentEventKind::Created);
        assert_eq!(event.appointment_id, "a-1");
    }

    #[test]
    fn emitting_without_subscribers_does_not_panic() {
        let dispatcher = EventDispatcher::new(8);
        dispatcher.emit(AppointmentEventKind::Cancelled, &appointment());
    }
}
