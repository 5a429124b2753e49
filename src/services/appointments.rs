use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::db::models::{
    Appointment, AppointmentState, ExceptionDay, LifecycleEvent, NewAppointment, ServiceLine,
    WeeklyScheduleEntry,
};
use crate::db::{AppointmentRepository, ExceptionDayRepository, ScheduleRepository};
use crate::error::{AppError, AppResult, SlotUnavailableReason};
use crate::services::capacity::ReserveOutcome;
use crate::services::events::AppointmentEventKind;
use crate::services::slots::{day_slots, DaySlots};
use crate::AppState;

/// Who asked for a cancellation. Clients are subject to the configured
/// cutoff; administrators are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelActor {
    Client,
    Admin,
}

/// Booking request as received from the API layer. `client_id`,
/// `specialist_id` and service ids are opaque foreign keys; only presence is
/// checked here.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub client_id: String,
    pub specialist_id: Option<String>,
    pub date: NaiveDate,
    pub slot_start: NaiveTime,
    pub service_lines: Vec<ServiceLine>,
}

// ============================================================================
// Appointment Lifecycle Manager
// ============================================================================

/// Owns the appointment state machine. The single writer to the capacity
/// ledger: every reserve/release goes through the operations below.
pub struct AppointmentService;

impl AppointmentService {
    pub async fn get(state: &AppState, id: &str) -> AppResult<Appointment> {
        AppointmentRepository::find_by_id(&state.db, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("appointment {id} not found")))
    }

    pub async fn list_for_date(state: &AppState, date: NaiveDate) -> AppResult<Vec<Appointment>> {
        AppointmentRepository::list_by_date(&state.db, date).await
    }

    pub async fn list_for_client(state: &AppState, client_id: &str) -> AppResult<Vec<Appointment>> {
        AppointmentRepository::list_by_client(&state.db, client_id).await
    }

    /// Book a slot. The ledger's atomic reserve is the only admission check
    /// against concurrent bookings: on `Full` no record is created and the
    /// caller must re-query availability and pick a different slot.
    pub async fn create(state: &AppState, request: BookingRequest) -> AppResult<Appointment> {
        if request.client_id.trim().is_empty() {
            return Err(AppError::Validation("client_id must not be empty".to_string()));
        }
        if request.service_lines.is_empty() {
            return Err(AppError::Validation(
                "at least one service line is required".to_string(),
            ));
        }

        let capacity = Self::resolve_bookable_slot(state, request.date, request.slot_start).await?;

        match state
            .capacity
            .reserve(request.date, request.slot_start, capacity)
            .await?
        {
            ReserveOutcome::Reserved => {}
            ReserveOutcome::Full => {
                return Err(AppError::SlotUnavailable(SlotUnavailableReason::Full));
            }
        }

        let services_json = serde_json::to_string(&request.service_lines)
            .map_err(|e| AppError::Internal(e.into()))?;

        let new = NewAppointment {
            client_id: request.client_id,
            specialist_id: request.specialist_id,
            date: request.date,
            slot_start: request.slot_start,
            services_json,
        };

        // The reservation is already held; give it back if the record
        // itself cannot be written.
        let appointment = match AppointmentRepository::create(&state.db, new).await {
            Ok(appointment) => appointment,
            Err(e) => {
                state
                    .capacity
                    .release(request.date, request.slot_start)
                    .await?;
                return Err(e);
            }
        };

        tracing::info!(
            "Appointment {} created for {} at {} {}",
            appointment.id,
            appointment.client_id,
            appointment.date,
            appointment.slot_start
        );
        state.events.emit(AppointmentEventKind::Created, &appointment);

        Ok(appointment)
    }

    /// Admin confirms a pending appointment.
    pub async fn confirm(state: &AppState, id: &str) -> AppResult<Appointment> {
        let appointment = Self::get(state, id).await?;

        let next = appointment
            .state
            .apply(LifecycleEvent::Confirm)
            .ok_or(AppError::InvalidTransition {
                state: appointment.state,
                action: "confirm",
            })?;

        let updated = AppointmentRepository::update_state(&state.db, id, next).await?;
        state.events.emit(AppointmentEventKind::Confirmed, &updated);

        Ok(updated)
    }

    /// Cancel a pending or confirmed appointment, releasing its slot.
    /// Client-initiated cancellations inside the configured cutoff window
    /// are rejected; admin-initiated ones are not.
    pub async fn cancel(state: &AppState, id: &str, actor: CancelActor) -> AppResult<Appointment> {
        let appointment = Self::get(state, id).await?;

        let next = appointment
            .state
            .apply(LifecycleEvent::Cancel)
            .ok_or(AppError::InvalidTransition {
                state: appointment.state,
                action: "cancel",
            })?;

        let cutoff_hours = state.config.scheduling.cancellation_cutoff_hours;
        if actor == CancelActor::Client && cutoff_hours > 0 {
            let now = crate::services::business_now(&state.config.scheduling);
            let lead = appointment.starts_at().signed_duration_since(now);
            if lead < chrono::Duration::hours(cutoff_hours as i64) {
                return Err(AppError::CancellationCutoff {
                    hours: cutoff_hours,
                });
            }
        }

        let updated = AppointmentRepository::update_state(&state.db, id, next).await?;
        state
            .capacity
            .release(updated.date, updated.slot_start)
            .await?;

        tracing::info!("Appointment {} cancelled by {:?}", updated.id, actor);
        state.events.emit(AppointmentEventKind::Cancelled, &updated);

        Ok(updated)
    }

    /// Move an appointment to a new (date, slot). Reserve-new strictly
    /// before release-old: a failed reserve leaves the appointment holding
    /// its original slot, and at no point does it hold none.
    pub async fn reschedule(
        state: &AppState,
        id: &str,
        new_date: NaiveDate,
        new_slot_start: NaiveTime,
    ) -> AppResult<Appointment> {
        let appointment = Self::get(state, id).await?;

        let next = appointment
            .state
            .apply(LifecycleEvent::Reschedule)
            .ok_or(AppError::InvalidTransition {
                state: appointment.state,
                action: "reschedule",
            })?;

        if new_date == appointment.date && new_slot_start == appointment.slot_start {
            return Err(AppError::Validation(
                "reschedule target must differ from the current slot".to_string(),
            ));
        }

        let capacity = Self::resolve_bookable_slot(state, new_date, new_slot_start).await?;

        match state
            .capacity
            .reserve(new_date, new_slot_start, capacity)
            .await?
        {
            ReserveOutcome::Reserved => {}
            ReserveOutcome::Full => {
                return Err(AppError::SlotUnavailable(SlotUnavailableReason::Full));
            }
        }

        let old_date = appointment.date;
        let old_slot_start = appointment.slot_start;

        let updated =
            match AppointmentRepository::update_slot(&state.db, id, new_date, new_slot_start, next)
                .await
            {
                Ok(updated) => updated,
                Err(e) => {
                    // Record move failed: give the new reservation back, the
                    // old one is still held.
                    state.capacity.release(new_date, new_slot_start).await?;
                    return Err(e);
                }
            };

        state.capacity.release(old_date, old_slot_start).await?;

        tracing::info!(
            "Appointment {} rescheduled from {} {} to {} {}",
            updated.id,
            old_date,
            old_slot_start,
            new_date,
            new_slot_start
        );
        state
            .events
            .emit(AppointmentEventKind::Rescheduled, &updated);

        Ok(updated)
    }

    /// Advance the service through `confirmed -> in_progress -> completed`.
    /// Skipping states is rejected.
    pub async fn advance(state: &AppState, id: &str) -> AppResult<Appointment> {
        let appointment = Self::get(state, id).await?;

        let event = match appointment.state {
            AppointmentState::Confirmed => LifecycleEvent::Begin,
            AppointmentState::InProgress => LifecycleEvent::Finish,
            _ => {
                return Err(AppError::InvalidTransition {
                    state: appointment.state,
                    action: "advance",
                })
            }
        };

        let next = appointment
            .state
            .apply(event)
            .ok_or(AppError::InvalidTransition {
                state: appointment.state,
                action: "advance",
            })?;

        let updated = AppointmentRepository::update_state(&state.db, id, next).await?;

        if updated.state == AppointmentState::Completed {
            state.events.emit(AppointmentEventKind::Completed, &updated);
        }

        Ok(updated)
    }

    /// Attach a one-time rating to a completed appointment.
    pub async fn rate(
        state: &AppState,
        id: &str,
        score: i64,
        comment: Option<&str>,
    ) -> AppResult<Appointment> {
        let appointment = Self::get(state, id).await?;

        if appointment.state != AppointmentState::Completed {
            return Err(AppError::InvalidTransition {
                state: appointment.state,
                action: "rate",
            });
        }
        if appointment.rating.is_some() {
            return Err(AppError::Validation(
                "appointment has already been rated".to_string(),
            ));
        }
        if !(1..=5).contains(&score) {
            return Err(AppError::Validation(format!(
                "rating must be between 1 and 5, got {score}"
            )));
        }

        AppointmentRepository::set_rating(&state.db, id, score, comment).await
    }

    /// Resolve a (date, slot_start) into the slot's capacity, or the precise
    /// reason it cannot be booked: closed day, past slot, or a start time
    /// the generator never produces.
    async fn resolve_bookable_slot(
        state: &AppState,
        date: NaiveDate,
        slot_start: NaiveTime,
    ) -> AppResult<i64> {
        let exception: Option<ExceptionDay> =
            ExceptionDayRepository::find_by_date(&state.db, date).await?;
        let weekday = date
            .weekday()
            .num_days_from_monday() as i64;
        let entry: Option<WeeklyScheduleEntry> =
            ScheduleRepository::find_by_weekday(&state.db, weekday).await?;

        let slots = match day_slots(date, entry.as_ref(), exception.as_ref()) {
            DaySlots::Closed(_) => {
                return Err(AppError::SlotUnavailable(SlotUnavailableReason::Closed))
            }
            DaySlots::Open(slots) => slots,
        };

        let now = crate::services::business_now(&state.config.scheduling);
        if date.and_time(slot_start) <= now {
            return Err(AppError::SlotUnavailable(SlotUnavailableReason::Past));
        }

        slots
            .iter()
            .find(|slot| slot.start_time == slot_start)
            .map(|slot| slot.capacity)
            .ok_or(AppError::SlotUnavailable(SlotUnavailableReason::UnknownSlot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::availability::{AvailabilityService, SlotStatus};
    use crate::services::test_support::test_state;
    use chrono::Duration;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn lines() -> Vec<ServiceLine> {
        vec![ServiceLine {
            service_id: "svc-1".to_string(),
            name: "Haircut".to_string(),
            price: 35.0,
        }]
    }

    fn booking(date: NaiveDate, slot: NaiveTime) -> BookingRequest {
        BookingRequest {
            client_id: "client-1".to_string(),
            specialist_id: None,
            date,
            slot_start: slot,
            service_lines: lines(),
        }
    }

    /// A date far enough out that every slot of the day is in the future.
    fn future_date(state: &crate::AppState) -> NaiveDate {
        crate::services::business_now(&state.config.scheduling).date() + Duration::days(2)
    }

    #[tokio::test]
    async fn create_books_a_pending_appointment() {
        let state = test_state().await;
        let date = future_date(&state);

        let appointment = AppointmentService::create(&state, booking(date, t(10, 0)))
            .await
            .unwrap();

        assert_eq!(appointment.state, AppointmentState::Pending);
        assert_eq!(appointment.date, date);
        assert_eq!(appointment.service_lines().len(), 1);
        assert_eq!(state.capacity.occupancy(date, t(10, 0)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn create_rejects_empty_service_lines() {
        let state = test_state().await;
        let mut request = booking(future_date(&state), t(10, 0));
        request.service_lines.clear();

        let err = AppointmentService::create(&state, request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn create_rejects_past_closed_and_unknown_slots() {
        let state = test_state().await;
        let today = crate::services::business_now(&state.config.scheduling).date();

        let err = AppointmentService::create(&state, booking(today - Duration::days(1), t(10, 0)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::SlotUnavailable(SlotUnavailableReason::Past)
        ));

        // break window slots are not generated
        let date = future_date(&state);
        let err = AppointmentService::create(&state, booking(date, t(13, 0)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::SlotUnavailable(SlotUnavailableReason::UnknownSlot)
        ));

        let err = AppointmentService::create(&state, booking(date, t(10, 5)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::SlotUnavailable(SlotUnavailableReason::UnknownSlot)
        ));

        // exception day is closed, not "no slots"
        crate::db::ExceptionDayRepository::create(&state.db, date, "Holiday")
            .await
            .unwrap();
        let err = AppointmentService::create(&state, booking(date, t(10, 0)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::SlotUnavailable(SlotUnavailableReason::Closed)
        ));
    }

    #[tokio::test]
    async fn fourth_booking_on_capacity_three_slot_is_rejected() {
        // The Monday scenario: capacity 3 per slot, 30-minute interval.
        let state = test_state().await;
        let date = future_date(&state);

        for _ in 0..3 {
            AppointmentService::create(&state, booking(date, t(10, 0)))
                .await
                .unwrap();
        }

        let day = AvailabilityService::day_view(&state, date).await.unwrap();
        let ten = day
            .slots
            .iter()
            .find(|s| s.start_time == t(10, 0))
            .unwrap();
        assert_eq!((ten.occupied, ten.total), (3, 3));
        assert_eq!(ten.status, SlotStatus::Full);

        let err = AppointmentService::create(&state, booking(date, t(10, 0)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::SlotUnavailable(SlotUnavailableReason::Full)
        ));

        // the neighbouring slot is unaffected
        AppointmentService::create(&state, booking(date, t(10, 30)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancel_releases_the_slot() {
        let state = test_state().await;
        let date = future_date(&state);

        let appointment = AppointmentService::create(&state, booking(date, t(10, 0)))
            .await
            .unwrap();
        assert_eq!(state.capacity.occupancy(date, t(10, 0)).await.unwrap(), 1);

        let cancelled = AppointmentService::cancel(&state, &appointment.id, CancelActor::Client)
            .await
            .unwrap();
        assert_eq!(cancelled.state, AppointmentState::Cancelled);
        assert_eq!(state.capacity.occupancy(date, t(10, 0)).await.unwrap(), 0);

        // terminal: cancelling again is an invalid transition
        let err = AppointmentService::cancel(&state, &appointment.id, CancelActor::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn client_cancellation_respects_cutoff_admin_bypasses() {
        let mut state = test_state().await;
        // a cutoff far larger than the booking lead time: the client is
        // always inside the window
        state.config.scheduling.cancellation_cutoff_hours = 24 * 365;
        let date = future_date(&state);

        let appointment = AppointmentService::create(&state, booking(date, t(10, 0)))
            .await
            .unwrap();

        let err = AppointmentService::cancel(&state, &appointment.id, CancelActor::Client)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CancellationCutoff { .. }));

        // still holds its slot
        assert_eq!(state.capacity.occupancy(date, t(10, 0)).await.unwrap(), 1);

        AppointmentService::cancel(&state, &appointment.id, CancelActor::Admin)
            .await
            .unwrap();
        assert_eq!(state.capacity.occupancy(date, t(10, 0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn client_cancellation_outside_cutoff_is_allowed() {
        let mut state = test_state().await;
        state.config.scheduling.cancellation_cutoff_hours = 1;
        let date = future_date(&state);

        let appointment = AppointmentService::create(&state, booking(date, t(10, 0)))
            .await
            .unwrap();
        AppointmentService::cancel(&state, &appointment.id, CancelActor::Client)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reschedule_moves_capacity_between_slots() {
        let state = test_state().await;
        let date = future_date(&state);

        let appointment = AppointmentService::create(&state, booking(date, t(10, 0)))
            .await
            .unwrap();
        AppointmentService::confirm(&state, &appointment.id)
            .await
            .unwrap();

        let updated = AppointmentService::reschedule(&state, &appointment.id, date, t(11, 0))
            .await
            .unwrap();

        assert_eq!(updated.state, AppointmentState::Pending);
        assert_eq!(updated.slot_start, t(11, 0));
        assert_eq!(state.capacity.occupancy(date, t(10, 0)).await.unwrap(), 0);
        assert_eq!(state.capacity.occupancy(date, t(11, 0)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reschedule_to_full_slot_keeps_the_original() {
        let state = test_state().await;
        let date = future_date(&state);

        // fill 10:00 to capacity
        for _ in 0..3 {
            AppointmentService::create(&state, booking(date, t(10, 0)))
                .await
                .unwrap();
        }
        let appointment = AppointmentService::create(&state, booking(date, t(10, 30)))
            .await
            .unwrap();

        let err = AppointmentService::reschedule(&state, &appointment.id, date, t(10, 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::SlotUnavailable(SlotUnavailableReason::Full)
        ));

        // never left slot-less: record and counters are untouched
        let unchanged = AppointmentService::get(&state, &appointment.id).await.unwrap();
        assert_eq!(unchanged.slot_start, t(10, 30));
        assert_eq!(unchanged.state, AppointmentState::Pending);
        assert_eq!(state.capacity.occupancy(date, t(10, 30)).await.unwrap(), 1);
        assert_eq!(state.capacity.occupancy(date, t(10, 0)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn reschedule_to_same_slot_is_rejected() {
        let state = test_state().await;
        let date = future_date(&state);

        let appointment = AppointmentService::create(&state, booking(date, t(10, 0)))
            .await
            .unwrap();
        let err = AppointmentService::reschedule(&state, &appointment.id, date, t(10, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn advance_walks_states_in_order_only() {
        let state = test_state().await;
        let date = future_date(&state);

        let appointment = AppointmentService::create(&state, booking(date, t(10, 0)))
            .await
            .unwrap();

        // pending cannot advance: confirmation is not skippable
        let err = AppointmentService::advance(&state, &appointment.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                state: AppointmentState::Pending,
                ..
            }
        ));

        AppointmentService::confirm(&state, &appointment.id)
            .await
            .unwrap();
        let in_progress = AppointmentService::advance(&state, &appointment.id)
            .await
            .unwrap();
        assert_eq!(in_progress.state, AppointmentState::InProgress);

        let mut events = state.events.subscribe();
        let completed = AppointmentService::advance(&state, &appointment.id)
            .await
            .unwrap();
        assert_eq!(completed.state, AppointmentState::Completed);

        // completion is announced for downstream payment/loyalty hooks
        let event = events.try_recv().unwrap();
        assert_eq!(event.event, AppointmentEventKind::Completed);

        // terminal
        let err = AppointmentService::advance(&state, &appointment.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        let err = AppointmentService::cancel(&state, &appointment.id, CancelActor::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn rating_requires_completed_and_happens_once() {
        let state = test_state().await;
        let date = future_date(&state);

        let appointment = AppointmentService::create(&state, booking(date, t(10, 0)))
            .await
            .unwrap();

        let err = AppointmentService::rate(&state, &appointment.id, 5, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        AppointmentService::confirm(&state, &appointment.id)
            .await
            .unwrap();
        AppointmentService::advance(&state, &appointment.id)
            .await
            .unwrap();
        AppointmentService::advance(&state, &appointment.id)
            .await
            .unwrap();

        let err = AppointmentService::rate(&state, &appointment.id, 6, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let rated = AppointmentService::rate(&state, &appointment.id, 5, Some("great"))
            .await
            .unwrap();
        assert_eq!(rated.rating, Some(5));
        assert_eq!(rated.rating_comment.as_deref(), Some("great"));

        let err = AppointmentService::rate(&state, &appointment.id, 4, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn create_emits_a_created_event() {
        let state = test_state().await;
        let mut events = state.events.subscribe();
        let date = future_date(&state);

        let appointment = AppointmentService::create(&state, booking(date, t(10, 0)))
            .await
            .unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.event, AppointmentEventKind::Created);
        assert_eq!(event.appointment_id, appointment.id);
        assert_eq!(event.slot_start, t(10, 0));
    }

    #[tokio::test]
    async fn unknown_appointment_is_not_found() {
        let state = test_state().await;
        let err = AppointmentService::get(&state, "missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
