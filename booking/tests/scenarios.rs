//! End-to-end booking flows through a running session.
//!
//! Every session runs on a fixed clock set to 2025-10-20.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use chrono::NaiveDate;
use little_lemon_booking::config::DEFAULT_TIMES;
use little_lemon_booking::error::SUBMIT_FAILED_MESSAGE;
use little_lemon_booking::mocks::{
    FailingSubmitter, FailingTimeSource, GatedSubmitter, PanickingSubmitter, RecordingSubmitter,
    ScriptedTimeSource, StaticTimeSource,
};
use little_lemon_booking::types::slots;
use little_lemon_booking::{
    AvailabilityAction, BookingConfig, BookingSession, Guests, Occasion, ReservationAction,
    ReservationDraft, SubmissionState, SubmitError, Submitter, TimeSlot, TimeSource,
    ValidationError,
};
use little_lemon_testing::test_clock;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 20).unwrap()
}

fn tomorrow() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 21).unwrap()
}

fn start(source: impl TimeSource + 'static, submitter: Option<Arc<dyn Submitter>>) -> BookingSession {
    start_with(source, submitter, BookingConfig::default())
}

fn start_with(
    source: impl TimeSource + 'static,
    submitter: Option<Arc<dyn Submitter>>,
    config: BookingConfig,
) -> BookingSession {
    let builder = BookingSession::builder(Arc::new(source))
        .with_clock(Arc::new(test_clock()))
        .with_config(config);
    match submitter {
        Some(submitter) => builder.with_submitter(submitter),
        None => builder,
    }
    .start()
    .unwrap()
}

fn three_slots() -> ScriptedTimeSource {
    ScriptedTimeSource::new().with_date(today(), slots(["17:00", "18:00", "19:00"]))
}

async fn fill_form(session: &BookingSession, time: &str) {
    session.send(ReservationAction::SelectDate { date: today() }).await.unwrap();
    session.send(ReservationAction::SelectTime { time: time.into() }).await.unwrap();
    session.send(ReservationAction::GuestsChanged { input: "4".into() }).await.unwrap();
    session
        .send(ReservationAction::SelectOccasion { occasion: Occasion::Anniversary })
        .await
        .unwrap();
}

#[tokio::test]
async fn accepted_booking_resets_form_and_removes_time() {
    let submitter = Arc::new(RecordingSubmitter::accepting());
    let session = start(three_slots(), Some(submitter.clone()));

    fill_form(&session, "18:00").await;
    assert!(session.state(|s| s.can_submit).await);
    session.send(ReservationAction::Submit).await.unwrap();

    let state = session.wait_until(|s| s.last_confirmed.is_some(), WAIT).await.unwrap();
    assert_eq!(state.draft, ReservationDraft::new(Some(TimeSlot::from("17:00"))));
    assert_eq!(state.submission, SubmissionState::Idle);
    assert!(!state.available_times.contains(&TimeSlot::from("18:00")));

    let availability = session
        .wait_for_availability(|a| !a.offers(&TimeSlot::from("18:00")), WAIT)
        .await
        .unwrap();
    assert_eq!(availability.date, Some(today()));
    assert_eq!(availability.times, slots(["17:00", "19:00"]));

    let calls = submitter.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].time, TimeSlot::from("18:00"));
    assert_eq!(calls[0].guests, Guests::new(4.0));
    assert_eq!(calls[0].occasion, Occasion::Anniversary);
}

#[tokio::test]
async fn rejected_booking_keeps_input_for_retry() {
    let submitter = Arc::new(RecordingSubmitter::rejecting());
    let session = start(three_slots(), Some(submitter.clone()));

    fill_form(&session, "18:00").await;
    let before = session.state(|s| s.draft.clone()).await;
    session.send(ReservationAction::Submit).await.unwrap();

    let state = session.wait_until(|s| s.errors.submit.is_some(), WAIT).await.unwrap();
    assert_eq!(state.errors.submit.as_deref(), Some(SUBMIT_FAILED_MESSAGE));
    assert_eq!(state.draft, before);
    assert!(state.is_valid);
    assert!(state.can_submit);
    assert!(state.available_times.contains(&TimeSlot::from("18:00")));
    assert!(session.availability(|a| a.offers(&TimeSlot::from("18:00"))).await);
    assert_eq!(submitter.calls().len(), 1);
}

#[tokio::test]
async fn failing_time_source_offers_default_times() {
    let session = start(FailingTimeSource::new("offline"), None);

    let defaults = slots(DEFAULT_TIMES);
    assert_eq!(session.state(|s| s.available_times.clone()).await, defaults);

    session.send(ReservationAction::SelectDate { date: tomorrow() }).await.unwrap();
    assert_eq!(session.availability(|a| a.times.clone()).await, defaults);
}

#[tokio::test]
async fn failed_fetch_for_new_date_replaces_previous_list_with_defaults() {
    let session = start(three_slots(), None);
    assert_eq!(session.state(|s| s.available_times.len()).await, 3);

    session.send(ReservationAction::SelectDate { date: tomorrow() }).await.unwrap();

    let state = session
        .wait_until(|s| s.available_times.len() == DEFAULT_TIMES.len(), WAIT)
        .await
        .unwrap();
    assert_eq!(state.available_times, slots(DEFAULT_TIMES));
    assert_eq!(state.draft.time, Some(TimeSlot::from("17:00")));
}

#[tokio::test]
async fn time_taken_elsewhere_blocks_submit_without_calling_submitter() {
    let submitter = Arc::new(RecordingSubmitter::accepting());
    let source = ScriptedTimeSource::new()
        .with_date(today(), slots(["20:00"]))
        .with_date(tomorrow(), slots(["17:00"]));
    let session = start(source, Some(submitter.clone()));

    session.send(ReservationAction::SelectDate { date: tomorrow() }).await.unwrap();
    session
        .wait_until(|s| s.available_times == slots(["17:00"]), WAIT)
        .await
        .unwrap();
    session.send(ReservationAction::SelectTime { time: "17:00".into() }).await.unwrap();

    session
        .send_availability(AvailabilityAction::TimeBooked { date: tomorrow(), time: "17:00".into() })
        .await
        .unwrap();
    session.wait_until(|s| s.available_times.is_empty(), WAIT).await.unwrap();

    session.send(ReservationAction::Submit).await.unwrap();

    let state = session.state(Clone::clone).await;
    assert_eq!(state.errors.time, Some(ValidationError::TimeUnavailable));
    assert_eq!(state.draft.time, Some(TimeSlot::from("17:00")));
    assert_eq!(state.submission, SubmissionState::Idle);
    assert!(!state.can_submit);
    assert!(submitter.calls().is_empty());
}

#[tokio::test]
async fn cancelled_submission_ignores_late_answer() {
    let gate = Arc::new(GatedSubmitter::new());
    let session = start(three_slots(), Some(gate.clone()));

    fill_form(&session, "19:00").await;
    let mut handle = session.send(ReservationAction::Submit).await.unwrap();
    gate.wait_for_calls(1).await;

    session.send(ReservationAction::Cancel).await.unwrap();
    assert_eq!(session.state(|s| s.submission.clone()).await, SubmissionState::Cancelled);

    gate.release(true);
    handle.wait_with_timeout(WAIT).await.unwrap();

    let state = session.state(Clone::clone).await;
    assert_eq!(state.submission, SubmissionState::Cancelled);
    assert_eq!(state.last_confirmed, None);
    assert_eq!(state.errors.submit, None);
    assert_eq!(state.draft.time, Some(TimeSlot::from("19:00")));
    assert!(session.availability(|a| a.offers(&TimeSlot::from("19:00"))).await);
}

#[tokio::test]
async fn resubmitting_after_cancel_books_once() {
    let gate = Arc::new(GatedSubmitter::new());
    let session = start(three_slots(), Some(gate.clone()));

    fill_form(&session, "19:00").await;
    let mut first = session.send(ReservationAction::Submit).await.unwrap();
    gate.wait_for_calls(1).await;
    session.send(ReservationAction::Cancel).await.unwrap();

    gate.release(true);
    session.send(ReservationAction::Submit).await.unwrap();
    first.wait_with_timeout(WAIT).await.unwrap();

    let state = session.wait_until(|s| s.last_confirmed.is_some(), WAIT).await.unwrap();
    assert_eq!(state.next_attempt, 3);
    assert_eq!(gate.calls().len(), 2);
    assert_eq!(
        session
            .wait_for_availability(|a| !a.offers(&TimeSlot::from("19:00")), WAIT)
            .await
            .unwrap()
            .times,
        slots(["17:00", "18:00"])
    );
}

#[tokio::test]
async fn cancel_during_delay_never_reaches_submitter() {
    let submitter = Arc::new(RecordingSubmitter::accepting());
    let config = BookingConfig::default().with_submit_delay(Duration::from_millis(200));
    let session = start_with(three_slots(), Some(submitter.clone()), config);

    fill_form(&session, "17:00").await;
    let mut handle = session.send(ReservationAction::Submit).await.unwrap();
    session.send(ReservationAction::Cancel).await.unwrap();
    handle.wait_with_timeout(WAIT).await.unwrap();

    assert!(submitter.calls().is_empty());
    assert_eq!(session.state(|s| s.submission.clone()).await, SubmissionState::Cancelled);
}

#[tokio::test]
async fn missing_submitter_accepts() {
    let session = start(three_slots(), None);

    fill_form(&session, "17:00").await;
    session.send(ReservationAction::Submit).await.unwrap();

    let state = session.wait_until(|s| s.last_confirmed.is_some(), WAIT).await.unwrap();
    assert_eq!(state.available_times, slots(["19:00", "18:00"]));
}

#[tokio::test]
async fn submitter_errors_and_panics_are_retryable_failures() {
    let submitters: [Arc<dyn Submitter>; 2] = [
        Arc::new(FailingSubmitter::new(SubmitError::Timeout)),
        Arc::new(PanickingSubmitter),
    ];

    for submitter in submitters {
        let session = start(three_slots(), Some(submitter));
        fill_form(&session, "18:00").await;
        session.send(ReservationAction::Submit).await.unwrap();

        let state = session.wait_until(|s| s.errors.submit.is_some(), WAIT).await.unwrap();
        assert!(matches!(state.submission, SubmissionState::Failed { .. }));
        assert!(state.can_submit);
        assert_eq!(state.draft.time, Some(TimeSlot::from("18:00")));
    }
}

#[tokio::test]
async fn booking_right_after_date_change_lands_on_new_date() {
    let session = start(StaticTimeSource::new(slots(["17:00", "18:00", "19:00"])), None);

    session.send(ReservationAction::SelectDate { date: tomorrow() }).await.unwrap();
    session.send(ReservationAction::Submit).await.unwrap();

    let confirmed = session.wait_until(|s| s.last_confirmed.is_some(), WAIT).await.unwrap();
    let booked = confirmed.last_confirmed.unwrap();
    assert_eq!(booked.date, tomorrow());

    let availability = session
        .wait_for_availability(|a| a.date == Some(tomorrow()) && !a.offers(&booked.time), WAIT)
        .await
        .unwrap();
    assert_eq!(availability.times.len(), 2);

    let state = session
        .wait_until(|s| s.available_times == availability.times, WAIT)
        .await
        .unwrap();
    assert!(!state.available_times.contains(&booked.time));
}

#[tokio::test]
async fn choosing_the_date_again_refetches_booked_time() {
    let session = start(StaticTimeSource::new(slots(["17:00", "18:00"])), None);

    session.send(ReservationAction::SelectDate { date: today() }).await.unwrap();
    session.send(ReservationAction::Submit).await.unwrap();
    let booked = session
        .wait_until(|s| s.last_confirmed.is_some(), WAIT)
        .await
        .unwrap()
        .last_confirmed
        .unwrap();
    session
        .wait_for_availability(|a| !a.offers(&booked.time), WAIT)
        .await
        .unwrap();

    session.send(ReservationAction::SelectDate { date: today() }).await.unwrap();
    let state = session
        .wait_until(|s| s.available_times.contains(&booked.time), WAIT)
        .await
        .unwrap();
    assert_eq!(state.available_times.len(), 2);
}
