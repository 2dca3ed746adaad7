//! Scripted walk through the booking flow.
//!
//! Starts a session against in-memory collaborators, books a table, shows a
//! rejected attempt and a cancelled one, then prints the collected metrics.
//!
//! Configuration comes from the environment (and `.env`, if present); see
//! [`BookingConfig::from_env`].

use anyhow::Context;
use chrono::Days;
use little_lemon_booking::mocks::{GatedSubmitter, RecordingSubmitter, ScriptedTimeSource};
use little_lemon_booking::types::slots;
use little_lemon_booking::{BookingConfig, BookingSession, Occasion, ReservationAction, ReservationState};
use little_lemon_core::environment::{Clock, SystemClock};
use little_lemon_runtime::metrics::MetricsExporter;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "little_lemon_booking=debug,little_lemon_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut exporter = MetricsExporter::new();
    exporter.install().context("installing metrics exporter")?;
    little_lemon_booking::metrics::register_metrics();

    let config = BookingConfig::from_env();
    info!(?config, "Configuration loaded");

    let today = SystemClock.today();
    let tomorrow = today.checked_add_days(Days::new(1)).context("date out of range")?;
    let time_source = ScriptedTimeSource::new()
        .with_date(tomorrow, slots(["17:00", "18:00", "19:00", "20:00"]))
        .otherwise(slots(["18:00", "20:00", "22:00"]));

    // Happy path: pick tomorrow, book the first offered time for four
    let submitter = Arc::new(RecordingSubmitter::accepting());
    let session = BookingSession::builder(Arc::new(time_source.clone()))
        .with_config(config.clone())
        .with_submitter(submitter.clone())
        .start()?;

    session.send(ReservationAction::SelectDate { date: tomorrow }).await?;
    let state = session
        .wait_until(|s| s.times_date == Some(tomorrow) && s.available_times.len() == 4, WAIT)
        .await?;
    info!(times = ?state.available_times, "Times for tomorrow");

    session.send(ReservationAction::GuestsChanged { input: "4".into() }).await?;
    session.send(ReservationAction::SelectOccasion { occasion: Occasion::Anniversary }).await?;
    session.send(ReservationAction::Submit).await?;
    let state = session.wait_until(|s| s.last_confirmed.is_some(), WAIT).await?;
    report("booked", &state);

    let remaining = session
        .wait_for_availability(|a| a.date == Some(tomorrow) && a.times.len() == 3, WAIT)
        .await?;
    info!(times = ?remaining.times, "Availability after booking");
    info!(received = submitter.calls().len(), "Submitter calls");
    session.shutdown(WAIT).await?;

    // Rejection: the form keeps its input and shows a retry message
    let session = BookingSession::builder(Arc::new(time_source.clone()))
        .with_config(config.clone())
        .with_submitter(Arc::new(RecordingSubmitter::rejecting()))
        .start()?;
    session.send(ReservationAction::SelectDate { date: tomorrow }).await?;
    session.wait_until(|s| s.available_times.len() == 4 && s.can_submit, WAIT).await?;
    session.send(ReservationAction::Submit).await?;
    let state = session.wait_until(|s| s.errors.submit.is_some(), WAIT).await?;
    report("rejected", &state);
    session.shutdown(WAIT).await?;

    // Cancellation: the answer arrives after cancel and is ignored
    let gate = Arc::new(GatedSubmitter::new());
    let session = BookingSession::builder(Arc::new(time_source))
        .with_config(config)
        .with_submitter(gate.clone())
        .start()?;
    session.send(ReservationAction::SelectDate { date: tomorrow }).await?;
    session.wait_until(|s| s.available_times.len() == 4 && s.can_submit, WAIT).await?;
    session.send(ReservationAction::Submit).await?;
    gate.wait_for_calls(1).await;
    session.send(ReservationAction::Cancel).await?;
    gate.release(true);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let state = session.state(Clone::clone).await;
    report("cancelled", &state);
    session.shutdown(WAIT).await?;

    if let Some(rendered) = exporter.render() {
        println!("{rendered}");
    }

    Ok(())
}

fn report(label: &str, state: &ReservationState) {
    info!(
        label,
        submission = ?state.submission,
        confirmed = ?state.last_confirmed,
        submit_error = ?state.errors.submit,
        times = ?state.available_times,
        "Form state"
    );
}
