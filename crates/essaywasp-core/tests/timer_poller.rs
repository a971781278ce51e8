//! Countdown poller driven by paused tokio time and a manual wall clock.

mod common;

use std::time::Duration;

use common::Harness;
use essaywasp_core::{spawn_poller, Event, Hms, Phase};

const PERIOD: Duration = Duration::from_secs(1);

#[tokio::test(start_paused = true)]
async fn poller_ticks_then_expires_exactly_once() {
    let h = Harness::with_duration_secs(3);
    h.session.start_session("opinion").await.unwrap();

    let (_handle, mut events) = spawn_poller(h.session.clone(), PERIOD);

    assert!(matches!(
        events.recv().await,
        Some(Event::TimerTicked { remaining, .. }) if remaining == Hms::from_secs(3)
    ));

    h.clock.advance_ms(1_000);
    assert!(matches!(
        events.recv().await,
        Some(Event::TimerTicked { remaining, .. }) if remaining == Hms::from_secs(2)
    ));

    h.clock.advance_ms(1_000);
    assert!(matches!(events.recv().await, Some(Event::TimerExpired { .. })));

    // The poller exits after expiry and closes the channel.
    assert!(events.recv().await.is_none());
    assert_eq!(h.session.phase(), Phase::Active);
    assert!(h.session.state().timer().is_expired());
}

#[tokio::test(start_paused = true)]
async fn manual_finish_stops_poller_without_expiry() {
    let h = Harness::with_credits(15);
    h.session.start_session("discussion").await.unwrap();
    h.session.update_essay_text("Both views have merit.").unwrap();

    let (_handle, mut events) = spawn_poller(h.session.clone(), PERIOD);
    assert!(matches!(events.recv().await, Some(Event::TimerTicked { .. })));

    h.clock.advance_ms(5_000);
    h.session.finish_session().await.unwrap();

    let mut rest = Vec::new();
    while let Some(event) = events.recv().await {
        rest.push(event);
    }
    assert!(rest
        .iter()
        .all(|e| !matches!(e, Event::TimerExpired { .. })));
    assert_eq!(h.session.phase(), Phase::Finished);
}

#[tokio::test(start_paused = true)]
async fn reset_stops_poller() {
    let h = Harness::with_credits(15);
    h.session.start_session("solution").await.unwrap();

    let (_handle, mut events) = spawn_poller(h.session.clone(), PERIOD);
    assert!(events.recv().await.is_some());

    h.session.reset().await;
    assert!(events.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn stopped_poller_sends_nothing_more() {
    let h = Harness::with_credits(15);
    h.session.start_session("direct").await.unwrap();

    let (handle, mut events) = spawn_poller(h.session.clone(), PERIOD);
    assert!(events.recv().await.is_some());

    handle.stop().await;
    h.clock.advance_ms(10_000);
    assert!(events.recv().await.is_none());
    assert!(h.session.state().timer().is_running());
}

#[tokio::test(start_paused = true)]
async fn poller_does_nothing_while_idle() {
    let h = Harness::with_credits(15);

    let (_handle, mut events) = spawn_poller(h.session.clone(), PERIOD);
    assert!(events.recv().await.is_none());
}
