//! Once-per-second countdown poller.
//!
//! A cooperative tokio task that calls [`EssaySession::tick`] on an interval
//! and forwards the resulting events. It stops on its own as soon as the
//! countdown is no longer running (manual finish, expiry, reset), when its
//! receiver is dropped, or when the handle is stopped or dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::machine::EssaySession;
use crate::events::Event;

pub struct PollerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop polling and wait for the task to exit. No tick runs after this
    /// returns.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = (&mut self.task).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start polling `session` every `period`. The first poll happens
/// immediately.
pub fn spawn_poller(
    session: Arc<EssaySession>,
    period: Duration,
) -> (PollerHandle, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {}
            }
            let Some(event) = session.tick() else {
                break;
            };
            let expired = matches!(event, Event::TimerExpired { .. });
            if tx.send(event).is_err() || expired {
                break;
            }
        }
        tracing::debug!("countdown poller stopped");
    });

    (
        PollerHandle {
            stop: Some(stop_tx),
            task,
        },
        rx,
    )
}
