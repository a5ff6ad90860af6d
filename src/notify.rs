//! # Notification Channel
//!
//! Hands newly inserted jobs to whatever consumer is attached (log writer,
//! future chat integration) over a bounded channel. Publishing never blocks
//! the processing loop: when the consumer falls behind, events are dropped
//! and counted.

use metrics::counter;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Event published once per newly inserted job row.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobEvent {
    pub source_id: String,
    pub company: String,
    pub title: String,
    pub url: String,
    pub score: i64,
}

/// Sending half of the notification channel.
#[derive(Clone)]
pub struct JobNotifier {
    tx: mpsc::Sender<JobEvent>,
}

/// Create a bounded notification channel.
pub fn channel(capacity: usize) -> (JobNotifier, mpsc::Receiver<JobEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (JobNotifier { tx }, rx)
}

impl JobNotifier {
    /// Publish an event without waiting. A full channel drops the event.
    pub fn notify(&self, event: JobEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                counter!("notify_dropped_total").increment(1);
                warn!(
                    source_id = %event.source_id,
                    "Notification channel full, dropping job event"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(
                    source_id = %event.source_id,
                    "Notification channel closed, dropping job event"
                );
            }
        }
    }
}

/// Drain the receiving half, logging every event at or above `min_score`.
///
/// Runs until the sending half is dropped. This is the default consumer
/// wired up by the binary; anything fancier replaces this task.
pub async fn log_events(mut rx: mpsc::Receiver<JobEvent>, min_score: i64) {
    while let Some(event) = rx.recv().await {
        if event.score >= min_score {
            info!(
                source_id = %event.source_id,
                company = %event.company,
                title = %event.title,
                url = %event.url,
                score = event.score,
                "New job"
            );
        } else {
            debug!(
                source_id = %event.source_id,
                score = event.score,
                "New job below notification threshold"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(source_id: &str, score: i64) -> JobEvent {
        JobEvent {
            source_id: source_id.to_string(),
            company: "Acme".to_string(),
            title: "Backend Engineer".to_string(),
            url: "https://acme.example/jobs/1".to_string(),
            score,
        }
    }

    #[tokio::test]
    async fn delivers_events_in_order() {
        let (notifier, mut rx) = channel(8);

        notifier.notify(event("a", 10));
        notifier.notify(event("b", 20));

        assert_eq!(rx.recv().await.unwrap().source_id, "a");
        assert_eq!(rx.recv().await.unwrap().source_id, "b");
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let (notifier, mut rx) = channel(1);

        notifier.notify(event("kept", 10));
        notifier.notify(event("dropped", 10));

        assert_eq!(rx.recv().await.unwrap().source_id, "kept");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_receiver_does_not_panic() {
        let (notifier, rx) = channel(1);
        drop(rx);

        notifier.notify(event("late", 10));
    }
}
