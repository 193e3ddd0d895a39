use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::status::{ChunkStatus, ChunkStatusRecord};
use crate::services::queue::{OutboundMessage, Publisher};
use crate::services::synthesizer::now_millis;

/// Process-wide message totals.
///
/// `total` counts arrivals and the other three count reported outcomes, so
/// `total == successes + errors + ignored` whenever no message is in flight.
#[derive(Debug, Default)]
pub struct MessageCounters {
    total: AtomicU64,
    successes: AtomicU64,
    errors: AtomicU64,
    ignored: AtomicU64,
}

impl MessageCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record an arrival from the input queue.
    pub fn add_received(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("chunk_messages_received_total").increment(1);
    }

    fn add_outcome(&self, status: ChunkStatus) {
        let counter = match status {
            ChunkStatus::Success => &self.successes,
            ChunkStatus::Error => &self.errors,
            ChunkStatus::Ignored => &self.ignored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        let label: &'static str = status.into();
        metrics::counter!("chunk_status_total", "status" => label).increment(1);
    }

    pub fn snapshot(&self) -> CountSnapshot {
        CountSnapshot {
            total: self.total.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`MessageCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CountSnapshot {
    pub total: u64,
    pub successes: u64,
    pub errors: u64,
    pub ignored: u64,
}

impl CountSnapshot {
    pub fn reported(&self) -> u64 {
        self.successes + self.errors + self.ignored
    }

    /// Arrivals whose outcome is not reported yet.
    pub fn in_flight(&self) -> u64 {
        self.total.saturating_sub(self.reported())
    }

    pub fn percent_error(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.errors as f64 / self.total as f64 * 100.0
        }
    }
}

impl fmt::Display for CountSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message count: Total = {}, Successes = {}, Errors = {}, Ignored = {}, PercentError = {:.2}%",
            self.total,
            self.successes,
            self.errors,
            self.ignored,
            self.percent_error()
        )
    }
}

/// Publishes one status record per inbound message and keeps the counters.
pub struct StatusReporter {
    publisher: Arc<dyn Publisher>,
    counters: Arc<MessageCounters>,
}

impl StatusReporter {
    pub fn new(publisher: Arc<dyn Publisher>, counters: Arc<MessageCounters>) -> Self {
        Self { publisher, counters }
    }

    /// Count the outcome, log the running totals and encode the status record.
    ///
    /// Never waits, so the ingest loop can call it between two selects. The
    /// returned message still has to go through [`StatusReporter::publish`].
    pub fn record(
        &self,
        task_id: &str,
        chunk_uuid: &str,
        status: ChunkStatus,
        error_msg: &str,
        info_msg: &str,
    ) -> Option<OutboundMessage> {
        let record =
            ChunkStatusRecord::new(task_id, chunk_uuid, status, error_msg, info_msg, now_millis());
        tracing::debug!(?record, "Chunk status");

        self.counters.add_outcome(status);
        let counts = self.counters.snapshot();
        tracing::info!(
            total = counts.total,
            successes = counts.successes,
            errors = counts.errors,
            ignored = counts.ignored,
            "{}",
            counts
        );

        match OutboundMessage::json(task_id, &record) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::error!(task_id, chunk_uuid, error = %e, "Failed to encode chunk status");
                None
            }
        }
    }

    /// Publish an encoded status record. Best effort: failures are logged and
    /// go no further.
    pub async fn publish(&self, message: OutboundMessage) {
        if let Err(e) = self.publisher.publish(message.clone()).await {
            tracing::error!(task_id = %message.key, error = %e, "Failed to publish chunk status");
        }
    }

    /// [`record`](Self::record) then [`publish`](Self::publish), for callers
    /// already running off the ingest loop.
    pub async fn report(
        &self,
        task_id: &str,
        chunk_uuid: &str,
        status: ChunkStatus,
        error_msg: &str,
        info_msg: &str,
    ) {
        if let Some(message) = self.record(task_id, chunk_uuid, status, error_msg, info_msg) {
            self.publish(message).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_display() {
        let counters = MessageCounters::new();
        for _ in 0..4 {
            counters.add_received();
        }
        counters.add_outcome(ChunkStatus::Success);
        counters.add_outcome(ChunkStatus::Success);
        counters.add_outcome(ChunkStatus::Ignored);
        counters.add_outcome(ChunkStatus::Error);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.reported(), snapshot.total);
        assert_eq!(
            snapshot.to_string(),
            "Message count: Total = 4, Successes = 2, Errors = 1, Ignored = 1, PercentError = 25.00%"
        );
    }

    #[test]
    fn test_in_flight_is_the_unreported_remainder() {
        let counters = MessageCounters::new();
        for _ in 0..3 {
            counters.add_received();
        }
        counters.add_outcome(ChunkStatus::Ignored);
        assert_eq!(counters.snapshot().in_flight(), 2);
    }

    #[tokio::test]
    async fn test_record_counts_without_publishing() {
        let publisher = Arc::new(CountingPublisher::default());
        let counters = MessageCounters::new();
        let reporter = StatusReporter::new(publisher.clone(), counters.clone());
        counters.add_received();

        let message = reporter
            .record("t1", "c1", ChunkStatus::Error, "bad chunk", "")
            .expect("status record encodes");
        assert_eq!(message.key, "t1");
        assert_eq!(counters.snapshot().errors, 1);
        assert_eq!(publisher.published.load(Ordering::SeqCst), 0);

        let record: ChunkStatusRecord = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(record.status, ChunkStatus::Error);
        assert_eq!(record.error_msg, "bad chunk");

        reporter.publish(message).await;
        assert_eq!(publisher.published.load(Ordering::SeqCst), 1);
    }

    #[derive(Default)]
    struct CountingPublisher {
        published: AtomicU64,
    }

    #[async_trait::async_trait]
    impl Publisher for CountingPublisher {
        async fn publish(&self, _message: OutboundMessage) -> Result<(), crate::services::queue::QueueError> {
            self.published.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_percent_error_without_messages() {
        assert_eq!(CountSnapshot::default().percent_error(), 0.0);
    }
}
