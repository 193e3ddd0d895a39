//! The consume-classify-produce loop.
//!
//! One task reads the input channel sequentially. Every supported chunk is
//! handed to its own task, with at most `max_concurrency` of them in flight;
//! at the cap the loop stops reading until one finishes. The loop waits on a
//! single `select!` over the shutdown signal, finished tasks, the idle timer
//! and the next message, and never awaits a publish itself: status records
//! for rejected messages are published from their own tasks.
//!
//! When the loop ends it closes its source and hands every message that was
//! read from the queue but not yet accepted back to the queue.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{sleep, timeout_at, Instant};

use crate::app_state::AppState;
use crate::config::AppConfig;
use crate::models::chunk::MediaChunkRecord;
use crate::models::status::ChunkStatus;
use crate::services::classifier::classify;
use crate::services::queue::{OutboundMessage, QueueError, RawMessage};
use crate::services::shutdown::{ShutdownListener, ShutdownSignal, EXIT_OK};
use crate::services::synthesizer::{now_millis, synthesize};

#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Maximum gap between accepted messages before the loop ends
    pub idle_timeout: Duration,

    /// Chunks processed concurrently
    pub max_concurrency: usize,

    /// Time granted to in-flight chunks once the loop ends
    pub shutdown_grace: Duration,
}

impl IngestSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            idle_timeout: config.idle_timeout(),
            max_concurrency: config.max_concurrency,
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

/// Why the ingest loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    IdleTimeout,
    Signal(ShutdownSignal),
    SourceClosed,
}

impl ExitReason {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::IdleTimeout | Self::SourceClosed => EXIT_OK,
            Self::Signal(signal) => signal.exit_code(),
        }
    }
}

/// Failure of a dispatched chunk after classification.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to build engine output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("Failed to publish engine output: {0}")]
    Publish(#[from] QueueError),
}

/// Run until the idle timer expires, shutdown is requested, or the source closes.
pub async fn run(
    state: AppState,
    settings: IngestSettings,
    mut source: mpsc::Receiver<RawMessage>,
    mut shutdown: ShutdownListener,
) -> ExitReason {
    let max_concurrency = settings.max_concurrency.max(1);
    let idle = sleep(settings.idle_timeout);
    tokio::pin!(idle);
    let mut in_flight: JoinSet<()> = JoinSet::new();
    let mut statuses: JoinSet<()> = JoinSet::new();

    tracing::info!(
        idle_timeout_secs = settings.idle_timeout.as_secs(),
        max_concurrency,
        "Listening for media chunks"
    );

    let reason = loop {
        tokio::select! {
            biased;

            signal = shutdown.recv() => break ExitReason::Signal(signal),

            Some(joined) = in_flight.join_next() => log_join(joined),

            Some(joined) = statuses.join_next() => log_join(joined),

            () = &mut idle => break ExitReason::IdleTimeout,

            received = source.recv(), if in_flight.len() < max_concurrency => {
                let Some(message) = received else {
                    break ExitReason::SourceClosed;
                };
                if let Some(chunk) = accept(&state, message, &mut statuses) {
                    in_flight.spawn(process_chunk(state.clone(), chunk));
                }
                idle.as_mut().reset(Instant::now() + settings.idle_timeout);
            }
        }
    };

    tracing::info!(?reason, counts = %state.counters.snapshot(), "Ingest loop stopped");
    let deadline = Instant::now() + settings.shutdown_grace;
    let unread = take_unread(&mut source);
    requeue_unread(&state, unread, deadline).await;
    drain(&mut in_flight, &mut statuses, deadline).await;
    reason
}

/// Count and classify a message. Rejections are counted here and their status
/// is published from a task in `statuses`; accepted chunks are returned for
/// dispatch.
fn accept(
    state: &AppState,
    message: RawMessage,
    statuses: &mut JoinSet<()>,
) -> Option<MediaChunkRecord> {
    state.counters.add_received();
    tracing::debug!(source = %message.source, payload = %message.payload_lossy(), "Received message");

    let failure = match classify(&message) {
        Ok(chunk) => return Some(chunk),
        Err(failure) => failure,
    };

    let description = failure.to_string();
    let (error_msg, info_msg) = if failure.is_soft() {
        tracing::warn!(task_id = failure.task_id(), chunk_uuid = failure.chunk_uuid(), "{}", description);
        ("", description.as_str())
    } else {
        tracing::error!(task_id = failure.task_id(), "{}", description);
        (description.as_str(), "")
    };

    let status = state.reporter.record(
        failure.task_id(),
        failure.chunk_uuid(),
        failure.status(),
        error_msg,
        info_msg,
    );
    if let Some(status) = status {
        let reporter = state.reporter.clone();
        statuses.spawn(async move { reporter.publish(status).await });
    }
    None
}

/// Synthesize and publish the output for one chunk, then report its status.
pub async fn process_chunk(state: AppState, chunk: MediaChunkRecord) {
    match publish_output(&state, &chunk).await {
        Ok(()) => {
            tracing::info!(
                task_id = %chunk.task_id,
                job_id = %chunk.job_id,
                chunk_uuid = %chunk.chunk_uuid,
                "Completed processing chunk"
            );
            state
                .reporter
                .report(&chunk.task_id, &chunk.chunk_uuid, ChunkStatus::Success, "", "")
                .await;
        }
        Err(e) => {
            tracing::error!(task_id = %chunk.task_id, chunk_uuid = %chunk.chunk_uuid, error = %e, "Chunk processing failed");
            state
                .reporter
                .report(&chunk.task_id, &chunk.chunk_uuid, ChunkStatus::Error, &e.to_string(), "")
                .await;
        }
    }
}

async fn publish_output(state: &AppState, chunk: &MediaChunkRecord) -> Result<(), ProcessError> {
    let output = synthesize(chunk, now_millis())?;
    let message = OutboundMessage::json(&chunk.task_id, &output)?;
    state.publisher.publish(message).await?;
    metrics::counter!("engine_outputs_published_total").increment(1);
    Ok(())
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Chunk task did not complete");
    }
}

/// Close the source and collect what it still buffers.
fn take_unread(source: &mut mpsc::Receiver<RawMessage>) -> Vec<RawMessage> {
    source.close();
    let mut unread = Vec::new();
    while let Ok(message) = source.try_recv() {
        unread.push(message);
    }
    unread
}

/// Push unread messages back onto their queue, newest first so the oldest is
/// read first again.
async fn requeue_unread(state: &AppState, unread: Vec<RawMessage>, deadline: Instant) {
    if unread.is_empty() {
        return;
    }

    let count = unread.len();
    let returned = timeout_at(deadline, async {
        for RawMessage { source, payload } in unread.into_iter().rev() {
            let message = OutboundMessage { key: source, payload };
            let key = message.key.clone();
            match state.requeue.publish(message).await {
                Ok(()) => metrics::counter!("chunk_messages_requeued_total").increment(1),
                Err(e) => tracing::error!(queue = %key, error = %e, "Failed to return unread message"),
            }
        }
    })
    .await;

    match returned {
        Ok(()) => tracing::info!(count, "Returned unread messages to the queue"),
        Err(_) => tracing::error!(count, "Grace period elapsed while returning unread messages"),
    }
}

/// Wait until `deadline` for in-flight chunks and pending status publishes,
/// then abort the rest.
async fn drain(in_flight: &mut JoinSet<()>, statuses: &mut JoinSet<()>, deadline: Instant) {
    if in_flight.is_empty() && statuses.is_empty() {
        return;
    }

    tracing::info!(
        in_flight = in_flight.len(),
        pending_statuses = statuses.len(),
        "Waiting for in-flight chunks"
    );
    let drained = timeout_at(deadline, async {
        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
        while let Some(joined) = statuses.join_next().await {
            log_join(joined);
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            abandoned = in_flight.len() + statuses.len(),
            "Grace period elapsed, aborting in-flight work"
        );
        in_flight.abort_all();
        statuses.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitReason::IdleTimeout.exit_code(), 0);
        assert_eq!(ExitReason::SourceClosed.exit_code(), 0);
        assert_eq!(ExitReason::Signal(ShutdownSignal::Interrupt).exit_code(), 130);
        assert_eq!(ExitReason::Signal(ShutdownSignal::Terminate).exit_code(), 143);
    }
}
