//! Test helper utilities for driving the ingest loop without Redis

#![allow(dead_code)]

use async_trait::async_trait;
use rt_test_engine::{
    app_state::AppState,
    models::{output::EngineOutputRecord, status::ChunkStatusRecord},
    services::{
        ingest::{self, ExitReason, IngestSettings},
        queue::{OutboundMessage, Publisher, QueueError, RawMessage},
        shutdown::{self, ShutdownTrigger},
    },
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Publisher that records every message, optionally failing engine outputs.
#[derive(Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<OutboundMessage>>,
    fail_outputs: AtomicBool,
}

impl MemoryPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_outputs(&self) {
        self.fail_outputs.store(true, Ordering::SeqCst);
    }

    fn json_of_type(&self, record_type: &str) -> Vec<serde_json::Value> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| serde_json::from_slice::<serde_json::Value>(&m.payload).unwrap())
            .filter(|v| v["type"] == record_type)
            .collect()
    }

    pub fn outputs(&self) -> Vec<EngineOutputRecord> {
        self.json_of_type("engine_output")
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect()
    }

    pub fn statuses(&self) -> Vec<ChunkStatusRecord> {
        self.json_of_type("chunk_processed_status")
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect()
    }

    /// Raw payloads as text, in publish order.
    pub fn payloads(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| String::from_utf8_lossy(&m.payload).into_owned())
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.messages.lock().unwrap().iter().map(|m| m.key.clone()).collect()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<(), QueueError> {
        let is_output = serde_json::from_slice::<serde_json::Value>(&message.payload)
            .map(|v| v["type"] == "engine_output")
            .unwrap_or(false);
        if is_output && self.fail_outputs.load(Ordering::SeqCst) {
            return Err(redis::RedisError::from((redis::ErrorKind::IoError, "broker unavailable")).into());
        }
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

/// A running ingest loop with handles to feed and stop it.
pub struct Harness {
    pub publisher: Arc<MemoryPublisher>,
    /// Input handed back to the queue when the loop stops.
    pub requeued: Arc<MemoryPublisher>,
    pub state: AppState,
    pub sender: mpsc::Sender<RawMessage>,
    pub trigger: ShutdownTrigger,
    pub handle: JoinHandle<ExitReason>,
}

impl Harness {
    pub fn start(settings: IngestSettings) -> Self {
        Self::start_with(MemoryPublisher::new(), settings)
    }

    pub fn start_with(publisher: Arc<MemoryPublisher>, settings: IngestSettings) -> Self {
        let requeued = MemoryPublisher::new();
        let state = AppState::new(publisher.clone(), requeued.clone());
        let (sender, source) = mpsc::channel(16);
        let (trigger, listener) = shutdown::channel();
        let handle = tokio::spawn(ingest::run(state.clone(), settings, source, listener));
        Self {
            publisher,
            requeued,
            state,
            sender,
            trigger,
            handle,
        }
    }

    pub async fn send(&self, payload: &str) {
        self.sender
            .send(RawMessage::new("engine:input", payload))
            .await
            .expect("ingest loop stopped reading");
    }

    /// Close the input and wait for the loop to finish.
    pub async fn finish(self) -> (ExitReason, Arc<MemoryPublisher>, AppState) {
        drop(self.sender);
        let reason = self.handle.await.expect("ingest loop panicked");
        (reason, self.publisher, self.state)
    }
}

pub fn settings(idle_timeout: Duration) -> IngestSettings {
    IngestSettings {
        idle_timeout,
        max_concurrency: 4,
        shutdown_grace: Duration::from_secs(5),
    }
}

/// A well-formed media chunk event.
pub fn chunk_event(task_id: &str, chunk_uuid: &str, mime_type: &str, start: i32, end: i32) -> String {
    serde_json::json!({
        "taskId": task_id,
        "type": "media_chunk",
        "chunkUuid": chunk_uuid,
        "mimeType": mime_type,
        "startOffsetMs": start,
        "endOffsetMs": end,
        "jobId": "j1",
        "tdoId": "d1",
    })
    .to_string()
}
