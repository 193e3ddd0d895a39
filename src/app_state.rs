use std::sync::Arc;

use crate::services::{
    queue::Publisher,
    status::{MessageCounters, StatusReporter},
};

/// Services shared by the ingest loop and every dispatched chunk.
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<dyn Publisher>,
    /// Returns read but unprocessed input to its queue.
    pub requeue: Arc<dyn Publisher>,
    pub reporter: Arc<StatusReporter>,
    pub counters: Arc<MessageCounters>,
}

impl AppState {
    pub fn new(publisher: Arc<dyn Publisher>, requeue: Arc<dyn Publisher>) -> Self {
        let counters = MessageCounters::new();
        let reporter = StatusReporter::new(publisher.clone(), counters.clone());
        Self {
            publisher,
            requeue,
            reporter: Arc::new(reporter),
            counters,
        }
    }
}
