use axum::extract::State;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Install the global Prometheus recorder and describe the engine's metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!(
        "chunk_messages_received_total",
        "Messages read from the input queue"
    );
    metrics::describe_counter!(
        "chunk_status_total",
        "Chunk status records reported, by status"
    );
    metrics::describe_counter!(
        "engine_outputs_published_total",
        "Synthetic engine outputs published"
    );
    metrics::describe_counter!(
        "chunk_messages_requeued_total",
        "Input messages handed back to the queue unprocessed at shutdown"
    );
    metrics::describe_gauge!("build_info", "Engine build information");
    metrics::gauge!("build_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    Ok(handle)
}

/// GET /metrics in Prometheus text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> String {
    handle.render()
}
