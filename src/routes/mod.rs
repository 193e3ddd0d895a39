use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::{queue::RedisQueue, status::MessageCounters};

pub mod health;
pub mod metrics;

/// State behind GET /health.
#[derive(Clone)]
pub struct HealthState {
    pub queue: Arc<RedisQueue>,
    pub counters: Arc<MessageCounters>,
    pub engine_id: String,
    pub engine_instance_id: String,
}

/// Operational endpoints served next to the worker loop.
pub fn router(health: HealthState, prometheus: Arc<PrometheusHandle>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .with_state(health)
        .route(
            "/metrics",
            get(metrics::prometheus_metrics).with_state(prometheus),
        )
        .layer(TraceLayer::new_for_http())
}
