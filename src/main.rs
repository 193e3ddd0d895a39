use rt_test_engine::{
    app_state::AppState,
    config::{AppConfig, LogFormat},
    routes::{self, HealthState},
    services::{
        ingest::{self, ExitReason, IngestSettings},
        queue::RedisQueue,
        shutdown::{self, EXIT_FAILURE},
    },
};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Configuration decides the log format, so load it before logging starts
    let config = AppConfig::from_env();
    init_tracing(config.as_ref().map(AppConfig::log_format).unwrap_or_default());
    let config = config.unwrap_or_else(|e| fatal("Failed to load configuration", e));

    tracing::info!(
        engine_id = %config.engine_id,
        engine_instance_id = %config.engine_instance_id,
        input_queue = %config.input_queue,
        chunk_queue = %config.chunk_queue,
        "Starting realtime test engine"
    );
    tracing::debug!(?config, "Loaded configuration");

    let prometheus = routes::metrics::install_recorder()
        .unwrap_or_else(|e| fatal("Failed to install Prometheus metrics recorder", e));

    tracing::info!("Connecting to Redis");
    let queue = RedisQueue::new(&config.redis_url)
        .unwrap_or_else(|e| fatal("Failed to initialize Redis client", e));
    let queue = Arc::new(queue);

    let publisher = queue
        .publisher(&config.chunk_queue)
        .await
        .unwrap_or_else(|e| fatal("Failed to initialize queue publisher", e));

    let requeuer = queue
        .requeuer(&config.input_queue)
        .await
        .unwrap_or_else(|e| fatal("Failed to initialize queue requeuer", e));

    let (source, mut consumer) = queue
        .spawn_consumer(&config.input_queue, config.max_concurrency)
        .await
        .unwrap_or_else(|e| fatal("Failed to initialize queue consumer", e));

    let state = AppState::new(Arc::new(publisher), Arc::new(requeuer));

    let health = HealthState {
        queue: queue.clone(),
        counters: state.counters.clone(),
        engine_id: config.engine_id.clone(),
        engine_instance_id: config.engine_instance_id.clone(),
    };
    let app = routes::router(health, Arc::new(prometheus));
    let listener = tokio::net::TcpListener::bind(&config.metrics_bind_addr)
        .await
        .unwrap_or_else(|e| fatal("Failed to bind metrics address", e));
    tracing::info!("Metrics and health listening on {}", config.metrics_bind_addr);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Metrics server error");
        }
    });

    let (trigger, shutdown_listener) = shutdown::channel();
    tokio::spawn(shutdown::listen_for_signals(trigger));

    let reason = ingest::run(
        state,
        IngestSettings::from_config(&config),
        source,
        shutdown_listener,
    )
    .await;
    server.abort();

    // The loop closed its source. A pop blocks for at most a second before the
    // consumer notices, returning any message it still holds.
    let mut exit_code = reason.exit_code();
    let consumer_wait = config.shutdown_grace() + Duration::from_secs(2);
    match tokio::time::timeout(consumer_wait, &mut consumer).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => {
            tracing::error!(error = %e, "Queue consumer failed");
            if reason == ExitReason::SourceClosed {
                exit_code = EXIT_FAILURE;
            }
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Queue consumer task panicked");
            if reason == ExitReason::SourceClosed {
                exit_code = EXIT_FAILURE;
            }
        }
        Err(_) => {
            tracing::warn!("Queue consumer did not stop in time");
            consumer.abort();
        }
    }

    tracing::info!(?reason, exit_code, "Engine stopped");
    std::process::exit(exit_code);
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Log an unrecoverable startup failure and exit.
fn fatal(context: &str, error: impl Display) -> ! {
    tracing::error!(error = %error, "{}", context);
    std::process::exit(EXIT_FAILURE);
}
