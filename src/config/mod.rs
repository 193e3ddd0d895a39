use garde::Validate;
use serde::Deserialize;
use std::time::Duration;
use strum::EnumString;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppConfig {
    /// Redis connection string for the input and output queues
    #[garde(length(min = 1))]
    pub redis_url: String,

    /// List the engine consumes media chunk events from
    #[serde(default = "default_input_queue")]
    #[garde(length(min = 1))]
    pub input_queue: String,

    /// List receiving engine outputs and chunk status records
    #[serde(default = "default_chunk_queue")]
    #[garde(length(min = 1))]
    pub chunk_queue: String,

    #[serde(default)]
    #[garde(skip)]
    pub engine_id: String,

    #[serde(default)]
    #[garde(skip)]
    pub engine_instance_id: String,

    /// Seconds without an accepted message before the worker exits
    #[serde(default = "default_end_if_idle_secs")]
    #[garde(range(min = 1))]
    pub end_if_idle_secs: u64,

    /// Upper bound on chunks processed concurrently
    #[serde(default = "default_max_concurrency")]
    #[garde(range(min = 1, max = 1024))]
    pub max_concurrency: usize,

    /// Seconds granted to in-flight chunks once the loop stops
    #[serde(default = "default_shutdown_grace_secs")]
    #[garde(skip)]
    pub shutdown_grace_secs: u64,

    /// "json" or "text"
    #[serde(default = "default_log_format")]
    #[garde(custom(validate_log_format))]
    pub log_format: String,

    /// Bind address for /health and /metrics
    #[serde(default = "default_metrics_bind_addr")]
    #[garde(length(min = 1))]
    pub metrics_bind_addr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

fn default_input_queue() -> String {
    "engine:input".to_string()
}

fn default_chunk_queue() -> String {
    "engine:chunks".to_string()
}

fn default_end_if_idle_secs() -> u64 {
    30 * 60
}

fn default_max_concurrency() -> usize {
    10
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_metrics_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn validate_log_format(value: &str, _ctx: &()) -> garde::Result {
    value
        .parse::<LogFormat>()
        .map(|_| ())
        .map_err(|_| garde::Error::new(format!("unsupported log format '{value}'")))
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from explicit key/value pairs (uppercase keys, as in the environment).
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.end_if_idle_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format.parse().unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment error: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
}
