use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Seconds a single BRPOP blocks before the consumer re-checks its channel.
const POP_TIMEOUT_SECS: f64 = 1.0;

/// A message as delivered by the input queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// List the message was popped from.
    pub source: String,
    pub payload: Vec<u8>,
}

impl RawMessage {
    pub fn new(source: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            source: source.into(),
            payload: payload.into(),
        }
    }

    /// Payload as text, for log lines and error messages.
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// A record ready for the output queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Partitioning key (the task id).
    pub key: String,
    pub payload: Vec<u8>,
}

impl OutboundMessage {
    pub fn json<T: serde::Serialize>(key: &str, value: &T) -> Result<Self, QueueError> {
        Ok(Self {
            key: key.to_string(),
            payload: serde_json::to_vec(value)?,
        })
    }
}

/// Sink for engine outputs and status records.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, message: OutboundMessage) -> Result<(), QueueError>;
}

/// Redis list transport: BRPOP for input, LPUSH for output, RPUSH to hand
/// unprocessed input back.
pub struct RedisQueue {
    client: redis::Client,
}

impl RedisQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    /// Open a publisher pushing onto `queue_key`.
    pub async fn publisher(&self, queue_key: &str) -> Result<RedisPublisher, QueueError> {
        self.open_publisher(queue_key, ListEnd::Head).await
    }

    /// Open a publisher that returns messages to `queue_key` at the end
    /// consumers pop from, so they are read again before newer input.
    pub async fn requeuer(&self, queue_key: &str) -> Result<RedisPublisher, QueueError> {
        self.open_publisher(queue_key, ListEnd::Tail).await
    }

    async fn open_publisher(&self, queue_key: &str, end: ListEnd) -> Result<RedisPublisher, QueueError> {
        let conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        Ok(RedisPublisher {
            conn,
            queue_key: queue_key.to_string(),
            end,
        })
    }

    /// Start a consumer popping `queue_key` into a channel of `capacity` messages.
    ///
    /// The consumer owns a dedicated connection, since BRPOP blocks it. It stops
    /// once the receiver is closed or dropped, and returns the transport error
    /// that ended it otherwise. A full channel stalls popping. A message popped
    /// after the receiver closed is pushed back onto the list.
    pub async fn spawn_consumer(
        &self,
        queue_key: &str,
        capacity: usize,
    ) -> Result<(mpsc::Receiver<RawMessage>, JoinHandle<Result<(), QueueError>>), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue_key = queue_key.to_string();

        let handle = tokio::spawn(async move {
            while !tx.is_closed() {
                let popped: Option<(String, Vec<u8>)> = conn
                    .brpop(&queue_key, POP_TIMEOUT_SECS)
                    .await
                    .map_err(QueueError::Redis)?;

                let Some((source, payload)) = popped else {
                    continue;
                };

                if let Err(mpsc::error::SendError(message)) = tx.send(RawMessage { source, payload }).await {
                    conn.rpush::<_, _, ()>(&queue_key, message.payload)
                        .await
                        .map_err(QueueError::Redis)?;
                    tracing::info!(queue = %queue_key, "Returned undelivered message to the queue");
                    metrics::counter!("chunk_messages_requeued_total").increment(1);
                    break;
                }
            }
            tracing::debug!(queue = %queue_key, "Queue consumer stopped");
            Ok::<(), QueueError>(())
        });

        Ok((rx, handle))
    }

    /// Get the current depth of a list.
    pub async fn queue_depth(&self, queue_key: &str) -> Result<u64, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(QueueError::Redis)?;
        let depth: u64 = conn.llen(queue_key).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListEnd {
    /// Where new messages go (LPUSH).
    Head,
    /// Where BRPOP takes from (RPUSH).
    Tail,
}

/// Publisher backed by a shared multiplexed connection.
#[derive(Clone)]
pub struct RedisPublisher {
    conn: MultiplexedConnection,
    queue_key: String,
    end: ListEnd,
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let pushed = match self.end {
            ListEnd::Head => conn.lpush::<_, _, ()>(&self.queue_key, message.payload).await,
            ListEnd::Tail => conn.rpush::<_, _, ()>(&self.queue_key, message.payload).await,
        };
        pushed.map_err(QueueError::Redis)?;
        tracing::trace!(queue = %self.queue_key, key = %message.key, "Published message");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
