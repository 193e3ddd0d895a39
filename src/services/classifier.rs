//! Validation and classification of inbound queue messages.
//!
//! Checks run in a fixed order and the first failing check decides the
//! outcome. Only an unsupported MIME type is a soft rejection; everything else
//! is reported as an error.

use serde_json::Value;
use std::str::FromStr;

use crate::models::chunk::{MediaChunkRecord, MessageType};
use crate::models::status::ChunkStatus;
use crate::services::queue::RawMessage;

/// Why a message did not yield a processable chunk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassificationFailure {
    #[error("Received message without taskId: {payload}")]
    MissingTaskId { payload: String },

    #[error("Received unknown message: {payload}")]
    UnknownMessageType { task_id: String, payload: String },

    #[error("Not a media_chunk: {payload}")]
    WrongMessageType { task_id: String, payload: String },

    #[error("Unable to decode media chunk: {reason}")]
    DecodeError { task_id: String, reason: String },

    #[error("Received message without chunkUuid: {payload}")]
    MissingChunkUuid { task_id: String, payload: String },

    #[error("Not an image/png or image/jpeg: {mime_type}")]
    UnsupportedMimeType {
        task_id: String,
        chunk_uuid: String,
        mime_type: String,
    },
}

impl ClassificationFailure {
    /// Task id to report the failure under (empty when none was found).
    pub fn task_id(&self) -> &str {
        match self {
            Self::MissingTaskId { .. } => "",
            Self::UnknownMessageType { task_id, .. }
            | Self::WrongMessageType { task_id, .. }
            | Self::DecodeError { task_id, .. }
            | Self::MissingChunkUuid { task_id, .. }
            | Self::UnsupportedMimeType { task_id, .. } => task_id,
        }
    }

    /// Chunk id to report the failure under. Only known once the chunk decoded.
    pub fn chunk_uuid(&self) -> &str {
        match self {
            Self::UnsupportedMimeType { chunk_uuid, .. } => chunk_uuid,
            _ => "",
        }
    }

    pub fn is_soft(&self) -> bool {
        matches!(self, Self::UnsupportedMimeType { .. })
    }

    pub fn status(&self) -> ChunkStatus {
        if self.is_soft() {
            ChunkStatus::Ignored
        } else {
            ChunkStatus::Error
        }
    }
}

/// Classify a raw message into a chunk ready for synthesis.
pub fn classify(message: &RawMessage) -> Result<MediaChunkRecord, ClassificationFailure> {
    let payload = || message.payload_lossy();

    let value: Value = match serde_json::from_slice(&message.payload) {
        Ok(value @ Value::Object(_)) => value,
        _ => return Err(ClassificationFailure::MissingTaskId { payload: payload() }),
    };

    let task_id = match value.get("taskId").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Err(ClassificationFailure::MissingTaskId { payload: payload() }),
    };

    let msg_type = value
        .get("type")
        .and_then(Value::as_str)
        .and_then(|tag| MessageType::from_str(tag).ok())
        .ok_or_else(|| ClassificationFailure::UnknownMessageType {
            task_id: task_id.clone(),
            payload: payload(),
        })?;

    if msg_type != MessageType::MediaChunk {
        return Err(ClassificationFailure::WrongMessageType {
            task_id,
            payload: payload(),
        });
    }

    let chunk: MediaChunkRecord =
        serde_json::from_value(value).map_err(|e| ClassificationFailure::DecodeError {
            task_id: task_id.clone(),
            reason: e.to_string(),
        })?;

    if chunk.chunk_uuid.is_empty() {
        return Err(ClassificationFailure::MissingChunkUuid {
            task_id,
            payload: payload(),
        });
    }

    if !chunk.has_supported_mime_type() {
        return Err(ClassificationFailure::UnsupportedMimeType {
            task_id,
            chunk_uuid: chunk.chunk_uuid,
            mime_type: chunk.mime_type,
        });
    }

    Ok(chunk)
}
