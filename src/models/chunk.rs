use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Message-type tags of the edge message family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum MessageType {
    MediaChunk,
    EngineOutput,
    ChunkProcessedStatus,
    EngineHeartbeat,
    StreamInit,
    RawStream,
}

/// MIME types the engine produces output for.
pub const SUPPORTED_MIME_TYPES: [&str; 2] = ["image/png", "image/jpeg"];

/// A media chunk event decoded from the input queue.
///
/// Decoding is lenient: absent fields fall back to empty strings or zero,
/// while fields of the wrong JSON type fail the decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunkRecord {
    #[serde(default)]
    pub task_id: String,

    #[serde(default)]
    pub job_id: String,

    #[serde(default)]
    pub tdo_id: String,

    #[serde(default, alias = "chunkUUID")]
    pub chunk_uuid: String,

    #[serde(default)]
    pub mime_type: String,

    #[serde(default)]
    pub start_offset_ms: i32,

    #[serde(default)]
    pub end_offset_ms: i32,
}

impl MediaChunkRecord {
    pub fn has_supported_mime_type(&self) -> bool {
        SUPPORTED_MIME_TYPES.contains(&self.mime_type.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_message_type_tags() {
        assert_eq!(MessageType::from_str("media_chunk").unwrap(), MessageType::MediaChunk);
        assert_eq!(MessageType::ChunkProcessedStatus.to_string(), "chunk_processed_status");
        assert!(MessageType::from_str("media-chunk").is_err());
    }

    #[test]
    fn test_decode_accepts_uuid_alias() {
        let chunk: MediaChunkRecord = serde_json::from_str(
            r#"{"taskId":"t1","chunkUUID":"c1","mimeType":"image/jpeg","startOffsetMs":5}"#,
        )
        .unwrap();
        assert_eq!(chunk.chunk_uuid, "c1");
        assert_eq!(chunk.start_offset_ms, 5);
        assert_eq!(chunk.end_offset_ms, 0);
        assert!(chunk.has_supported_mime_type());
    }

    #[test]
    fn test_decode_rejects_out_of_range_offset() {
        let result: Result<MediaChunkRecord, _> =
            serde_json::from_str(r#"{"taskId":"t1","startOffsetMs":3000000000}"#);
        assert!(result.is_err());
    }
}
