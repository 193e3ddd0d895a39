use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Discriminator carried by every chunk status record.
pub const CHUNK_STATUS_TYPE: &str = "chunk_processed_status";

/// Outcome of processing a single inbound message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkStatus {
    Success,
    Error,
    Ignored,
}

/// Status record published for every inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkStatusRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub timestamp_utc: i64,
    pub task_id: String,
    pub chunk_uuid: String,
    pub status: ChunkStatus,
    pub error_msg: String,
    pub info_msg: String,
}

impl ChunkStatusRecord {
    pub fn new(
        task_id: &str,
        chunk_uuid: &str,
        status: ChunkStatus,
        error_msg: &str,
        info_msg: &str,
        timestamp_utc: i64,
    ) -> Self {
        Self {
            record_type: CHUNK_STATUS_TYPE.to_string(),
            timestamp_utc,
            task_id: task_id.to_string(),
            chunk_uuid: chunk_uuid.to_string(),
            status,
            error_msg: error_msg.to_string(),
            info_msg: info_msg.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_wire_format() {
        let record = ChunkStatusRecord::new("t1", "c1", ChunkStatus::Ignored, "", "not an image", 42);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "chunk_processed_status");
        assert_eq!(json["status"], "IGNORED");
        assert_eq!(json["chunkUuid"], "c1");
        assert_eq!(json["infoMsg"], "not an image");
    }

    #[test]
    fn test_unrecognized_status_does_not_parse() {
        assert_eq!(ChunkStatus::from_str("ERROR").unwrap(), ChunkStatus::Error);
        assert!(ChunkStatus::from_str("PENDING").is_err());
    }
}
