use serde::{Deserialize, Serialize};

/// Discriminator carried by every engine output record.
pub const ENGINE_OUTPUT_TYPE: &str = "engine_output";

/// Synthetic analysis result published for a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOutputRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub timestamp_utc: i64,
    pub task_id: String,
    pub tdo_id: String,
    pub job_id: String,
    pub mime_type: String,
    pub start_offset_ms: i32,
    pub end_offset_ms: i32,
    pub chunk_uuid: String,
    /// JSON-encoded [`SeriesContent`].
    pub content: String,
}

/// Body of the `content` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesContent {
    pub series: Vec<SeriesObject>,
}

/// One detection spanning a time range of the chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesObject {
    pub start_time_ms: i32,
    pub stop_time_ms: i32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entity_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub library_id: String,

    pub object: DetectedObject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedObject {
    #[serde(rename = "type")]
    pub object_type: String,
    pub confidence: f64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bounding_poly: Vec<BoundingPoly>,
}

/// Normalized polygon vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingPoly {
    pub x: f64,
    pub y: f64,
}
