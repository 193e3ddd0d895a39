use crate::models::chunk::MediaChunkRecord;
use crate::models::output::{
    DetectedObject, EngineOutputRecord, SeriesContent, SeriesObject, ENGINE_OUTPUT_TYPE,
};

/// Object type of the synthetic detection.
pub const SYNTHETIC_OBJECT_TYPE: &str = "face";

/// Build the synthetic result for a chunk: a single face detection at full
/// confidence covering the whole chunk.
pub fn synthesize(
    chunk: &MediaChunkRecord,
    timestamp_utc: i64,
) -> Result<EngineOutputRecord, serde_json::Error> {
    let content = SeriesContent {
        series: vec![SeriesObject {
            start_time_ms: chunk.start_offset_ms,
            stop_time_ms: chunk.end_offset_ms,
            entity_id: String::new(),
            library_id: String::new(),
            object: DetectedObject {
                object_type: SYNTHETIC_OBJECT_TYPE.to_string(),
                confidence: 1.0,
                label: String::new(),
                uri: String::new(),
                bounding_poly: Vec::new(),
            },
        }],
    };

    Ok(EngineOutputRecord {
        record_type: ENGINE_OUTPUT_TYPE.to_string(),
        timestamp_utc,
        task_id: chunk.task_id.clone(),
        tdo_id: chunk.tdo_id.clone(),
        job_id: chunk.job_id.clone(),
        mime_type: chunk.mime_type.clone(),
        start_offset_ms: chunk.start_offset_ms,
        end_offset_ms: chunk.end_offset_ms,
        chunk_uuid: chunk.chunk_uuid.clone(),
        content: serde_json::to_string(&content)?,
    })
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk() -> MediaChunkRecord {
        MediaChunkRecord {
            task_id: "t1".to_string(),
            job_id: "j1".to_string(),
            tdo_id: "d1".to_string(),
            chunk_uuid: "c1".to_string(),
            mime_type: "image/jpeg".to_string(),
            start_offset_ms: 1000,
            end_offset_ms: 2000,
        }
    }

    #[test]
    fn test_output_copies_chunk_identity() {
        let output = synthesize(&chunk(), 1_700_000_000_000).unwrap();
        assert_eq!(output.record_type, "engine_output");
        assert_eq!(output.timestamp_utc, 1_700_000_000_000);
        assert_eq!(output.task_id, "t1");
        assert_eq!(output.job_id, "j1");
        assert_eq!(output.tdo_id, "d1");
        assert_eq!(output.chunk_uuid, "c1");
        assert_eq!(output.mime_type, "image/jpeg");
        assert_eq!(output.start_offset_ms, 1000);
        assert_eq!(output.end_offset_ms, 2000);
    }

    #[test]
    fn test_content_is_single_face_series() {
        let output = synthesize(&chunk(), 0).unwrap();
        assert_eq!(
            output.content,
            r#"{"series":[{"startTimeMs":1000,"stopTimeMs":2000,"object":{"type":"face","confidence":1.0}}]}"#
        );

        let content: SeriesContent = serde_json::from_str(&output.content).unwrap();
        assert_eq!(content.series.len(), 1);
        assert_eq!(content.series[0].object.confidence, 1.0);
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        assert_eq!(synthesize(&chunk(), 7).unwrap(), synthesize(&chunk(), 7).unwrap());
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(synthesize(&chunk(), 5).unwrap()).unwrap();
        for field in [
            "type", "timestampUtc", "taskId", "tdoId", "jobId", "mimeType",
            "startOffsetMs", "endOffsetMs", "chunkUuid", "content",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }
}
