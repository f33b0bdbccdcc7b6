use crate::{AgentId, AgentStatus, LocationData, SearchCriteria};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 256 * 1024;

/// One update pushed by the backend on the search stream.
///
/// Wire shape is `{"type": "<tag>", "data": {...}}`, one JSON document per
/// WebSocket text frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamMessage {
    AgentUpdate(AgentUpdate),
    CriteriaUpdate(SearchCriteria),
    MapboxUpdate(LocationData),
    ApifyUpdate(ApifyUpdate),
    ResultsUpdate(ResultsUpdate),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentUpdate {
    pub id: AgentId,
    pub status: AgentStatus,
    #[serde(default)]
    pub current_task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::deserialize_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApifyUpdate {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::deserialize_count_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub duplicates_found: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResultsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_to_supabase: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    AgentUpdate,
    CriteriaUpdate,
    MapboxUpdate,
    ApifyUpdate,
    ResultsUpdate,
}

impl MessageKind {
    pub const ALL: [MessageKind; 5] = [
        MessageKind::AgentUpdate,
        MessageKind::CriteriaUpdate,
        MessageKind::MapboxUpdate,
        MessageKind::ApifyUpdate,
        MessageKind::ResultsUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::AgentUpdate => "agent_update",
            MessageKind::CriteriaUpdate => "criteria_update",
            MessageKind::MapboxUpdate => "mapbox_update",
            MessageKind::ApifyUpdate => "apify_update",
            MessageKind::ResultsUpdate => "results_update",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StreamMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            StreamMessage::AgentUpdate(_) => MessageKind::AgentUpdate,
            StreamMessage::CriteriaUpdate(_) => MessageKind::CriteriaUpdate,
            StreamMessage::MapboxUpdate(_) => MessageKind::MapboxUpdate,
            StreamMessage::ApifyUpdate(_) => MessageKind::ApifyUpdate,
            StreamMessage::ResultsUpdate(_) => MessageKind::ResultsUpdate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("frame exceeds max size: {size} > {max}")]
    OversizedFrame { size: usize, max: usize },
    #[error("frame is not valid json: {0}")]
    InvalidJson(String),
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("unknown message type '{0}'")]
    UnknownType(String),
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: MessageKind, reason: String },
    #[error("frame encode failed: {0}")]
    Encode(String),
}

/// Decodes one text frame. Unknown tags are rejected rather than passed through.
pub fn decode_message(text: &str) -> Result<StreamMessage, StreamError> {
    decode_message_with_limit(text, DEFAULT_MAX_FRAME_BYTES)
}

pub fn decode_message_with_limit(
    text: &str,
    max_frame_bytes: usize,
) -> Result<StreamMessage, StreamError> {
    let raw = text.trim_end_matches(['\n', '\r']);
    if raw.len() > max_frame_bytes {
        return Err(StreamError::OversizedFrame {
            size: raw.len(),
            max: max_frame_bytes,
        });
    }
    let value: Value =
        serde_json::from_str(raw).map_err(|err| StreamError::InvalidJson(err.to_string()))?;
    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(StreamError::MissingType)?;
    let kind =
        MessageKind::from_tag(tag).ok_or_else(|| StreamError::UnknownType(tag.to_string()))?;
    serde_json::from_value(value).map_err(|err| StreamError::InvalidPayload {
        kind,
        reason: err.to_string(),
    })
}

pub fn encode_message(message: &StreamMessage) -> Result<String, StreamError> {
    serde_json::to_string(message).map_err(|err| StreamError::Encode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_agent_update() {
        let text = json!({
            "type": "agent_update",
            "data": {
                "id": "parser",
                "status": "completed",
                "currentTask": "Parsed request",
                "output": "3 bed, 2 bath",
                "endTime": 1_767_225_600_000i64
            }
        })
        .to_string();

        let message = decode_message(&text).expect("decode");
        assert_eq!(message.kind(), MessageKind::AgentUpdate);
        let StreamMessage::AgentUpdate(update) = message else {
            panic!("expected agent update");
        };
        assert_eq!(update.id, AgentId::Parser);
        assert_eq!(update.status, AgentStatus::Completed);
        assert_eq!(update.output.as_deref(), Some("3 bed, 2 bath"));
        assert_eq!(update.end_time, Some(1_767_225_600_000));
    }

    #[test]
    fn fractional_end_time_still_completes_the_agent() {
        let text = r#"{"type":"agent_update","data":{"id":"parser","status":"completed","currentTask":"done","endTime":1767225600123.5}}"#;
        let StreamMessage::AgentUpdate(update) = decode_message(text).expect("decode") else {
            panic!("expected agent update");
        };
        assert_eq!(update.status, AgentStatus::Completed);
        assert_eq!(update.end_time, Some(1_767_225_600_124));

        let text = r#"{"type":"agent_update","data":{"id":"mapbox","status":"working","endTime":null}}"#;
        let StreamMessage::AgentUpdate(update) = decode_message(text).expect("decode") else {
            panic!("expected agent update");
        };
        assert_eq!(update.end_time, None);

        let bad = r#"{"type":"agent_update","data":{"id":"mapbox","status":"working","endTime":"soon"}}"#;
        assert!(decode_message(bad).is_err());
    }

    #[test]
    fn apify_update_keeps_absent_duplicates_distinct_from_zero() {
        let without = decode_message(r#"{"type":"apify_update","data":{"jobId":"run-1"}}"#)
            .expect("decode");
        assert_eq!(
            without,
            StreamMessage::ApifyUpdate(ApifyUpdate {
                job_id: Some("run-1".to_string()),
                duplicates_found: None,
            })
        );

        let with = decode_message(
            r#"{"type":"apify_update","data":{"jobId":"run-1","duplicatesFound":0}}"#,
        )
        .expect("decode");
        let StreamMessage::ApifyUpdate(update) = with else {
            panic!("expected apify update");
        };
        assert_eq!(update.duplicates_found, Some(0));

        let float = decode_message(
            r#"{"type":"apify_update","data":{"jobId":"run-1","duplicatesFound":3.0}}"#,
        )
        .expect("decode");
        let StreamMessage::ApifyUpdate(update) = float else {
            panic!("expected apify update");
        };
        assert_eq!(update.duplicates_found, Some(3));
    }

    #[test]
    fn results_update_ignores_extra_fields() {
        let message = decode_message(
            r#"{"type":"results_update","data":{"savedToSupabase":true,"totalFound":9}}"#,
        )
        .expect("decode");
        assert_eq!(
            message,
            StreamMessage::ResultsUpdate(ResultsUpdate {
                saved_to_supabase: Some(true)
            })
        );
    }

    #[test]
    fn rejects_invalid_json() {
        let err = decode_message("{not json").unwrap_err();
        assert!(matches!(err, StreamError::InvalidJson(_)));
    }

    #[test]
    fn rejects_unknown_and_missing_tags() {
        let err = decode_message(r#"{"type":"weather_update","data":{}}"#).unwrap_err();
        assert_eq!(err, StreamError::UnknownType("weather_update".to_string()));

        let err = decode_message(r#"{"data":{}}"#).unwrap_err();
        assert_eq!(err, StreamError::MissingType);
    }

    #[test]
    fn rejects_payload_that_does_not_fit_its_tag() {
        let err = decode_message(r#"{"type":"agent_update","data":{"id":"geocoder","status":"working"}}"#)
            .unwrap_err();
        match err {
            StreamError::InvalidPayload { kind, .. } => assert_eq!(kind, MessageKind::AgentUpdate),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_oversized_frames() {
        let text = format!(r#"{{"type":"results_update","data":{{"pad":"{}"}}}}"#, "x".repeat(64));
        let err = decode_message_with_limit(&text, 32).unwrap_err();
        assert!(matches!(err, StreamError::OversizedFrame { max: 32, .. }));
    }

    #[test]
    fn encoded_message_uses_type_and_data_keys() {
        let message = StreamMessage::ResultsUpdate(ResultsUpdate {
            saved_to_supabase: Some(true),
        });
        let value: Value = serde_json::from_str(&encode_message(&message).unwrap()).unwrap();
        assert_eq!(value["type"], "results_update");
        assert_eq!(value["data"]["savedToSupabase"], true);
    }
}
