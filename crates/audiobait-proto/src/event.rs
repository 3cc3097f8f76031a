//! The play-event record handed to the external event sink, and the trait
//! that abstracts over it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayEventDetails {
    #[serde(rename = "fileId")]
    pub file_id: i64,
    pub volume: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Arbitrary additional fields an RPC caller supplied alongside the
    /// required ones; merged in on top of `fileId`/`volume`/`priority`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub details: PlayEventDetails,
}

impl PlayEvent {
    pub fn new(timestamp: DateTime<Utc>, file_id: i64, volume: i32) -> Self {
        Self {
            timestamp,
            event_type: "audioBait".to_string(),
            details: PlayEventDetails {
                file_id,
                volume,
                priority: None,
                extra: Map::new(),
            },
        }
    }

    /// Builds an event from an RPC caller's partial JSON, per §4.7: default
    /// `type`, then force `timestamp`/`fileId`/`volume`/`priority` to the
    /// values the scheduler actually observed, keeping any other caller
    /// supplied fields.
    pub fn from_partial_json(
        partial: &str,
        timestamp: DateTime<Utc>,
        file_id: i64,
        volume: i32,
        priority: Option<i32>,
    ) -> Result<Self, serde_json::Error> {
        let mut value: Value = if partial.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(partial)?
        };

        let obj = value.as_object_mut().ok_or_else(|| {
            serde::de::Error::custom("event_json must decode to a JSON object")
        })?;

        let event_type = obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("audioBait")
            .to_string();

        let mut details = match obj.remove("details").and_then(|v| v.as_object().cloned()) {
            Some(m) => m,
            None => Map::new(),
        };
        details.insert("fileId".to_string(), Value::from(file_id));
        details.insert("volume".to_string(), Value::from(volume));
        if let Some(p) = priority {
            details.insert("priority".to_string(), Value::from(p));
        }

        Ok(Self {
            timestamp,
            event_type,
            details: serde_json::from_value(Value::Object(details))?,
        })
    }
}
