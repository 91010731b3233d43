use std::sync::Arc;

use chrono::{DateTime, Utc};
use pipesock_core::Result;
use serde::{Deserialize, Serialize};

/// One line of ingested text, stamped with its arrival time.
/// Wire: `{ "Time": "2024-01-01T00:00:00Z", "Message": "..." }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "Time")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Message")]
    pub text: String,
}

impl Event {
    pub fn new(text: impl Into<String>) -> Self {
        Self::at(Utc::now(), text)
    }

    pub fn at(timestamp: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            text: text.into(),
        }
    }
}

/// All events coalesced during one flush period, in arrival order.
/// Wire: `{ "Time": "...", "Messages": [Event, ...] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcast {
    #[serde(rename = "Time")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Messages")]
    pub events: Vec<Event>,
}

impl Broadcast {
    pub fn new(timestamp: DateTime<Utc>, events: Vec<Event>) -> Self {
        Self { timestamp, events }
    }
}

/// Encode the live frame sent after a flush.
pub fn encode_broadcast(broadcast: &Broadcast) -> Result<String> {
    Ok(serde_json::to_string(broadcast)?)
}

/// Encode the replay frame sent once on join, oldest broadcast first.
pub fn encode_history(history: &[Arc<Broadcast>]) -> Result<String> {
    Ok(serde_json::to_string(history)?)
}
