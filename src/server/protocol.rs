//! Wire envelope for named events
//!
//! Every text frame carries one event:
//!
//! ```json
//! {"event": "disciple-connected", "data": {"id": "d1", "hostname": "gpu-1"}}
//! {"event": "response:text", "data": "Dropped 2 Disciples!"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// A named event with an arbitrary payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Decode a text frame
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Encode as a text frame
    pub fn to_message(&self) -> Result<WsMessage, serde_json::Error> {
        Ok(WsMessage::Text(serde_json::to_string(self)?))
    }
}
