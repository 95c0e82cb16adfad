//! Admin channel handle
//!
//! Registries reply to an admin command by emitting exactly one
//! [`AdminResponse`] on the channel the command arrived on.

use serde_json::Value;

use crate::types::RegistryError;

/// Event name for JSON replies
pub const RESPONSE_JSON: &str = "response:json";

/// Event name for plain-text replies
pub const RESPONSE_TEXT: &str = "response:text";

/// A reply to an admin command
#[derive(Debug, Clone, PartialEq)]
pub enum AdminResponse {
    /// Record arrays, `{"status":"success"}` or `{"error": ...}`
    Json(Value),
    /// Human-readable summaries such as `Dropped 3 Disciples!`
    Text(String),
}

impl AdminResponse {
    pub fn success() -> Self {
        Self::Json(serde_json::json!({ "status": "success" }))
    }

    pub fn error(err: &RegistryError) -> Self {
        Self::Json(err.to_payload())
    }

    /// Serialize a record list, falling back to an error payload
    pub fn records<T: serde::Serialize>(records: &[T]) -> Self {
        match serde_json::to_value(records) {
            Ok(value) => Self::Json(value),
            Err(e) => Self::error(&RegistryError::Internal(e.to_string())),
        }
    }

    /// Wire event name
    pub fn event(&self) -> &'static str {
        match self {
            Self::Json(_) => RESPONSE_JSON,
            Self::Text(_) => RESPONSE_TEXT,
        }
    }

    /// Wire payload
    pub fn payload(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Text(text) => Value::String(text.clone()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Json(Value::Object(map)) if map.contains_key("error"))
    }
}

/// Outbound side of an admin connection
#[async_trait::async_trait]
pub trait AdminChannel: Send + Sync {
    /// Transport session id, used for log context
    fn session_id(&self) -> &str;

    /// Send a reply; delivery failures are the transport's concern
    async fn emit(&self, response: AdminResponse);
}

/// Channel that records every reply, for tests and embedding
#[derive(Debug, Default)]
pub struct RecordingChannel {
    session_id: String,
    responses: tokio::sync::Mutex<Vec<AdminResponse>>,
}

impl RecordingChannel {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            responses: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Replies received so far, in emission order
    pub async fn responses(&self) -> Vec<AdminResponse> {
        self.responses.lock().await.clone()
    }

    /// Remove and return the replies received so far
    pub async fn take(&self) -> Vec<AdminResponse> {
        std::mem::take(&mut *self.responses.lock().await)
    }
}

#[async_trait::async_trait]
impl AdminChannel for RecordingChannel {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn emit(&self, response: AdminResponse) {
        self.responses.lock().await.push(response);
    }
}
