//! Disciple session events
//!
//! Translates transport events on a disciple connection into registry calls.
//! Session ids are minted per connection and never reused.

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::schemas::{DiscipleStatus, PresenceReport};
use crate::query::relaxed;
use crate::registry::DiscipleRegistry;

/// Event a disciple sends with its presence report
pub const DISCIPLE_CONNECTED: &str = "disciple-connected";

/// Explicit disconnect event; closing the socket has the same effect
pub const DISCONNECT: &str = "disconnect";

/// Fresh transport session id
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Adapter between disciple transport events and the registry
#[derive(Clone)]
pub struct SessionManager {
    registry: DiscipleRegistry,
}

impl SessionManager {
    pub fn new(registry: DiscipleRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &DiscipleRegistry {
        &self.registry
    }

    /// Handle a named event from a disciple
    pub async fn on_event(&self, session_id: &str, event: &str, data: &Value) {
        match event {
            DISCIPLE_CONNECTED => self.connected(session_id, data).await,
            DISCONNECT => self.disconnected(session_id).await,
            other => debug!(session = %session_id, event = other, "Ignoring disciple event"),
        }
    }

    /// Presence report; malformed payloads are logged and dropped
    pub async fn connected(&self, session_id: &str, data: &Value) {
        let report = match decode_report(data) {
            Ok(report) => report,
            Err(e) => {
                warn!(session = %session_id, "Dropping malformed presence report: {}", e);
                return;
            }
        };

        self.registry
            .report_status(session_id, DiscipleStatus::Connected, &report)
            .await;
    }

    pub async fn disconnected(&self, session_id: &str) {
        self.registry.mark_disconnected(session_id).await;
    }
}

fn decode_report(data: &Value) -> Result<PresenceReport, String> {
    let value = relaxed::parse_payload(data).map_err(|e| e.to_string())?;
    serde_json::from_value(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::Disciple;
    use crate::db::{DocumentStore, MemoryStore};
    use crate::query::Query;
    use serde_json::json;
    use std::sync::Arc;

    fn manager() -> (Arc<MemoryStore<Disciple>>, SessionManager) {
        let store = Arc::new(MemoryStore::<Disciple>::new());
        let manager = SessionManager::new(DiscipleRegistry::new(store.clone()));
        (store, manager)
    }

    #[tokio::test]
    async fn test_connect_then_disconnect() {
        let (store, manager) = manager();
        let session = new_session_id();

        manager
            .on_event(&session, DISCIPLE_CONNECTED, &json!({"id": "d1", "hostname": "h", "ram": 4}))
            .await;
        manager.on_event(&session, DISCONNECT, &Value::Null).await;

        let all = store.find(&Query::all()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, DiscipleStatus::Disconnected);
        assert_eq!(all[0].client_id.as_deref(), Some(session.as_str()));
    }

    #[tokio::test]
    async fn test_malformed_report_is_dropped() {
        let (store, manager) = manager();

        manager.on_event("s1", DISCIPLE_CONNECTED, &json!({"hostname": "h"})).await;
        manager.on_event("s1", DISCIPLE_CONNECTED, &json!(42)).await;
        manager.on_event("s1", "telemetry", &json!({"id": "d1"})).await;

        assert!(store.is_empty().await);
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(new_session_id(), new_session_id());
    }
}
