//! Disciple document schema
//!
//! A registered worker node and the presence report it sends on connect.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::schemas::Metadata;
use crate::db::store::{IndexSpec, MutMetadata, Record};

/// Collection name for disciples
pub const DISCIPLE_COLLECTION: &str = "disciples";

/// Disciple presence status
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiscipleStatus {
    /// A transport session is open for this disciple
    Connected,
    /// No live session, or the server restarted since the last report
    #[default]
    Disconnected,
}

impl DiscipleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for DiscipleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disciple document
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Disciple {
    /// Store-assigned record id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Durable identity reported by the worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disciple_id: Option<String>,

    /// Transport session currently bound to this disciple
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default)]
    pub os: Vec<Value>,

    #[serde(default)]
    pub cpus: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram: Option<i64>,

    /// Model this disciple is associated with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default)]
    pub status: DiscipleStatus,

    #[serde(flatten)]
    pub metadata: Metadata,
}

impl Disciple {
    /// Build a connected record from a presence report
    pub fn from_report(client_id: &str, report: &PresenceReport) -> Self {
        Self {
            id: None,
            disciple_id: Some(report.id.clone()),
            client_id: Some(client_id.to_string()),
            hostname: report.hostname.clone(),
            os: report.os.clone(),
            cpus: report.cpus.clone(),
            ram: report.ram,
            model: None,
            status: DiscipleStatus::Connected,
            metadata: Metadata::default(),
        }
    }
}

impl Record for Disciple {
    const COLLECTION: &'static str = DISCIPLE_COLLECTION;

    const FIELDS: &'static [&'static str] = &[
        "id",
        "discipleId",
        "clientId",
        "hostname",
        "os",
        "cpus",
        "ram",
        "model",
        "status",
        "createdAt",
        "updatedAt",
    ];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn into_indices() -> Vec<IndexSpec> {
        vec![
            IndexSpec::unique("discipleId"),
            IndexSpec::plain("clientId"),
            IndexSpec::plain("status"),
        ]
    }
}

impl MutMetadata for Disciple {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

/// Self-description sent by a disciple on `disciple-connected`
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct PresenceReport {
    /// Durable disciple identity
    pub id: String,

    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default)]
    pub ram: Option<i64>,

    #[serde(default)]
    pub cpus: Vec<Value>,

    #[serde(default)]
    pub os: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_disciple_serialization() {
        let report: PresenceReport = serde_json::from_value(json!({
            "id": "d1",
            "hostname": "h1",
            "ram": 8,
            "cpus": [1, 2],
            "os": ["linux"]
        }))
        .unwrap();

        let disciple = Disciple::from_report("session-1", &report);
        let value = serde_json::to_value(&disciple).unwrap();

        assert_eq!(value["discipleId"], "d1");
        assert_eq!(value["clientId"], "session-1");
        assert_eq!(value["status"], "connected");
        assert_eq!(value["cpus"], json!([1, 2]));
        assert!(value.get("id").is_none());
        assert!(value.get("createdAt").is_none());
    }

    #[test]
    fn test_missing_status_defaults_to_disconnected() {
        let disciple: Disciple = serde_json::from_value(json!({"clientId": "abc"})).unwrap();
        assert_eq!(disciple.status, DiscipleStatus::Disconnected);
        assert!(disciple.disciple_id.is_none());
    }

    #[test]
    fn test_report_requires_id() {
        let result = serde_json::from_value::<PresenceReport>(json!({"hostname": "h1"}));
        assert!(result.is_err());
    }
}
