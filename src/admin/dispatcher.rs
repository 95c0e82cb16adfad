//! Admin command dispatcher
//!
//! Parses the payload, builds a typed query or model input, and hands off to
//! the owning registry. Any failure before the registry call is answered with
//! an error on `response:json` so the admin always gets one reply.

use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::admin::{AdminChannel, AdminResponse};
use crate::db::schemas::{Disciple, DiscipleModel, ModelInput};
use crate::db::Record;
use crate::query::{relaxed, Query};
use crate::registry::{DiscipleRegistry, ModelRegistry};
use crate::types::{RegistryError, Result};

/// Named admin commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    FlushDisciples,
    ListDisciples,
    ListModels,
    UpsertModel,
    DropModels,
}

impl AdminCommand {
    pub const ALL: [AdminCommand; 5] = [
        Self::FlushDisciples,
        Self::ListDisciples,
        Self::ListModels,
        Self::UpsertModel,
        Self::DropModels,
    ];

    /// Wire event name
    pub fn event(&self) -> &'static str {
        match self {
            Self::FlushDisciples => "disciples:flush",
            Self::ListDisciples => "disciples",
            Self::ListModels => "models",
            Self::UpsertModel => "model",
            Self::DropModels => "model:drop",
        }
    }
}

impl FromStr for AdminCommand {
    type Err = RegistryError;

    fn from_str(event: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.event() == event)
            .ok_or_else(|| RegistryError::UnknownCommand(event.to_string()))
    }
}

/// Routes admin commands to the registries
#[derive(Clone)]
pub struct AdminDispatcher {
    disciples: DiscipleRegistry,
    models: ModelRegistry,
}

impl AdminDispatcher {
    pub fn new(disciples: DiscipleRegistry, models: ModelRegistry) -> Self {
        Self { disciples, models }
    }

    /// Handle one inbound admin event
    pub async fn dispatch(&self, admin: &dyn AdminChannel, event: &str, data: &Value) {
        debug!(admin = %admin.session_id(), event, "Admin command");

        if let Err(e) = self.try_dispatch(admin, event, data).await {
            warn!(admin = %admin.session_id(), event, "Rejected admin command: {}", e);
            admin.emit(AdminResponse::error(&e)).await;
        }
    }

    async fn try_dispatch(&self, admin: &dyn AdminChannel, event: &str, data: &Value) -> Result<()> {
        let command: AdminCommand = event.parse()?;
        let payload = relaxed::parse_payload(data)?;

        match command {
            AdminCommand::FlushDisciples => {
                let query = query_for::<Disciple>(&payload)?;
                self.disciples.flush(admin, query).await;
            }
            AdminCommand::ListDisciples => {
                let query = query_for::<Disciple>(&payload)?;
                self.disciples.list(admin, query).await;
            }
            AdminCommand::ListModels => {
                let query = query_for::<DiscipleModel>(&payload)?;
                self.models.list(admin, query).await;
            }
            AdminCommand::UpsertModel => {
                let input = model_input(payload)?;
                self.models.update(admin, input).await;
            }
            AdminCommand::DropModels => {
                let query = query_for::<DiscipleModel>(&payload)?;
                self.models.drop(admin, query).await;
            }
        }
        Ok(())
    }
}

fn query_for<T: Record>(payload: &Value) -> Result<Query> {
    Ok(Query::from_value(payload, T::COLLECTION, T::FIELDS)?)
}

fn model_input(payload: Value) -> Result<ModelInput> {
    if !payload.is_object() {
        return Err(RegistryError::BadRequest("model payload must be an object".into()));
    }
    serde_json::from_value(payload).map_err(|e| RegistryError::BadRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::RecordingChannel;
    use crate::db::{DocumentStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    fn dispatcher() -> AdminDispatcher {
        AdminDispatcher::new(
            DiscipleRegistry::new(Arc::new(MemoryStore::<Disciple>::new())),
            ModelRegistry::new(Arc::new(MemoryStore::<DiscipleModel>::new())),
        )
    }

    #[test]
    fn test_command_names_round_trip() {
        for command in AdminCommand::ALL {
            assert_eq!(command.event().parse::<AdminCommand>().unwrap(), command);
        }
        assert!("models:all".parse::<AdminCommand>().is_err());
    }

    #[tokio::test]
    async fn test_unknown_command_gets_error() {
        let dispatcher = dispatcher();
        let admin = RecordingChannel::new("admin");

        dispatcher.dispatch(&admin, "reboot", &Value::Null).await;

        let responses = admin.take().await;
        assert_eq!(responses.len(), 1);
        assert_eq!(
            responses[0].payload(),
            json!({"error": "Unknown command: reboot"})
        );
    }

    #[tokio::test]
    async fn test_syntax_error_gets_error() {
        let dispatcher = dispatcher();
        let admin = RecordingChannel::new("admin");

        dispatcher.dispatch(&admin, "models", &json!("{name: ")).await;

        let responses = admin.take().await;
        assert_eq!(responses.len(), 1);
        assert!(responses[0].is_error());
    }

    #[tokio::test]
    async fn test_model_command_creates_from_relaxed_text() {
        let dispatcher = dispatcher();
        let admin = RecordingChannel::new("admin");

        dispatcher
            .dispatch(&admin, "model", &json!("name: iris, type: classifier, dataset: 7"))
            .await;
        dispatcher.dispatch(&admin, "models", &json!("type: classifier")).await;

        let responses = admin.take().await;
        assert_eq!(responses[0], AdminResponse::success());
        let listed = responses[1].payload();
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["name"], "iris");
        assert_eq!(listed[0]["dataset"], "7");
    }

    #[tokio::test]
    async fn test_model_update_by_unquoted_store_id() {
        let models = Arc::new(MemoryStore::<DiscipleModel>::new());
        let dispatcher = AdminDispatcher::new(
            DiscipleRegistry::new(Arc::new(MemoryStore::<Disciple>::new())),
            ModelRegistry::new(models.clone()),
        );
        let admin = RecordingChannel::new("admin");

        let id = "68b1f72a-20a3-4f3e-9d2b-0c5e1a7b9f10";
        models
            .create(DiscipleModel {
                id: Some(id.to_string()),
                name: Some("iris".into()),
                ..DiscipleModel::default()
            })
            .await
            .unwrap();

        dispatcher
            .dispatch(&admin, "model", &json!(format!("id: {}, description: upd", id)))
            .await;

        assert_eq!(admin.take().await, vec![AdminResponse::success()]);
        let stored = models.find(&Query::all()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id.as_deref(), Some(id));
        assert_eq!(stored[0].description.as_deref(), Some("upd"));
    }

    #[tokio::test]
    async fn test_model_command_rejects_unknown_field() {
        let dispatcher = dispatcher();
        let admin = RecordingChannel::new("admin");

        dispatcher.dispatch(&admin, "model", &json!({"name": "x", "owner": "me"})).await;
        dispatcher.dispatch(&admin, "model", &json!("[1, 2]")).await;

        let responses = admin.take().await;
        assert_eq!(responses.len(), 2);
        assert!(responses.iter().all(AdminResponse::is_error));
    }
}
