//! Model metadata registry
//!
//! Unlike the presence path, every store failure here is reported back to
//! the admin that issued the command.

use std::sync::Arc;
use tracing::{error, info};

use crate::admin::{AdminChannel, AdminResponse};
use crate::db::schemas::{DiscipleModel, ModelInput};
use crate::db::DocumentStore;
use crate::query::Query;
use crate::registry::destroy_matching;
use crate::types::{RegistryError, Result};

/// Registry of model metadata
#[derive(Clone)]
pub struct ModelRegistry {
    store: Arc<dyn DocumentStore<DiscipleModel>>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn DocumentStore<DiscipleModel>>) -> Self {
        Self { store }
    }

    /// Reply with every model matching the query
    pub async fn list(&self, admin: &dyn AdminChannel, query: Query) {
        let response = match self.store.find(&query).await {
            Ok(models) => AdminResponse::records(&models),
            Err(e) => {
                error!(admin = %admin.session_id(), "Failed to list models: {}", e);
                AdminResponse::error(&RegistryError::from(e))
            }
        };
        admin.emit(response).await;
    }

    /// Insert a new model built from the input
    pub async fn create(&self, admin: &dyn AdminChannel, input: &ModelInput) {
        let result = self.insert(input).await;
        admin.emit(Self::outcome(admin, result)).await;
    }

    /// Upsert by id: merge the supplied fields into an existing model, or create one
    pub async fn update(&self, admin: &dyn AdminChannel, input: ModelInput) {
        let result = self.upsert(&input).await;
        admin.emit(Self::outcome(admin, result)).await;
    }

    /// Destroy every model matching a non-empty query
    pub async fn drop(&self, admin: &dyn AdminChannel, query: Query) {
        if query.is_empty() {
            admin
                .emit(AdminResponse::error(&RegistryError::BadRequest(
                    "model:drop requires a query".into(),
                )))
                .await;
            return;
        }

        let models = match self.store.find(&query).await {
            Ok(models) => models,
            Err(e) => {
                error!(admin = %admin.session_id(), "Failed to find models to drop: {}", e);
                admin.emit(AdminResponse::error(&RegistryError::from(e))).await;
                return;
            }
        };

        let dropped = destroy_matching(self.store.as_ref(), models).await;
        info!(admin = %admin.session_id(), "Dropped {} models", dropped);
        admin
            .emit(AdminResponse::Text(format!("Dropped {} Models!", dropped)))
            .await;
    }

    async fn upsert(&self, input: &ModelInput) -> Result<()> {
        let existing = match input.id_ref() {
            Some(id) => self
                .store
                .find(&Query::new().eq("id", id))
                .await?
                .into_iter()
                .next(),
            None => None,
        };

        let Some(mut model) = existing else {
            return self.insert(input).await;
        };

        model.merge(input);
        self.store.save(&model).await?;
        info!(model = ?model.id, "Updated model");
        Ok(())
    }

    async fn insert(&self, input: &ModelInput) -> Result<()> {
        let model = self.store.create(DiscipleModel::from_input(input)).await?;
        info!(model = ?model.id, name = ?model.name, "Created model");
        Ok(())
    }

    fn outcome(admin: &dyn AdminChannel, result: Result<()>) -> AdminResponse {
        match result {
            Ok(()) => AdminResponse::success(),
            Err(e) => {
                error!(admin = %admin.session_id(), "Model write failed: {}", e);
                AdminResponse::error(&e)
            }
        }
    }
}
