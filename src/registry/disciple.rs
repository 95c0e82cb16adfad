//! Disciple presence registry
//!
//! Reconciles presence reports and transport disconnects against stored
//! records. Store failures on this path are logged, never surfaced: a
//! disciple receives no acknowledgements.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::admin::{AdminChannel, AdminResponse};
use crate::db::schemas::{Disciple, DiscipleStatus, PresenceReport};
use crate::db::DocumentStore;
use crate::query::Query;
use crate::registry::{destroy_matching, or_default};
use crate::types::{RegistryError, StoreError};

/// Registry of connected and previously seen disciples
#[derive(Clone)]
pub struct DiscipleRegistry {
    store: Arc<dyn DocumentStore<Disciple>>,
}

impl DiscipleRegistry {
    pub fn new(store: Arc<dyn DocumentStore<Disciple>>) -> Self {
        Self { store }
    }

    /// Mark every stored disciple disconnected.
    ///
    /// Run once at boot, before any listener accepts connections: no session
    /// survives a restart. Returns the number of records swept.
    pub async fn startup_reset(&self) -> usize {
        let disciples = self.find_logged(&Query::all()).await;

        let mut swept = 0;
        for mut disciple in disciples {
            disciple.status = DiscipleStatus::Disconnected;
            match self.store.save(&disciple).await {
                Ok(()) => swept += 1,
                Err(e) => error!(
                    disciple = ?disciple.disciple_id,
                    "Failed to reset disciple status: {}", e
                ),
            }
        }

        info!("Reset {} disciples to disconnected", swept);
        swept
    }

    /// Record a presence report for the disciple behind `session_id`.
    ///
    /// Creates the record on first sight of `report.id`; otherwise rebinds the
    /// session and overwrites the status.
    pub async fn report_status(&self, session_id: &str, status: DiscipleStatus, report: &PresenceReport) {
        if self.update_existing(session_id, status, report).await {
            return;
        }

        match self.insert(session_id, report).await {
            Ok(()) => {}
            Err(e) if e.is_duplicate() => {
                // A concurrent report created the record first
                debug!(disciple = %report.id, "Lost create race, updating instead");
                if !self.update_existing(session_id, status, report).await {
                    warn!(disciple = %report.id, "Record vanished after duplicate key");
                }
            }
            Err(e) => error!(disciple = %report.id, "Failed to create disciple: {}", e),
        }
    }

    /// Insert a fresh connected record for a presence report
    pub async fn create(&self, session_id: &str, report: &PresenceReport) {
        if let Err(e) = self.insert(session_id, report).await {
            error!(disciple = %report.id, "Failed to create disciple: {}", e);
        }
    }

    /// Mark the disciple bound to `session_id` disconnected; unknown sessions are ignored
    pub async fn mark_disconnected(&self, session_id: &str) {
        let query = Query::new().eq("clientId", session_id);
        let Some(mut disciple) = self.find_logged(&query).await.into_iter().next() else {
            debug!(session = %session_id, "Disconnect for unknown session");
            return;
        };

        disciple.status = DiscipleStatus::Disconnected;
        match self.store.save(&disciple).await {
            Ok(()) => info!(
                disciple = ?disciple.disciple_id,
                session = %session_id,
                "Disciple disconnected"
            ),
            Err(e) => error!(session = %session_id, "Failed to mark disciple disconnected: {}", e),
        }
    }

    /// Reply with matching disciples; an empty query lists everyone not disconnected
    pub async fn list(&self, admin: &dyn AdminChannel, query: Query) {
        let query = or_default(query, || {
            Query::new().ne("status", DiscipleStatus::Disconnected.as_str())
        });

        match self.store.find(&query).await {
            Ok(disciples) => admin.emit(AdminResponse::records(&disciples)).await,
            Err(e) => {
                error!(admin = %admin.session_id(), "Failed to list disciples: {}", e);
                admin.emit(AdminResponse::error(&RegistryError::from(e))).await;
            }
        }
    }

    /// Destroy matching disciples; an empty query targets the disconnected ones
    pub async fn flush(&self, admin: &dyn AdminChannel, query: Query) {
        let query = or_default(query, || {
            Query::new().eq("status", DiscipleStatus::Disconnected.as_str())
        });

        let disciples = match self.store.find(&query).await {
            Ok(disciples) => disciples,
            Err(e) => {
                error!(admin = %admin.session_id(), "Failed to find disciples to flush: {}", e);
                admin.emit(AdminResponse::error(&RegistryError::from(e))).await;
                return;
            }
        };

        let dropped = destroy_matching(self.store.as_ref(), disciples).await;
        info!(admin = %admin.session_id(), "Flushed {} disciples", dropped);
        admin
            .emit(AdminResponse::Text(format!("Dropped {} Disciples!", dropped)))
            .await;
    }

    /// Update the first record for `report.id`; false when there is none
    async fn update_existing(&self, session_id: &str, status: DiscipleStatus, report: &PresenceReport) -> bool {
        let query = Query::new().eq("discipleId", report.id.as_str());
        let Some(mut disciple) = self.find_logged(&query).await.into_iter().next() else {
            return false;
        };

        disciple.status = status;
        disciple.client_id = Some(session_id.to_string());

        match self.store.save(&disciple).await {
            Ok(()) => info!(disciple = %report.id, session = %session_id, "Disciple {}", status),
            Err(e) => error!(disciple = %report.id, "Failed to update disciple: {}", e),
        }
        true
    }

    async fn insert(&self, session_id: &str, report: &PresenceReport) -> Result<(), StoreError> {
        self.store.create(Disciple::from_report(session_id, report)).await?;
        info!(disciple = %report.id, session = %session_id, "Registered new disciple");
        Ok(())
    }

    /// Find on the presence path: failures are logged and read as no records
    async fn find_logged(&self, query: &Query) -> Vec<Disciple> {
        match self.store.find(query).await {
            Ok(disciples) => disciples,
            Err(e) => {
                error!("Failed to query disciples: {}", e);
                Vec::new()
            }
        }
    }
}
