//! In-memory document store
//!
//! Keeps records in insertion order behind a `RwLock`. Honors the unique
//! indexes a schema declares, so it behaves like the MongoDB backend for
//! everything the registries rely on. Used with `--memory-store` and in tests.

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::db::store::{DocumentStore, Record};
use crate::query::{matcher, Query};
use crate::types::StoreError;

/// Record collection held in process memory
pub struct MemoryStore<T: Record> {
    records: RwLock<Vec<T>>,
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn to_json(record: &T) -> serde_json::Value {
        serde_json::to_value(record).unwrap_or(serde_json::Value::Null)
    }

    /// Reject `candidate` if another record already holds one of its unique values
    fn check_unique(records: &[T], candidate: &T) -> Result<(), StoreError> {
        let unique: Vec<&str> = T::into_indices()
            .into_iter()
            .filter(|index| index.unique)
            .map(|index| index.field)
            .collect();

        if unique.is_empty() {
            return Ok(());
        }

        let candidate_json = Self::to_json(candidate);
        for field in unique {
            let value = match candidate_json.get(field) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };

            let clash = records.iter().any(|existing| {
                existing.id() != candidate.id()
                    && Self::to_json(existing).get(field) == Some(value)
            });

            if clash {
                return Err(StoreError::Duplicate(format!(
                    "{}.{} = {}",
                    T::COLLECTION,
                    field,
                    value
                )));
            }
        }

        Ok(())
    }
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<T: Record> DocumentStore<T> for MemoryStore<T> {
    async fn find(&self, query: &Query) -> Result<Vec<T>, StoreError> {
        let records = self.records.read().await.clone();
        Ok(matcher::apply(records, query, Self::to_json))
    }

    async fn create(&self, mut record: T) -> Result<T, StoreError> {
        let mut records = self.records.write().await;

        if record.id().is_none() {
            record.set_id(Uuid::new_v4().to_string());
        }
        Self::check_unique(&records, &record)?;
        if records.iter().any(|existing| existing.id() == record.id()) {
            return Err(StoreError::Duplicate(format!("{}.id", T::COLLECTION)));
        }

        record.mut_metadata().mark_created();
        records.push(record.clone());

        debug!(collection = T::COLLECTION, id = ?record.id(), "Inserted record");
        Ok(record)
    }

    async fn save(&self, record: &T) -> Result<(), StoreError> {
        let id = record
            .id()
            .ok_or_else(|| StoreError::NotFound(format!("{} record without id", T::COLLECTION)))?;

        let mut records = self.records.write().await;
        Self::check_unique(&records, record)?;

        let slot = records
            .iter_mut()
            .find(|existing| existing.id() == Some(id))
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", T::COLLECTION, id)))?;

        let mut updated = record.clone();
        updated.mut_metadata().touch();
        *slot = updated;
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|existing| existing.id() != Some(id));
        Ok(records.len() < before)
    }
}
