//! Document store abstraction
//!
//! A collection of typed records supporting `find`, `create`, `save` and
//! `destroy`. Record ids are strings assigned by the store on create.

use serde::{de::DeserializeOwned, Serialize};

use crate::db::schemas::Metadata;
use crate::query::Query;
use crate::types::StoreError;

/// Index declared by a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub field: &'static str,
    /// Unique among documents that carry the field (sparse)
    pub unique: bool,
}

impl IndexSpec {
    pub const fn unique(field: &'static str) -> Self {
        Self { field, unique: true }
    }

    pub const fn plain(field: &'static str) -> Self {
        Self {
            field,
            unique: false,
        }
    }
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// A storable record type
pub trait Record:
    Serialize + DeserializeOwned + Clone + Send + Sync + Unpin + MutMetadata + 'static
{
    /// Collection name
    const COLLECTION: &'static str;

    /// Fields admin queries may filter and sort on
    const FIELDS: &'static [&'static str];

    /// Store-assigned id, `None` before the first insert
    fn id(&self) -> Option<&str>;

    fn set_id(&mut self, id: String);

    /// Index definitions applied by the store
    fn into_indices() -> Vec<IndexSpec> {
        Vec::new()
    }
}

/// Abstract document collection
#[async_trait::async_trait]
pub trait DocumentStore<T: Record>: Send + Sync {
    /// All records matching the query, in store order unless the query sorts
    async fn find(&self, query: &Query) -> Result<Vec<T>, StoreError>;

    /// Insert a record, assigning an id; fails with `Duplicate` on a unique index violation
    async fn create(&self, record: T) -> Result<T, StoreError>;

    /// Persist changes to an existing record; fails with `NotFound` if it is gone
    async fn save(&self, record: &T) -> Result<(), StoreError>;

    /// Remove a record by id; `Ok(false)` when nothing was there to remove
    async fn destroy(&self, id: &str) -> Result<bool, StoreError>;
}
