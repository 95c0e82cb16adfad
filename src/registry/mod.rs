//! Registries over the disciple and model collections
//!
//! Every decision re-reads the store; nothing here caches records.

pub mod disciple;
pub mod model;

pub use disciple::DiscipleRegistry;
pub use model::ModelRegistry;

use tracing::warn;

use crate::db::{DocumentStore, Record};
use crate::query::Query;

/// Destroy every record matching `query`, returning how many were confirmed gone.
///
/// Records without an id, failed deletes and records already removed by a
/// concurrent caller are logged and left out of the count.
pub(crate) async fn destroy_matching<T: Record>(
    store: &dyn DocumentStore<T>,
    records: Vec<T>,
) -> usize {
    let mut dropped = 0;
    for record in records {
        let Some(id) = record.id() else {
            warn!(collection = T::COLLECTION, "Skipping record without id");
            continue;
        };
        match store.destroy(id).await {
            Ok(true) => dropped += 1,
            Ok(false) => warn!(collection = T::COLLECTION, id, "Record already gone"),
            Err(e) => warn!(collection = T::COLLECTION, id, "Failed to destroy record: {}", e),
        }
    }
    dropped
}

/// Substitute `default` when the caller supplied an empty query
pub(crate) fn or_default(query: Query, default: impl FnOnce() -> Query) -> Query {
    if query.is_empty() {
        default()
    } else {
        query
    }
}
