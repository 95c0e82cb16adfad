//! MongoDB client and collection wrapper
//!
//! Records are stored as raw BSON documents; the record `id` lives in `_id`.
//! Documents inserted by other tools may carry an ObjectId `_id`; it surfaces
//! as its hex string and id lookups match either form.
//! Queries are translated from the typed AST into MongoDB filter documents.

use bson::{doc, oid::ObjectId, Bson, Document};
use futures_util::StreamExt;
use mongodb::{
    options::{FindOptions, IndexOptions},
    Client, Collection, IndexModel,
};
use std::marker::PhantomData;
use tracing::{error, info};
use uuid::Uuid;

use crate::db::store::{DocumentStore, Record};
use crate::query::{Clause, Condition, Query, SortOrder};
use crate::types::StoreError;

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}/?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri.trim_end_matches('/'))
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed store for a record's collection
    pub async fn store<T: Record>(&self) -> Result<MongoStore<T>, StoreError> {
        MongoStore::new(&self.client, &self.db_name).await
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoStore<T: Record> {
    inner: Collection<Document>,
    _marker: PhantomData<T>,
}

impl<T: Record> MongoStore<T> {
    /// Open the collection and apply schema indexes
    pub async fn new(client: &Client, db_name: &str) -> Result<Self, StoreError> {
        let inner = client
            .database(db_name)
            .collection::<Document>(T::COLLECTION);
        let store = Self {
            inner,
            _marker: PhantomData,
        };

        store.apply_indexes().await?;
        Ok(store)
    }

    async fn apply_indexes(&self) -> Result<(), StoreError> {
        let indices: Vec<IndexModel> = T::into_indices()
            .into_iter()
            .map(|spec| {
                let options = IndexOptions::builder()
                    .name(format!("{}_{}", spec.field, if spec.unique { "unique" } else { "index" }))
                    .unique(spec.unique)
                    .sparse(spec.unique)
                    .build();
                let mut keys = Document::new();
                keys.insert(spec.field, 1);
                IndexModel::builder().keys(keys).options(Some(options)).build()
            })
            .collect();

        if indices.is_empty() {
            return Ok(());
        }

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    fn to_document(record: &T) -> Result<Document, StoreError> {
        let mut document = bson::to_document(record)?;
        if let Some(id) = document.remove("id") {
            document.insert("_id", id);
        }
        Ok(document)
    }

    fn from_document(mut document: Document) -> Result<T, StoreError> {
        if let Some(id) = document.remove("_id") {
            let id = match id {
                Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
                other => other,
            };
            document.insert("id", id);
        }
        Ok(bson::from_document(document)?)
    }
}

#[async_trait::async_trait]
impl<T: Record> DocumentStore<T> for MongoStore<T> {
    async fn find(&self, query: &Query) -> Result<Vec<T>, StoreError> {
        let filter = to_filter(query)?;

        let mut options = FindOptions::default();
        options.sort = to_sort(query);
        options.skip = query.skip;
        options.limit = to_limit(query);

        let cursor = self.inner.find(filter).with_options(options).await?;

        let results: Vec<T> = cursor
            .filter_map(|document| async move {
                match document.map_err(StoreError::from).and_then(Self::from_document) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        error!("Error reading {} document: {}", T::COLLECTION, e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    async fn create(&self, mut record: T) -> Result<T, StoreError> {
        if record.id().is_none() {
            record.set_id(Uuid::new_v4().to_string());
        }
        record.mut_metadata().mark_created();

        self.inner.insert_one(Self::to_document(&record)?).await?;
        Ok(record)
    }

    async fn save(&self, record: &T) -> Result<(), StoreError> {
        let id = record
            .id()
            .ok_or_else(|| StoreError::NotFound(format!("{} record without id", T::COLLECTION)))?
            .to_string();

        let mut updated = record.clone();
        updated.mut_metadata().touch();

        // The stored `_id` keeps its original BSON type
        let mut replacement = Self::to_document(&updated)?;
        replacement.remove("_id");

        let result = self.inner.replace_one(id_filter(&id), replacement).await?;

        if result.matched_count == 0 {
            return Err(StoreError::NotFound(format!("{}/{}", T::COLLECTION, id)));
        }
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<bool, StoreError> {
        let result = self.inner.delete_one(id_filter(id)).await?;
        Ok(result.deleted_count > 0)
    }
}

/// Translate a query into a MongoDB filter document
pub fn to_filter(query: &Query) -> Result<Document, StoreError> {
    let mut parts = query
        .clauses
        .iter()
        .map(clause_to_document)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(match parts.len() {
        0 => Document::new(),
        1 => parts.remove(0),
        _ => doc! { "$and": parts },
    })
}

/// Match a record id stored either as a string or as the ObjectId it encodes
fn id_filter(id: &str) -> Document {
    match ObjectId::parse_str(id) {
        Ok(oid) => doc! { "_id": { "$in": [id, oid] } },
        Err(_) => doc! { "_id": id },
    }
}

/// Zero means no limit; anything past `i64::MAX` saturates
fn to_limit(query: &Query) -> Option<i64> {
    query
        .limit
        .filter(|&l| l > 0)
        .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
}

fn to_sort(query: &Query) -> Option<Document> {
    if query.sort.is_empty() {
        return None;
    }
    let mut sort = Document::new();
    for (field, order) in &query.sort {
        let direction = match order {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        };
        sort.insert(storage_field(field), direction);
    }
    Some(sort)
}

fn storage_field(field: &str) -> &str {
    if field == "id" {
        "_id"
    } else {
        field
    }
}

fn clause_to_document(clause: &Clause) -> Result<Document, StoreError> {
    let to_bson = |value: &serde_json::Value| -> Result<Bson, StoreError> { Ok(bson::to_bson(value)?) };
    let to_bson_all = |values: &[serde_json::Value]| -> Result<Vec<Bson>, StoreError> {
        values.iter().map(to_bson).collect()
    };

    if let ("id", Condition::Eq(serde_json::Value::String(id))) =
        (clause.field.as_str(), &clause.condition)
    {
        return Ok(id_filter(id));
    }

    let condition = match &clause.condition {
        Condition::Eq(value) => to_bson(value)?,
        Condition::Ne(value) => Bson::Document(doc! { "$ne": to_bson(value)? }),
        Condition::In(values) => Bson::Document(doc! { "$in": to_bson_all(values)? }),
        Condition::NotIn(values) => Bson::Document(doc! { "$nin": to_bson_all(values)? }),
        Condition::Lt(value) => Bson::Document(doc! { "$lt": to_bson(value)? }),
        Condition::Lte(value) => Bson::Document(doc! { "$lte": to_bson(value)? }),
        Condition::Gt(value) => Bson::Document(doc! { "$gt": to_bson(value)? }),
        Condition::Gte(value) => Bson::Document(doc! { "$gte": to_bson(value)? }),
        Condition::Contains(text) => regex(&escape_regex(text)),
        Condition::StartsWith(text) => regex(&format!("^{}", escape_regex(text))),
        Condition::EndsWith(text) => regex(&format!("{}$", escape_regex(text))),
    };

    let mut document = Document::new();
    document.insert(storage_field(&clause.field), condition);
    Ok(document)
}

fn regex(pattern: &str) -> Bson {
    Bson::Document(doc! { "$regex": pattern, "$options": "i" })
}

fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\.+*?()|[]{}^$#&-~".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
