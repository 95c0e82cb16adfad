//! Database layer
//!
//! The registries only see the [`DocumentStore`] trait. Two backends implement
//! it: MongoDB for production and an in-memory store for development and tests.

pub mod memory;
pub mod mongo;
pub mod schemas;
pub mod store;

pub use memory::MemoryStore;
pub use mongo::{MongoClient, MongoStore};
pub use schemas::{Disciple, DiscipleModel, DiscipleStatus, Metadata, ModelType};
pub use store::{DocumentStore, IndexSpec, MutMetadata, Record};
