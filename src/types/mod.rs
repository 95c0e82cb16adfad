//! Shared types for the disciple server

pub mod error;

pub use error::{QueryError, RegistryError, Result, StoreError};
