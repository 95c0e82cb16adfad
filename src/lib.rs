//! Disciple server - control plane for a fleet of worker processes
//!
//! Disciples connect over WebSocket and announce themselves; the server keeps
//! one durable record per disciple and tracks whether it is connected.
//! Operators connect to a separate admin listener to query and prune the
//! fleet and to manage model metadata.
//!
//! ## Components
//!
//! - **Store**: [`db::DocumentStore`] with MongoDB and in-memory backends
//! - **Query**: relaxed admin literals parsed into a typed, whitelisted query
//! - **Registries**: presence reconciliation and model upserts
//! - **Admin**: command dispatch with one reply per command
//! - **Server**: hyper + hyper-tungstenite listeners

pub mod admin;
pub mod config;
pub mod db;
pub mod query;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{RegistryError, Result};
