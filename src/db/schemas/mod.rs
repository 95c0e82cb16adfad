//! Document schemas
//!
//! Disciple and model records as stored by every backend.

mod disciple;
mod metadata;
mod model;

pub use disciple::{Disciple, DiscipleStatus, PresenceReport, DISCIPLE_COLLECTION};
pub use metadata::Metadata;
pub use model::{DiscipleModel, ModelInput, ModelType, MODEL_COLLECTION};
