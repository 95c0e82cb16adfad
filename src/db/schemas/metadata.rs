//! Common metadata for all documents
//!
//! Tracks creation and update timestamps; stores set them on write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Common metadata for all documents
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// When the document was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// When the document was last saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Metadata {
    /// Stamp a freshly inserted document
    pub fn mark_created(&mut self) {
        let now = Utc::now();
        self.created_at = Some(now);
        self.updated_at = Some(now);
    }

    /// Stamp a saved document
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
        if self.created_at.is_none() {
            self.created_at = self.updated_at;
        }
    }
}
