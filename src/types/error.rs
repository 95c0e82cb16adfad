//! Error types for the disciple server
//!
//! Store failures, admin query failures, and the crate-level error that wraps both.

/// Errors raised by a document store backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether this failure is a uniqueness violation
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};

        if let ErrorKind::Write(WriteFailure::WriteError(ref write_error)) = *err.kind {
            if write_error.code == 11000 {
                return Self::Duplicate(write_error.message.clone());
            }
        }
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for StoreError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(err: bson::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors raised while turning an admin payload into a typed query
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Unknown field '{field}' for {collection}")]
    UnknownField { collection: String, field: String },

    #[error("Unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Query must be an object")]
    NotAnObject,
}

/// Main error type for registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    /// Payload sent to admin clients on `response:json`
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<hyper::Error> for RegistryError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RegistryError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Internal(format!("WebSocket error: {}", err))
    }
}

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_payload() {
        let err = RegistryError::from(QueryError::UnknownField {
            collection: "disciples".into(),
            field: "colour".into(),
        });

        let payload = err.to_payload();
        assert_eq!(payload["error"], "Unknown field 'colour' for disciples");
    }

    #[test]
    fn test_duplicate_detection() {
        assert!(StoreError::Duplicate("discipleId".into()).is_duplicate());
        assert!(!StoreError::Database("down".into()).is_duplicate());
    }
}
