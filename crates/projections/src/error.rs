//! Projection error types.

use thiserror::Error;

/// Errors raised while feeding events into read models.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// An event payload did not deserialize into its domain type.
    #[error("event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("projection error: {0}")]
    Projection(String),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
