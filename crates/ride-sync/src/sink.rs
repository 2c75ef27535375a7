use chrono::{DateTime, Utc};

use crate::activity::SinkActivitySummary;

/// Errors surfaced by a sink client.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transient error: {0}")]
    Transient(String),
}

/// What the sink said about an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadResult {
    Accepted,
    /// The sink already holds this activity. A terminal success, never
    /// retried and never an error.
    AlreadyExists,
    Rejected(String),
}

/// The service activities are pushed to.
#[async_trait::async_trait]
pub trait SinkClient: Send + Sync {
    /// Human-readable label identifying this sink.
    fn label(&self) -> &str;

    async fn authenticate(&mut self) -> Result<(), SinkError>;

    /// Activities near `around`, for duplicate comparison. Implementations
    /// fetch a window wide enough that the ±2 h tolerance survives
    /// midnight. Callers treat failures as non-fatal.
    async fn recent_activities(
        &self,
        around: DateTime<Utc>,
    ) -> Result<Vec<SinkActivitySummary>, SinkError>;

    async fn upload(&self, blob: &[u8]) -> Result<UploadResult, SinkError>;
}
