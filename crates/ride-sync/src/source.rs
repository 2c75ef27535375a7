use crate::activity::ActivityRecord;

/// Errors surfaced by a source client. Only `Auth` is retried (once, after
/// re-authentication); everything else is fatal for the record at hand.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("download failed: {0}")]
    Download(String),
}

/// The service activities are pulled from.
///
/// Clients own their transport session; `authenticate` establishes it and
/// the other operations assume it is in place, returning `Auth` when the
/// service rejects it so the caller can re-authenticate.
#[async_trait::async_trait]
pub trait SourceClient: Send + Sync {
    /// Human-readable label identifying this source.
    fn label(&self) -> &str;

    async fn authenticate(&mut self) -> Result<(), SourceError>;

    /// List activities, most recent first.
    async fn list_activities(&self, limit: usize) -> Result<Vec<ActivityRecord>, SourceError>;

    /// Resolve a record's file handle and download the raw activity file.
    /// The returned bytes are guaranteed to start with the container magic.
    async fn fetch_blob(&self, record: &ActivityRecord) -> Result<Vec<u8>, SourceError>;
}
