use std::io::Write;

use chrono::{DateTime, Utc};
use ride_sync_fit::DeviceIdentity;
use tempfile::NamedTempFile;

use crate::activity::{ActivityRecord, SinkActivitySummary};
use crate::duplicate::{DUPLICATE_WINDOW_SECONDS, is_duplicate};
use crate::feedback::Feedback;
use crate::outcome::{SyncOutcome, SyncTally};
use crate::sink::{SinkClient, SinkError, UploadResult};
use crate::source::{SourceClient, SourceError};

/// Errors that abort a whole run. Everything else becomes a per-record
/// `SyncOutcome::Failed` and never escapes the engine.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("source authentication failed: {0}")]
    SourceAuth(String),

    #[error("sink authentication failed: {0}")]
    SinkAuth(String),

    #[error("could not list source activities: {0}")]
    Listing(String),
}

/// Drives one sync run: list from the source, duplicate-check against the
/// sink, download, rewrite device identity, upload.
///
/// The engine owns both authenticated sessions for the run's duration.
/// Authentication is lazy, and a session rejected mid-run is
/// re-established at most once per client — a second rejection aborts.
pub struct SyncEngine {
    source: Box<dyn SourceClient>,
    sink: Box<dyn SinkClient>,
    identity: DeviceIdentity,
    feedback: Vec<Feedback>,
    source_authenticated: bool,
    source_reauthenticated: bool,
    sink_authenticated: bool,
    sink_reauthenticated: bool,
}

impl SyncEngine {
    pub fn new(
        source: Box<dyn SourceClient>,
        sink: Box<dyn SinkClient>,
        identity: DeviceIdentity,
    ) -> Self {
        Self {
            source,
            sink,
            identity,
            feedback: Vec::new(),
            source_authenticated: false,
            source_reauthenticated: false,
            sink_authenticated: false,
            sink_reauthenticated: false,
        }
    }

    pub fn feedback(&self) -> &[Feedback] {
        &self.feedback
    }

    pub fn take_feedback(&mut self) -> Vec<Feedback> {
        std::mem::take(&mut self.feedback)
    }

    /// Sync the single most recent activity. Returns true iff the outcome
    /// was an upload or a duplicate skip.
    pub async fn process_latest(&mut self, check_duplicates: bool) -> Result<bool, SyncError> {
        let records = self.list_from_source(1).await?;
        let Some(record) = records.into_iter().next() else {
            self.info("no activities found; nothing to sync");
            return Ok(false);
        };

        let outcome = self.process_one(&record, check_duplicates).await?;
        Ok(outcome.is_success())
    }

    /// Sync up to `limit` most recent activities. A failed record is
    /// tallied and the batch moves on.
    pub async fn process_batch(
        &mut self,
        limit: usize,
        check_duplicates: bool,
    ) -> Result<SyncTally, SyncError> {
        let records = self.list_from_source(limit).await?;
        let mut tally = SyncTally::default();

        for record in &records {
            let outcome = self.process_one(record, check_duplicates).await?;
            tally.record(&outcome);
        }

        Ok(tally)
    }

    /// Run one record through the pipeline:
    /// duplicate check → download → mutate → upload.
    pub async fn process_one(
        &mut self,
        record: &ActivityRecord,
        check_duplicates: bool,
    ) -> Result<SyncOutcome, SyncError> {
        if check_duplicates {
            match record.recorded_at {
                Some(recorded_at) => {
                    let existing = self.recent_summaries(recorded_at).await?;
                    if is_duplicate(record, &existing, DUPLICATE_WINDOW_SECONDS) {
                        self.info(format!(
                            "'{}' already on {}; skipping",
                            record.name,
                            self.sink.label()
                        ));
                        return Ok(SyncOutcome::SkippedDuplicate);
                    }
                }
                None => {
                    let raw = record.raw_timestamp.as_deref().unwrap_or("<missing>");
                    self.warn(format!(
                        "could not parse timestamp {raw:?} for '{}'; \
                         duplicate check disabled for this activity",
                        record.name
                    ));
                }
            }
        }

        let blob = match self.fetch_with_reauth(record).await? {
            Ok(blob) => blob,
            Err(reason) => return Ok(self.fail(record, reason)),
        };

        // Both copies live in scoped temp files that drop cleans up on
        // every return path below.
        let _original = match stage_blob(&blob) {
            Ok(staged) => staged,
            Err(e) => return Ok(self.fail(record, format!("could not stage download: {e}"))),
        };

        let mutated = match ride_sync_fit::mutate(&blob, &self.identity) {
            Ok(bytes) => bytes,
            Err(e) => return Ok(self.fail(record, format!("malformed container: {e}"))),
        };

        let staged = match stage_blob(&mutated) {
            Ok(staged) => staged,
            Err(e) => return Ok(self.fail(record, format!("could not stage upload: {e}"))),
        };

        // Upload reads back the staged, mutated copy; nothing ever uploads
        // the bytes as downloaded.
        let upload_bytes = match std::fs::read(staged.path()) {
            Ok(bytes) => bytes,
            Err(e) => return Ok(self.fail(record, format!("could not read staged upload: {e}"))),
        };

        match self.upload_with_reauth(&upload_bytes).await? {
            Ok(UploadResult::Accepted) => {
                self.info(format!("uploaded '{}' to {}", record.name, self.sink.label()));
                Ok(SyncOutcome::Uploaded)
            }
            Ok(UploadResult::AlreadyExists) => {
                self.info(format!(
                    "{} already holds '{}'; treating as synced",
                    self.sink.label(),
                    record.name
                ));
                Ok(SyncOutcome::Uploaded)
            }
            Ok(UploadResult::Rejected(reason)) => {
                Ok(self.fail(record, format!("upload rejected: {reason}")))
            }
            Err(reason) => Ok(self.fail(record, reason)),
        }
    }

    fn info(&mut self, msg: impl Into<String>) {
        self.feedback.push(Feedback::info(msg));
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.feedback.push(Feedback::warning(msg));
    }

    fn fail(&mut self, record: &ActivityRecord, reason: String) -> SyncOutcome {
        self.warn(format!("sync failed for '{}': {reason}", record.name));
        SyncOutcome::Failed(reason)
    }

    async fn ensure_source_auth(&mut self) -> Result<(), SyncError> {
        if self.source_authenticated {
            return Ok(());
        }
        self.source
            .authenticate()
            .await
            .map_err(|e| SyncError::SourceAuth(e.to_string()))?;
        self.source_authenticated = true;
        Ok(())
    }

    async fn ensure_sink_auth(&mut self) -> Result<(), SyncError> {
        if self.sink_authenticated {
            return Ok(());
        }
        self.sink
            .authenticate()
            .await
            .map_err(|e| SyncError::SinkAuth(e.to_string()))?;
        self.sink_authenticated = true;
        Ok(())
    }

    async fn reauthenticate_source(&mut self, reason: &str) -> Result<(), SyncError> {
        if self.source_reauthenticated {
            return Err(SyncError::SourceAuth(format!(
                "repeated session rejection: {reason}"
            )));
        }
        self.source_reauthenticated = true;
        self.warn(format!(
            "{} rejected the session ({reason}); re-authenticating",
            self.source.label()
        ));
        self.source
            .authenticate()
            .await
            .map_err(|e| SyncError::SourceAuth(e.to_string()))
    }

    async fn reauthenticate_sink(&mut self, reason: &str) -> Result<(), SyncError> {
        if self.sink_reauthenticated {
            return Err(SyncError::SinkAuth(format!(
                "repeated session rejection: {reason}"
            )));
        }
        self.sink_reauthenticated = true;
        self.warn(format!(
            "{} rejected the session ({reason}); re-authenticating",
            self.sink.label()
        ));
        self.sink
            .authenticate()
            .await
            .map_err(|e| SyncError::SinkAuth(e.to_string()))
    }

    async fn list_from_source(&mut self, limit: usize) -> Result<Vec<ActivityRecord>, SyncError> {
        self.ensure_source_auth().await?;
        match self.source.list_activities(limit).await {
            Ok(records) => Ok(records),
            Err(SourceError::Auth(reason)) => {
                self.reauthenticate_source(&reason).await?;
                self.source
                    .list_activities(limit)
                    .await
                    .map_err(|e| SyncError::Listing(e.to_string()))
            }
            Err(e) => Err(SyncError::Listing(e.to_string())),
        }
    }

    /// Download with a single re-authentication retry. The outer error is
    /// fatal for the run; the inner one fails only this record.
    async fn fetch_with_reauth(
        &mut self,
        record: &ActivityRecord,
    ) -> Result<Result<Vec<u8>, String>, SyncError> {
        self.ensure_source_auth().await?;
        match self.source.fetch_blob(record).await {
            Ok(blob) => Ok(Ok(blob)),
            Err(SourceError::Auth(reason)) => {
                self.reauthenticate_source(&reason).await?;
                match self.source.fetch_blob(record).await {
                    Ok(blob) => Ok(Ok(blob)),
                    Err(SourceError::Auth(reason)) => Err(SyncError::SourceAuth(format!(
                        "repeated session rejection: {reason}"
                    ))),
                    Err(e) => Ok(Err(e.to_string())),
                }
            }
            Err(e) => Ok(Err(e.to_string())),
        }
    }

    async fn upload_with_reauth(
        &mut self,
        blob: &[u8],
    ) -> Result<Result<UploadResult, String>, SyncError> {
        self.ensure_sink_auth().await?;
        match self.sink.upload(blob).await {
            Ok(result) => Ok(Ok(result)),
            Err(SinkError::Auth(reason)) => {
                self.reauthenticate_sink(&reason).await?;
                match self.sink.upload(blob).await {
                    Ok(result) => Ok(Ok(result)),
                    Err(SinkError::Auth(reason)) => Err(SyncError::SinkAuth(format!(
                        "repeated session rejection: {reason}"
                    ))),
                    Err(e) => Ok(Err(e.to_string())),
                }
            }
            Err(e) => Ok(Err(e.to_string())),
        }
    }

    /// Recent sink activities for duplicate comparison. Non-auth failures
    /// degrade to an empty list with a warning rather than blocking sync.
    async fn recent_summaries(
        &mut self,
        around: DateTime<Utc>,
    ) -> Result<Vec<SinkActivitySummary>, SyncError> {
        self.ensure_sink_auth().await?;
        match self.sink.recent_activities(around).await {
            Ok(summaries) => Ok(summaries),
            Err(SinkError::Auth(reason)) => {
                self.reauthenticate_sink(&reason).await?;
                match self.sink.recent_activities(around).await {
                    Ok(summaries) => Ok(summaries),
                    Err(SinkError::Auth(reason)) => Err(SyncError::SinkAuth(format!(
                        "repeated session rejection: {reason}"
                    ))),
                    Err(e) => Ok(self.degraded_duplicate_check(&e)),
                }
            }
            Err(e) => Ok(self.degraded_duplicate_check(&e)),
        }
    }

    fn degraded_duplicate_check(&mut self, error: &SinkError) -> Vec<SinkActivitySummary> {
        self.warn(format!(
            "could not list recent {} activities ({error}); duplicate check degraded",
            self.sink.label()
        ));
        Vec::new()
    }
}

/// Materialize blob bytes to a scoped temp file. The handle's drop removes
/// the file on success, skip, and failure alike.
fn stage_blob(bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut staged = tempfile::Builder::new()
        .prefix("ride-sync-")
        .suffix(".fit")
        .tempfile()?;
    staged.write_all(bytes)?;
    staged.flush()?;
    Ok(staged)
}
