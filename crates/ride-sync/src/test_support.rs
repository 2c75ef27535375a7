use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::activity::{ActivityRecord, SinkActivitySummary};
use crate::sink::{SinkClient, SinkError, UploadResult};
use crate::source::{SourceClient, SourceError};

/// Call counters shared between a stub and the test that boxed it away.
#[derive(Debug, Clone, Default)]
pub struct CallCounters {
    pub auth: Arc<AtomicUsize>,
    pub list: Arc<AtomicUsize>,
    pub fetch: Arc<AtomicUsize>,
    pub recent: Arc<AtomicUsize>,
    pub upload: Arc<AtomicUsize>,
}

impl CallCounters {
    pub fn auth_calls(&self) -> usize {
        self.auth.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch.load(Ordering::SeqCst)
    }

    pub fn recent_calls(&self) -> usize {
        self.recent.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload.load(Ordering::SeqCst)
    }
}

/// In-memory source client. Activities are served in insertion order
/// (tests insert most recent first, as the real service lists them).
pub struct StubSource {
    activities: Vec<ActivityRecord>,
    blobs: HashMap<String, Vec<u8>>,
    failing_downloads: HashSet<String>,
    auth_failures_remaining: Mutex<usize>,
    session_expired: Mutex<bool>,
    session_revoked: bool,
    counters: CallCounters,
}

impl StubSource {
    pub fn new() -> Self {
        Self {
            activities: Vec::new(),
            blobs: HashMap::new(),
            failing_downloads: HashSet::new(),
            auth_failures_remaining: Mutex::new(0),
            session_expired: Mutex::new(false),
            session_revoked: false,
            counters: CallCounters::default(),
        }
    }

    pub fn with_activity(mut self, record: ActivityRecord, blob: Vec<u8>) -> Self {
        self.blobs.insert(record.file_handle.clone(), blob);
        self.activities.push(record);
        self
    }

    /// The next fetch of this record fails at the transport layer.
    pub fn with_failing_download(mut self, record: ActivityRecord) -> Self {
        self.failing_downloads.insert(record.file_handle.clone());
        self.activities.push(record);
        self
    }

    /// The next `times` authentication attempts fail.
    pub fn failing_auth(self, times: usize) -> Self {
        *self.auth_failures_remaining.lock().unwrap() = times;
        self
    }

    /// The next list or fetch call is rejected with an auth error, once.
    pub fn expired_session(self) -> Self {
        *self.session_expired.lock().unwrap() = true;
        self
    }

    /// Every list and fetch call is rejected with an auth error, even
    /// after re-authenticating.
    pub fn revoked_session(mut self) -> Self {
        self.session_revoked = true;
        self
    }

    pub fn counters(&self) -> CallCounters {
        self.counters.clone()
    }

    fn session_rejected(&self) -> bool {
        if self.session_revoked {
            return true;
        }
        let mut expired = self.session_expired.lock().unwrap();
        std::mem::take(&mut *expired)
    }
}

impl Default for StubSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceClient for StubSource {
    fn label(&self) -> &str {
        "stub-source"
    }

    async fn authenticate(&mut self) -> Result<(), SourceError> {
        self.counters.auth.fetch_add(1, Ordering::SeqCst);
        let mut remaining = self.auth_failures_remaining.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(SourceError::Auth("bad credentials".into()));
        }
        Ok(())
    }

    async fn list_activities(&self, limit: usize) -> Result<Vec<ActivityRecord>, SourceError> {
        self.counters.list.fetch_add(1, Ordering::SeqCst);
        if self.session_rejected() {
            return Err(SourceError::Auth("session expired".into()));
        }
        Ok(self.activities.iter().take(limit).cloned().collect())
    }

    async fn fetch_blob(&self, record: &ActivityRecord) -> Result<Vec<u8>, SourceError> {
        self.counters.fetch.fetch_add(1, Ordering::SeqCst);
        if self.session_rejected() {
            return Err(SourceError::Auth("session expired".into()));
        }
        if self.failing_downloads.contains(&record.file_handle) {
            return Err(SourceError::Download("connection reset".into()));
        }
        self.blobs
            .get(&record.file_handle)
            .cloned()
            .ok_or_else(|| SourceError::Download(format!("unknown handle {}", record.file_handle)))
    }
}

/// In-memory sink client recording every uploaded blob.
pub struct StubSink {
    existing: Vec<SinkActivitySummary>,
    upload_result: UploadResult,
    recent_fails: bool,
    auth_failures_remaining: Mutex<usize>,
    session_expired: Mutex<bool>,
    session_revoked: bool,
    uploads: Arc<Mutex<Vec<Vec<u8>>>>,
    counters: CallCounters,
}

impl StubSink {
    pub fn new() -> Self {
        Self {
            existing: Vec::new(),
            upload_result: UploadResult::Accepted,
            recent_fails: false,
            auth_failures_remaining: Mutex::new(0),
            session_expired: Mutex::new(false),
            session_revoked: false,
            uploads: Arc::new(Mutex::new(Vec::new())),
            counters: CallCounters::default(),
        }
    }

    pub fn with_existing(mut self, summary: SinkActivitySummary) -> Self {
        self.existing.push(summary);
        self
    }

    pub fn with_upload_result(mut self, result: UploadResult) -> Self {
        self.upload_result = result;
        self
    }

    /// Recent-activity listing fails with a transient error.
    pub fn failing_recent(mut self) -> Self {
        self.recent_fails = true;
        self
    }

    /// The next `times` authentication attempts fail.
    pub fn failing_auth(self, times: usize) -> Self {
        *self.auth_failures_remaining.lock().unwrap() = times;
        self
    }

    /// The next recent or upload call is rejected with an auth error, once.
    pub fn expired_session(self) -> Self {
        *self.session_expired.lock().unwrap() = true;
        self
    }

    /// Every recent and upload call is rejected with an auth error, even
    /// after re-authenticating.
    pub fn revoked_session(mut self) -> Self {
        self.session_revoked = true;
        self
    }

    pub fn counters(&self) -> CallCounters {
        self.counters.clone()
    }

    /// Handle for inspecting uploads after the stub is boxed away.
    pub fn uploads(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.uploads)
    }

    fn session_rejected(&self) -> bool {
        if self.session_revoked {
            return true;
        }
        let mut expired = self.session_expired.lock().unwrap();
        std::mem::take(&mut *expired)
    }
}

impl Default for StubSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SinkClient for StubSink {
    fn label(&self) -> &str {
        "stub-sink"
    }

    async fn authenticate(&mut self) -> Result<(), SinkError> {
        self.counters.auth.fetch_add(1, Ordering::SeqCst);
        let mut remaining = self.auth_failures_remaining.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(SinkError::Auth("bad credentials".into()));
        }
        Ok(())
    }

    async fn recent_activities(
        &self,
        _around: DateTime<Utc>,
    ) -> Result<Vec<SinkActivitySummary>, SinkError> {
        self.counters.recent.fetch_add(1, Ordering::SeqCst);
        if self.session_rejected() {
            return Err(SinkError::Auth("session expired".into()));
        }
        if self.recent_fails {
            return Err(SinkError::Transient("activity search unavailable".into()));
        }
        Ok(self.existing.clone())
    }

    async fn upload(&self, blob: &[u8]) -> Result<UploadResult, SinkError> {
        self.counters.upload.fetch_add(1, Ordering::SeqCst);
        if self.session_rejected() {
            return Err(SinkError::Auth("session expired".into()));
        }
        self.uploads.lock().unwrap().push(blob.to_vec());
        Ok(self.upload_result.clone())
    }
}
