use std::fmt;

/// Terminal state of one processed activity. Produced exactly once per
/// record attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Uploaded to the sink (or the sink already held it — idempotent).
    Uploaded,
    /// Duplicate matcher found it on the sink; nothing was downloaded.
    SkippedDuplicate,
    /// This record failed; later records are unaffected.
    Failed(String),
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Aggregate results of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTally {
    pub total: usize,
    pub synced: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl SyncTally {
    pub fn record(&mut self, outcome: &SyncOutcome) {
        self.total += 1;
        match outcome {
            SyncOutcome::Uploaded => self.synced += 1,
            SyncOutcome::SkippedDuplicate => self.skipped += 1,
            SyncOutcome::Failed(_) => self.errors += 1,
        }
    }
}

impl fmt::Display for SyncTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} synced ({} skipped, {} failed)",
            self.synced, self.total, self.skipped, self.errors
        )
    }
}
