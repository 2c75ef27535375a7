pub mod activity;
pub mod duplicate;
pub mod feedback;
pub mod outcome;
pub mod sink;
pub mod source;
pub mod sync;

pub use activity::{ActivityId, ActivityRecord, SinkActivitySummary, parse_timestamp};
pub use duplicate::{DUPLICATE_WINDOW_SECONDS, is_duplicate};
pub use feedback::Feedback;
pub use outcome::{SyncOutcome, SyncTally};
pub use ride_sync_fit::DeviceIdentity;
pub use sink::{SinkClient, SinkError, UploadResult};
pub use source::{SourceClient, SourceError};
pub use sync::{SyncEngine, SyncError};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
