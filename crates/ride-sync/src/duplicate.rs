use crate::activity::{ActivityRecord, SinkActivitySummary};

/// The ±2 hour tolerance for matching a candidate against sink activities.
pub const DUPLICATE_WINDOW_SECONDS: i64 = 7200;

/// Decide whether the candidate already exists on the sink.
///
/// A summary matches when its start time is within `window_seconds` of the
/// candidate's recorded time AND one name case-insensitively contains the
/// other. A time match with a non-matching name does not decide — scanning
/// continues, since several activities can share a day. Pure and
/// deterministic; a candidate without a parsed timestamp never matches.
pub fn is_duplicate(
    candidate: &ActivityRecord,
    existing: &[SinkActivitySummary],
    window_seconds: i64,
) -> bool {
    let Some(recorded_at) = candidate.recorded_at else {
        return false;
    };

    existing.iter().any(|summary| {
        let drift = (summary.start_time - recorded_at).num_seconds().abs();
        drift <= window_seconds && names_match(&candidate.name, &summary.name)
    })
}

fn names_match(candidate: &str, existing: &str) -> bool {
    let candidate = candidate.to_lowercase();
    let existing = existing.to_lowercase();
    candidate.contains(&existing) || existing.contains(&candidate)
}
