use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Source-opaque identifier for an activity.
/// The source service determines its own ID scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivityId(String);

impl ActivityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An activity as listed by the source service. Immutable once fetched.
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub id: ActivityId,
    pub name: String,
    /// Normalized start time; `None` when the source timestamp did not
    /// parse (duplicate checking is skipped for such records, never the
    /// whole run).
    pub recorded_at: Option<DateTime<Utc>>,
    /// The timestamp string as the source sent it, kept for warnings.
    pub raw_timestamp: Option<String>,
    /// Handle the source client resolves to the actual file bytes.
    pub file_handle: String,
}

/// Read-only projection of an activity already present on the sink,
/// used only for duplicate comparison. Fetched fresh every run.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkActivitySummary {
    pub start_time: DateTime<Utc>,
    pub name: String,
}

/// Epoch values above this are taken to be milliseconds.
const MILLIS_THRESHOLD: f64 = 100_000_000_000.0;

/// Normalize the timestamp formats observed in the wild: epoch seconds or
/// milliseconds (string or numeric), RFC 3339, naive ISO-8601 with or
/// without fractional seconds, space-separated, and bare dates. Naive
/// values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(numeric) = trimmed.parse::<f64>() {
        if !numeric.is_finite() || numeric <= 0.0 {
            return None;
        }
        let millis = if numeric > MILLIS_THRESHOLD {
            numeric
        } else {
            numeric * 1000.0
        };
        return DateTime::from_timestamp_millis(millis as i64);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }

    let naive = trimmed.trim_end_matches('Z');
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(parsed.and_utc());
        }
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seconds(ts: &str) -> i64 {
        parse_timestamp(ts).unwrap().timestamp()
    }

    #[test]
    fn parses_epoch_seconds() {
        assert_eq!(seconds("1700000000"), 1_700_000_000);
    }

    #[test]
    fn parses_epoch_milliseconds() {
        assert_eq!(seconds("1700000000500"), 1_700_000_000);
    }

    #[test]
    fn parses_rfc3339() {
        assert_eq!(seconds("2023-11-14T22:13:20Z"), 1_700_000_000);
        assert_eq!(seconds("2023-11-14T23:13:20+01:00"), 1_700_000_000);
    }

    #[test]
    fn parses_naive_iso_variants() {
        assert_eq!(seconds("2023-11-14T22:13:20"), 1_700_000_000);
        assert_eq!(seconds("2023-11-14T22:13:20.500Z"), 1_700_000_000);
        assert_eq!(seconds("2023-11-14 22:13:20"), 1_700_000_000);
    }

    #[test]
    fn parses_bare_date_as_midnight() {
        let parsed = parse_timestamp("2023-11-14").unwrap();
        assert_eq!(parsed.format("%H:%M:%S").to_string(), "00:00:00");
    }

    #[test]
    fn rejects_unrecognized_formats() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("14/11/2023").is_none());
        assert!(parse_timestamp("-5").is_none());
        assert!(parse_timestamp("NaN").is_none());
    }
}
