use ride_sync::{ActivityId, ActivityRecord, parse_timestamp};
use serde::Deserialize;

/// The activities endpoint has shipped several envelope shapes over time:
/// a bare array, `{results: [...]}`, `{data: [...]}`, and
/// `{data: {results: [...]}}`. All of them normalize to one flat list
/// here; the ambiguity never leaks past this crate.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListingResponse {
    Plain(Vec<ActivityEntry>),
    Results { results: Vec<ActivityEntry> },
    Enveloped { data: DataSection },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DataSection {
    Results { results: Vec<ActivityEntry> },
    Plain(Vec<ActivityEntry>),
}

/// One activity as the service lists it. Field names vary by API vintage,
/// hence the aliases; the timestamp arrives as a string or a number.
#[derive(Debug, Deserialize)]
pub struct ActivityEntry {
    #[serde(default, alias = "_id")]
    id: Option<String>,

    #[serde(default, alias = "title")]
    name: Option<String>,

    #[serde(
        default,
        alias = "startTime",
        alias = "createdAt",
        alias = "timestamp"
    )]
    date: Option<serde_json::Value>,

    #[serde(default, rename = "activityFileId")]
    activity_file_id: Option<String>,
}

impl ListingResponse {
    /// Flatten whatever envelope arrived into activity records, most
    /// recent first as the service sorts them. Entries without an id or a
    /// download handle can never be synced and are silently dropped.
    pub fn into_records(self) -> Vec<ActivityRecord> {
        let entries = match self {
            Self::Plain(entries) | Self::Results { results: entries } => entries,
            Self::Enveloped {
                data: DataSection::Results { results },
            }
            | Self::Enveloped {
                data: DataSection::Plain(results),
            } => results,
        };

        entries
            .into_iter()
            .filter_map(ActivityEntry::into_record)
            .collect()
    }
}

impl ActivityEntry {
    fn into_record(self) -> Option<ActivityRecord> {
        let file_handle = self.activity_file_id?;
        let id = self.id?;

        let raw_timestamp = self.date.map(|value| match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        let recorded_at = raw_timestamp.as_deref().and_then(parse_timestamp);

        Some(ActivityRecord {
            id: ActivityId::new(id),
            name: self.name.unwrap_or_else(|| "Unknown Activity".into()),
            recorded_at,
            raw_timestamp,
            file_handle,
        })
    }
}
