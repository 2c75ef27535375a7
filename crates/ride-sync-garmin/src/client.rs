use std::time::Duration;

use chrono::{DateTime, Days, Utc};
use ride_sync::{SinkActivitySummary, SinkClient, SinkError, UploadResult, parse_timestamp};
use serde::Deserialize;

const DEFAULT_API_BASE_URL: &str = "https://connectapi.garmin.com";

/// Configuration for the Garmin Connect client. The base URL override
/// exists for tests; production uses the service default.
#[derive(Debug, Clone)]
pub struct GarminConfig {
    pub username: String,
    pub password: String,
    pub api_base_url: Option<String>,
    pub timeout: Duration,
}

/// Pushes activities to Garmin Connect and lists what it already holds.
pub struct GarminClient {
    config: GarminConfig,
    client: reqwest::Client,
    access_token: Option<String>,
}

impl GarminClient {
    pub fn new(config: GarminConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SinkError::Transient(format!("could not build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            access_token: None,
        })
    }

    fn api_base(&self) -> &str {
        self.config
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE_URL)
    }

    fn token(&self) -> Result<&str, SinkError> {
        self.access_token
            .as_deref()
            .ok_or_else(|| SinkError::Auth("not authenticated".into()))
    }
}

#[async_trait::async_trait]
impl SinkClient for GarminClient {
    fn label(&self) -> &str {
        "Garmin Connect"
    }

    async fn authenticate(&mut self) -> Result<(), SinkError> {
        let url = format!("{}/auth/login", self.api_base());

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await
            .map_err(|e| SinkError::Auth(format!("login transport error: {e}")))?;

        if response.status().as_u16() == 401 || response.status().as_u16() == 403 {
            return Err(SinkError::Auth("invalid credentials".into()));
        }
        if !response.status().is_success() {
            return Err(SinkError::Auth(format!(
                "login returned HTTP {}",
                response.status()
            )));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| SinkError::Auth(format!("invalid login response: {e}")))?;

        let token = body
            .access_token
            .ok_or_else(|| SinkError::Auth("login response missing access token".into()))?;

        self.access_token = Some(token);
        Ok(())
    }

    async fn recent_activities(
        &self,
        around: DateTime<Utc>,
    ) -> Result<Vec<SinkActivitySummary>, SinkError> {
        let token = self.token()?;
        let url = format!(
            "{}/activitylist-service/activities/search/activities",
            self.api_base()
        );

        // A full day on each side keeps the two-hour tolerance intact
        // across midnight and modest timezone skew.
        let start = around
            .checked_sub_days(Days::new(1))
            .unwrap_or(around)
            .format("%Y-%m-%d")
            .to_string();
        let end = around
            .checked_add_days(Days::new(1))
            .unwrap_or(around)
            .format("%Y-%m-%d")
            .to_string();

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("startDate", start.as_str()), ("endDate", end.as_str())])
            .send()
            .await
            .map_err(|e| SinkError::Transient(format!("activity search failed: {e}")))?;

        match response.status().as_u16() {
            401 | 403 => return Err(SinkError::Auth("session expired".into())),
            status if status >= 400 => {
                return Err(SinkError::Transient(format!(
                    "activity search returned HTTP {status}"
                )));
            }
            _ => {}
        }

        let entries: Vec<ActivitySearchEntry> = response
            .json()
            .await
            .map_err(|e| SinkError::Transient(format!("invalid search response: {e}")))?;

        // Entries whose timestamp does not parse cannot participate in
        // the time-window comparison and are dropped.
        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let start_time = parse_timestamp(entry.start_time.as_deref()?)?;
                Some(SinkActivitySummary {
                    start_time,
                    name: entry.activity_name.unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn upload(&self, blob: &[u8]) -> Result<UploadResult, SinkError> {
        let token = self.token()?;
        let url = format!("{}/upload-service/upload/.fit", self.api_base());

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(blob.to_vec())
            .send()
            .await
            .map_err(|e| SinkError::Transient(format!("upload transport error: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(UploadResult::Accepted);
        }

        match status.as_u16() {
            409 => Ok(UploadResult::AlreadyExists),
            401 | 403 => Err(SinkError::Auth("session expired".into())),
            429 => Err(SinkError::Transient("rate limited".into())),
            code if (400..500).contains(&code) => {
                let body = response.text().await.unwrap_or_default();
                Ok(UploadResult::Rejected(format!("HTTP {code}: {body}")))
            }
            code => Err(SinkError::Transient(format!("upload returned HTTP {code}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default, alias = "accessToken", alias = "access_token")]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActivitySearchEntry {
    #[serde(default, rename = "activityName")]
    activity_name: Option<String>,
    #[serde(default, rename = "startTimeLocal", alias = "startTimeGMT")]
    start_time: Option<String>,
}
