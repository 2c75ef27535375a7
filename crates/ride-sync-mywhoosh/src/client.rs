use std::time::Duration;

use ride_sync::{ActivityRecord, SourceClient, SourceError};
use serde::Deserialize;

use crate::response::ListingResponse;

const DEFAULT_AUTH_BASE_URL: &str = "https://services.mywhoosh.com/http-service";
const DEFAULT_API_BASE_URL: &str = "https://service14.mywhoosh.com/v2";

/// Configuration for the MyWhoosh client. The base URL overrides exist
/// for tests; production uses the service defaults.
#[derive(Debug, Clone)]
pub struct MyWhooshConfig {
    pub email: String,
    pub password: String,
    pub auth_base_url: Option<String>,
    pub api_base_url: Option<String>,
    /// Applied to every transport call; expiry surfaces as an error
    /// rather than a hang.
    pub timeout: Duration,
}

/// Session tokens returned by a successful login.
#[derive(Debug, Clone)]
struct Session {
    access_token: String,
    rider_id: String,
}

/// Pulls activities and their FIT files from the MyWhoosh API.
pub struct MyWhooshClient {
    config: MyWhooshConfig,
    client: reqwest::Client,
    device_id: String,
    session: Option<Session>,
}

impl MyWhooshClient {
    pub fn new(config: MyWhooshConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceError::Transient(format!("could not build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            device_id: uuid::Uuid::new_v4().to_string(),
            session: None,
        })
    }

    fn auth_base(&self) -> &str {
        self.config
            .auth_base_url
            .as_deref()
            .unwrap_or(DEFAULT_AUTH_BASE_URL)
    }

    fn api_base(&self) -> &str {
        self.config
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE_URL)
    }

    fn session(&self) -> Result<&Session, SourceError> {
        self.session
            .as_ref()
            .ok_or_else(|| SourceError::Auth("not authenticated".into()))
    }

    async fn resolve_download_url(&self, record: &ActivityRecord) -> Result<String, SourceError> {
        let session = self.session()?;
        let url = format!("{}/rider/profile/download-activity-file", self.api_base());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.access_token)
            .json(&serde_json::json!({
                "key": session.rider_id,
                "fileId": record.file_handle,
            }))
            .send()
            .await
            .map_err(|e| SourceError::Download(format!("download resolution failed: {e}")))?;

        if response.status().as_u16() == 401 {
            return Err(SourceError::Auth("session expired".into()));
        }
        if !response.status().is_success() {
            return Err(SourceError::Download(format!(
                "download resolution returned HTTP {}",
                response.status()
            )));
        }

        let body: DownloadResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Download(format!("invalid resolution response: {e}")))?;

        if body.error {
            return Err(SourceError::Download(
                body.message.unwrap_or_else(|| "unknown API error".into()),
            ));
        }

        body.data
            .filter(|url| url.starts_with("http"))
            .ok_or_else(|| SourceError::Download("no download URL in response".into()))
    }
}

#[async_trait::async_trait]
impl SourceClient for MyWhooshClient {
    fn label(&self) -> &str {
        "MyWhoosh"
    }

    async fn authenticate(&mut self) -> Result<(), SourceError> {
        let url = format!("{}/api/login", self.auth_base());

        let payload = serde_json::json!({
            "Username": self.config.email,
            "Password": self.config.password,
            "Platform": "Android",
            "Action": 1001,
            "CorrelationId": uuid::Uuid::new_v4().to_string(),
            "DeviceId": self.device_id,
            "Authorization": "",
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SourceError::Auth(format!("login transport error: {e}")))?;

        if !response.status().is_success() {
            return Err(SourceError::Auth(format!(
                "login returned HTTP {}",
                response.status()
            )));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Auth(format!("invalid login response: {e}")))?;

        if !body.success {
            return Err(SourceError::Auth(
                body.message.unwrap_or_else(|| "unknown error".into()),
            ));
        }

        let access_token = body
            .access_token
            .ok_or_else(|| SourceError::Auth("login response missing access token".into()))?;
        let rider_id = body
            .whoosh_id
            .ok_or_else(|| SourceError::Auth("login response missing rider id".into()))?;

        self.session = Some(Session {
            access_token,
            rider_id,
        });

        Ok(())
    }

    async fn list_activities(&self, limit: usize) -> Result<Vec<ActivityRecord>, SourceError> {
        let session = self.session()?;
        let url = format!("{}/rider/profile/activities", self.api_base());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.access_token)
            .json(&serde_json::json!({
                "page": 1,
                "limit": limit,
                "sortDate": "DESC",
            }))
            .send()
            .await
            .map_err(|e| SourceError::Transient(format!("activity listing failed: {e}")))?;

        match response.status().as_u16() {
            401 => return Err(SourceError::Auth("session expired".into())),
            429 => return Err(SourceError::Transient("rate limited".into())),
            status if status >= 400 => {
                return Err(SourceError::Transient(format!(
                    "activity listing returned HTTP {status}"
                )));
            }
            _ => {}
        }

        let listing: ListingResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Transient(format!("invalid listing response: {e}")))?;

        Ok(listing.into_records())
    }

    async fn fetch_blob(&self, record: &ActivityRecord) -> Result<Vec<u8>, SourceError> {
        let download_url = self.resolve_download_url(record).await?;

        let response = self
            .client
            .get(&download_url)
            .send()
            .await
            .map_err(|e| SourceError::Download(format!("file download failed: {e}")))?;

        if !response.status().is_success() {
            return Err(SourceError::Download(format!(
                "file download returned HTTP {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::Download(format!("file download failed: {e}")))?;

        if !ride_sync_fit::has_fit_magic(&bytes) {
            return Err(SourceError::InvalidFileFormat(format!(
                "downloaded file for activity {} lacks the .FIT magic",
                record.id
            )));
        }

        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default, rename = "Success")]
    success: bool,
    #[serde(default, rename = "Message")]
    message: Option<String>,
    #[serde(default, rename = "AccessToken")]
    access_token: Option<String>,
    #[serde(default, rename = "WhooshId")]
    whoosh_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<String>,
}
