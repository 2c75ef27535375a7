use std::time::Duration;

use ride_sync::{ActivityId, ActivityRecord, SourceClient, SourceError};
use ride_sync_mywhoosh::{MyWhooshClient, MyWhooshConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> MyWhooshConfig {
    MyWhooshConfig {
        email: "rider@example.com".into(),
        password: "secret".into(),
        auth_base_url: Some(server.uri()),
        api_base_url: Some(server.uri()),
        timeout: Duration::from_secs(5),
    }
}

async fn authenticated_client(server: &MockServer) -> MyWhooshClient {
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Success": true,
            "AccessToken": "token-123",
            "WhooshId": "rider-1",
        })))
        .mount(server)
        .await;

    let mut client = MyWhooshClient::new(config_for(server)).unwrap();
    client.authenticate().await.unwrap();
    client
}

fn record() -> ActivityRecord {
    ActivityRecord {
        id: ActivityId::new("a1"),
        name: "Morning Ride".into(),
        recorded_at: None,
        raw_timestamp: None,
        file_handle: "f1".into(),
    }
}

/// Minimal bytes with a valid FIT header magic.
fn fit_bytes() -> Vec<u8> {
    let mut bytes = vec![14, 0x10, 0x2C, 0x08, 0, 0, 0, 0];
    bytes.extend_from_slice(b".FIT");
    bytes.extend_from_slice(&[0, 0]);
    bytes
}

#[tokio::test]
async fn resolves_storage_url_and_downloads_bytes() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("POST"))
        .and(path("/rider/profile/download-activity-file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": false,
            "data": format!("{}/storage/a1.fit", server.uri()),
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/storage/a1.fit"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(fit_bytes()))
        .mount(&server)
        .await;

    let blob = client.fetch_blob(&record()).await.unwrap();
    assert_eq!(blob, fit_bytes());
}

#[tokio::test]
async fn missing_magic_is_invalid_file_format() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("POST"))
        .and(path("/rider/profile/download-activity-file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": false,
            "data": format!("{}/storage/a1.fit", server.uri()),
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/storage/a1.fit"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<html>expired link</html>".to_vec()))
        .mount(&server)
        .await;

    assert!(matches!(
        client.fetch_blob(&record()).await,
        Err(SourceError::InvalidFileFormat(_))
    ));
}

#[tokio::test]
async fn resolution_api_error_is_a_download_error() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("POST"))
        .and(path("/rider/profile/download-activity-file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": true,
            "message": "file not found",
        })))
        .mount(&server)
        .await;

    match client.fetch_blob(&record()).await {
        Err(SourceError::Download(reason)) => assert!(reason.contains("file not found")),
        other => panic!("expected Download, got {other:?}"),
    }
}

#[tokio::test]
async fn non_url_resolution_payload_is_a_download_error() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("POST"))
        .and(path("/rider/profile/download-activity-file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": false,
            "data": "not-a-url",
        })))
        .mount(&server)
        .await;

    assert!(matches!(
        client.fetch_blob(&record()).await,
        Err(SourceError::Download(_))
    ));
}

#[tokio::test]
async fn expired_session_during_resolution_is_an_auth_error() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("POST"))
        .and(path("/rider/profile/download-activity-file"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    assert!(matches!(
        client.fetch_blob(&record()).await,
        Err(SourceError::Auth(_))
    ));
}

#[tokio::test]
async fn failed_storage_fetch_is_a_download_error() {
    let server = MockServer::start().await;
    let client = authenticated_client(&server).await;

    Mock::given(method("POST"))
        .and(path("/rider/profile/download-activity-file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": false,
            "data": format!("{}/storage/a1.fit", server.uri()),
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/storage/a1.fit"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    assert!(matches!(
        client.fetch_blob(&record()).await,
        Err(SourceError::Download(_))
    ));
}
