// File credential store integration tests

use chrono::{Duration, SubsecRound, Utc};
use oss_meter_client::{ApiToken, CredentialStore, FileCredentialStore, MeterIdentifier, OssError};
use tempfile::TempDir;

fn token() -> ApiToken {
    // Whole seconds so the RFC 3339 round trip compares equal
    ApiToken::new("T1", "HomeAssistant", (Utc::now() + Duration::days(365)).trunc_subsecs(0))
}

#[tokio::test]
async fn test_save_then_load() {
    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::new(dir.path().join("credentials.json"));
    let token = token();
    let meter = MeterIdentifier::new("M-00123");

    store.save(&token, &meter).await.unwrap();
    let (loaded_token, loaded_meter) = store.load().await.unwrap().unwrap();

    assert_eq!(loaded_token, token);
    assert_eq!(loaded_meter, meter);
}

#[tokio::test]
async fn test_file_carries_configuration_keys() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    let store = FileCredentialStore::new(&path);

    store
        .save(&token(), &MeterIdentifier::new("M-00123"))
        .await
        .unwrap();

    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(json["token"], "T1");
    assert_eq!(json["meterNumber"], "M-00123");
    assert_eq!(json["label"], "HomeAssistant");
    assert!(json["expiresAt"].is_string());

    let configuration = store.load_configuration().await.unwrap().unwrap();
    assert_eq!(configuration.token, "T1");
    assert_eq!(configuration.meter_number, "M-00123");
}

#[tokio::test]
async fn test_missing_file_loads_nothing() {
    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::new(dir.path().join("absent.json"));

    assert!(store.load().await.unwrap().is_none());
    assert!(store.load_configuration().await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_replaces_previous_credentials() {
    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::new(dir.path().join("credentials.json"));

    store
        .save(&token(), &MeterIdentifier::new("M-00123"))
        .await
        .unwrap();
    let replacement = ApiToken::new("T2", "Garage", token().expires_at());
    store
        .save(&replacement, &MeterIdentifier::new("M-00456"))
        .await
        .unwrap();

    let (loaded_token, loaded_meter) = store.load().await.unwrap().unwrap();
    assert_eq!(loaded_token.expose_secret(), "T2");
    assert_eq!(loaded_meter.as_str(), "M-00456");
    assert!(!dir.path().join("credentials.json.tmp").exists());
}

#[tokio::test]
async fn test_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("oss").join("credentials.json");
    let store = FileCredentialStore::new(&path);

    store
        .save(&token(), &MeterIdentifier::new("M-00123"))
        .await
        .unwrap();

    assert!(path.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    FileCredentialStore::new(&path)
        .save(&token(), &MeterIdentifier::new("M-00123"))
        .await
        .unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[tokio::test]
async fn test_hand_written_file_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    std::fs::write(&path, r#"{"token": "T1", "meterNumber": " M-00123 "}"#).unwrap();

    let (token, meter) = FileCredentialStore::new(&path).load().await.unwrap().unwrap();

    assert_eq!(token.expose_secret(), "T1");
    assert_eq!(token.label(), "");
    assert!(!token.is_expired());
    assert_eq!(meter.as_str(), "M-00123");
}

#[tokio::test]
async fn test_malformed_file_is_store_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    std::fs::write(&path, "not json").unwrap();

    let err = FileCredentialStore::new(&path).load().await.unwrap_err();

    assert!(matches!(err, OssError::Store(_)));
}

#[tokio::test]
async fn test_empty_token_is_store_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    std::fs::write(&path, r#"{"token": "", "meterNumber": "M-00123"}"#).unwrap();

    let err = FileCredentialStore::new(&path).load().await.unwrap_err();

    assert!(matches!(err, OssError::Store(_)));
}

#[tokio::test]
async fn test_failed_replace_leaves_no_temp_file() {
    let dir = TempDir::new().unwrap();
    // A non-empty directory at the target path cannot be replaced by a file
    let path = dir.path().join("credentials.json");
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("keep"), "x").unwrap();

    let err = FileCredentialStore::new(&path)
        .save(&token(), &MeterIdentifier::new("M-00123"))
        .await
        .unwrap_err();

    assert!(matches!(err, OssError::Store(_)));
    assert!(!dir.path().join("credentials.json.tmp").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_stale_temp_file_is_not_reused() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    let stale = dir.path().join("credentials.json.tmp");
    std::fs::write(&stale, "leftover").unwrap();
    std::fs::set_permissions(&stale, std::fs::Permissions::from_mode(0o644)).unwrap();

    FileCredentialStore::new(&path)
        .save(&token(), &MeterIdentifier::new("M-00123"))
        .await
        .unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    assert!(!stale.exists());
}
