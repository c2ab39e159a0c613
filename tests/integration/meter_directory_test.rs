// Meter directory integration tests
// Covers listing, idempotence and the retry policy for transient failures

use chrono::{Duration, Utc};
use oss_meter_client::config::RetryConfig;
use oss_meter_client::{ApiToken, Config, MeterDirectoryClient, MeterIdentifier, OssError, VendorClient};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 10,
        backoff_multiplier: 1.0,
        max_delay_ms: 10,
    }
}

fn directory(base_url: &str) -> MeterDirectoryClient {
    let config = Config::with_base_url(base_url).unwrap();
    MeterDirectoryClient::new(VendorClient::from_config(&config).unwrap(), fast_retry())
}

fn token() -> ApiToken {
    ApiToken::new("T1", "HomeAssistant", Utc::now() + Duration::days(365))
}

#[tokio::test]
async fn test_list_meters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/meters"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"meterNumber": "M-00123", "name": "House"},
            {"meterNumber": 4567},
            {"meterNumber": "  "}
        ])))
        .mount(&server)
        .await;

    let meters = directory(&server.uri()).list_meters(&token()).await.unwrap();

    assert_eq!(
        meters,
        vec![MeterIdentifier::new("M-00123"), MeterIdentifier::new("4567")]
    );
}

#[tokio::test]
async fn test_listing_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/meters"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"meterNumber": "M-00123"}])),
        )
        .expect(2)
        .mount(&server)
        .await;

    let directory = directory(&server.uri());
    let token = token();
    let first = directory.list_meters(&token).await.unwrap();
    let second = directory.list_meters(&token).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_account_without_meters_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/meters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let meters = directory(&server.uri()).list_meters(&token()).await.unwrap();

    assert!(meters.is_empty());
}

#[tokio::test]
async fn test_revoked_token_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/meters"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let directory = directory(&server.uri());
    let token = token();
    for _ in 0..2 {
        let err = directory.list_meters(&token).await.unwrap_err();
        assert!(matches!(err, OssError::Unauthorized(_)));
    }
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/meters"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/meters"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"meterNumber": "M-00123"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let meters = directory(&server.uri()).list_meters(&token()).await.unwrap();

    assert_eq!(meters, vec![MeterIdentifier::new("M-00123")]);
}

#[tokio::test]
async fn test_persistent_failure_gives_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/meters"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let err = directory(&server.uri()).list_meters(&token()).await.unwrap_err();

    match err {
        OssError::Unauthorized(detail) => assert!(detail.contains("after 3 attempts")),
        other => panic!("expected Unauthorized, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_listing_is_unexpected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/meters"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = directory(&server.uri()).list_meters(&token()).await.unwrap_err();

    assert!(matches!(err, OssError::UnexpectedResponse(_)));
}
