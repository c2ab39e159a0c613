// Telemetry client and watcher integration tests

use chrono::{DateTime, Duration, Utc};
use oss_meter_client::models::{Measurement, Phase, PowerUnit, Statistic};
use oss_meter_client::{
    ApiToken, Config, MeterIdentifier, OssError, TelemetryClient, TelemetryWatcher, VendorClient,
};
use serde_json::json;
use std::time::Duration as StdDuration;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> TelemetryClient {
    let config = Config::with_base_url(&server.uri()).unwrap();
    TelemetryClient::new(VendorClient::from_config(&config).unwrap())
}

fn token() -> ApiToken {
    ApiToken::new("T1", "HomeAssistant", Utc::now() + Duration::days(365))
}

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn bucket() -> serde_json::Value {
    json!([{
        "cumulativeActivePower": {"input": {"max": 8123.456}},
        "activePower": {"input": {"min": 400.0, "max": 2500.0, "avg": 1500.0}},
        "phaseOne": {"voltage": {"avg": 230.456}, "current": {"avg": 4.2}},
        "phaseTwo": {"voltage": {"avg": 231.0}},
        "phaseThree": {"voltage": {"avg": 229.5}, "current": {}}
    }])
}

#[tokio::test]
async fn test_latest_reading_uses_last_complete_minute() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(
            "/telemetry/M-00123/2025-03-01T12:32:00Z/2025-03-01T12:33:00Z/1",
        ))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bucket()))
        .expect(1)
        .mount(&server)
        .await;

    let reading = client(&server)
        .latest_at(
            &token(),
            &MeterIdentifier::new("M-00123"),
            at("2025-03-01T12:34:56Z"),
        )
        .await
        .unwrap();

    assert_eq!(reading.total_energy_kwh(), Some(8123.46));
    assert_eq!(reading.active_power(Statistic::Avg, PowerUnit::Kilowatt), Some(1.5));
    assert_eq!(reading.active_power(Statistic::Max, PowerUnit::Watt), Some(2500.0));
    assert_eq!(
        reading.phase_value(Phase::One, Measurement::Voltage, Statistic::Avg),
        Some(230.46)
    );
    assert_eq!(
        reading.phase_value(Phase::Two, Measurement::Current, Statistic::Avg),
        None
    );
    assert_eq!(
        reading.phase_value(Phase::Three, Measurement::Current, Statistic::Avg),
        Some(0.0)
    );
}

#[tokio::test]
async fn test_empty_bucket_is_no_telemetry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/telemetry/M-00123/.+/.+/1$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let err = client(&server)
        .latest(&token(), &MeterIdentifier::new("M-00123"))
        .await
        .unwrap_err();

    assert!(matches!(err, OssError::NoTelemetry(meter) if meter == "M-00123"));
}

#[tokio::test]
async fn test_rejected_token_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/telemetry/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client(&server)
        .latest(&token(), &MeterIdentifier::new("M-00123"))
        .await
        .unwrap_err();

    assert!(matches!(err, OssError::Unauthorized(_)));
}

#[tokio::test]
async fn test_watcher_delivers_readings_until_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/telemetry/M-00123/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bucket()))
        .mount(&server)
        .await;

    let watcher = TelemetryWatcher::new(
        client(&server),
        token(),
        MeterIdentifier::new("M-00123"),
        StdDuration::from_secs(3600),
    );

    let mut seen = Vec::new();
    watcher
        .run_until(tokio::time::sleep(StdDuration::from_millis(500)), |meter, reading| {
            seen.push((meter.clone(), reading.total_energy_kwh()));
        })
        .await
        .unwrap();

    // The first tick fires immediately, the next one is an hour away
    assert_eq!(seen, vec![(MeterIdentifier::new("M-00123"), Some(8123.46))]);
}

#[tokio::test]
async fn test_watcher_stops_on_rejected_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/telemetry/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let watcher = TelemetryWatcher::new(
        client(&server),
        token(),
        MeterIdentifier::new("M-00123"),
        StdDuration::from_secs(10),
    );

    let result = watcher
        .run_until(std::future::pending::<()>(), |_, _| {
            panic!("no reading expected")
        })
        .await;

    assert!(matches!(result, Err(OssError::Unauthorized(_))));
}

#[cfg(unix)]
#[tokio::test]
async fn test_sigterm_ends_watch() {
    use oss_meter_client::services::telemetry::termination_signal;

    let waiting = tokio::spawn(termination_signal());
    // Let the handler install before the signal is sent
    tokio::time::sleep(StdDuration::from_millis(300)).await;

    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let signal = tokio::time::timeout(StdDuration::from_secs(5), waiting)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(signal, "SIGTERM");
}
