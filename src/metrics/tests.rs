//! Tests for metrics module

use super::*;
use crate::config::{MetricBinding, MetricsConfig};
use crate::types::ParsedRecord;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record(value: Value) -> ParsedRecord {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn bindings() -> Vec<MetricBinding> {
    vec![
        MetricBinding::new("temperature_c", "TemperatureC", "None"),
        MetricBinding::new("rain_mm", "RainfallMM", "Millimeters"),
    ]
}

fn observation(name: &str, value: f64) -> Observation {
    Observation {
        namespace: "EcoFarm/Forecast".to_string(),
        name: name.to_string(),
        value,
        unit: "None".to_string(),
        location: "Samsamso Ecofarm".to_string(),
        timestamp: Utc.with_ymd_and_hms(2025, 11, 3, 7, 0, 0).unwrap(),
    }
}

// ============================================================================
// Observation Extraction Tests
// ============================================================================

#[test]
fn test_observations_for_bound_fields() {
    let run_ts = Utc.with_ymd_and_hms(2025, 11, 3, 12, 0, 0).unwrap();
    let records = vec![
        record(json!({
            "datetime": "2025-11-03T07:00:00.000Z",
            "temperature_c": 12.5,
            "rain_mm": "0.4",
            "humidity": 80
        })),
        record(json!({"temperature_c": null, "rain_mm": "n/a", "location_name": "North"})),
        record(json!({"temperature_c": 9, "location_name": "North"})),
    ];

    let obs = observations_for(&records, &bindings(), "EcoFarm/Forecast", "Samsamso Ecofarm", run_ts);

    assert_eq!(obs.len(), 3);
    assert_eq!(obs[0].name, "TemperatureC");
    assert_eq!(obs[0].timestamp, Utc.with_ymd_and_hms(2025, 11, 3, 7, 0, 0).unwrap());
    assert_eq!(obs[0].location, "Samsamso Ecofarm");
    assert_eq!(obs[1].name, "RainfallMM");
    assert_eq!(obs[1].value, 0.4);
    assert_eq!(obs[1].unit, "Millimeters");
    assert_eq!(obs[2].value, 9.0);
    assert_eq!(obs[2].location, "North");
    assert_eq!(obs[2].timestamp, run_ts);
}

#[test]
fn test_observations_without_bindings() {
    let records = vec![record(json!({"temperature_c": 1.0}))];
    assert!(observations_for(&records, &[], "ns", "loc", Utc::now()).is_empty());
}

// ============================================================================
// HTTP Sink Tests
// ============================================================================

#[tokio::test]
async fn test_http_sink_posts_batches() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/metrics"))
        .and(body_string_contains("TemperatureC"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&mock_server)
        .await;

    let sink = HttpMetricsSink::new(format!("{}/metrics", mock_server.uri()))
        .unwrap()
        .with_batch_size(2);
    let obs = vec![
        observation("TemperatureC", 1.0),
        observation("TemperatureC", 2.0),
        observation("TemperatureC", 3.0),
    ];

    sink.try_publish(&obs).await.unwrap();
}

#[tokio::test]
async fn test_http_sink_error_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("throttled"))
        .mount(&mock_server)
        .await;

    let sink = HttpMetricsSink::new(mock_server.uri()).unwrap();
    let err = sink
        .try_publish(&[observation("Humidity", 50.0)])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("503"));

    // The trait method swallows the failure
    sink.publish(&[observation("Humidity", 50.0)]).await;
}

#[tokio::test]
async fn test_http_sink_unreachable_is_swallowed() {
    let sink = HttpMetricsSink::new("http://127.0.0.1:9/metrics").unwrap();
    sink.publish(&[observation("CloudCover", 10.0)]).await;
}

#[test]
fn test_sink_from_config() {
    let sink = sink_from_config(None).unwrap();
    assert!(format!("{sink:?}").contains("TracingMetricsSink"));

    let config = MetricsConfig {
        endpoint: Some("http://localhost:4318/metrics".to_string()),
        ..MetricsConfig::default()
    };
    let sink = sink_from_config(Some(&config)).unwrap();
    assert!(format!("{sink:?}").contains("HttpMetricsSink"));

    let disabled = MetricsConfig {
        enabled: false,
        ..config
    };
    let sink = sink_from_config(Some(&disabled)).unwrap();
    assert!(format!("{sink:?}").contains("NoopMetricsSink"));
}
