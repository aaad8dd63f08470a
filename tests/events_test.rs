#![cfg(feature = "web")]

mod common;

use pretty_assertions::assert_eq;
use serde_json::{Map, json};
use xlstock::error::LogError;
use xlstock::events::{ClientMetrics, EventKind, EventLogger, LogFailurePolicy, read_log};
use xlstock::geoip::HttpGeoIp;

use common::StubGeoIp;

fn extra(key: &str, value: usize) -> Map<String, serde_json::Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), json!(value));
    map
}

#[tokio::test]
async fn test_entry_carries_client_metrics_and_ip_info() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("submissions_log.jsonl");
    let logger = EventLogger::new(
        &path,
        StubGeoIp::answering(json!({"country": "Chile", "query": "203.0.113.7"})),
        LogFailurePolicy::Propagate,
    );
    let client = ClientMetrics {
        screen_width: Some(1280),
        screen_height: Some(720),
        user_agent: Some("Mozilla/5.0".to_string()),
    };

    logger
        .log_event(EventKind::FileUploaded, Some(client), extra("uploaded_rows", 2))
        .await
        .unwrap();

    let entries = read_log(&path).unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.event, EventKind::FileUploaded);
    assert_eq!(entry.screen_width, Some(1280));
    assert_eq!(entry.screen_height, Some(720));
    assert_eq!(entry.user_agent.as_deref(), Some("Mozilla/5.0"));
    assert_eq!(entry.ip_info["country"], json!("Chile"));
    assert_eq!(entry.extra_info, extra("uploaded_rows", 2));
}

#[tokio::test]
async fn test_missing_client_metrics_are_null() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let logger = EventLogger::new(&path, StubGeoIp::failing(), LogFailurePolicy::Propagate);

    logger
        .log_event(EventKind::StockDownloaded, None, extra("rows", 3))
        .await
        .unwrap();

    let line = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(value["event"], json!("stock_downloaded"));
    assert_eq!(value["screen_width"], json!(null));
    assert_eq!(value["screen_height"], json!(null));
    assert_eq!(value["user_agent"], json!(null));
    assert_eq!(value["ip_info"], json!({}));
    assert_eq!(value["extra_info"], json!({"rows": 3}));
}

#[tokio::test]
async fn test_unreachable_geoip_still_logs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    // Port 9 (discard) is closed on test machines, so the connection is refused.
    let logger = EventLogger::new(
        &path,
        HttpGeoIp::new("http://127.0.0.1:9/json"),
        LogFailurePolicy::Propagate,
    );

    logger
        .log_event(EventKind::FileUploaded, None, extra("uploaded_rows", 1))
        .await
        .unwrap();

    let entries = read_log(&path).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].ip_info.is_empty());
    assert_eq!(entries[0].extra_info, extra("uploaded_rows", 1));
}

#[tokio::test]
async fn test_disabled_geoip_logs_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let logger = EventLogger::new(&path, HttpGeoIp::disabled(), LogFailurePolicy::Propagate);

    logger
        .log_event(EventKind::StockDownloaded, None, Map::new())
        .await
        .unwrap();

    assert!(read_log(&path).unwrap()[0].ip_info.is_empty());
}

#[tokio::test]
async fn test_entries_are_appended() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let logger = EventLogger::new(&path, StubGeoIp::failing(), LogFailurePolicy::Propagate);

    for rows in 1..=3 {
        logger
            .log_event(EventKind::StockDownloaded, None, extra("rows", rows))
            .await
            .unwrap();
    }

    let rows: Vec<_> = read_log(&path)
        .unwrap()
        .into_iter()
        .map(|entry| entry.extra_info["rows"].clone())
        .collect();
    assert_eq!(rows, vec![json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn test_write_failure_follows_policy() {
    let dir = tempfile::tempdir().unwrap();
    // A directory cannot be opened for appending.
    let path = dir.path().to_path_buf();

    let strict = EventLogger::new(&path, StubGeoIp::failing(), LogFailurePolicy::Propagate);
    let result = strict
        .log_event(EventKind::FileUploaded, None, Map::new())
        .await;
    assert!(matches!(result, Err(LogError::Io(_))));

    let lenient = EventLogger::new(&path, StubGeoIp::failing(), LogFailurePolicy::Ignore);
    let result = lenient
        .log_event(EventKind::FileUploaded, None, Map::new())
        .await;
    assert!(result.is_ok());
}
