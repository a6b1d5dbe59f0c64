//! Shared fixtures for the HTTP tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use ids_scoring::config::Config;
use ids_scoring::logic::service::ScoringService;
use ids_scoring::{create_router, AppState};

pub const FEATURES: [&str; 28] = [
    "time_start", "time_end", "ue_total", "src_port", "dst_port", "protocol",
    "packet_size", "flow_duration", "total_bytes_fwd", "total_bytes_bwd",
    "total_pkts_fwd", "total_pkts_bwd", "pkts_per_sec", "bytes_per_sec",
    "flow_pkts_per_sec", "flow_bytes_per_sec", "jitter_ms", "delay_ms",
    "src_ip_numeric", "src_ip_freq", "dst_ip_numeric", "dst_ip_freq",
    "fwd_bwd_packets_ratio", "fwd_bwd_bytes_ratio", "avg_packet_size",
    "flow_duration_log", "is_common_port", "port_range",
];

pub const METADATA: [&str; 5] = ["label", "confidence", "rule", "latency_ms", "timestamp"];

/// Shipped demo artifact
pub fn artifact(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("models").join(name)
}

/// Config over the demo artifacts, logging into a fresh temp dir
pub fn demo_config() -> (TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        port: 0,
        features_path: artifact("features.txt"),
        model_path: artifact("lightgbm_demo.txt"),
        model_name: None,
        scaler_path: artifact("scaler_params.json"),
        fallback_model_path: None,
        decision_log_path: dir.path().join("runs").join("decisions.csv"),
    };
    (dir, config)
}

pub fn app_for(config: &Config) -> (Router, AppState) {
    let service = ScoringService::initialize(config)
        .unwrap_or_else(|e| panic!("service failed to start: {}", e));
    let state = AppState::new(service);
    (create_router(state.clone()), state)
}

/// The reference flow
pub fn example_flow() -> Value {
    json!({
        "time_start": 1.23, "time_end": 2.34, "ue_total": 5, "src_port": 80,
        "dst_port": 443, "protocol": 6, "packet_size": 512, "flow_duration": 1.11,
        "total_bytes_fwd": 2000, "total_bytes_bwd": 1500, "total_pkts_fwd": 20,
        "total_pkts_bwd": 15, "pkts_per_sec": 25.3, "bytes_per_sec": 1200.4,
        "flow_pkts_per_sec": 25.3, "flow_bytes_per_sec": 1200.4, "jitter_ms": 2.5,
        "delay_ms": 1.1, "src_ip_numeric": 12345, "src_ip_freq": 0.1,
        "dst_ip_numeric": 54321, "dst_ip_freq": 0.2, "fwd_bwd_packets_ratio": 1.33,
        "fwd_bwd_bytes_ratio": 1.22, "avg_packet_size": 430.2, "flow_duration_log": 0.33,
        "is_common_port": 1, "port_range": 2
    })
}

/// A heavy flow that the demo model should flag
pub fn flood_flow() -> Value {
    let mut flow = example_flow();
    let obj = flow.as_object_mut().unwrap();
    obj.insert("pkts_per_sec".into(), json!(5000.0));
    obj.insert("bytes_per_sec".into(), json!(2_500_000.0));
    obj.insert("total_pkts_fwd".into(), json!(3000));
    obj.insert("total_bytes_fwd".into(), json!(60000));
    obj.insert("fwd_bwd_packets_ratio".into(), json!(12.0));
    obj.insert("jitter_ms".into(), json!(25.0));
    flow
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: &Router, uri: &str, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Wait for the detached log appends to land
pub async fn wait_for_lines(path: &Path, expected: usize) -> Vec<String> {
    for _ in 0..200 {
        let lines = read_lines(path);
        if lines.len() >= expected {
            return lines;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    read_lines(path)
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|content| content.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Data rows of a decision log, parsed as CSV
pub fn read_rows(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

pub fn expected_header() -> String {
    FEATURES.iter().chain(METADATA.iter()).copied().collect::<Vec<_>>().join(",")
}
