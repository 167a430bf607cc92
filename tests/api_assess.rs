use anyhow::Result;
use serde_json::Value;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

use harbor_sentinel::api::{ApiConfig, ApiHandle, ApiServer};
use harbor_sentinel::{ClassificationTable, ThreatAssessor};

fn read_response(stream: &mut TcpStream) -> Result<(String, String)> {
    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    let mut parts = response.splitn(2, "\r\n\r\n");
    let headers = parts.next().unwrap_or("").to_string();
    let body = parts.next().unwrap_or("").to_string();
    Ok((headers, body))
}

fn request(addr: SocketAddr, method: &str, path: &str, body: Option<&str>) -> Result<(String, String)> {
    let mut stream = TcpStream::connect(addr)?;
    let body = body.unwrap_or("");
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes())?;
    stream.shutdown(std::net::Shutdown::Write)?;
    read_response(&mut stream)
}

struct TestApi {
    assessor: Arc<ThreatAssessor>,
    api_handle: Option<ApiHandle>,
}

impl TestApi {
    fn new() -> Result<Self> {
        let assessor = Arc::new(ThreatAssessor::new(ClassificationTable::maritime_default()));
        let api_config = ApiConfig {
            addr: "127.0.0.1:0".to_string(),
        };
        let api_handle = ApiServer::new(api_config, assessor.clone()).spawn()?;
        Ok(Self {
            assessor,
            api_handle: Some(api_handle),
        })
    }

    fn addr(&self) -> SocketAddr {
        self.api_handle
            .as_ref()
            .expect("test API handle should be initialized")
            .addr
    }
}

impl Drop for TestApi {
    fn drop(&mut self) {
        if let Some(handle) = self.api_handle.take() {
            handle.stop().expect("failed to stop API server");
        }
    }
}

#[test]
fn health_reports_threshold_and_classes() -> Result<()> {
    let api = TestApi::new()?;

    let (headers, body) = request(api.addr(), "GET", "/health", None)?;
    assert!(headers.contains("200 OK"));

    let value: Value = serde_json::from_str(&body)?;
    assert_eq!(value["status"], "ok");
    assert_eq!(value["classes"]["mayin"], "CRITICAL");
    assert_eq!(value["classes"]["submarine"], "HIGH");
    assert!(value["confidence_threshold"].is_f64());

    Ok(())
}

#[test]
fn assess_round_trips_a_detection_batch() -> Result<()> {
    let api = TestApi::new()?;

    let payload = r#"{
        "image_width": 1000,
        "image_height": 1000,
        "detections": [
            {"class": "mayin", "confidence": 0.95, "bbox": [0.0, 0.0, 100.0, 100.0]},
            {"class": "jellyfish", "confidence": 0.97, "bbox": [0.0, 0.0, 200.0, 200.0]}
        ]
    }"#;
    let (headers, body) = request(api.addr(), "POST", "/assess", Some(payload))?;
    assert!(headers.contains("200 OK"));

    let value: Value = serde_json::from_str(&body)?;
    assert_eq!(value["success"], true);
    assert_eq!(value["threat_count"], 2);
    assert_eq!(value["overall_threat_level"], "CRITICAL");
    assert!((value["overall_threat_score"].as_f64().unwrap() - 0.95).abs() < 1e-9);
    // Ordered by confidence: the benign-but-confident detection leads.
    assert_eq!(value["threats"][0]["class"], "jellyfish");
    assert_eq!(value["threats"][1]["class"], "mayin");
    assert_eq!(value["threats"][1]["relative_size"], 1.0);
    assert_eq!(value["threats"][1]["bounding_box"]["width"], 100.0);

    Ok(())
}

#[test]
fn assess_honors_payload_threshold_override() -> Result<()> {
    let api = TestApi::new()?;

    let payload = r#"{
        "image_width": 1000,
        "image_height": 1000,
        "confidence_threshold": 0.5,
        "detections": [
            {"class": "mayin", "confidence": 0.3, "bbox": [0.0, 0.0, 100.0, 100.0]}
        ]
    }"#;
    let (headers, body) = request(api.addr(), "POST", "/assess", Some(payload))?;
    assert!(headers.contains("200 OK"));

    let value: Value = serde_json::from_str(&body)?;
    assert_eq!(value["threat_count"], 0);
    // Per-call override never persists.
    assert_eq!(
        api.assessor.confidence_threshold(),
        harbor_sentinel::DEFAULT_CONFIDENCE_THRESHOLD
    );

    Ok(())
}

#[test]
fn assess_rejects_unusable_payload() -> Result<()> {
    let api = TestApi::new()?;

    let (headers, body) = request(api.addr(), "POST", "/assess", Some("not json"))?;
    assert!(headers.contains("400 Bad Request"));

    let value: Value = serde_json::from_str(&body)?;
    assert_eq!(value["success"], false);
    assert!(value["error"].as_str().unwrap().contains("unusable payload"));

    Ok(())
}

#[test]
fn threshold_round_trip() -> Result<()> {
    let api = TestApi::new()?;

    let (headers, body) = request(
        api.addr(),
        "PUT",
        "/threshold",
        Some(r#"{"confidence_threshold": 0.4}"#),
    )?;
    assert!(headers.contains("200 OK"));
    let value: Value = serde_json::from_str(&body)?;
    assert_eq!(value["confidence_threshold"], 0.4);
    assert_eq!(api.assessor.confidence_threshold(), 0.4);

    let (headers, body) = request(api.addr(), "GET", "/threshold", None)?;
    assert!(headers.contains("200 OK"));
    let value: Value = serde_json::from_str(&body)?;
    assert_eq!(value["confidence_threshold"], 0.4);

    Ok(())
}

#[test]
fn threshold_rejects_out_of_range_values() -> Result<()> {
    let api = TestApi::new()?;
    let stored = api.assessor.confidence_threshold();

    let (headers, body) = request(
        api.addr(),
        "PUT",
        "/threshold",
        Some(r#"{"confidence_threshold": 1.5}"#),
    )?;
    assert!(headers.contains("400 Bad Request"));
    let value: Value = serde_json::from_str(&body)?;
    assert!(value["error"].as_str().unwrap().contains("threshold"));
    assert_eq!(api.assessor.confidence_threshold(), stored);

    Ok(())
}

#[test]
fn unknown_path_is_not_found() -> Result<()> {
    let api = TestApi::new()?;

    let (headers, body) = request(api.addr(), "GET", "/events", None)?;
    assert!(headers.contains("404 Not Found"));
    assert!(body.contains(r#""error":"not_found""#));

    Ok(())
}
