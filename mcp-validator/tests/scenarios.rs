//! End-to-end validation runs against in-process mock servers

mod common;

use common::*;
use mcp_compliance_validator::{
    InMemoryRecorder, IssueLevel, TransportType, ValidationOptions, Validator, codes,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn validator() -> Validator {
    Validator::new(config()).unwrap()
}

#[tokio::test]
async fn test_compliant_server() {
    let (url, _) = MockServer::default().spawn().await;

    let result = validator()
        .validate(url.as_str(), &ValidationOptions::default())
        .await
        .unwrap();

    assert!(result.success, "unexpected issues: {:?}", result.issues);
    assert!(result.issues.is_empty());
    assert_eq!(result.transport, TransportType::StreamableHttp);
    assert!(result.endpoint.ends_with("/mcp"));
    assert_eq!(result.protocol_version, "2025-06-18");
    assert_eq!(result.capabilities, vec!["tools", "resources"]);
    assert_eq!(result.server_info.unwrap().name, "mock-server");
    assert!(!result.requires_auth);
    assert!(result.duration > Duration::ZERO);
}

#[tokio::test]
async fn test_oldest_version_with_subscribable_resources() {
    let (url, _) = MockServer::default()
        .with_version("2024-11-05")
        .with_capabilities(json!({ "tools": {}, "resources": { "subscribe": true } }))
        .with_server_info("test-server", "1.0.0")
        .spawn()
        .await;

    let result = validator()
        .validate(url.as_str(), &ValidationOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.protocol_version, "2024-11-05");
    assert_eq!(result.capabilities, vec!["tools", "resources"]);
    assert_eq!(result.error_count(), 0);
    let info = result.server_info.unwrap();
    assert_eq!((info.name.as_str(), info.version.as_str()), ("test-server", "1.0.0"));
}

#[tokio::test]
async fn test_unsupported_protocol_version() {
    let (url, _) = MockServer::default().with_version("1.0.0").spawn().await;

    let result = validator()
        .validate(url.as_str(), &ValidationOptions::default())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.issues.len(), 1);
    let issue = result.find_issue(codes::INVALID_PROTOCOL).unwrap();
    assert_eq!(issue.level, IssueLevel::Error);
    assert!(issue.message.contains("1.0.0"));
    assert!(issue.message.contains("2025-06-18"));
    assert!(issue.is_enhanced());
    assert_eq!(result.protocol_version, "1.0.0");
}

#[tokio::test]
async fn test_missing_required_capability() {
    let (url, _) = MockServer::default()
        .with_capabilities(json!({ "tools": {} }))
        .spawn()
        .await;
    let options = ValidationOptions::default().with_required_capabilities(["tools", "resources"]);

    let result = validator().validate(url.as_str(), &options).await.unwrap();

    assert!(!result.success);
    let missing: Vec<_> = result
        .issues
        .iter()
        .filter(|i| i.code == codes::MISSING_CAPABILITY)
        .collect();
    assert_eq!(missing.len(), 1);
    assert!(missing[0].message.contains("'resources'"));
    assert_eq!(result.capabilities, vec!["tools"]);
}

#[tokio::test]
async fn test_empty_capabilities_warn() {
    let (url, _) = MockServer::default()
        .with_capabilities(json!({}))
        .spawn()
        .await;

    let result = validator()
        .validate(url.as_str(), &ValidationOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    let issue = result.find_issue(codes::NO_CAPABILITIES).unwrap();
    assert_eq!(issue.level, IssueLevel::Warning);
    assert!(result.capabilities.is_empty());
    assert_eq!(result.status_string(), "WARNING");
}

#[tokio::test]
async fn test_strict_mode_fails_on_warnings() {
    let (url, _) = MockServer::default()
        .with_capabilities(json!({}))
        .spawn()
        .await;
    let options = ValidationOptions::default().with_strict(true);

    let result = validator().validate(url.as_str(), &options).await.unwrap();

    assert!(!result.success);
    assert!(result.has_issue(codes::NO_CAPABILITIES));
    assert_eq!(result.error_count(), 0);
}

#[tokio::test]
async fn test_missing_server_info() {
    let (url, _) = MockServer::default().without_server_info().spawn().await;

    let result = validator()
        .validate(url.as_str(), &ValidationOptions::default())
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.has_issue(codes::MISSING_SERVER_INFO));
    assert!(result.server_info.is_none());
}

#[tokio::test]
async fn test_initialize_timeout() {
    let (url, _) = MockServer::default()
        .with_delay(Duration::from_secs(2))
        .spawn()
        .await;
    let options = ValidationOptions::default()
        .with_timeout(Duration::from_millis(100))
        .with_transport(TransportType::StreamableHttp);

    let result = validator().validate(url.as_str(), &options).await.unwrap();

    assert!(!result.success);
    let issue = result.find_issue(codes::INITIALIZE_FAILED).unwrap();
    assert!(issue.message.contains("timed out"), "{}", issue.message);
    assert!(result.duration < Duration::from_secs(2));
}

#[tokio::test]
async fn test_detection_prefers_streamable_http() {
    let (url, _) = MockServer::default().spawn_with_sse().await;

    let result = validator()
        .validate(url.as_str(), &ValidationOptions::default())
        .await
        .unwrap();

    assert_eq!(result.transport, TransportType::StreamableHttp);
    assert!(result.endpoint.ends_with("/mcp"));
}

#[tokio::test]
async fn test_sse_handshake() {
    let (url, hits) = MockServer::default().spawn_sse().await;

    let result = validator()
        .validate(url.as_str(), &ValidationOptions::default())
        .await
        .unwrap();

    assert!(result.success, "unexpected issues: {:?}", result.issues);
    assert_eq!(result.transport, TransportType::Sse);
    assert!(result.endpoint.ends_with("/sse"));
    assert_eq!(result.protocol_version, "2025-06-18");
    assert_eq!(result.capabilities, vec!["tools", "resources"]);
    assert_eq!(hits.initialize(), 1);
}

#[tokio::test]
async fn test_sse_transport_override() {
    let (url, _) = MockServer::default().spawn_sse().await;
    let options = ValidationOptions::default().with_transport(TransportType::Sse);

    let result = validator().validate(url.as_str(), &options).await.unwrap();

    assert!(result.success);
    assert_eq!(result.transport, TransportType::Sse);
}

#[tokio::test]
async fn test_auth_required() {
    let (url, _) = MockServer::default().requiring_auth().spawn().await;

    let result = validator()
        .validate(url.as_str(), &ValidationOptions::default())
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.requires_auth);
    assert_eq!(result.auth_type.as_deref(), Some("Bearer"));
    let issue = result.find_issue(codes::AUTH_REQUIRED).unwrap();
    assert_eq!(issue.level, IssueLevel::Warning);
    assert!(!result.has_issue(codes::INITIALIZE_FAILED));
}

#[tokio::test]
async fn test_failing_listing_is_a_warning() {
    let (url, _) = MockServer::default()
        .with_capabilities(json!({ "tools": {}, "prompts": {} }))
        .failing("prompts/list")
        .spawn()
        .await;

    let result = validator()
        .validate(url.as_str(), &ValidationOptions::default())
        .await
        .unwrap();

    assert!(result.success);
    let issue = result.find_issue(codes::PROMPTS_LIST_FAILED).unwrap();
    assert_eq!(issue.level, IssueLevel::Warning);
    assert!(issue.message.contains("listing unavailable"));
    assert!(!result.has_issue(codes::TOOLS_LIST_FAILED));
}

#[tokio::test]
async fn test_nothing_to_detect() {
    let url = spawn(axum::Router::new()).await;

    let result = validator()
        .validate(url.as_str(), &ValidationOptions::default())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.transport, TransportType::Unknown);
    let issue = result.find_issue(codes::TRANSPORT_DETECTION_FAILED).unwrap();
    assert!(issue.message.contains("/mcp"));
    assert!(issue.message.contains("/sse"));
}

#[tokio::test]
async fn test_metrics_recorded_once_per_run() {
    let recorder = Arc::new(InMemoryRecorder::new());
    let validator = validator().with_metrics(recorder.clone());
    let (good, _) = MockServer::default().spawn().await;
    let (bad, _) = MockServer::default().with_version("1.0.0").spawn().await;

    let options = ValidationOptions::default();
    validator.validate(good.as_str(), &options).await.unwrap();
    validator.validate(bad.as_str(), &options).await.unwrap();

    let snapshot = recorder.snapshot();
    assert_eq!(snapshot.validations_total, 2);
    assert_eq!(snapshot.validations_succeeded, 1);
    assert_eq!(snapshot.validations_failed, 1);
    assert_eq!(snapshot.error_issues, 1);
}

#[tokio::test]
async fn test_bad_input_is_an_error() {
    let validator = validator();

    assert!(
        validator
            .validate("file:///tmp/server", &ValidationOptions::default())
            .await
            .is_err()
    );
    assert!(
        validator
            .validate(
                "http://localhost:1",
                &ValidationOptions::default().with_timeout(Duration::ZERO)
            )
            .await
            .is_err()
    );
}
