//! Integration tests for the admin API and startup loading.

mod common;

use clap::Parser;
use common::TestServer;
use mirage_http::admin_api::{ConfigurationDetail, ErrorResponse, RemovalResponse};
use mirage_http::config::Settings;
use mirage_http::Mirage;
use serde_json::{json, Value};
use std::io::Write;

const FLEET: &str = r#"
zulu:
  paths:
    /z:
      GET:
        statusCode: 200
alpha:
  ttl: 10m
  paths:
    /ships/:class:
      GET:
        statusCode: 200
        bodyTemplate: "{{class}}"
      DELETE:
        statusCode: 204
"#;

#[tokio::test]
async fn test_submit_returns_sorted_names() {
    let server = TestServer::start().await;

    let response = server.submit(FLEET).await;
    assert_eq!(response.status(), 201);
    let names: Vec<String> = response.json().await.unwrap();
    assert_eq!(names, vec!["alpha".to_string(), "zulu".to_string()]);

    server.stop().await;
}

#[tokio::test]
async fn test_submit_accepts_json() {
    let server = TestServer::start().await;

    let response = server
        .client
        .post(server.admin_url("/configurations"))
        .json(&json!({
            "jsonconfig": {
                "paths": {"/json": {"post": {"statusCode": 201, "body": "{\"ok\":true}"}}}
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let response = server
        .client
        .post(server.stub_url("/json"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ok"], true);

    server.stop().await;
}

#[tokio::test]
async fn test_invalid_document_is_rejected_without_side_effects() {
    let server = TestServer::start().await;

    let response = server
        .submit(
            r#"
good:
  paths:
    /good:
      GET:
        statusCode: 200
bad:
  paths:
    /bad:
      GET:
        statusCode: 200
        bodyTemplate: "{{#if}}"
"#,
        )
        .await;
    assert_eq!(response.status(), 400);
    let error: ErrorResponse = response.json().await.unwrap();
    assert_eq!(error.errors.len(), 1);
    assert_eq!(error.errors[0].code, "400");
    assert!(error.errors[0].message.contains("bad"));

    assert_eq!(server.get("/good", None).await.0, 404);
    assert!(server.service.known_names().is_empty());
    assert!(server.service.routes().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_documents_are_400() {
    let server = TestServer::start().await;

    for document in ["", "not: [valid", "alpha:\n  paths:\n    /x:\n      GET: {}\n"] {
        let response = server.submit(document).await;
        assert_eq!(response.status(), 400, "document {document:?}");
        let error: ErrorResponse = response.json().await.unwrap();
        assert_eq!(error.errors[0].code, "400");
    }

    server.stop().await;
}

#[tokio::test]
async fn test_list_get_and_delete() {
    let server = TestServer::start().await;
    server.submit(FLEET).await;

    let names: Vec<String> = server
        .client
        .get(server.admin_url("/configurations"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(names, vec!["alpha".to_string(), "zulu".to_string()]);

    let response = server
        .client
        .get(server.admin_url("/configurations/alpha"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let detail: ConfigurationDetail = response.json().await.unwrap();
    assert_eq!(detail.name, "alpha");
    assert_eq!(detail.ttl.as_deref(), Some("10m"));
    assert!(detail.expires_at.is_some());
    assert_eq!(detail.routes.len(), 2);

    let response = server
        .client
        .delete(server.admin_url("/configurations/alpha"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let removal: RemovalResponse = response.json().await.unwrap();
    assert!(removal.removed);

    let removal: RemovalResponse = server
        .client
        .delete(server.admin_url("/configurations/alpha"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!removal.removed);

    let response = server
        .client
        .get(server.admin_url("/configurations/alpha"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(server.get("/ships/Galaxy", None).await.0, 404);

    // Removed names are still known
    let names: Vec<String> = server
        .client
        .get(server.admin_url("/configurations"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(names.len(), 2);

    server.stop().await;
}

#[tokio::test]
async fn test_health_metrics_and_unknown_paths() {
    let server = TestServer::start().await;
    server.submit(FLEET).await;
    server.get("/z", None).await;

    let health: Value = server
        .client
        .get(server.admin_url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health, json!({"status": "ok"}));

    let metrics = server
        .client
        .get(server.admin_url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("mirage_requests_total"));
    assert!(metrics.contains("mirage_registrations_total"));

    let response = server
        .client
        .get(server.admin_url("/stubs"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let error: ErrorResponse = response.json().await.unwrap();
    assert_eq!(error.errors[0].code, "404");

    let response = server
        .client
        .put(server.admin_url("/configurations"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    server.stop().await;
}

#[tokio::test]
async fn test_startup_file_is_loaded() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "preloaded:\n  paths:\n    /hello:\n      GET:\n        statusCode: 200\n        body: from file"
    )
    .unwrap();

    let settings = Settings::try_parse_from([
        "mirage",
        "--port",
        "0",
        "--admin-port",
        "0",
        "--config",
        file.path().to_str().unwrap(),
    ])
    .unwrap();

    let mirage = Mirage::bind(&settings).await.unwrap();
    let document = settings.load_initial_configurations().unwrap().unwrap();
    mirage.service().submit(document).unwrap();

    let stub = mirage.stub_addr().unwrap();
    let shutdown = mirage.shutdown_handle();
    let task = tokio::spawn(mirage.run());

    let body = reqwest::get(format!("http://{stub}/hello"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "from file");

    shutdown.trigger();
    task.await.unwrap().unwrap();
}
