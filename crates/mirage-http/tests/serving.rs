//! Integration tests for the serving surface: selection, templates, delays,
//! TTL expiry and concurrent registration.

mod common;

use common::{TestServer, SELECTION_HEADER};
use std::time::{Duration, Instant};

const SHARED_ROUTE: &str = r#"
alpha:
  paths:
    /api/status:
      GET:
        statusCode: 200
        body: alpha
        responseHeaders:
          - Content-Type: text/plain
          - X-Served-By: alpha
beta:
  paths:
    /api/status:
      GET:
        statusCode: 500
        body: beta
"#;

#[tokio::test]
async fn test_default_configuration_answers_without_header() {
    let server = TestServer::start().await;
    assert_eq!(server.submit(SHARED_ROUTE).await.status(), 201);

    let response = server
        .client
        .get(server.stub_url("/api/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(response.headers()["x-served-by"], "alpha");
    assert_eq!(response.text().await.unwrap(), "alpha");

    server.stop().await;
}

#[tokio::test]
async fn test_header_selects_other_configuration() {
    let server = TestServer::start().await;
    server.submit(SHARED_ROUTE).await;

    assert_eq!(
        server.get("/api/status", Some("beta")).await,
        (500, "beta".to_string())
    );
    assert_eq!(
        server.get("/api/status", Some("alpha")).await,
        (200, "alpha".to_string())
    );
    // An unknown selection is a miss, not a fallback
    assert_eq!(server.get("/api/status", Some("gamma")).await, (404, String::new()));

    server.stop().await;
}

#[tokio::test]
async fn test_unregistered_route_is_404_for_any_selection() {
    let server = TestServer::start().await;
    server.submit(SHARED_ROUTE).await;

    assert_eq!(server.get("/api/other", None).await, (404, String::new()));
    assert_eq!(server.get("/api/other", Some("alpha")).await, (404, String::new()));

    let response = server
        .client
        .post(server.stub_url("/api/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    server.stop().await;
}

#[tokio::test]
async fn test_body_template_renders_path_parameters() {
    let server = TestServer::start().await;
    let response = server
        .submit(
            r#"
starships:
  paths:
    /ships/:class/:designation:
      GET:
        statusCode: 200
        bodyTemplate: "The {{designation}} is {{class}} class."
"#,
        )
        .await;
    assert_eq!(response.status(), 201);

    assert_eq!(
        server.get("/ships/Galaxy/Enterprise", None).await,
        (200, "The Enterprise is Galaxy class.".to_string())
    );
    assert_eq!(
        server.get("/ships/Intrepid/Voyager", Some("starships")).await,
        (200, "The Voyager is Intrepid class.".to_string())
    );

    server.stop().await;
}

#[tokio::test]
async fn test_delay_holds_response() {
    let server = TestServer::start().await;
    server
        .submit("slow:\n  paths:\n    /slow:\n      GET:\n        statusCode: 200\n        body: done\n        delay: 2s\n")
        .await;

    let early = server
        .client
        .get(server.stub_url("/slow"))
        .timeout(Duration::from_secs(1))
        .send()
        .await;
    assert!(early.is_err());

    let started = Instant::now();
    let response = server
        .client
        .get(server.stub_url("/slow"))
        .timeout(Duration::from_secs(3))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "done");
    assert!(started.elapsed() >= Duration::from_secs(2));

    server.stop().await;
}

#[tokio::test]
async fn test_ttl_expiry_keeps_binding_for_other_configurations() {
    let server = TestServer::start().await;
    server
        .submit(
            r#"
permanent:
  paths:
    /weather:
      GET:
        statusCode: 200
        body: sunny
"#,
        )
        .await;
    server
        .submit(
            r#"
storm:
  ttl: 500ms
  paths:
    /weather:
      GET:
        statusCode: 200
        body: stormy
"#,
        )
        .await;

    assert_eq!(
        server.get("/weather", Some("storm")).await,
        (200, "stormy".to_string())
    );

    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert_eq!(server.get("/weather", Some("storm")).await, (404, String::new()));
    assert_eq!(server.get("/weather", None).await, (200, "sunny".to_string()));

    let names: Vec<String> = server
        .client
        .get(server.admin_url("/configurations"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(names, vec!["permanent".to_string(), "storm".to_string()]);

    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_registration_binds_route_once() {
    let server = TestServer::start().await;

    let submissions = (0..10).map(|i| {
        let client = server.client.clone();
        let url = server.admin_url("/configurations");
        async move {
            let document = format!(
                "config-{i}:\n  paths:\n    /shared:\n      GET:\n        statusCode: 200\n        body: \"{i}\"\n"
            );
            client.post(url).body(document).send().await.unwrap().status()
        }
    });
    let handles: Vec<_> = submissions.map(tokio::spawn).collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), 201);
    }

    assert_eq!(server.service.routes().len(), 1);
    for i in 0..10 {
        let name = format!("config-{i}");
        let response = server
            .client
            .get(server.stub_url("/shared"))
            .header(SELECTION_HEADER, &name)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), i.to_string());
    }

    server.stop().await;
}

#[tokio::test]
async fn test_wildcard_route_and_encoded_parameters() {
    let server = TestServer::start().await;
    server
        .submit(
            r#"
files:
  paths:
    /files/*path:
      GET:
        statusCode: 200
        bodyTemplate: "file={{path}}"
    /people/:name:
      GET:
        statusCode: 200
        bodyTemplate: "hello {{name}}"
"#,
        )
        .await;

    assert_eq!(
        server.get("/files/logs/today.txt", None).await,
        (200, "file=logs/today.txt".to_string())
    );
    assert_eq!(
        server.get("/people/Jean-Luc%20Picard", None).await,
        (200, "hello Jean-Luc Picard".to_string())
    );

    server.stop().await;
}
