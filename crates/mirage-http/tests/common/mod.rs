//! Shared helpers: an in-process Mirage bound to ephemeral ports.

#![allow(dead_code)]

use mirage_http::{Mirage, MirageService, ShutdownHandle};
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const SELECTION_HEADER: &str = "x-mirage-config";

pub struct TestServer {
    pub stub: SocketAddr,
    pub admin: SocketAddr,
    pub service: Arc<MirageService>,
    pub client: Client,
    shutdown: ShutdownHandle,
    task: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(Arc::new(MirageService::default())).await
    }

    pub async fn start_with(service: Arc<MirageService>) -> Self {
        let stub_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let admin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mirage = Mirage::from_listeners(
            Arc::clone(&service),
            stub_listener,
            admin_listener,
            Duration::from_secs(1),
        );
        let stub = mirage.stub_addr().unwrap();
        let admin = mirage.admin_addr().unwrap();
        let shutdown = mirage.shutdown_handle();
        let task = tokio::spawn(mirage.run());

        Self {
            stub,
            admin,
            service,
            client: Client::new(),
            shutdown,
            task,
        }
    }

    pub fn stub_url(&self, path: &str) -> String {
        format!("http://{}{}", self.stub, path)
    }

    pub fn admin_url(&self, path: &str) -> String {
        format!("http://{}{}", self.admin, path)
    }

    /// POST a document to the admin API.
    pub async fn submit(&self, document: &str) -> reqwest::Response {
        self.client
            .post(self.admin_url("/configurations"))
            .header("Content-Type", "application/yaml")
            .body(document.to_string())
            .send()
            .await
            .unwrap()
    }

    /// GET on the serving surface, optionally selecting a configuration.
    pub async fn get(&self, path: &str, config: Option<&str>) -> (u16, String) {
        let mut request = self.client.get(self.stub_url(path));
        if let Some(config) = config {
            request = request.header(SELECTION_HEADER, config);
        }
        let response = request.send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.task.await.unwrap().unwrap();
    }
}
