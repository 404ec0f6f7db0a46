//! Admin API handlers.

use super::types::*;
use crate::document;
use crate::metrics::collect_metrics;
use crate::service::MirageService;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{info, warn};

/// POST /configurations - Submit a configuration document
pub async fn handle_create(
    req: Request<Incoming>,
    service: Arc<MirageService>,
) -> Response<Full<Bytes>> {
    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let set = match document::from_slice(&body) {
        Ok(set) => set,
        Err(e) => {
            warn!("rejected configuration document: {}", e);
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    match service.submit(set) {
        Ok(registrations) => {
            let mut names: Vec<String> = registrations.into_iter().map(|r| r.name).collect();
            names.sort();
            info!("accepted configurations {:?}", names);
            json_response(StatusCode::CREATED, &names)
        }
        Err(e) => {
            warn!("rejected configuration document: {}", e);
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

/// GET /configurations - Every configuration name ever registered
pub fn handle_list(service: &MirageService) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &service.known_names())
}

/// GET /configurations/{name} - Active configuration detail
pub fn handle_get(name: &str, service: &MirageService) -> Response<Full<Bytes>> {
    match service.describe(name) {
        Some(active) => json_response(StatusCode::OK, &ConfigurationDetail::from(active.as_ref())),
        None => error_response(
            StatusCode::NOT_FOUND,
            &format!("configuration {name:?} is not active"),
        ),
    }
}

/// DELETE /configurations/{name} - Remove a configuration
pub fn handle_delete(name: &str, service: &MirageService) -> Response<Full<Bytes>> {
    let removed = service.remove(name);
    json_response(
        StatusCode::OK,
        &RemovalResponse {
            name: name.to_string(),
            removed,
        },
    )
}

/// GET /health - Health check
pub fn handle_health() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &serde_json::json!({"status": "ok"}))
}

/// GET /metrics - Prometheus metrics
pub fn handle_metrics() -> Response<Full<Bytes>> {
    build_response_with_headers(
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        collect_metrics(),
    )
}
