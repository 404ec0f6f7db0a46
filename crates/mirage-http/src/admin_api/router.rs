//! Route dispatch logic for the Admin API.

use super::handlers;
use super::types::not_found;
use crate::service::MirageService;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use std::sync::Arc;
use tracing::debug;

/// Parsed admin route
#[derive(Debug, PartialEq, Eq)]
enum AdminRoute {
    /// GET /health
    Health,
    /// GET /metrics
    Metrics,
    /// GET/POST /configurations
    Configurations,
    /// GET/DELETE /configurations/{name}
    Configuration(String),
}

impl AdminRoute {
    fn parse(path: &str) -> Option<Self> {
        let path = path.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(path);
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match segments.as_slice() {
            ["health"] => Some(AdminRoute::Health),
            ["metrics"] => Some(AdminRoute::Metrics),
            ["configurations"] => Some(AdminRoute::Configurations),
            ["configurations", name] if !name.is_empty() => {
                let name = urlencoding::decode(name)
                    .map(|n| n.into_owned())
                    .unwrap_or_else(|_| name.to_string());
                Some(AdminRoute::Configuration(name))
            }
            _ => None,
        }
    }
}

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    service: Arc<MirageService>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("Admin API: {} {}", method, path);

    let Some(route) = AdminRoute::parse(&path) else {
        return not_found();
    };

    match (&method, route) {
        (&Method::GET, AdminRoute::Health) => handlers::handle_health(),
        (&Method::GET, AdminRoute::Metrics) => handlers::handle_metrics(),
        (&Method::GET, AdminRoute::Configurations) => handlers::handle_list(&service),
        (&Method::POST, AdminRoute::Configurations) => handlers::handle_create(req, service).await,
        (&Method::GET, AdminRoute::Configuration(name)) => handlers::handle_get(&name, &service),
        (&Method::DELETE, AdminRoute::Configuration(name)) => {
            handlers::handle_delete(&name, &service)
        }
        _ => not_found(),
    }
}
