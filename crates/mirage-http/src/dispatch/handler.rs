//! Per-request handling on the serving surface.

use super::{DispatchError, RouteMatch, RouteTable};
use crate::metrics;
use crate::registry::{CompiledRule, Registry};
use crate::render::{RenderScope, Renderer};
use crate::selection::SelectionResolver;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::HeaderMap;
use hyper::{Method, Response, StatusCode};
use std::sync::Arc;
use tracing::debug;

/// Answers requests: route match → selection → registry lookup → render.
pub struct Dispatcher {
    registry: Arc<Registry>,
    routes: Arc<RouteTable>,
    selection: SelectionResolver,
    renderer: Renderer,
}

/// Everything needed to render, resolved under short-lived read locks.
struct Resolved {
    configuration: String,
    matched: RouteMatch,
    rule: Arc<CompiledRule>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        routes: Arc<RouteTable>,
        selection: SelectionResolver,
    ) -> Self {
        Self {
            registry,
            routes,
            selection,
            renderer: Renderer::new(),
        }
    }

    pub fn selection(&self) -> &SelectionResolver {
        &self.selection
    }

    fn resolve(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<Resolved, DispatchError> {
        let matched = self.routes.route(method, path)?;
        let configuration = self
            .selection
            .resolve(headers, &matched.binding.default_configuration)
            .into_owned();
        let pattern = &matched.binding.key.path;

        let rule = self
            .registry
            .lookup(&configuration, pattern, method)
            .ok_or_else(|| DispatchError::ConfigurationMissing {
                configuration: configuration.clone(),
                method: method.to_string(),
                path: pattern.clone(),
            })?;

        Ok(Resolved {
            configuration,
            matched,
            rule,
        })
    }

    /// Answer one request. Never fails: anything unresolvable is a 404 with
    /// an empty body.
    pub async fn handle(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
    ) -> Response<Full<Bytes>> {
        let resolved = match self.resolve(method, path, headers) {
            Ok(resolved) => resolved,
            Err(e) => {
                match &e {
                    DispatchError::RouteNotBound { .. } => {
                        debug!(path = %path, method = %method, "{}", e)
                    }
                    DispatchError::ConfigurationMissing { configuration, .. } => {
                        debug!(config = %configuration, path = %path, method = %method, "{}", e)
                    }
                }
                metrics::record_request(method.as_str(), 404, e.outcome());
                return not_found();
            }
        };

        debug!(
            config = %resolved.configuration,
            path = %path,
            method = %method,
            "serving rule"
        );
        let scope = RenderScope {
            configuration: &resolved.configuration,
            method: method.as_str(),
            path: &resolved.matched.binding.key.path,
        };
        let response = self
            .renderer
            .respond(&resolved.rule, &resolved.matched.params, scope)
            .await;
        metrics::record_request(method.as_str(), response.status().as_u16(), "served");
        response
    }
}

fn not_found() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}
