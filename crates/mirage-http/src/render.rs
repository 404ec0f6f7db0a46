//! Response rendering.
//!
//! Turns a compiled rule and the request's path parameters into a response:
//! waits out the configured delay, sets the status, appends headers in
//! declared order and produces the body. Body templates use Handlebars
//! syntax (`{{designation}}`) over the path parameters; undefined names
//! render as empty strings and no HTML escaping is applied.

use crate::metrics;
use crate::registry::{CompiledRule, ResponseBody};
use bytes::Bytes;
use handlebars::{Handlebars, RenderError};
use http_body_util::Full;
use hyper::Response;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;

/// A body template failed at request time.
#[derive(Debug, Error)]
#[error("failed to render body template: {0}")]
pub struct RenderFailure(#[from] RenderError);

/// Where a rule is being rendered, for logs.
#[derive(Debug, Clone, Copy)]
pub struct RenderScope<'a> {
    pub configuration: &'a str,
    pub method: &'a str,
    pub path: &'a str,
}

/// Stateless renderer; one instance is shared by all requests.
pub struct Renderer {
    handlebars: Handlebars<'static>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// Body for `rule` given the path parameters.
    pub fn render_body(
        &self,
        rule: &CompiledRule,
        params: &[(String, String)],
    ) -> Result<Bytes, RenderFailure> {
        match &rule.body {
            ResponseBody::Empty => Ok(Bytes::new()),
            ResponseBody::Literal(body) => Ok(body.clone()),
            ResponseBody::Template(template) => {
                let data: BTreeMap<&str, &str> = params
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str()))
                    .collect();
                let rendered = self.handlebars.render_template(template, &data)?;
                Ok(Bytes::from(rendered))
            }
        }
    }

    /// Build the full response, sleeping for the rule's delay first.
    pub async fn respond(
        &self,
        rule: &CompiledRule,
        params: &[(String, String)],
        scope: RenderScope<'_>,
    ) -> Response<Full<Bytes>> {
        if !rule.delay.is_zero() {
            metrics::record_delay(rule.delay.as_millis() as u64);
            tokio::time::sleep(rule.delay).await;
        }

        let body = match self.render_body(rule, params) {
            Ok(body) => body,
            Err(e) => {
                error!(
                    config = %scope.configuration,
                    method = %scope.method,
                    path = %scope.path,
                    "{}", e
                );
                metrics::record_render_failure(scope.method);
                Bytes::new()
            }
        };

        let mut response = Response::new(Full::new(body));
        *response.status_mut() = rule.status;
        let headers = response.headers_mut();
        for (name, value) in &rule.headers {
            headers.append(name.clone(), value.clone());
        }
        response
    }
}
