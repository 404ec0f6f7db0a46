//! Validation of submitted configurations.
//!
//! Everything that can be rejected without looking at shared state is
//! checked here, before the registry lock is taken: durations, methods,
//! status codes, header tokens and body templates.

use super::types::{CompiledConfiguration, CompiledRule, RegistryError, ResponseBody, RouteRules};
use crate::document::{ConfigurationDocument, ResponseDocument};
use crate::duration::parse_duration;
use bytes::Bytes;
use handlebars::Template;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Parameter name given to an anonymous trailing `*` segment.
pub const WILDCARD_PARAM: &str = "wildcard";

/// Convert a declared path into router syntax.
///
/// `:name` segments become `{name}` and a `*name` segment becomes the
/// catch-all `{*name}`. Patterns already written as `{name}` pass through.
pub fn to_route_pattern(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':').filter(|n| !n.is_empty()) {
                format!("{{{name}}}")
            } else if let Some(name) = segment.strip_prefix('*') {
                let name = if name.is_empty() { WILDCARD_PARAM } else { name };
                format!("{{*{name}}}")
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Validate one configuration of a submitted document.
pub fn compile_configuration(
    name: &str,
    document: &ConfigurationDocument,
) -> Result<CompiledConfiguration, RegistryError> {
    if name.trim().is_empty() {
        return Err(RegistryError::EmptyName);
    }

    let ttl_source = document
        .ttl
        .as_deref()
        .map(str::trim)
        .filter(|ttl| !ttl.is_empty());
    let ttl = ttl_source
        .map(|ttl| {
            parse_duration(ttl).map_err(|source| RegistryError::InvalidDuration {
                configuration: name.to_string(),
                field: "ttl",
                value: ttl.to_string(),
                source,
            })
        })
        .transpose()?;

    let mut paths = RouteRules::new();
    for (declared_path, methods) in &document.paths {
        if !declared_path.starts_with('/') {
            return Err(RegistryError::InvalidPath {
                configuration: name.to_string(),
                path: declared_path.clone(),
            });
        }
        let pattern = to_route_pattern(declared_path);
        let rules = paths.entry(pattern).or_default();

        for (declared_method, response) in methods {
            let method = Method::from_bytes(declared_method.trim().to_uppercase().as_bytes())
                .map_err(|_| RegistryError::InvalidMethod {
                    configuration: name.to_string(),
                    method: declared_method.clone(),
                    path: declared_path.clone(),
                })?;
            let rule = compile_rule(name, declared_path, &method, response)?;
            rules.insert(method, Arc::new(rule));
        }
    }

    Ok(CompiledConfiguration {
        name: name.to_string(),
        ttl,
        ttl_source: ttl_source.map(str::to_string),
        paths,
    })
}

fn compile_rule(
    configuration: &str,
    path: &str,
    method: &Method,
    response: &ResponseDocument,
) -> Result<CompiledRule, RegistryError> {
    let status = StatusCode::from_u16(response.status_code).map_err(|_| {
        RegistryError::InvalidStatusCode {
            configuration: configuration.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            status: response.status_code,
        }
    })?;

    let mut headers = Vec::new();
    for (name, value) in response.response_headers.iter().flat_map(|entry| &entry.0) {
        let invalid = || RegistryError::InvalidHeader {
            configuration: configuration.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            name: name.clone(),
        };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        headers.push((header_name, header_value));
    }

    let delay = match response.delay.as_deref().map(str::trim) {
        None | Some("") => Duration::ZERO,
        Some(delay) => parse_duration(delay).map_err(|source| RegistryError::InvalidDuration {
            configuration: configuration.to_string(),
            field: "delay",
            value: delay.to_string(),
            source,
        })?,
    };

    let body = match (&response.body_template, &response.body) {
        (Some(template), literal) => {
            Template::compile(template).map_err(|source| RegistryError::InvalidTemplate {
                configuration: configuration.to_string(),
                method: method.to_string(),
                path: path.to_string(),
                source: Box::new(source),
            })?;
            if literal.is_some() {
                warn!(
                    config = %configuration,
                    path = %path,
                    method = %method,
                    "both body and bodyTemplate set, the template wins"
                );
            }
            ResponseBody::Template(template.clone())
        }
        (None, Some(literal)) => ResponseBody::Literal(Bytes::from(literal.clone())),
        (None, None) => ResponseBody::Empty,
    };

    Ok(CompiledRule {
        status,
        headers,
        body,
        delay,
    })
}
