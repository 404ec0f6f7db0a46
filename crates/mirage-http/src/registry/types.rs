//! Type definitions for the configuration registry.
//!
//! Compiled configurations, route identity and the registry error taxonomy.

use crate::duration::DurationError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Method, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Route identity
// ============================================================================

/// A (method, path pattern) pair. The pattern is in router syntax
/// (`/ships/{class}`), see [`super::compile::to_route_pattern`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub method: Method,
    pub path: String,
}

impl RouteKey {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

impl std::fmt::Display for RouteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A route bound once at the router level.
///
/// `default_configuration` is the configuration that introduced the route;
/// it answers requests that carry no selection header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteBinding {
    pub key: RouteKey,
    pub default_configuration: String,
}

// ============================================================================
// Compiled configuration
// ============================================================================

/// Body of a response rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Empty,
    Literal(Bytes),
    /// Handlebars source, validated when the configuration was compiled
    Template(String),
}

/// A validated response rule for one method on one path.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub status: StatusCode,
    /// Applied in order with append semantics
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: ResponseBody,
    pub delay: Duration,
}

/// Path pattern → method → rule.
pub type RouteRules = HashMap<String, HashMap<Method, Arc<CompiledRule>>>;

/// A configuration that passed validation and can be registered.
#[derive(Debug, Clone)]
pub struct CompiledConfiguration {
    pub name: String,
    pub ttl: Option<Duration>,
    /// TTL as it was written, for display
    pub ttl_source: Option<String>,
    pub paths: RouteRules,
}

impl CompiledConfiguration {
    /// Every (method, path) pair this configuration declares.
    pub fn route_keys(&self) -> impl Iterator<Item = RouteKey> + '_ {
        self.paths.iter().flat_map(|(path, methods)| {
            methods
                .keys()
                .map(move |method| RouteKey::new(method.clone(), path.clone()))
        })
    }

    pub fn rule(&self, path: &str, method: &Method) -> Option<&Arc<CompiledRule>> {
        self.paths.get(path).and_then(|methods| methods.get(method))
    }

    pub fn route_count(&self) -> usize {
        self.paths.values().map(HashMap::len).sum()
    }
}

/// A configuration currently held by the registry.
#[derive(Debug)]
pub struct ActiveConfiguration {
    pub configuration: CompiledConfiguration,
    pub registered_at: DateTime<Utc>,
}

impl ActiveConfiguration {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let ttl = self.configuration.ttl?;
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| self.registered_at.checked_add_signed(ttl))
    }
}

/// Outcome of registering one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub ttl: Option<Duration>,
    /// Routes this registration bound for the first time
    pub introduced: Vec<RouteBinding>,
    /// Name of the configuration this one overwrote
    pub replaced: Option<String>,
}

// ============================================================================
// Errors
// ============================================================================

/// Registration errors. The registry is left unchanged by all of them.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("configuration name must not be empty")]
    EmptyName,
    #[error("configuration {configuration}: invalid {field} {value:?}: {source}")]
    InvalidDuration {
        configuration: String,
        field: &'static str,
        value: String,
        #[source]
        source: DurationError,
    },
    #[error("configuration {configuration}: invalid body template for {method} {path}: {source}")]
    InvalidTemplate {
        configuration: String,
        method: String,
        path: String,
        #[source]
        source: Box<handlebars::TemplateError>,
    },
    #[error("configuration {configuration}: invalid method {method:?} for {path}")]
    InvalidMethod {
        configuration: String,
        method: String,
        path: String,
    },
    #[error("configuration {configuration}: path {path:?} must start with '/'")]
    InvalidPath { configuration: String, path: String },
    #[error("configuration {configuration}: invalid status code {status} for {method} {path}")]
    InvalidStatusCode {
        configuration: String,
        method: String,
        path: String,
        status: u16,
    },
    #[error("configuration {configuration}: invalid response header {name:?} for {method} {path}")]
    InvalidHeader {
        configuration: String,
        method: String,
        path: String,
        name: String,
    },
    #[error("route {method} {path} cannot be bound: {reason}")]
    RouteConflict {
        method: String,
        path: String,
        reason: String,
    },
}
