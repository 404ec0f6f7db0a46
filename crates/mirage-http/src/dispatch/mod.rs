//! Dispatch engine.
//!
//! `RouteTable` holds exactly one router entry per bound (method, path)
//! pair; `Dispatcher` answers requests by matching the route, resolving the
//! serving configuration and rendering its rule.

mod handler;
mod table;

pub use handler::Dispatcher;
pub use table::{RouteMatch, RouteTable};

use thiserror::Error;

/// Reasons a request is answered with 404.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("no route bound for {method} {path}")]
    RouteNotBound { method: String, path: String },
    #[error("configuration {configuration:?} has no rule for {method} {path}")]
    ConfigurationMissing {
        configuration: String,
        method: String,
        path: String,
    },
}

impl DispatchError {
    /// Metrics label for the outcome
    pub fn outcome(&self) -> &'static str {
        match self {
            DispatchError::RouteNotBound { .. } => "route_not_bound",
            DispatchError::ConfigurationMissing { .. } => "configuration_missing",
        }
    }
}
