//! Admin REST API.
//!
//! This module provides endpoints for:
//! - Submitting configuration documents (JSON or YAML)
//! - Listing, inspecting and deleting configurations
//! - Health and metrics endpoints

mod handlers;
mod router;
mod types;

pub use router::route_request;
pub use types::{ConfigurationDetail, ErrorDetail, ErrorResponse, RemovalResponse, RouteSummary};
