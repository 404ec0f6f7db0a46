// Library exports for the server binary, the linter and integration tests

// ===== Core dispatch engine =====
pub mod dispatch;
pub mod expiry;
pub mod registry;
pub mod render;
pub mod selection;

// ===== Intake, surfaces and process plumbing =====
pub mod admin_api;
pub mod config;
pub mod document;
pub mod duration;
pub mod metrics;
pub mod server;
pub mod service;

pub use document::ConfigurationSet;
pub use registry::{Registration, Registry, RegistryError};
pub use server::{Mirage, ShutdownHandle};
pub use service::MirageService;
