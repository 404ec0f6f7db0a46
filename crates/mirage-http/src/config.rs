//! Process settings from command-line flags and environment variables.

use crate::document::{self, ConfigurationSet};
use crate::duration::parse_duration;
use crate::selection::{SelectionResolver, DEFAULT_SELECTION_HEADER};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Mirage programmable HTTP stub server
#[derive(Parser, Debug, Clone)]
#[command(name = "mirage")]
#[command(
    author,
    version,
    about = "Programmable HTTP stub server with header-selected configurations"
)]
pub struct Settings {
    /// Interface both listeners bind to
    #[arg(long, env = "MIRAGE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port of the stub (serving) surface
    #[arg(short, long, env = "MIRAGE_PORT", default_value = "8080")]
    pub port: u16,

    /// Port of the admin API
    #[arg(long, env = "MIRAGE_ADMIN_PORT", default_value = "8081")]
    pub admin_port: u16,

    /// Configuration document loaded at startup when the file exists
    #[arg(short, long, env = "MIRAGE_CONFIG", default_value = "./mirage.yaml")]
    pub config: PathBuf,

    /// Request header that selects the serving configuration
    #[arg(long, env = "MIRAGE_SELECTION_HEADER", default_value = DEFAULT_SELECTION_HEADER)]
    pub selection_header: String,

    /// How long open connections may drain on shutdown
    #[arg(long, env = "MIRAGE_SHUTDOWN_GRACE", default_value = "10s", value_parser = parse_duration)]
    pub shutdown_grace: Duration,

    /// Log level, overridden by RUST_LOG
    #[arg(long, env = "MIRAGE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Settings {
    pub fn selection_resolver(&self) -> anyhow::Result<SelectionResolver> {
        SelectionResolver::new(&self.selection_header)
            .with_context(|| format!("invalid selection header {:?}", self.selection_header))
    }

    /// The startup document, if the configured file exists.
    ///
    /// A file that exists but cannot be read or decoded is an error.
    pub fn load_initial_configurations(&self) -> anyhow::Result<Option<ConfigurationSet>> {
        if !self.config.exists() {
            info!(
                "no configuration file at {}, starting empty",
                self.config.display()
            );
            return Ok(None);
        }
        let set = document::from_file(&self.config)
            .with_context(|| format!("failed to load {}", self.config.display()))?;
        Ok(Some(set))
    }
}
