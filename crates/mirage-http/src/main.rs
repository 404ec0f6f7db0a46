use anyhow::Context;
use clap::Parser;
use mirage_http::config::Settings;
use mirage_http::Mirage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .init();

    let mirage = Mirage::bind(&settings).await?;

    if let Some(document) = settings.load_initial_configurations()? {
        let registrations = mirage
            .service()
            .submit(document)
            .with_context(|| format!("invalid configuration in {}", settings.config.display()))?;
        info!(
            "loaded {} configuration(s) from {}",
            registrations.len(),
            settings.config.display()
        );
    }

    let shutdown = mirage.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                shutdown.trigger();
            }
            Err(e) => error!("failed to listen for shutdown signal: {}", e),
        }
    });

    mirage.run().await
}
