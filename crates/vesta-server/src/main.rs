use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use vesta_client::{AlgoliaClient, CommercetoolsClient};
use vesta_core::{HttpConfig, SyncService};
use vesta_server::{create_app, run_server, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Setup logging (stderr, like every other diagnostic)
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install the log subscriber")?;

    // Parse command line arguments
    let config = Config::parse();
    let settings = config
        .sync_settings()
        .inspect_err(|e| error!("{}", e.user_message()))
        .context("Invalid index configuration")?;

    // Initialize clients
    let http = HttpConfig::default();
    let catalog = CommercetoolsClient::new(config.commercetools_credentials(), http.clone())
        .context("Invalid commercetools configuration")?;
    let search = match config.algolia_base_url.as_deref() {
        Some(base_url) => AlgoliaClient::with_base_url(
            base_url,
            &config.algolia_app_id,
            &config.algolia_write_api_key,
            &http,
        ),
        None => AlgoliaClient::new(&config.algolia_app_id, &config.algolia_write_api_key, &http),
    }
    .context("Invalid Algolia configuration")?;

    info!(
        project = %config.ctp_project_key,
        index = %settings.index.name,
        ensure_index = %settings.ensure_index,
        untyped_events = %settings.untyped_events,
        "Starting Vesta"
    );

    let sync = SyncService::new(Arc::new(catalog), Arc::new(search), settings);
    let app = create_app(AppState::new(sync));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    run_server(app, addr).await
}
