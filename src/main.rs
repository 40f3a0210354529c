//! Catalog-Lens: suggestion and pass-through services for a federated catalog
//!
//! This is the main entry point for the application.

use anyhow::Result;
use catalog_lens::{
    config,
    lens::LensLoader,
    web::{create_router, AppState},
};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().skip(1).any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }

    // Initialize logging; RUST_LOG wins over the debug setting
    let (filter, filter_handle) = reload::Layer::new(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    info!("Starting Catalog-Lens v{}", catalog_lens::VERSION);

    // Load configuration
    let settings = config::load_settings()?;
    if settings.general.debug && std::env::var_os("RUST_LOG").is_none() {
        filter_handle.reload(EnvFilter::new("debug"))?;
    }
    info!("Loaded configuration for instance: {}", settings.general.instance_name);

    // Load lenses
    let registry = LensLoader::load(&settings)?;

    // Create application state
    let state = AppState::new(settings.clone(), registry)?;
    info!("Application state initialized");

    // Create router
    let app = create_router(state);

    // Bind address
    let addr = SocketAddr::new(settings.server.bind_address.parse()?, settings.server.port);

    info!("Starting server on http://{}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Print usage information
fn print_usage() {
    println!(
        r#"
Catalog-Lens v{}
Suggestion and pass-through services for a federated catalog

USAGE:
    catalog-lens [OPTIONS]

OPTIONS:
    -h, --help             Print help information

ENVIRONMENT VARIABLES:
    CATALOG_LENS_SETTINGS_PATH  Path to settings.yml
    CATALOG_LENS_DEBUG          Enable debug logging (true/false)
    CATALOG_LENS_PORT           Server port
    CATALOG_LENS_BIND_ADDRESS   Bind address
    SOLR_URL                    Catalog Solr core URL
    EDS_URL                     EDS API base URL
    FIREHOSE_URL                Inventory service URL
    RUST_LOG                    Log filter (overrides CATALOG_LENS_DEBUG)
"#,
        catalog_lens::VERSION
    );
}
