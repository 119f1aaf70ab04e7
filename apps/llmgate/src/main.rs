use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use llmgate_core::{
    AppState, ConfigSource, ConfigStore, Dispatcher, UpstreamClientConfig, WreqUpstreamClient,
    gateway_router,
};

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("llmgate failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let store = Arc::new(ConfigStore::load(ConfigSource::Path(PathBuf::from(
        &cli.config,
    )))?);
    let client = Arc::new(WreqUpstreamClient::new(UpstreamClientConfig::default())?);
    let dispatcher = Arc::new(Dispatcher::new(store.clone(), client));

    let app = gateway_router(AppState { store, dispatcher });

    let bind = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(addr = %bind, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("llmgate=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
