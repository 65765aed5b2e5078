use std::sync::Arc;

use anyhow::{Error, Result};
use relay_service::{
    api::run_api_server,
    clients::{bus::BusClient, connector::ConnectorClient},
    config::Config,
    models::destination::DestinationRegistry,
    utils::{retry_with_backoff, run_consumer},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let registry = Arc::new(DestinationRegistry::new());
    let connector = Arc::new(ConnectorClient::new(&config)?);

    let bus = retry_with_backoff(&config.retry_config(), || BusClient::connect(&config)).await?;

    info!("Relay service starting");

    tokio::try_join!(
        run_api_server(config.clone(), Arc::clone(&registry), Arc::clone(&connector)),
        run_consumer(&bus, &registry, &connector),
    )?;

    Ok(())
}
