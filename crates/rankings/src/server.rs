use std::net::SocketAddr;

use anyhow::{Context, Result};
use rankings_service::config::Config;
use rankings_service::metric;
use rankings_service::services::create_services;

use crate::endpoints;

/// Creates the services, ensures the data file exists and serves HTTP based on loaded config.
pub fn run(config: Config) -> Result<()> {
    // Log this metric before actually starting the server. This allows to see restarts even if
    // bootstrapping fails.
    metric!(counter("server.starting") += 1);

    let megs = 1024 * 1024;
    let web_pool = tokio::runtime::Builder::new_multi_thread()
        .thread_name("rankings-web")
        .enable_all()
        .thread_stack_size(8 * megs)
        .build()?;

    let services = create_services(&config);

    let created = web_pool
        .block_on(services.generator.bootstrap())
        .context("failed to create initial data file")?;
    if created {
        tracing::info!(path = %config.data_path.display(), "Created initial data file");
    }

    let socket = config
        .bind
        .parse::<SocketAddr>()
        .context("invalid bind address")?;
    let server = axum_server::bind(socket)
        .serve(endpoints::create_app(services, &config).into_make_service());
    tracing::info!("Starting HTTP server on {}", socket);

    web_pool.block_on(server)?;
    tracing::info!("System shutdown complete");

    Ok(())
}
