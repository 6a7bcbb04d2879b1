//! Exposes the command line application.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rankings_service::config::Config;
use rankings_service::metrics;
use rankings_service::services::GeneratorService;
use rankings_service::store::JsonFileStore;

use crate::healthcheck::healthcheck;
use crate::logging;
use crate::server;

/// Rankings commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web server.
    ///
    /// The data file is created with synthetic records if it does not exist yet.
    Run,

    /// Append synthetic records to the data file.
    Generate {
        /// The number of records to append.
        ///
        /// Defaults to the configured batch size.
        #[arg(long, short = 'n')]
        count: Option<usize>,
    },

    /// Check the health of a running server.
    Healthcheck {
        /// The address of the server, defaults to the configured bind address.
        #[arg(long)]
        addr: Option<SocketAddr>,

        /// Request timeout in seconds.
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },
}

/// Command line interface parser.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to your configuration file.
    #[arg(long, short, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Returns the path to the configuration file.
    fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::get(cli.config()).context("failed loading config")?;

    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: config.sentry_dsn.clone(),
        release: Some(env!("CARGO_PKG_VERSION").into()),
        ..Default::default()
    });

    // SAFETY: We are still single-threaded at this point.
    unsafe { logging::init_logging(&config) };
    if let Some(ref statsd) = config.metrics.statsd {
        let mut tags = config.metrics.custom_tags.clone();

        if let Some(hostname_tag) = config.metrics.hostname_tag.clone() {
            if tags.contains_key(&hostname_tag) {
                tracing::warn!(
                    "tag {} defined both as hostname tag and as a custom tag",
                    hostname_tag
                );
            }
            if let Some(hostname) = hostname::get().ok().and_then(|s| s.into_string().ok()) {
                tags.insert(hostname_tag, hostname);
            } else {
                tracing::error!("could not read host name");
            }
        };

        metrics::configure_statsd(&config.metrics.prefix, statsd, tags)
            .context("failed to configure statsd")?;
    }

    match cli.command {
        Command::Run => server::run(config).context("failed to start the server")?,
        Command::Generate { count } => generate(config, count)?,
        Command::Healthcheck { addr, timeout } => healthcheck(config, addr, timeout)?,
    }

    Ok(())
}

/// Appends records to the configured data file without starting the server.
fn generate(config: Config, count: Option<usize>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let generator = GeneratorService::new(JsonFileStore::new(&config.data_path), config.generator);
    let response = runtime
        .block_on(generator.append(count))
        .context("failed to generate records")?;

    println!("{}", response.message);
    println!("total records: {}", response.total_records);
    Ok(())
}
