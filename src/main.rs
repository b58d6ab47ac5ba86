//! ringlb - a round-robin HTTP load balancer
//!
//! Usage:
//!     ringlb --config <path>
//!
//! See --help for more options.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use ringlb::config::{load_config, Config};
use ringlb::frontend::FrontendListener;
use ringlb::health::HealthProber;
use ringlb::pool::ServerPool;
use ringlb::proxy::{Dispatcher, HttpForwarder};
use ringlb::util::{init_logging, ShutdownSignal};

/// A round-robin HTTP load balancer with active health probing.
#[derive(Parser, Debug)]
#[command(name = "ringlb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config).with_context(|| {
        format!(
            "failed to load configuration from '{}'",
            cli.config.display()
        )
    })?;

    // CLI overrides config
    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.global.log_level);

    init_logging(log_level, &config.global.log_format);

    if cli.validate {
        info!("Configuration is valid");
        println!("Configuration is valid.");
        println!("  Listen: {}", config.listen);
        println!("  Backends: {}", config.backends.len());
        for backend in &config.backends {
            println!("    - {}", backend);
        }
        return Ok(());
    }

    info!(
        config_path = %cli.config.display(),
        listen = %config.listen,
        backends = config.backends.len(),
        "ringlb starting"
    );

    // A full probe pass can take probe_timeout per backend; if the
    // interval is shorter than that, passes overlap. Tolerated, but
    // worth flagging.
    let full_pass = config.health.probe_timeout * config.backends.len() as u32;
    if config.health.probe_interval <= full_pass {
        warn!(
            interval = ?config.health.probe_interval,
            worst_case_pass = ?full_pass,
            "probe interval does not cover a worst-case probe pass, passes may overlap"
        );
    }

    run(config)
}

/// Run the load balancer with the given configuration.
fn run(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(run_async(config))
}

/// Async entry point for the load balancer.
async fn run_async(config: Config) -> Result<()> {
    let shutdown = ShutdownSignal::new();

    // The pool is fixed before any traffic or probing starts.
    let pool = Arc::new(ServerPool::from_addresses(config.backends.iter().copied()));

    let prober = HealthProber::new(
        Arc::clone(&pool),
        config.health.probe_interval,
        config.health.probe_timeout,
    );
    let prober_handle = tokio::spawn(prober.run(shutdown.subscribe()));

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&pool),
        HttpForwarder::default(),
        config.retry.max_retries,
        config.retry.backoff_delay,
    ));

    let listener = FrontendListener::bind(config.listen, dispatcher)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.listen))?;
    let listener_handle = tokio::spawn(listener.run(shutdown.subscribe()));

    info!("ringlb is running");
    info!("press Ctrl+C to stop");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("received shutdown signal");
        }
        Err(e) => {
            error!(error = %e, "failed to listen for shutdown signal");
        }
    }

    shutdown.shutdown();

    let _ = listener_handle.await;
    let _ = prober_handle.await;

    info!("ringlb shut down complete");
    Ok(())
}
