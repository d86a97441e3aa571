use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use stickylb::config;
use stickylb::metrics::MetricsCollector;
use stickylb::shared::SharedArena;
use stickylb::status::run_status_server;
use stickylb::upstream::Upstream;
use stickylb::util::logging::init_logging;
use tokio::sync::broadcast;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "stickylb",
    version,
    about = "Session-affinity upstream peer selection with a status endpoint"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Override the configured log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    if cli.validate {
        println!("configuration ok: {} upstream(s)", config.upstreams.len());
        for upstream in &config.upstreams {
            let backups = upstream.servers.iter().filter(|s| s.backup).count();
            println!(
                "  {}: {} primary, {} backup, affinity cookie {:?}",
                upstream.name,
                upstream.servers.len() - backups,
                backups,
                upstream.affinity.cookie
            );
        }
        return Ok(());
    }

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.global.log_level);
    init_logging(level, config.global.log_format.clone());

    info!(
        config = %cli.config.display(),
        upstreams = config.upstreams.len(),
        "starting stickylb"
    );

    let arena = SharedArena::new(config.global.shared_region_size);
    let metrics = Arc::new(MetricsCollector::new());

    let mut upstreams = Vec::with_capacity(config.upstreams.len());
    for upstream_config in &config.upstreams {
        let upstream = Upstream::new(upstream_config, &arena, Arc::clone(&metrics))
            .with_context(|| format!("building upstream {}", upstream_config.name))?;
        upstreams.push(Arc::new(upstream));
    }

    info!(
        arena_used = arena.used(),
        arena_capacity = arena.capacity(),
        "upstreams ready"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let server = if config.status.enabled {
        let handle = tokio::spawn(run_status_server(
            config.status.address,
            upstreams.clone(),
            Arc::clone(&metrics),
            shutdown_tx.subscribe(),
        ));
        Some(handle)
    } else {
        info!("status server disabled");
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("listening for shutdown signal")?;
    info!("shutdown signal received");

    let _ = shutdown_tx.send(());
    if let Some(handle) = server {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "status server failed"),
            Err(e) => error!(error = %e, "status server task panicked"),
        }
    }

    info!("shutdown complete");
    Ok(())
}
