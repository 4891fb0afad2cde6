//! wardend: the warden daemon.
//!
//! Assembles the warden subsystems into one process:
//! - Health monitor and its poll loop
//! - Notifier (transitions are written to the log)
//! - Restart governor and docker driver
//! - REST command API
//!
//! # Usage
//!
//! ```text
//! wardend run --config /etc/warden/warden.toml
//! wardend check --config /etc/warden/warden.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use warden_api::ApiState;
use warden_control::{DockerCliDriver, RestartCoordinator, RestartGovernor};
use warden_core::config::LoggingConfig;
use warden_core::{BoxFuture, ContainerDriver, HealthSnapshot, WardenConfig};
use warden_health::{HealthMonitor, ServerQueries, TransitionCallback};
use warden_notify::{LogSink, Notifier};

#[derive(Parser)]
#[command(name = "wardend", about = "Game server health warden")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the poll loop and the command API until interrupted.
    Run {
        /// Path to the TOML config file.
        #[arg(long, default_value = "warden.toml")]
        config: PathBuf,
    },
    /// Probe the server once and print the snapshot as JSON.
    Check {
        /// Path to the TOML config file.
        #[arg(long, default_value = "warden.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => {
            let config = load_config(&config)?;
            init_tracing(&config.logging);
            run(config).await
        }
        Command::Check { config } => {
            let config = load_config(&config)?;
            init_tracing(&config.logging);
            check(config).await
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<WardenConfig> {
    WardenConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn check(config: WardenConfig) -> anyhow::Result<()> {
    let monitor = HealthMonitor::from_config(&config.monitoring)?;
    let snapshot = monitor.evaluate().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn run(config: WardenConfig) -> anyhow::Result<()> {
    info!(
        container = %config.docker.container_name,
        ports = ?config.monitoring.tcp_ports,
        "warden starting"
    );

    // ── Initialize subsystems ──────────────────────────────────

    let monitor = Arc::new(HealthMonitor::from_config(&config.monitoring)?);
    info!(grace_secs = config.monitoring.grace_period().as_secs(), "health monitor initialized");

    let driver: Arc<dyn ContainerDriver> = Arc::new(DockerCliDriver::from_config(&config.docker));
    let governor = Arc::new(RestartGovernor::from_config(&config.security));
    info!(limit = governor.limit(), "restart governor initialized");

    let restarts = Arc::new(
        RestartCoordinator::new(governor, Arc::clone(&monitor), Arc::clone(&driver))
            .with_settle_delay(config.docker.settle_delay()),
    );

    let notifier = Arc::new(Notifier::from_config(Arc::new(LogSink), &config.notifications));
    if notifier.recipients().is_empty() {
        warn!("no notification recipients configured");
    }
    let on_change: TransitionCallback = Arc::new(move |snapshot: HealthSnapshot| {
        let notifier = Arc::clone(&notifier);
        Box::pin(async move {
            notifier.on_transition(&snapshot).await;
        }) as BoxFuture<'static, ()>
    });

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let poll_interval = config.monitoring.poll_interval();
    let poll_handle = tokio::spawn(
        Arc::clone(&monitor).run(poll_interval, Some(on_change), shutdown_rx),
    );

    // ── Start API server ───────────────────────────────────────

    let server = Arc::new(ServerQueries::from_config(
        &config.monitoring,
        &config.api_endpoints,
    ));

    let router = warden_api::build_router(ApiState {
        monitor,
        restarts,
        driver,
        server,
    });
    let addr: SocketAddr = config
        .api
        .listen
        .parse()
        .with_context(|| format!("invalid api listen address {}", config.api.listen))?;

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for the in-flight poll cycle.
    let _ = poll_handle.await;

    info!("warden stopped");
    Ok(())
}
