//! Netkeeper Daemon
//!
//! Keeps a headless device reachable: supervises the client connection and
//! falls back to a self-hosted access point when no network is available.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod breaker;
mod config;
mod nm;
mod probe;
mod status;
mod supervisor;

use config::DaemonConfig;
use supervisor::{Supervisor, SupervisorHandle};

#[derive(Parser)]
#[command(name = "netkeeperd")]
#[command(about = "Netkeeper daemon - connectivity supervision and AP fallback")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/netkeeper/config.toml")]
    config: PathBuf,

    /// Web UI listen address (overrides the config file)
    #[arg(short, long)]
    listen: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl netkeeper_web::Control for SupervisorHandle {
    fn status(&self) -> netkeeper_common::StatusSnapshot {
        SupervisorHandle::status(self)
    }

    fn submit(
        &self,
        request: netkeeper_common::ConnectRequest,
    ) -> netkeeper_common::Result<()> {
        SupervisorHandle::submit(self, request)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("Netkeeper daemon v{}", env!("CARGO_PKG_VERSION"));

    let mut config = DaemonConfig::load(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.web_listen = listen;
    }

    let controller = Arc::new(nm::NmcliController::new(
        config.ap.wifi_interface.clone(),
        config.timing.command_timeout(),
    ));
    let probe = Arc::new(probe::SystemProbe::new(
        config.ap.wired_interface.clone(),
        config.timing.command_timeout(),
    ));

    let shutdown = CancellationToken::new();
    let (supervisor, handle) =
        Supervisor::new(controller, probe, config.clone(), shutdown.clone());

    let supervisor_task = tokio::spawn(supervisor.run());
    let web_task = tokio::spawn(netkeeper_web::serve(
        config.web_listen.clone(),
        Arc::new(handle),
        shutdown.clone(),
    ));

    info!("Daemon started, web UI on {}", config.web_listen);

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    shutdown.cancel();

    let _ = supervisor_task.await;
    if let Ok(Err(e)) = web_task.await {
        tracing::error!("Web server error: {e}");
    }

    info!("Daemon shutdown complete");
    Ok(())
}
