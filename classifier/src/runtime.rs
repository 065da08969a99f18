use clap::Parser;
use tokio::signal;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::runtime::{
    cli::Cli,
    conf::{Conf, ConfigError},
};

pub mod capabilities;
pub mod cli;
pub mod conf;

pub struct Runtime {
    pub cli: Cli,
    pub conf: Conf,
}

impl Runtime {
    pub fn new() -> Result<Self, ConfigError> {
        let cli = Cli::parse();
        let (conf, cli) = Conf::new(cli)?;

        Ok(Runtime { cli, conf })
    }
}

/// Installs the global subscriber. Records emitted through `log` (the eBPF
/// log forwarder) are bridged into the same pipeline.
pub fn init_tracing(log_level: Level) {
    let mut fmt_layer = fmt::layer().with_ansi(std::env::var("NO_COLOR").is_err());
    if log_level >= Level::DEBUG {
        fmt_layer = fmt_layer.with_file(true).with_line_number(true);
    }

    let filter = EnvFilter::new(format!("warn,classifier={log_level}"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(
                event.name = "runtime.signal_failed",
                error.message = %e,
                "failed to listen for ctrl-c"
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(
                    event.name = "runtime.signal_failed",
                    error.message = %e,
                    "failed to listen for sigterm"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(event.name = "runtime.shutdown_requested", "shutdown signal received");
}
