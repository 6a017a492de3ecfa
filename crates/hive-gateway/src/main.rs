use std::net::SocketAddr;

use clap::Parser;
use hive_core::config::HiveConfig;
use hive_gateway::app;
use hive_gateway::cli::{self, Cli, Command, ConfigCommand};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "hive_gateway=info".into()))
        .init();

    let cli = Cli::parse();
    let config_path = std::env::var("HIVE_CONFIG").ok();

    match cli.command {
        Command::Serve => serve(config_path).await,
        Command::Config { cmd } => match cmd {
            ConfigCommand::Check => cli::run_config_check(config_path.as_deref()),
        },
    }
}

async fn serve(config_path: Option<String>) -> anyhow::Result<()> {
    let config = HiveConfig::load(config_path.as_deref())?;
    let bind_addr: SocketAddr = "0.0.0.0:8080".parse()?;

    let state = app::AppState::bootstrap(config).await?;
    write_pid_file(&state.config.data_dir)?;
    let reminder_cancel = tokio_util::sync::CancellationToken::new();
    let sweeper = state.reminder_sweeper.clone();
    let sweep_cancel = reminder_cancel.clone();
    tokio::spawn(async move { sweeper.run(sweep_cancel).await });

    let router = app::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "Hive gateway listening");

    let server = axum::serve(listener, router);
    tokio::select! {
        result = server => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    reminder_cancel.cancel();
    state.scheduler.shutdown();
    remove_pid_file(&state.config.data_dir);
    Ok(())
}

const PID_FILE_NAME: &str = "hive.pid";

/// Writes the running process id to `<dataDir>/hive.pid`, overwriting any
/// stale file left behind by an unclean prior shutdown.
fn write_pid_file(data_dir: &str) -> anyhow::Result<()> {
    let path = std::path::Path::new(data_dir).join(PID_FILE_NAME);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, std::process::id().to_string())?;
    Ok(())
}

/// Removes `<dataDir>/hive.pid` on graceful shutdown. A missing file is not
/// an error — nothing else in the shutdown sequence depends on it.
fn remove_pid_file(data_dir: &str) {
    let path = std::path::Path::new(data_dir).join(PID_FILE_NAME);
    if let Err(e) = std::fs::remove_file(&path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove pid file");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
