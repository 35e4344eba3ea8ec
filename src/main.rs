//! # nightfury
//!
//! Session orchestration server binary: opens the store, starts the
//! HTTP/WebSocket server and shuts it down cleanly on ctrl+c or SIGTERM.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use nightfury_server::ServerConfig;
use nightfury_store::{Database, Repository};
use nightfury_telemetry::{init_telemetry, parse_level, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "nightfury", about = "Game session orchestration server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the server.
    Server(ServerArgs),
    /// Print the version and exit.
    Version,
}

#[derive(Args, Debug)]
struct ServerArgs {
    /// Address to bind.
    #[arg(long, env = "NIGHTFURY_BIND_ADDRESS", default_value = "0.0.0.0")]
    bind_address: String,

    /// Port to bind (0 for auto-assign).
    #[arg(short = 'p', long, env = "NIGHTFURY_BIND_PORT", default_value_t = 5624)]
    bind_port: u16,

    /// Path to the SQLite database.
    #[arg(long, env = "NIGHTFURY_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Default log level (RUST_LOG overrides).
    #[arg(long, env = "NIGHTFURY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = "NIGHTFURY_LOG_JSON")]
    log_json: bool,
}

impl ServerArgs {
    fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".nightfury").join("nightfury.db")
        })
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.bind_address.clone(),
            port: self.bind_port,
            ..Default::default()
        }
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Version => {
            println!("nightfury {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Server(args) => run_server(args).await,
    }
}

async fn run_server(args: ServerArgs) -> Result<()> {
    let telemetry = TelemetryConfig {
        log_level: parse_level(&args.log_level)?,
        json: args.log_json,
        ..Default::default()
    };
    init_telemetry(&telemetry)?;

    let db_path = args.db_path();
    ensure_parent_dir(&db_path)?;
    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "Database opened");

    let store: Arc<dyn Repository> = Arc::new(db);
    let handle = nightfury_server::start(args.server_config(), store)
        .await
        .context("Failed to start server")?;
    tracing::info!(addr = %handle.addr, "nightfury ready");

    wait_for_signal().await?;

    let purged = handle.shutdown().await.context("Shutdown failed")?;
    tracing::info!(purged, "Shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("Failed to listen for ctrl+c")?,
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_flags_parse() {
        let cli = Cli::try_parse_from([
            "nightfury",
            "server",
            "--bind-address",
            "127.0.0.1",
            "-p",
            "9000",
            "--db-path",
            "/tmp/nf.db",
            "--log-json",
        ])
        .unwrap();
        let Command::Server(args) = cli.command else {
            panic!("expected server subcommand");
        };
        let config = args.server_config();
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert_eq!(args.db_path(), PathBuf::from("/tmp/nf.db"));
        assert!(args.log_json);
    }

    #[test]
    fn version_subcommand_parses() {
        let cli = Cli::try_parse_from(["nightfury", "version"]).unwrap();
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn missing_subcommand_rejected() {
        assert!(Cli::try_parse_from(["nightfury"]).is_err());
    }
}
