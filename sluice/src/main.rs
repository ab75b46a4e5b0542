use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sluice::{DEFAULT_LOG_FILTER, SluiceConfig, bind_with_fallback, build_app_state, serve};

#[derive(Parser)]
#[command(name = "sluice", about = "Streaming LLM gateway", version)]
struct Cli {
    /// Path to a sluice.toml config file
    #[arg(long, env = "SLUICE_CONFIG")]
    config: Option<PathBuf>,

    /// First port to try; later ports are tried when it is taken
    #[arg(long, env = "SLUICE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    sluice::init_tracing(DEFAULT_LOG_FILTER);
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SluiceConfig::load(path),
        None => Ok(SluiceConfig::default()),
    };
    let mut config = match config {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(phase = "startup", event = "config_failed", %error);
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }

    let state = match build_app_state(&config) {
        Ok(state) => state,
        Err(error) => {
            tracing::error!(phase = "startup", event = "wiring_failed", %error);
            return ExitCode::FAILURE;
        }
    };

    let server = &config.server;
    let (listener, port) =
        match bind_with_fallback(&server.host, server.port, server.port_search_attempts).await {
            Ok(bound) => bound,
            Err(error) => {
                tracing::error!(phase = "startup", event = "bind_failed", %error);
                return ExitCode::FAILURE;
            }
        };
    tracing::info!(phase = "startup", event = "bound", host = %server.host, port);

    tokio::select! {
        result = serve(listener, state) => {
            if let Err(error) = result {
                tracing::error!(phase = "server", event = "stopped", %error);
                return ExitCode::FAILURE;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(phase = "server", event = "shutdown");
        }
    }
    ExitCode::SUCCESS
}
