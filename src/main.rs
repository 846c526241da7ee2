mod config;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use codebridge_client::{HttpSessionClient, SessionClient};
use codebridge_core::{Orchestrator, RetryPolicy};
use codebridge_gateway_discord::{DiscordConfig, DiscordGateway};
use config::Config;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Codebridge - bridge chat platforms to a remote conversational AI backend
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "codebridge.yaml")]
    config: String,

    /// Backend base URL (overrides config file)
    #[arg(long)]
    backend_url: Option<String>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("codebridge=info".parse().expect("valid directive")),
        )
        .init();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;

    // CLI backend URL overrides config
    if let Some(url) = args.backend_url {
        config.backend.base_url = url;
    }

    let Some(bot_token) = config.discord.resolve_token() else {
        return Err("Discord bot token not set; provide DISCORD_TOKEN or discord.token".into());
    };

    let client: Arc<dyn SessionClient> = Arc::new(HttpSessionClient::new(&config.backend.base_url));

    // Fail fast when the backend is unreachable rather than connecting the
    // bot and erroring on the first message.
    info!(base_url = %config.backend.base_url, "checking backend connectivity");
    if let Err(e) = client.list_sessions().await {
        return Err(format!(
            "cannot reach backend at {}: {e}; is the session server running?",
            config.backend.base_url
        )
        .into());
    }
    info!("backend reachable");

    let policy = RetryPolicy {
        max_attempts: config.backend.poll_attempts,
        interval: Duration::from_millis(config.backend.poll_interval_ms),
    };
    let orchestrator = Arc::new(Orchestrator::new(
        client,
        policy,
        config.backend.default_model.clone(),
    ));

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    let gateway = DiscordGateway::new(DiscordConfig::new(bot_token), orchestrator, cancel);
    gateway.start().await?;

    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
