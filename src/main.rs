//! Context engine daemon entry point: wires `Engine` up to the Discord
//! adapter and runs the ingestion loop. Replying through an LLM provider is
//! out of scope here (spec §1 non-goal) — this binary keeps the durable
//! store and mirror in sync with the platform and leaves provider wiring
//! to the embedding application.

use anyhow::Context as _;
use clap::Parser;
use ctxbridge::config::EngineConfig;
use ctxbridge::engine::Engine;
use ctxbridge::messaging::discord::DiscordAdapter;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ctxbridge", version)]
#[command(about = "Conversation context engine for chat<->LLM bridges")]
struct Cli {
    /// Path to ctxengine.toml (optional — falls back to ./ctxengine.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = load_config(&cli.config)?;
    tracing::info!(database_path = %config.database_path.display(), "configuration loaded");

    let engine = Engine::open(config).await.context("failed to open engine")?;

    let token = std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN must be set")?;
    let adapter = Arc::new(DiscordAdapter::new(token, Arc::new(ctxbridge::mentions::MemberCache::new())));

    let mut inbound = adapter.start().await.context("failed to start discord gateway")?;
    tracing::info!("discord gateway connected, awaiting messages");

    loop {
        tokio::select! {
            Some(raw) = inbound.recv() => {
                let channel_id = raw.channel_id.clone();
                match engine.on_message(raw, adapter.as_ref()).await {
                    Ok(stored) => {
                        tracing::debug!(channel_id = %channel_id, row_id = %stored.row_id, "message ingested");
                    }
                    Err(error) => {
                        tracing::warn!(channel_id = %channel_id, %error, "failed to ingest message");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let default_directive = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive)),
        )
        .init();
}

fn load_config(config_path: &Option<PathBuf>) -> anyhow::Result<EngineConfig> {
    if let Some(path) = config_path {
        EngineConfig::load_from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display()))
    } else {
        EngineConfig::load().context("failed to load configuration")
    }
}
