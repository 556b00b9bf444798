//! Memorai diagnostics - inspect tier detection and verify the local model

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde_json::json;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use memorai::config::Config;
use memorai::engine::MemoryEngine;
use memorai::error::{MemoraiError, Result};

/// Memorai - adaptive memory engine for AI agents
#[derive(Parser)]
#[command(name = "memorai")]
#[command(about = "Inspect the Memorai memory engine's tiers and health")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the active tier, fallback chain and per-tier availability
    Tiers {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the full health report as JSON
    Health,
    /// Load the local embedding model and verify its dimension
    #[command(name = "setup-local")]
    SetupLocal,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Command::Tiers { json } => tiers(config, json).await,
        Command::Health => health(config).await,
        Command::SetupLocal => setup_local(config).await,
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,memorai=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_config(path: &PathBuf) -> Result<Config> {
    tracing::info!("Loading config from: {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|e| {
        MemoraiError::Configuration(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    toml::from_str(&content)
        .map_err(|e| MemoraiError::Configuration(format!("Failed to parse config: {e}")))
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let mut config = match config_path {
        Some(path) => read_config(&path)?,
        None => {
            let default_paths = [
                dirs::home_dir().map(|h| h.join(".memorai").join("config.toml")),
                dirs::config_dir().map(|c| c.join("memorai").join("config.toml")),
                Some(PathBuf::from("config.toml")),
            ];
            match default_paths.iter().flatten().find(|p| p.exists()) {
                Some(path) => read_config(path)?,
                None => {
                    tracing::info!("No config file found, using defaults");
                    Config::default()
                }
            }
        }
    };

    // Credentials may come from the environment; the library itself never reads it
    if config.embedding.remote.api_key.is_none() {
        config.embedding.remote.api_key = std::env::var("MEMORAI_EMBEDDING_API_KEY").ok();
    }
    if config.vector_store.api_key.is_none() {
        config.vector_store.api_key = std::env::var("MEMORAI_VECTOR_API_KEY").ok();
    }
    Ok(config)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn tiers(config: Config, as_json: bool) -> Result<()> {
    let engine = MemoryEngine::new(config).await?;
    let info = engine.get_tier_info();
    if as_json {
        return print_json(&info);
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["Tier", "Name", "Priority", "Embeddings", "Configured", "Available", "Active"]);

    let yes_no = |b: bool| if b { "yes" } else { "no" };
    for status in &info.available_tiers {
        table.add_row([
            status.tier.to_string(),
            status.name.to_string(),
            status.priority.to_string(),
            yes_no(status.requires_embedding).to_string(),
            yes_no(status.configured).to_string(),
            yes_no(status.available).to_string(),
            if status.tier == info.current_tier { "*" } else { "" }.to_string(),
        ]);
    }

    println!("{table}");
    let chain: Vec<String> = info.fallback_chain.iter().map(ToString::to_string).collect();
    println!("Fallback chain: {}", chain.join(" -> "));
    println!("{}", info.message);
    Ok(())
}

async fn health(config: Config) -> Result<()> {
    let engine = MemoryEngine::new(config).await?;
    print_json(&engine.get_health())
}

#[cfg(feature = "local-model")]
async fn setup_local(config: Config) -> Result<()> {
    use memorai::embedding::{EmbeddingService, LocalEmbedding};

    let local = config.embedding.local.clone();
    let model = local.model.clone();
    tracing::info!(model = %model, "Loading local embedding model (this may take a moment on first run)...");

    let loaded = tokio::task::spawn_blocking(move || LocalEmbedding::new(&local))
        .await
        .map_err(|e| MemoraiError::Configuration(format!("model loader failed: {e}")))?;

    let report = match loaded {
        Ok(embedding) => json!({
            "model": model,
            "dimension": embedding.dimension(),
            "status": "ready",
        }),
        Err(e) => {
            tracing::warn!("Local model unavailable, the engine will fall back to Basic Memory (keyword search)");
            json!({
                "model": model,
                "status": "error",
                "error": e.to_string(),
            })
        }
    };
    print_json(&report)
}

#[cfg(not(feature = "local-model"))]
async fn setup_local(config: Config) -> Result<()> {
    print_json(&json!({
        "model": config.embedding.local.model,
        "status": "unavailable",
        "error": "memorai was built without the local-model feature",
    }))
}
