//! Vitalis daemon - health-data chat service with tiered memory

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use vitalis::agent::{HttpAgent, NoTools};
use vitalis::chat::ChatPipeline;
use vitalis::config::Config;
use vitalis::embedding::build_embedder;
use vitalis::error::Result;
use vitalis::memory::{
    EpisodicStore, MemoryCoordinator, ProceduralStore, SemanticStore, ShortTermStore,
};
use vitalis::server::ChatServer;
use vitalis::store::InMemoryStore;

/// Vitalis - A personal health assistant that remembers
#[derive(Parser)]
#[command(name = "vitalis")]
#[command(about = "A personal health assistant with tiered memory and response validation")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the chat server (default command)
    #[command(name = "serve")]
    Serve,
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

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config).await,
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,vitalis=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = config_path {
        tracing::info!("Loading config from: {}", path.display());
        return read_config(&path);
    }

    let default_paths = [
        dirs::home_dir().map(|h| h.join(".vitalis").join("config.toml")),
        dirs::config_dir().map(|c| c.join("vitalis").join("config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            tracing::info!("Loading config from: {}", path.display());
            return read_config(path);
        }
    }

    tracing::info!("No config file found, using defaults");
    Ok(Config::default())
}

fn read_config(path: &PathBuf) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        vitalis::VitalisError::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    toml::from_str(&content)
        .map_err(|e| vitalis::VitalisError::Config(format!("Failed to parse config: {e}")))
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Starting Vitalis daemon");

    let config = load_config(config_path)?;
    tracing::debug!("Config loaded: {:?}", config);

    let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
    let embedder: Arc<dyn vitalis::embedding::Embedder> =
        build_embedder(&config.embedding)?.into();
    let day = Duration::from_secs(86400);

    let short_term = Arc::new(ShortTermStore::new(
        store.clone(),
        config.memory.short_term_max_turns,
        config.memory.short_term_max_tokens,
        Duration::from_secs(config.memory.short_term_ttl_secs),
    ));
    let episodic = Arc::new(EpisodicStore::new(
        store.clone(),
        embedder.clone(),
        day * config.memory.episodic_ttl_days as u32,
    ));
    let procedural = Arc::new(ProceduralStore::new(
        store.clone(),
        day * config.memory.procedural_ttl_days as u32,
    ));
    let semantic = Arc::new(SemanticStore::new(
        store,
        embedder,
        day * config.memory.semantic_ttl_days as u32,
    ));

    let loaded = semantic.load_knowledge_base().await?;
    tracing::info!("Semantic memory ready with {loaded} verified facts");

    let coordinator = Arc::new(MemoryCoordinator::new(
        short_term,
        episodic,
        procedural,
        semantic,
        &config.memory,
    ));

    let agent = Arc::new(HttpAgent::new(&config.agent, Arc::new(NoTools))?);
    tracing::info!(
        "Agent configured against {} (model {})",
        config.agent.base_url,
        config.agent.model
    );

    let pipeline = Arc::new(ChatPipeline::new(
        coordinator.clone(),
        agent,
        &config.validation,
    ));

    let server = ChatServer::new(config.server.clone(), pipeline, coordinator);
    server.serve().await?;

    tracing::info!("Vitalis daemon stopped");
    Ok(())
}
