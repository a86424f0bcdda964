mod config;

use clap::{Parser, Subcommand};
use config::{ElevareConfig, StorageBackend};
use elevare_capabilities::Capabilities;
use elevare_core::SessionId;
use elevare_gateway::GatewayServer;
use elevare_pipeline::PipelineEngine;
use elevare_session::{
    FileSessionStore, MemorySessionStore, SessionStore, SqliteSessionStore, StateStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "elevare", about = "Elevare - session-scoped learning pipelines")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "elevare.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Inspect stored sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List stored session ids
    List,
    /// Print the stored state of one session
    Show { id: String },
}

async fn open_storage(config: &ElevareConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    let store: Arc<dyn SessionStore> = match config.storage.backend {
        StorageBackend::File => {
            Arc::new(FileSessionStore::new(config.data_dir.join("sessions")).await?)
        }
        StorageBackend::Sqlite => {
            tokio::fs::create_dir_all(&config.data_dir).await?;
            Arc::new(SqliteSessionStore::open(config.data_dir.join("sessions.db"))?)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory session storage, sessions will not survive a restart");
            Arc::new(MemorySessionStore::new())
        }
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let (config, found) = ElevareConfig::load(&cli.config).await?;
    if !found {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            info!("Starting Elevare gateway on {host}:{port}");

            let store = Arc::new(StateStore::new(open_storage(&config).await?));
            let capabilities = Capabilities::from_config(&config.capabilities)?;
            let engine = Arc::new(PipelineEngine::new(
                Arc::clone(&store),
                capabilities,
                config.pipeline.engine_config(),
            ));

            // Retry sessions whose checkpoint failed during a storage outage.
            let retry = Duration::from_secs(config.storage.persist_retry_secs.max(1));
            let flusher = Arc::clone(&store);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(retry);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    flusher.flush_dirty().await;
                }
            });

            let app = GatewayServer::build(engine);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Elevare gateway listening on {addr}");
            axum::serve(listener, app).await?;
        }
        Commands::Session { action } => {
            let store = open_storage(&config).await?;
            match action {
                SessionAction::List => {
                    let ids = store.list().await?;
                    if ids.is_empty() {
                        println!("No stored sessions.");
                    } else {
                        for id in &ids {
                            println!("{id}");
                        }
                        println!("\nTotal: {} session(s)", ids.len());
                    }
                }
                SessionAction::Show { id } => {
                    let id = SessionId::parse(&id)?;
                    match store.load(&id).await? {
                        Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
                        None => anyhow::bail!("Session '{id}' not found"),
                    }
                }
            }
        }
    }

    Ok(())
}
