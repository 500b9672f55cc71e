//! Pressroom Server
//!
//! Axum server for the customer dashboard, the admin console and the public
//! signup and mailing-list endpoints, wired to the release pipeline in
//! crates/core.

mod api;
mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pressroom_core::llm::ProviderRouter;
use pressroom_core::pipeline::ReleaseStatus;
use pressroom_core::state::PressroomDb;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::{PressroomConfig, CONFIG_PATH};

#[derive(Parser, Clone)]
#[command(author, version, about = "Pressroom - press releases drafted, reviewed and distributed")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the Pressroom server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "PRESSROOM_PORT")]
        port: u16,
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1", env = "PRESSROOM_BIND")]
        bind: String,
    },
    /// Create .pressroom/ with a config file and the database
    Init {
        /// Admin token to store in the config
        #[arg(long)]
        admin_token: Option<String>,
    },
    /// Insert any missing default prompt configs
    SeedPrompts,
    /// Print the release lifecycle table
    Statuses,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pressroom_server=info,pressroom_core=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn load_config() -> anyhow::Result<PressroomConfig> {
    let config = PressroomConfig::load().await.with_env();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn open_db(config: &PressroomConfig) -> anyhow::Result<Arc<PressroomDb>> {
    let path = config.db_path();
    let db = PressroomDb::open_at(&path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    Ok(Arc::new(db))
}

async fn run_server(port: u16, bind: &str) -> anyhow::Result<()> {
    let config = load_config().await?;
    let db = open_db(&config)?;

    match db.seed_prompts() {
        Ok(count) if count > 0 => tracing::info!(count, "Seeded default prompts"),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to seed prompts"),
    }
    if config.admin_token.is_none() {
        tracing::warn!("No admin token configured; the admin API will reject every request");
    }

    let model = config.model_config()?;
    tracing::info!(provider = %model.provider, model = %model.model, "LLM configured");
    let llm = Arc::new(ProviderRouter::new(model, config.llm_timeout()));

    let state = AppState::new(db, llm, config, PathBuf::from(CONFIG_PATH));
    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Pressroom listening");
    tracing::info!("OpenAPI document at http://{}/api/v1/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

async fn init_project(admin_token: Option<String>) -> anyhow::Result<()> {
    let dir = std::path::Path::new(".pressroom");
    tokio::fs::create_dir_all(dir)
        .await
        .context("Failed to create .pressroom directory")?;

    let gitignore = dir.join(".gitignore");
    if !gitignore.exists() {
        tokio::fs::write(&gitignore, "# Never commit secrets\n.env\n*.env\nconfig.json\n*.db\n")
            .await
            .context("Failed to write .gitignore")?;
    }

    let mut config = PressroomConfig::load().await;
    if admin_token.is_some() {
        config.merge(PressroomConfig {
            admin_token,
            ..Default::default()
        });
    }
    config.save().await?;

    let db = open_db(&config)?;
    let seeded = db.seed_prompts()?;

    println!("Pressroom initialized");
    println!("   Config:   {}", CONFIG_PATH);
    println!("   Database: {}", config.db_path().display());
    println!("   Prompts:  {} seeded", seeded);
    if config.admin_token.is_none() {
        println!("\nSet PRESSROOM_ADMIN_TOKEN or re-run with --admin-token to enable the admin API");
    }
    println!("\nRun `pressroom serve` to start the server");
    Ok(())
}

fn print_statuses() {
    println!("{:<18} {:<20} {:<8} NEXT ACTIONS", "STATUS", "LABEL", "COLOR");
    for status in ReleaseStatus::all() {
        let info = status.info();
        let actions: Vec<&str> = info.next_actions.iter().map(|a| a.as_str()).collect();
        println!(
            "{:<18} {:<20} {:<8} {}",
            status.as_str(),
            info.label,
            info.color,
            if actions.is_empty() { "-".to_string() } else { actions.join(", ") }
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let _ = dotenvy::from_path(".pressroom/.env");
    init_tracing();

    let args = Args::parse();
    match args.command {
        Some(CliCommand::Serve { port, bind }) => run_server(port, &bind).await,
        None => run_server(8080, "127.0.0.1").await,
        Some(CliCommand::Init { admin_token }) => init_project(admin_token).await,
        Some(CliCommand::SeedPrompts) => {
            let config = load_config().await?;
            let seeded = open_db(&config)?.seed_prompts()?;
            println!("Seeded {} prompt configs", seeded);
            Ok(())
        }
        Some(CliCommand::Statuses) => {
            print_statuses();
            Ok(())
        }
    }
}
