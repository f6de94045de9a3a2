//! mta-server - Massage Therapy Academy backend
//!
//! REST + WebSocket API for the course catalogue, quizzes, subscriptions,
//! chat, notifications and the class schedule.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mta_common::config::{self, RootFolderInitializer, RootFolderResolver, TomlConfig};
use mta_common::db::RuntimeSettings;
use mta_gen::import::Importer;
use mta_gen::{AnthropicClient, AnthropicConfig, ContentGenerator};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mta_server::services::{accounts, maintenance};
use mta_server::AppState;

/// Compiled default port
const DEFAULT_PORT: u16 = 5780;

/// Command-line arguments for mta-server
#[derive(Parser, Debug)]
#[command(name = "mta-server")]
#[command(about = "Massage Therapy Academy backend")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the TOML `port`)
    #[arg(short, long, env = "MTA_PORT")]
    port: Option<u16>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", env = "MTA_BIND")]
    bind: IpAddr,
}

fn init_tracing(toml: &TomlConfig) {
    let level = toml.logging.level.trim();
    let default = format!(
        "mta_server={level},mta_common={level},mta_gen={level},tower_http=info",
        level = if level.is_empty() { "info" } else { level }
    );
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml = TomlConfig::load_or_default();
    init_tracing(&toml);

    info!("Starting mta-server (Massage Therapy Academy)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve root folder and open the database
    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder.clone())
        .with_toml(&toml)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db = mta_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    // Step 2: Runtime settings and secrets
    let settings = RuntimeSettings::load(&db).await?;
    info!("Runtime settings: {:?}", settings);

    let mut state = AppState::new(db.clone(), settings.clone());

    match config::resolve_secret(&db, config::ANTHROPIC_API_KEY, toml.anthropic_api_key.as_deref()).await? {
        Some(key) => {
            let client = AnthropicClient::new(AnthropicConfig::new(
                key,
                settings.generator_model.clone(),
                settings.generator_max_tokens,
            ))?;
            info!("Content generator enabled (model {})", client.model());
            state = state.with_generator(ContentGenerator::new(Arc::new(client)));
        }
        None => warn!("No Anthropic API key configured; content generation disabled"),
    }

    match config::resolve_secret(&db, config::WEBHOOK_SECRET, toml.webhook_secret.as_deref()).await? {
        Some(secret) => state = state.with_webhook_secret(secret),
        None => warn!("No webhook secret configured; payment webhook rejects all calls"),
    }

    match Importer::new() {
        Ok(importer) => state = state.with_importer(importer),
        Err(e) => warn!("External import disabled: {}", e),
    }

    // Step 3: Bootstrap administrator
    if let Some(email) = toml.admin_email.as_deref().filter(|e| config::is_valid_key(e)) {
        match std::env::var("MTA_ADMIN_PASSWORD") {
            Ok(password) => {
                if let Some(admin) = accounts::bootstrap_admin(&db, email, &password).await? {
                    info!("Bootstrap administrator ready: {}", admin.email);
                }
            }
            Err(_) => warn!("admin_email set but MTA_ADMIN_PASSWORD missing; no admin created"),
        }
    }

    // Step 4: Background maintenance
    let maintenance = maintenance::spawn(state.clone());

    // Step 5: Serve
    let port = args.port.or(toml.port).unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::new(args.bind, port);
    let app = mta_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    maintenance.abort();
    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
