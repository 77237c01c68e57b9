//! Stockroom Daemon
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! STOCKROOM_JWT_SECRET=... stockroom
//!
//! # Start with custom config
//! stockroom --config /path/to/config.toml
//!
//! # Local development: identity headers instead of tokens
//! stockroom --dev-mode --storage-dir ./data
//!
//! # Mint a token for a user
//! stockroom issue-token alice manager --tenant north
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use stockroom::auth::TokenInput;
use stockroom::services::spawn_logging_listener;
use stockroom::{Config, HttpServer, JwtValidator, LedgerDb, Role, Services};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stockroom")]
#[command(about = "Stock-count ledger service")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long)]
    http_port: Option<u16>,

    /// HS256 secret for bearer tokens
    #[arg(long, env = "STOCKROOM_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Accept X-User-Id / X-User-Role / X-Tenant-Id headers
    #[arg(long)]
    dev_mode: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a bearer token for a user and exit
    IssueToken {
        user_id: String,
        /// manager or employee
        role: Role,
        #[arg(long, default_value = "default")]
        tenant: String,
    },
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("stockroom=info"))
        .context("Invalid log filter")?;

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn build_validator(config: &Config) -> anyhow::Result<JwtValidator> {
    match config.jwt_secret.clone() {
        Some(secret) => Ok(JwtValidator::new(secret, config.token_expiry_secs)?),
        None if config.dev_mode => {
            warn!("No jwt_secret set, using the built-in development secret");
            Ok(JwtValidator::new_dev())
        }
        None => anyhow::bail!("jwt_secret is required unless dev_mode is enabled"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load config
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(secret) = args.jwt_secret {
        config.jwt_secret = Some(secret);
    }
    if args.dev_mode {
        config.dev_mode = true;
    }

    init_tracing(config.log_json)?;

    let validator = build_validator(&config)?;

    if let Some(Command::IssueToken { user_id, role, tenant }) = args.command {
        let token = validator.generate_token(TokenInput {
            user_id,
            role,
            tenant,
        })?;
        println!("{}", token);
        return Ok(());
    }

    info!(
        storage_dir = %config.storage_dir.display(),
        http_port = config.http_port,
        dev_mode = config.dev_mode,
        "Starting stockroom"
    );

    // Ensure storage directory exists
    tokio::fs::create_dir_all(&config.storage_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.storage_dir.display()))?;

    // Save effective config on first start
    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let db = Arc::new(LedgerDb::open(
        &config.database_path(),
        config.pool_size,
        config.busy_timeout_ms,
    )?);
    info!(path = %config.database_path().display(), "Ledger database opened");

    let services = Arc::new(Services::new(db, config.access, config.limits));
    let _listener = spawn_logging_listener(services.events.clone());

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let server = Arc::new(
        HttpServer::new(services, validator, http_addr).with_dev_mode(config.dev_mode),
    );

    info!("HTTP API available at http://{}", http_addr);

    tokio::select! {
        result = server.run() => {
            result.context("HTTP server stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
