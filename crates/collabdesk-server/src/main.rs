//! Collabdesk - server entry point
//!
//! `collabdesk` runs the API server and the stuck-campaign sweeper.
//! `collabdesk issue-key <email> [name]` creates the user if needed and
//! prints a fresh API key for them.

use anyhow::{bail, Context, Result};
use collabdesk_api::{create_router, issue_api_key, AppState};
use collabdesk_common::config::{Config, LoggingConfig};
use collabdesk_core::{mailer, DispatchEngine, FixedIntervalPacer, StuckCampaignSweeper};
use collabdesk_storage::{DatabasePool, DbDispatchStore, UserRepository};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Scopes granted to keys issued from the command line
const DEFAULT_SCOPES: &[&str] = &["*"];

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_logging(&config.logging);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("serve") => serve(config).await,
        Some("issue-key") => {
            let email = args.get(1).context("usage: collabdesk issue-key <email> [name]")?;
            issue_key(config, email, args.get(2).map(String::as_str)).await
        }
        Some(other) => bail!("Unknown command: {}", other),
    }
}

async fn connect(config: &Config) -> Result<DatabasePool> {
    let db_pool = DatabasePool::new(&config.database).await?;
    if config.database.run_migrations {
        db_pool.migrate().await?;
    }
    Ok(db_pool)
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Collabdesk server...");

    let db_pool = connect(&config).await?;

    let mailer = mailer::from_config(&config.mail)?;
    let pacer = Arc::new(FixedIntervalPacer::from_millis(config.dispatch.send_delay_ms));
    let store = Arc::new(DbDispatchStore::new(db_pool.pool().clone()));
    let engine = Arc::new(DispatchEngine::new(store, mailer, pacer));

    info!(
        provider = ?config.mail.provider,
        send_delay_ms = config.dispatch.send_delay_ms,
        "Dispatch engine ready"
    );

    // Start stuck-campaign sweeper
    let sweeper_handle = {
        let store = Arc::new(DbDispatchStore::new(db_pool.pool().clone()));
        let sweeper = StuckCampaignSweeper::new(store, &config.dispatch);
        tokio::spawn(async move {
            sweeper.run().await;
        })
    };

    let state = Arc::new(AppState { db_pool, engine });
    let app = create_router(state, &config.api);

    let addr = format!("{}:{}", config.server.bind_address, config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server on {}", addr))?;
    info!("Starting API server on {}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("API server error: {}", e);
    }

    sweeper_handle.abort();
    info!("Collabdesk server shutdown complete");

    Ok(())
}

async fn issue_key(config: Config, email: &str, name: Option<&str>) -> Result<()> {
    let db_pool = connect(&config).await?;

    let user = UserRepository::new(db_pool.clone())
        .get_or_create(email, name)
        .await?;

    let scopes = DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect();
    let (plain_key, api_key) = issue_api_key(&db_pool, user.id, "cli", scopes).await?;

    info!(user_id = %user.id, api_key_id = %api_key.id, "Issued API key");
    println!("{}", plain_key);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},collabdesk=debug", config.level)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
