// ABOUTME: Server binary wiring configuration, storage, keys, and the OAuth engine into an axum listener
// ABOUTME: Supports seeding pre-provisioned clients and users before the listener starts
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # OAuth Labs Server Binary
//!
//! Starts the authorization server with configuration taken from the
//! environment. Security toggles are read from `OAUTH_*` variables.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use oauth_labs_core::constants::endpoints;
use oauth_labs_core::models::ClientMetadata;
use oauth_labs_server::{
    config::ServerConfig,
    logging,
    oauth2_server::OAuthEngine,
    routes::{self, OAuthServerState},
    storage::Storage,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "oauth-labs-server")]
#[command(about = "OAuth 2.0 authorization server with configurable protocol checks")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    port: Option<u16>,

    /// JSON file with clients to provision at startup
    #[arg(long)]
    seed_client: Option<PathBuf>,

    /// User id to add to the user directory (repeatable)
    #[arg(long = "seed-user")]
    seed_users: Vec<String>,
}

/// One entry of the `--seed-client` file
#[derive(Debug, Deserialize)]
struct SeedClient {
    client_id: String,
    client_secret: String,
    #[serde(flatten)]
    metadata: ClientMetadata,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.port {
        config.http.port = port;
    }

    logging::init_from_env()?;
    info!("Starting OAuth Labs Server");
    info!("{}", config.summary());

    let config = Arc::new(config);
    let storage = Storage::from_config(&config)
        .await
        .context("Failed to initialize storage")?;
    let keys = Arc::new(config.key_manager()?);
    info!(kid = %keys.kid(), "Signing key loaded");

    let engine = Arc::new(OAuthEngine::new(Arc::clone(&config), keys, &storage)?);

    for user_id in &args.seed_users {
        engine.add_user(user_id).await?;
        info!(user_id = %user_id, "Seeded user");
    }
    if let Some(path) = &args.seed_client {
        seed_clients(&engine, path).await?;
    }

    let state = Arc::new(OAuthServerState::new(Arc::clone(&engine), &config)?);
    let app = routes::router(state);

    let addr = format!("{}:{}", config.http.host, config.http.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    display_available_endpoints(&config);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}

async fn seed_clients(engine: &OAuthEngine, path: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    let clients: Vec<SeedClient> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid seed file {}", path.display()))?;

    for seed in clients {
        let client_id = seed.client_id.clone();
        engine
            .provision_client(seed.client_id, seed.client_secret, seed.metadata)
            .await
            .with_context(|| format!("Failed to seed client {client_id}"))?;
        info!(client_id = %client_id, "Seeded client");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}

fn display_available_endpoints(config: &ServerConfig) {
    let base = &config.issuer;
    info!("=== Available API Endpoints ===");
    info!("   Metadata:      GET  {base}{}", endpoints::METADATA);
    info!("   JWKS:          GET  {base}{}", endpoints::JWKS);
    info!("   Authorization: GET  {base}{}", endpoints::AUTHORIZE);
    info!("   Token:         POST {base}{}", endpoints::TOKEN);
    info!("   Revocation:    POST {base}{}", endpoints::REVOKE);
    if config.registration_key.is_some() {
        info!("   Registration:  POST {base}{}", endpoints::REGISTER);
    }
    info!("   Health:        GET  {base}/health");
}
