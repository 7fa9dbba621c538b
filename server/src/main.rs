//! devgate device authorization server
//!
//! Client software polls `/api/v1/check` to learn whether its device may
//! run. Operators approve or reject devices through the admin routes.
//!
//! Usage:
//!   devgate-server --port 8787 --state-file /var/lib/devgate/state.json
//!
//! All state lives in a single JSON file owned by this process.

use std::{net::IpAddr, net::SocketAddr, path::PathBuf};
use anyhow::{Context, Result};
use clap::Parser;
use devgate_server::{build_router, AppState};
use devgate_store::{DeviceStore, StoreConfig};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "devgate-server")]
#[command(about = "Device authorization gatekeeper")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, env = "DEVGATE_PORT", default_value = "8787")]
    port: u16,

    /// Address to bind
    #[arg(long, env = "DEVGATE_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Path to the JSON state file
    #[arg(short, long, env = "DEVGATE_STATE_FILE", default_value = "devgate-state.json")]
    state_file: PathBuf,

    /// Admin token for operator routes (generated if absent and none is stored)
    #[arg(long, env = "DEVGATE_ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("devgate starting...");

    let token_from_config = token_supplied(args.admin_token.as_deref());
    let mut config = StoreConfig::new(&args.state_file);
    config.admin_token = args.admin_token;
    let store = DeviceStore::open(config)
        .with_context(|| format!("Failed to open state file {:?}", args.state_file))?;
    let admin_token = store.admin_token();

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", addr))?;
    info!("HTTP API listening on {}", addr);

    println!("\n========================================");
    println!("  devgate Running");
    println!("========================================");
    println!("  Listen:      {}", addr);
    println!("  State file:  {}", args.state_file.display());
    if token_from_config {
        println!("  Admin token: (from configuration)");
    } else {
        println!("  Admin token: {}", admin_token);
    }
    println!("========================================\n");

    let app = build_router(AppState::new(store));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("devgate stopped");
    Ok(())
}

/// Whether the operator configured a usable token. Blank values are ignored
/// by the store, which then falls back to the stored or a generated token.
fn token_supplied(token: Option<&str>) -> bool {
    token.is_some_and(|t| !t.trim().is_empty())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
