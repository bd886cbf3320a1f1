// peer/src/main.rs

//! Peer server binary.
//!
//! Run with no arguments to start a brand-new chain (a root user is
//! generated and its public PEM logged), or with one or more remote
//! addresses to clone the chain from the first and connect to all of
//! them. The server picks a random port from the configured range and
//! leaves the mesh politely on ctrl-c.

use std::sync::{Arc, Mutex};

use tokio::signal;

use chain::Identity;
use peer::{AppState, ChainManager, MetricsRegistry, PeerConfig, PeerError, SharedState, routes};

#[tokio::main]
async fn main() {
    // Basic tracing setup.
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "peer=info,chain=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cfg = PeerConfig::default();
    let remotes: Vec<String> = std::env::args().skip(1).collect();

    let port = cfg.pick_port();
    let addr = cfg.public_addr(port);

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    // ---------------------------
    // Replica bootstrap
    // ---------------------------

    // Bootstrapping may clone a remote chain over HTTP with the blocking
    // client, so it runs on a blocking worker.
    let manager = {
        let addr = addr.clone();
        let remotes = remotes.clone();
        tokio::task::spawn_blocking(move || bootstrap(addr, &remotes))
            .await
            .map_err(|e| format!("bootstrap task failed: {e}"))?
            .map_err(|e| format!("failed to bootstrap replica: {e}"))?
    };

    tracing::info!(
        length = manager.chain().len(),
        root = %hex::encode(manager.chain()[0].signature().unwrap_or_default()),
        "replica ready",
    );
    metrics.peer.chain_height.set(manager.chain().len() as i64);

    // ---------------------------
    // Shared state + router
    // ---------------------------

    let state: SharedState = Arc::new(AppState {
        manager: Mutex::new(manager),
        metrics: metrics.clone(),
    });

    let app = routes::router(state.clone());

    // ---------------------------
    // HTTP server
    // ---------------------------

    let listen = format!("{}:{}", cfg.listen_host, port);
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .map_err(|e| format!("failed to bind {listen}: {e}"))?;

    tracing::info!("peer listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("server error: {e}"))?;

    // Leave the mesh, best-effort.
    tokio::task::spawn_blocking(move || {
        let mut manager = state.manager.lock().expect("manager mutex poisoned");
        manager.disconnect_all();
    })
    .await
    .map_err(|e| format!("shutdown task failed: {e}"))?;

    Ok(())
}

/// Builds this process's replica: a fresh chain when `remotes` is empty,
/// otherwise a clone of the first remote plus connections to all of them.
fn bootstrap(addr: String, remotes: &[String]) -> Result<ChainManager, PeerError> {
    match remotes.first() {
        Some(first) => {
            tracing::info!("cloning chain from {first}");
            let mut manager = ChainManager::clone_from(addr, first)?;
            for remote in &remotes[1..] {
                manager.connect(remote)?;
            }
            Ok(manager)
        }
        None => {
            let root_user = Identity::generate()?;
            tracing::info!("generated root user:\n{}", root_user.public_pem()?);
            ChainManager::generate(addr, &root_user)
        }
    }
}

/// Waits for ctrl-c, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
