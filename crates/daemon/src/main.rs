// SPDX-License-Identifier: MIT

//! `jobletd` entry point (SPEC_FULL.md §6 "daemon startup"): re-exec
//! dispatch into isolation phase 4 happens before anything else touches the
//! tokio runtime, then the normal path loads config, reconciles persisted
//! state, and wires the [`engine::Engine`] up to the [`listener::Listener`].

mod config;
mod engine;
mod listener;

use config::Config;
use engine::{Engine, EngineHandle};
use joblet_core::NodeId;
use joblet_storage::{LocalWalClient, StateClient};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UnixListener as TokioUnixListener;
use tracing::{error, info};

fn main() {
    let mut args = std::env::args();
    let argv0 = args.next();
    let _ = argv0;
    let rest: Vec<String> = args.collect();

    if rest.first().map(String::as_str) == Some(joblet_isolation::init::INIT_MARKER) {
        let descriptor_path = rest.get(1).map(PathBuf::from).unwrap_or_else(|| {
            eprintln!("joblet init: missing descriptor path argument");
            std::process::exit(joblet_isolation::error::EXIT_EXEC_FAILURE);
        });
        std::process::exit(joblet_isolation::init::run_from_path(&descriptor_path));
    }

    let config_path = rest
        .first()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(Config::DEFAULT_PATH));

    tracing_subscriber::fmt::init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config_path)) {
        error!(error = %e, "jobletd exited with an error");
        std::process::exit(1);
    }
}

async fn run(config_path: PathBuf) -> anyhow::Result<()> {
    let config = Config::load(&config_path)?;
    info!(?config, "starting jobletd");

    for dir in [&config.jobs_root, &config.log_root, &config.runtime_root, &config.volumes_root] {
        tokio::fs::create_dir_all(dir).await?;
    }
    if let Some(parent) = config.socket_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if let Some(parent) = config.wal_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let storage: Arc<dyn StateClient> = Arc::new(LocalWalClient::open(config.wal_path.clone())?);

    let node_id = NodeId::new();
    let (msg_tx, msg_rx) = tokio::sync::mpsc::channel(1024);
    let (tick_tx, tick_rx) = tokio::sync::mpsc::channel(1024);

    let engine = Engine::new(node_id, config.clone(), storage, msg_tx.clone(), tick_tx);
    engine.reconcile_on_startup().await;

    let handle = EngineHandle::new(msg_tx);
    let engine_task = tokio::spawn(engine.run(msg_rx, tick_rx));

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let uds = TokioUnixListener::bind(&config.socket_path)?;
    info!(socket = %config.socket_path.display(), "listening for client connections");

    let listener = listener::Listener::new(uds, handle);
    listener.run().await;

    engine_task.abort();
    Ok(())
}
