//! Groupwork server -- HTTP front end for the group task engine.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:8080
//! cargo run --bin groupwork-server
//!
//! # Persist state across restarts
//! cargo run --bin groupwork-server -- --snapshot /var/lib/groupwork/state.bin
//!
//! # Or via environment variables
//! GROUPWORK_ADDR=127.0.0.1:9090 GROUPWORK_LOG=debug cargo run --bin groupwork-server
//! ```

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use groupwork::Engine;
use groupwork_server::api::{self, AppState};
use groupwork_server::config::{ServerCliArgs, ServerConfig};
use groupwork_server::persist;
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Held until exit so buffered file logs are flushed.
    let _log_guard = init_logging(&config.log_level, config.log_file.as_deref());

    let engine_config = config.engine_config();
    let engine = match config.snapshot_path.as_deref().map(persist::load) {
        Some(Ok(Some(snapshot))) => {
            tracing::info!(
                users = snapshot.users.len(),
                groups = snapshot.groups.len(),
                tasks = snapshot.tasks.len(),
                "restored snapshot"
            );
            Engine::restore(snapshot, &engine_config)
        }
        Some(Err(e)) => {
            tracing::error!(error = %e, "failed to load snapshot");
            std::process::exit(1);
        }
        Some(Ok(None)) | None => Engine::new(&engine_config),
    };
    let state = Arc::new(AppState::new(engine));

    tracing::info!(addr = %config.bind_addr, "starting groupwork server");

    let handle = match api::start_server_with_state(&config.bind_addr, Arc::clone(&state)).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "server listening");
            handle
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = handle => {
            if let Err(e) = result {
                tracing::error!(error = %e, "server task failed");
            }
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutting down");
        }
    }

    if let Some(path) = config.snapshot_path.as_deref() {
        save_snapshot(&state, path);
    }
}

fn save_snapshot(state: &AppState, path: &Path) {
    match persist::save(path, &state.engine().snapshot()) {
        Ok(()) => tracing::info!(path = %path.display(), "snapshot saved"),
        Err(e) => tracing::error!(error = %e, "failed to save snapshot"),
    }
}

/// Initialize logging to stdout, or to `file_path` when given.
///
/// Returns a [`WorkerGuard`] for the file writer that must be held until
/// shutdown.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some((log_dir, file_name)) =
        file_path.and_then(|p| Some((p.parent()?, p.file_name()?)))
    else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        return None;
    };

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
