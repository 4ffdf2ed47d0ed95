// textmill server binary
use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use textmill::config::AppConfig;
use textmill::extract::EngineChain;
use textmill::server::{router, AppState};
use textmill::session::{reaper, SessionStore};

#[derive(Parser, Debug)]
#[command(name = "textmill", about = "PDF text extraction service")]
struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the bind address from the config
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    // When no storage root is configured, sessions live in a temporary
    // directory that is removed when the guard drops at shutdown.
    let mut temp_guard = None;
    let storage_root = match &config.storage_root {
        Some(root) => {
            std::fs::create_dir_all(root)
                .with_context(|| format!("failed to create storage root {}", root.display()))?;
            root.clone()
        }
        None => {
            let dir = tempfile::Builder::new()
                .prefix("textmill-")
                .tempdir()
                .context("failed to create temporary storage root")?;
            let path = dir.path().to_path_buf();
            temp_guard = Some(dir);
            path
        }
    };

    let store = Arc::new(SessionStore::new(
        &storage_root,
        ChronoDuration::minutes(config.session_ttl_minutes),
        ChronoDuration::minutes(config.download_grace_minutes),
    ));
    let chain = Arc::new(EngineChain::with_default_engines(&config));
    info!(
        root = %storage_root.display(),
        engines = ?chain.descriptors().iter().map(|d| d.name).collect::<Vec<_>>(),
        "starting"
    );

    let reaper_handle = reaper::spawn(store.clone(), Duration::from_secs(config.reap_interval_secs));

    let state = AppState {
        config: Arc::new(config.clone()),
        store: store.clone(),
        chain,
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    reaper_handle.abort();
    let purged = store.purge_all();
    info!(purged, "shut down, sessions purged");
    drop(temp_guard);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
}
