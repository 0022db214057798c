//! Sentinel Cache — process entry point.
//!
//! Boots the engine (restoring from snapshot or AOF if one exists), starts
//! its background schedulers, and serves the HTTP transport until the
//! process receives a shutdown signal.

use std::panic;
use std::sync::Arc;

use sentinel_cache::config::Configuration;
use sentinel_cache::engine::Engine;
use sentinel_cache::paths::PersistedPaths;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("sentinel-cached fatal error:");
        eprintln!("{panic_info}");
    }));

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_level))
        .init();

    tracing::info!("═══════════════════════════════════════════════");
    tracing::info!("  Sentinel Cache v{}", sentinel_cache::VERSION);
    tracing::info!("  Platform: {} / {}", std::env::consts::OS, std::env::consts::ARCH);
    tracing::info!("═══════════════════════════════════════════════");

    let paths = PersistedPaths::resolve()?;
    let config_path = paths.root.join("ghostdbConf.json");
    let config = Configuration::load_or_default(&config_path);

    let engine = Arc::new(Engine::boot(config, paths).await?);
    let app = sentinel_cache::http::router(engine);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:7878").await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("sentinel-cached shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
