//! droughtmap - SPI drought severity maps
//!
//! `droughtmap render` writes a self-contained map directory;
//! `droughtmap serve` runs the web UI.

use anyhow::Context;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};

use droughtmap::cache::SceneCache;
use droughtmap::config::{Action, Invocation};
use droughtmap::export::export_map;
use droughtmap::handlers::build_router;
use droughtmap::state::load_scene_from_file;
use droughtmap::vector::load_vector_overlay;
use droughtmap::{init_tracing, log_error, log_timed_operation, AppState, Config};

fn main() -> anyhow::Result<()> {
    let (config, invocation) = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.log_level);
    info!("Starting droughtmap v{}", env!("CARGO_PKG_VERSION"));

    match invocation.action.clone() {
        Action::Render { out_dir } => render(&config, &invocation, &out_dir),
        Action::Serve => serve(config, &invocation),
    }
}

fn render(config: &Config, invocation: &Invocation, out_dir: &std::path::Path) -> anyhow::Result<()> {
    let cache = SceneCache::new(1);
    let scene = load_scene_from_file(&invocation.raster, config, &cache).map_err(|e| {
        log_error(&e, "loading raster");
        e
    })?;

    let vector = config
        .render
        .vector
        .as_deref()
        .and_then(load_vector_overlay);

    let files = log_timed_operation("render", || {
        export_map(&scene, &config.render, vector.as_ref(), out_dir)
    })
    .context("Failed to write map")?;

    println!("Map:      {}", files.map.display());
    println!("Overlay:  {}", files.overlay.display());
    println!("Summary:  {}", files.summary.display());
    if let Some(footprint) = &files.footprint {
        println!("Footprint: {}", footprint.display());
    }
    Ok(())
}

fn serve(config: Config, invocation: &Invocation) -> anyhow::Result<()> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(workers) = config.server.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.build().context("Failed to start the async runtime")?;

    runtime.block_on(run_server(config, invocation))
}

async fn run_server(config: Config, invocation: &Invocation) -> anyhow::Result<()> {
    info!("Loading raster: {:?}", invocation.raster);

    let cache = SceneCache::new(config.server.cache_capacity);
    let scene = load_scene_from_file(&invocation.raster, &config, &cache).map_err(|e| {
        log_error(&e, "loading raster");
        e
    })?;

    let vector = config
        .render
        .vector
        .as_deref()
        .and_then(load_vector_overlay);

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .context("Invalid host address")?,
        config.server.port,
    ));

    let state = AppState::new_shared(config, scene, cache, vector);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server has been gracefully shut down");
    Ok(())
}

/// Wait for a shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
