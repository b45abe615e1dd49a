//! `serve` and `render` entry points: wire connector, refresher, multiplexer
//! and server together.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use schemascope_core::DiagramBuilder;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::broadcast::Broadcaster;
use crate::cli::{RefreshOpts, RenderOpts, ServeOpts};
use crate::config::load_sources;
use crate::connector::StoreConnector;
use crate::multiplexer::Multiplexer;
use crate::refresh::Refresher;
use crate::server::{self, AppState};

fn build_refresher(config_path: &Path, opts: &RefreshOpts) -> anyhow::Result<Refresher> {
    let sources = load_sources(config_path)?;
    for source in &sources {
        tracing::info!(source = %source.name, kind = %source.kind(), "source configured");
    }
    let timeout = opts.source_timeout();
    Ok(Refresher::new(
        sources,
        Arc::new(StoreConnector::new(timeout)),
        DiagramBuilder::new(opts.size_threshold),
        timeout,
    ))
}

pub async fn run_daemon(opts: ServeOpts, config_path: &Path) -> anyhow::Result<()> {
    let refresher = Arc::new(build_refresher(config_path, &opts.refresh)?);
    let broadcaster = Arc::new(Broadcaster::new());
    let cancel = CancellationToken::new();

    let listener = TcpListener::bind(opts.listen)
        .await
        .with_context(|| format!("failed to bind {}", opts.listen))?;

    let mut multiplexer = Multiplexer::new(
        Arc::clone(&refresher),
        Arc::clone(&broadcaster),
        opts.poll_interval(),
        cancel.clone(),
    );
    multiplexer.start_watchers().await;
    tracing::info!(watched = ?multiplexer.watched_sources(), "change watchers ready");
    let mux_handle = tokio::spawn(async move { multiplexer.run().await });

    let state = AppState {
        refresher,
        broadcaster: Arc::clone(&broadcaster),
        cancel: cancel.clone(),
    };
    let mut server_handle = tokio::spawn(server::serve(listener, state));

    tokio::select! {
        () = shutdown_signal() => {}
        res = &mut server_handle => {
            match res {
                Ok(Ok(())) => tracing::warn!("server exited unexpectedly"),
                Ok(Err(e)) => tracing::error!(error = %e, "server error"),
                Err(e) => tracing::error!(error = %e, "server task failed"),
            }
        }
    }

    cancel.cancel();
    if let Err(e) = mux_handle.await {
        tracing::warn!(error = %e, "multiplexer task failed");
    }
    if !server_handle.is_finished() {
        let _ = server_handle.await;
    }
    tracing::info!(
        snapshots = broadcaster.snapshots_published(),
        edges = broadcaster.edges_published(),
        "daemon stopped"
    );
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                ctrl_c.await;
                tracing::info!("received ctrl-c, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        tracing::info!("received ctrl-c, shutting down");
    }
}

/// One refresh, printed to stdout as the same JSON array `GET /diagram` returns.
pub async fn run_render(opts: RenderOpts, config_path: &Path) -> anyhow::Result<()> {
    let refresher = build_refresher(config_path, &opts.refresh)?;
    let diagrams = refresher.refresh().await;
    let json = if opts.pretty {
        serde_json::to_string_pretty(&diagrams)?
    } else {
        serde_json::to_string(&diagrams)?
    };
    println!("{json}");
    Ok(())
}

pub fn run_check_config(config_path: &Path) -> anyhow::Result<()> {
    let sources = load_sources(config_path)?;
    println!("{}: {} source(s)", config_path.display(), sources.len());
    for source in &sources {
        println!("  {} ({})", source.name, source.kind());
    }
    Ok(())
}
