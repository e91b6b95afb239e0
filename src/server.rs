// src/server.rs
//! HTTP listener lifecycle: serve until cancelled, then drain for a bounded
//! grace period.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding api listener on {addr}"))
}

/// Serve `app` until `cancel` fires. In-flight requests then get up to
/// `grace` to complete; whatever is still open afterwards is dropped.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    cancel: CancellationToken,
    grace: Duration,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "api listening");
    }

    let shutdown = cancel.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        res = &mut server => return res.context("api server"),
        _ = cancel.cancelled() => {}
    }

    match tokio::time::timeout(grace, server).await {
        Ok(res) => {
            tracing::info!("api server stopped");
            res.context("api server")
        }
        Err(_) => {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "grace period elapsed, dropping open connections"
            );
            Ok(())
        }
    }
}
