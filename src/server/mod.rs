//! Metrics and diagnostic HTTP server
//!
//! `/metrics` serves the Prometheus text exposition of the registry and
//! `/chunkmap/<world>.png` a bitmap of the cells currently pinned in a world.

pub mod chunkmap;
pub mod error;

pub use error::ServerError;

use crate::core::types::WorldId;
use crate::metrics::Metrics;
use crate::pinning::PinLedger;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct AppState {
    pub metrics: Metrics,
    pub ledger: Arc<PinLedger>,
}

impl AppState {
    pub fn new(metrics: Metrics, ledger: Arc<PinLedger>) -> Self {
        Self { metrics, ledger }
    }
}

pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Run `serve` in the background, logging a failure as soon as it happens
/// rather than when the handle is finally awaited
pub fn spawn(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = serve(addr, state, shutdown).await {
            tracing::error!("Metrics server on {} failed: {}", addr, e);
        }
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/chunkmap/{*path}", get(chunk_map))
        .with_state(state)
}

async fn metrics(State(state): State<AppState>) -> Result<Response, ServerError> {
    let body = state.metrics.encode_text()?;
    Ok(([(header::CONTENT_TYPE, state.metrics.content_type())], body).into_response())
}

async fn chunk_map(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ServerError> {
    let world = chunkmap::parse_world(&path).ok_or(ServerError::UnknownPath(path))?;
    let cells = state.ledger.cells_in(WorldId(world));
    let png = chunkmap::encode_png(&chunkmap::render_cells(&cells)?)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}
