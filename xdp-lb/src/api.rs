//! HTTP control surface over the redirect table.
//!
//! - `GET /rules` returns the forwarded traffic per backend.
//! - `POST /rules?sourceAddr=<ipv4>` replaces the backend set with the JSON
//!   list in the body, `[{"server": "...", "mac": "...", "ifindex": 2}]`.

use crate::{
    backends::{self, BackendEntry},
    error::ApiError,
    stats::{self, BackendStats},
    table::{RedirectTable, SlotMap},
};
use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{Method, Uri},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::{net::TcpListener, signal, sync::RwLock};

/// Shared state handed to every request handler.
///
/// Assignments take the write lock so they never interleave with each
/// other or with a statistics read.
pub struct AppState<M> {
    pub table: Arc<RwLock<RedirectTable<M>>>,
}

impl<M> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

impl<M> AppState<M> {
    pub fn new(table: RedirectTable<M>) -> Self {
        Self {
            table: Arc::new(RwLock::new(table)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn ok() -> Self {
        Self {
            message: "ok".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerStats {
    #[serde(flatten)]
    pub backend: BackendEntry,
    pub forward_bytes: u64,
    pub forward_packages: u64,
}

impl From<BackendStats> for ServerStats {
    fn from(be: BackendStats) -> Self {
        Self {
            backend: BackendEntry {
                server: be.server,
                mac: be.mac,
                ifindex: be.ifindex,
            },
            forward_bytes: be.bytes,
            forward_packages: be.packets,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignParams {
    #[serde(rename = "sourceAddr")]
    pub source_addr: Option<String>,
}

pub fn build_router<M>(state: AppState<M>) -> Router
where
    M: SlotMap + Send + Sync + 'static,
{
    Router::new()
        .route("/rules", get(get_rules::<M>).post(update_rules::<M>))
        .with_state(state)
}

async fn get_rules<M>(
    State(state): State<AppState<M>>,
    method: Method,
    uri: Uri,
) -> Result<Json<Vec<ServerStats>>, ApiError>
where
    M: SlotMap + Send + Sync + 'static,
{
    report(&method, &uri, read_stats(&state).await)
}

async fn update_rules<M>(
    State(state): State<AppState<M>>,
    method: Method,
    uri: Uri,
    params: Option<Query<AssignParams>>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError>
where
    M: SlotMap + Send + Sync + 'static,
{
    report(&method, &uri, assign(&state, params, &body).await)
}

async fn read_stats<M: SlotMap>(state: &AppState<M>) -> Result<Json<Vec<ServerStats>>, ApiError> {
    let slots = state.table.read().await.get()?;
    let servers = stats::aggregate(&slots)
        .into_iter()
        .map(ServerStats::from)
        .collect();
    Ok(Json(servers))
}

async fn assign<M: SlotMap>(
    state: &AppState<M>,
    params: Option<Query<AssignParams>>,
    body: &[u8],
) -> Result<Json<MessageResponse>, ApiError> {
    let source_addr = params
        .and_then(|Query(p)| p.source_addr)
        .filter(|addr| !addr.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("sourceAddr is required".to_string()))?;

    // a `null` body is an empty backend list
    let entries: Vec<BackendEntry> = serde_json::from_slice::<Option<Vec<BackendEntry>>>(body)
        .map_err(|e| ApiError::InvalidRequest(format!("decode request error: {}", e)))?
        .unwrap_or_default();

    let servers = backends::with_source(&source_addr, &entries);
    state.table.write().await.set(&servers)?;

    log::info!(
        "Backend set replaced with {} servers from source {}",
        servers.len(),
        source_addr
    );
    Ok(Json(MessageResponse::ok()))
}

fn report<T>(method: &Method, uri: &Uri, result: Result<T, ApiError>) -> Result<T, ApiError> {
    if let Err(e) = &result {
        log::warn!("{}", failure_line(method, uri, e));
    }
    result
}

fn failure_line(method: &Method, uri: &Uri, e: &ApiError) -> String {
    format!("{} {} processing error: {}", method, uri, e)
}

/// Serves the control surface on `addr` until Ctrl-C.
pub async fn serve<M>(addr: &str, state: AppState<M>) -> Result<(), anyhow::Error>
where
    M: SlotMap + Send + Sync + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .context(format!("Can't listen on {}", addr))?;

    log::info!("Server started on {}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => log::info!("Exiting..."),
        Err(e) => {
            log::warn!("Can't listen for Ctrl-C, {}", e);
            std::future::pending::<()>().await
        }
    }
}
