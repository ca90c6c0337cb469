// src/server.rs
// HTTP triggers. Every route answers "OK" straight away; the light work happens
// on the pulse worker.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::pulse::PulseHandle;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pulse: PulseHandle,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(start).post(start))
        .route("/frontend", get(start_frontend))
        .route("/success", get(success))
        .route("/fail", get(fail))
        .route("/kill", get(kill))
        .with_state(state)
}

/// Bind `0.0.0.0:{PORT}` and serve until the process is killed.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, state).await
}

pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<()> {
    info!("Server listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn start(State(state): State<AppState>) -> &'static str {
    debug!("Start requested");
    state.pulse.start(state.config.default_job());
    "OK"
}

async fn start_frontend(State(state): State<AppState>) -> &'static str {
    debug!("Frontend start requested");
    state.pulse.start(state.config.frontend_job());
    "OK"
}

async fn success(State(state): State<AppState>) -> &'static str {
    state.pulse.halt(state.config.success_hue);
    "OK"
}

async fn fail(State(state): State<AppState>) -> &'static str {
    state.pulse.halt(state.config.failure_hue);
    "OK"
}

async fn kill(State(state): State<AppState>) -> &'static str {
    info!("Kill requested");
    state.pulse.halt(state.config.failure_hue);
    "OK"
}
