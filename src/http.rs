use crate::prelude::*;
use crate::status::ProcessStatus;

use axum::{extract::State, routing::get, Json, Router};

/// State shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub snapshot: SnapshotCell,
    pub status: StatusBoard,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/info", get(info_handler))
        .with_state(state)
}

/// Latest datagram
async fn status_handler(State(state): State<AppState>) -> Json<Datagram> {
    Json(state.snapshot.get())
}

/// Loop states and counters
async fn info_handler(State(state): State<AppState>) -> Json<ProcessStatus> {
    Json(state.status.snapshot())
}

pub struct Http {
    config: config::Http,
    state: AppState,
}

impl Http {
    pub fn new(config: config::Http, snapshot: SnapshotCell, status: StatusBoard) -> Self {
        Self {
            config,
            state: AppState { snapshot, status },
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled() {
            info!("http disabled, skipping");
            return Ok(());
        }

        let addr = format!("0.0.0.0:{}", self.config.port());
        info!("Starting HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|err| anyhow!("http bind {}: {}", addr, err))?;
        axum::serve(listener, create_router(self.state.clone())).await?;

        Ok(())
    }
}
