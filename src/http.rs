// src/http.rs

//! Webhook ingestion endpoint.
//!
//! `POST /observer` takes a build lifecycle event, queues it, and answers
//! `202 Accepted` before any processing happens. Malformed payloads are
//! rejected by the JSON extractor.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{Engine, Task};
use crate::errors::Result;
use crate::model::BuildEvent;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/observer", post(observe))
        .route("/health", get(health))
        .with_state(AppState { engine })
}

async fn observe(State(state): State<AppState>, Json(event): Json<BuildEvent>) -> StatusCode {
    let delivery = Uuid::new_v4();
    debug!(%delivery, job = %event.name, build = event.build.number, "webhook delivery");

    if state.engine.tasks().submit(Task::Observe { event, delivery }) {
        StatusCode::ACCEPTED
    } else {
        warn!(%delivery, "webhook delivery dropped");
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Serve the webhook until `shutdown` is cancelled.
pub async fn serve(bind: &str, engine: Arc<Engine>, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(address = %listener.local_addr()?, "webhook listening");

    axum::serve(listener, router(engine))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
