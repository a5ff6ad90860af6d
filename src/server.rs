//! # HTTP Server
//!
//! Thin axum surface over the poll pipeline: a health probe, the poll
//! status snapshot, and a run-now trigger. Jobs themselves have no read
//! API here; consumers read the database directly.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::db;
use crate::models::ServiceInfo;
use crate::poll::{Orchestrator, PollStatus, StatusStore};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub status: StatusStore,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            db,
            status: orchestrator.status().clone(),
            orchestrator,
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(poll_status))
        .route("/poll", post(trigger_poll))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs the server until the shutdown token fires.
pub async fn run_server(
    config: &AppConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_app(state);

    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}

/// Liveness plus one database round-trip.
async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<ServiceInfo>) {
    let info = ServiceInfo::default();
    match db::health_check(&state.db).await {
        Ok(()) => (StatusCode::OK, Json(info)),
        Err(err) => {
            warn!(error = %err, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(info))
        }
    }
}

async fn poll_status(State(state): State<AppState>) -> Json<PollStatus> {
    Json(state.status.snapshot())
}

#[derive(Debug, Serialize)]
struct PollTriggered {
    started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'static str>,
}

/// Kick off a cycle on a background task. A cycle already in flight is
/// reported as a conflict, never queued behind the running one.
async fn trigger_poll(State(state): State<AppState>) -> (StatusCode, Json<PollTriggered>) {
    if state.orchestrator.spawn_cycle() {
        (
            StatusCode::ACCEPTED,
            Json(PollTriggered {
                started: true,
                detail: None,
            }),
        )
    } else {
        (
            StatusCode::CONFLICT,
            Json(PollTriggered {
                started: false,
                detail: Some("a poll cycle is already running"),
            }),
        )
    }
}
