//! WebSocket endpoint and HTTP surface
//!
//! One axum router carries the match endpoint plus the health, stats, and
//! metrics endpoints. Each accepted socket gets a writer task draining its
//! outbound channel; the read loop feeds frames into the session engine.

use crate::service::health::HealthCheck;
use crate::session::engine::SessionEngine;
use crate::ws::registry::{ConnectionHandle, ConnectionRegistry, OutboundFrame};
use axum::{
    extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::metrics::MetricsCollector;

/// Shared state for all routes
#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<SessionEngine>,
    pub registry: Arc<ConnectionRegistry>,
    pub metrics: Arc<MetricsCollector>,
    pub service_name: String,
    pub started_at: DateTime<Utc>,
    pub is_running: Arc<RwLock<bool>>,
}

/// Build the service router
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/metrics", get(metrics_handler))
        .route("/normal_match/{player_id}", get(ws_handler))
        .with_state(state)
}

/// Root endpoint handler - shows service information
async fn root_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(json!({
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/health",
            "/stats",
            "/metrics",
            "/normal_match/{player_id}"
        ]
    }))
}

/// Liveness endpoint handler
async fn health_handler(State(state): State<ServerState>) -> Response {
    let is_running = *state.is_running.read().await;
    let check = HealthCheck::snapshot(
        &state.engine,
        &state.registry,
        &state.service_name,
        state.started_at,
        is_running,
    );

    let status = if is_running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(check)).into_response()
}

/// Engine statistics endpoint handler
async fn stats_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.engine.stats())
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<ServerState>) -> Response {
    match state.metrics.gather() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Upgrade handler for the match endpoint
async fn ws_handler(
    Path(player_id): Path<String>,
    State(state): State<ServerState>,
    ws: WebSocketUpgrade,
) -> Response {
    if player_id.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "playerId is required").into_response();
    }

    info!("Player {} connecting", player_id);
    ws.on_upgrade(move |socket| handle_socket(socket, player_id, state))
}

/// Drive a single player connection.
///
/// Called after the upgrade; `socket` is the full-duplex WebSocket.
async fn handle_socket(socket: WebSocket, player_id: String, state: ServerState) {
    let (mut sink, mut stream) = socket.split();
    let (handle, mut outbound) = ConnectionHandle::channel(player_id.clone());

    // Writer task: drain the outbound channel into the socket.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            match frame {
                OutboundFrame::Event(json) => {
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                OutboundFrame::Close { code, reason } => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    });

    if let Err(e) = state.engine.register_player(&player_id, handle.clone()) {
        warn!("Failed to register player {}: {}", player_id, e);
    }

    // Read loop: text frames go to the engine, everything else is transport
    // noise. Handler errors never close the connection.
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if let Err(e) = state.engine.handle_message(&player_id, text.as_str()) {
                    error!("Failed to handle message from {}: {}", player_id, e);
                }
            }
            Ok(Message::Binary(_)) => {
                error!("Got binary message from player {}, ignoring", player_id);
            }
            Ok(Message::Close(_)) => break,
            // Ping/pong frames are answered by the protocol layer
            Ok(_) => {}
            Err(e) => {
                debug!("Connection error for player {}: {}", player_id, e);
                break;
            }
        }
    }

    handle.mark_closed();
    if let Err(e) = state.engine.handle_disconnect(&player_id) {
        warn!("Failed to clean up after player {}: {}", player_id, e);
    }
    writer.abort();
    info!("Player {} disconnected", player_id);
}
