//! WebSocket handler for real-time updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::verify_token;
use crate::error::AppResult;
use crate::server::state::{event_message, AppState};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler. The session token comes in the query string.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> AppResult<Response> {
    let token = query.token.unwrap_or_default();
    let claims = verify_token(&state.keys, &token, Utc::now())?;
    tracing::debug!(user_id = claims.sub, "WebSocket client connected");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state)))
}

/// Handles an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so no event falls in between
    let mut rx = state.subscribe();

    if let Some(initial_state) = initial_state(&state) {
        if sender.send(Message::Text(initial_state)).await.is_err() {
            return;
        }
    }

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if sender.send(Message::Text(msg)).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "WebSocket client lagging, dropped updates");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Clients only listen; anything but Close is ignored
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    tracing::debug!("WebSocket connection closed");
}

/// Dashboard counts sent when a client connects.
fn initial_state(state: &AppState) -> Option<String> {
    let counts = match state.db.dashboard_counts() {
        Ok(counts) => counts,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load initial state");
            return None;
        }
    };
    serde_json::to_string(&event_message("initial_state", &counts)).ok()
}
