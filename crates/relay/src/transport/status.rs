// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status subscriber endpoint — observes a bridge's control-channel output.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::StreamExt;

use crate::state::RelayState;
use crate::ws;

/// `GET /status/{bridge_id}` — websocket upgrade for a status subscriber.
pub async fn status_handler(
    State(state): State<Arc<RelayState>>,
    Path(bridge_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_status(state, bridge_id, socket))
}

async fn serve_status(state: Arc<RelayState>, bridge_id: String, socket: WebSocket) {
    let (sink, mut stream) = socket.split();

    let Some(bridge) = state.registry.load(&bridge_id).await else {
        ws::close(sink, ws::CLOSE_GOING_AWAY, "No such bridge").await;
        return;
    };
    let subscriber_id = match bridge.add_subscriber(sink).await {
        Ok(id) => id,
        Err(sink) => {
            // The bridge is already tearing down; don't leak the socket.
            ws::close(sink, ws::CLOSE_ABNORMAL, "").await;
            return;
        }
    };
    tracing::debug!(bridge_id = %bridge_id, subscriber_id, "status subscriber attached");

    // Subscribers only listen. The first data frame, close, or error ends
    // the subscription.
    loop {
        match stream.next().await {
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            _ => break,
        }
    }

    if let Some(sink) = bridge.remove_subscriber(subscriber_id).await {
        ws::close(sink, ws::CLOSE_ABNORMAL, "").await;
    }
    tracing::debug!(bridge_id = %bridge_id, subscriber_id, "status subscriber detached");
}
