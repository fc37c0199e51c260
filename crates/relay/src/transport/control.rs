// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridge control endpoint — the long-lived channel a bridge keeps open to
//! be reachable.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::StreamExt;

use crate::bridge::Bridge;
use crate::state::RelayState;
use crate::stats;

/// `GET /bridge/control/{bridge_id}` — websocket upgrade for a bridge's
/// control channel.
pub async fn control_handler(
    State(state): State<Arc<RelayState>>,
    Path(bridge_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(usize::MAX)
        .max_frame_size(usize::MAX)
        .on_upgrade(move |socket| serve_control(state, bridge_id, socket))
}

async fn serve_control(state: Arc<RelayState>, bridge_id: String, socket: WebSocket) {
    stats::add(&state.counters.accepted_bridge_control_websockets, 1);
    let (sink, mut stream) = socket.split();
    let bridge = Arc::new(Bridge::new(bridge_id.clone(), sink));

    if let Some(previous) = state.registry.load_and_store(&bridge_id, Arc::clone(&bridge)).await {
        stats::add(&state.counters.kicked_bridges, 1);
        tracing::info!(bridge_id = %bridge_id, "bridge replaced, kicking the previous one");
        previous.shutdown(true).await;
    }
    tracing::debug!(bridge_id = %bridge_id, "bridge control connected");

    // Control payloads are opaque; they are only fanned out to subscribers.
    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(_) | Message::Binary(_) => bridge.fan_out(message).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Disappear from the registry only if not already replaced.
    state.registry.remove_if_current(&bridge_id, &bridge).await;
    bridge.shutdown(false).await;
    tracing::debug!(bridge_id = %bridge_id, "bridge control closed");
}
