// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridge data endpoint — the bridge-side leg of a rendezvous.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::StreamExt;

use crate::state::RelayState;
use crate::stats;
use crate::ws;

/// `GET /bridge/data/{bridge_id}/{connection_id}` — websocket upgrade for
/// the data channel a bridge dials in response to a connect notification.
pub async fn data_handler(
    State(state): State<Arc<RelayState>>,
    Path((bridge_id, connection_id)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(usize::MAX)
        .max_frame_size(usize::MAX)
        .on_upgrade(move |socket| serve_data(state, bridge_id, connection_id, socket))
}

async fn serve_data(
    state: Arc<RelayState>,
    bridge_id: String,
    connection_id: String,
    socket: WebSocket,
) {
    stats::add(&state.counters.accepted_bridge_data_websockets, 1);
    let (sink, mut stream) = socket.split();

    let Some(bridge) = state.registry.load(&bridge_id).await else {
        ws::close(sink, ws::CLOSE_GOING_AWAY, "No such bridge").await;
        return;
    };
    let connection = match bridge.attach_data_socket(&connection_id, sink).await {
        Ok(connection) => connection,
        Err(sink) => {
            // No connect notification was ever sent for this id.
            ws::close(sink, ws::CLOSE_GOING_AWAY, "No such connection").await;
            return;
        }
    };
    let limiter = connection.limiter();
    tracing::debug!(bridge_id = %bridge_id, connection_id = %connection_id, "bridge data paired");

    let mut close_code = ws::CLOSE_GOING_AWAY;
    let mut close_reason = ws::REASON_CLOSING;
    while let Some(Ok(message)) = stream.next().await {
        let len = match ws::payload_len(&message) {
            Some(len) => len as u64,
            None => {
                if matches!(message, Message::Close(_)) {
                    break;
                }
                continue;
            }
        };
        stats::add(&state.counters.bridge_to_remote_controller_bytes, len);
        if !limiter.allow(8 * len) {
            close_code = ws::CLOSE_RATE_LIMITED;
            close_reason = ws::REASON_RATE_LIMITED;
            stats::add(&state.counters.rate_limit_exceeded, 1);
            break;
        }
        connection.forward_to_remote_controller(message).await;
    }

    bridge.remove_connection(&connection_id).await;
    connection.close(close_code, close_reason).await;
    tracing::debug!(bridge_id = %bridge_id, connection_id = %connection_id, "bridge data closed");
}
