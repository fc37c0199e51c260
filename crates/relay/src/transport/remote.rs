// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote-controller endpoint — mints a connection and asks the bridge to
//! dial the matching data leg.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::StreamExt;

use crate::bridge::Bridge;
use crate::connection::Connection;
use crate::limiter::{RateLimiter, SESSION_BURST_BITS, SESSION_RATE_BITS_PER_SECOND};
use crate::state::RelayState;
use crate::stats;
use crate::ws;

/// `GET /remote-controller/{bridge_id}` — websocket upgrade for a remote
/// controller session.
pub async fn remote_controller_handler(
    State(state): State<Arc<RelayState>>,
    Path(bridge_id): Path<String>,
    ws: WebSocketUpgrade,
) -> axum::response::Response {
    // Reject before upgrading: no bridge means no handshake.
    let Some(bridge) = state.registry.load(&bridge_id).await else {
        stats::add(&state.counters.rejected_remote_controller_websockets_no_bridge, 1);
        tracing::debug!(bridge_id = %bridge_id, "remote controller rejected, no bridge");
        return axum::http::Response::builder()
            .status(404)
            .body(axum::body::Body::from("no bridge registered"))
            .unwrap_or_default()
            .into_response();
    };

    ws.max_message_size(usize::MAX)
        .max_frame_size(usize::MAX)
        .on_upgrade(move |socket| serve_remote_controller(state, bridge, socket))
        .into_response()
}

async fn serve_remote_controller(state: Arc<RelayState>, bridge: Arc<Bridge>, socket: WebSocket) {
    stats::add(&state.counters.accepted_remote_controller_websockets, 1);
    let connection_id = uuid::Uuid::new_v4().to_string();
    let (sink, mut stream) = socket.split();
    let connection = Arc::new(Connection::new(
        sink,
        RateLimiter::new(SESSION_RATE_BITS_PER_SECOND, SESSION_BURST_BITS),
    ));
    let limiter = connection.limiter();

    bridge.register_connection(&connection_id, Arc::clone(&connection)).await;
    tracing::debug!(
        bridge_id = %bridge.id(),
        connection_id = %connection_id,
        "remote controller connected"
    );

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
        stats::add(&state.counters.remote_controller_to_bridge_bytes, len);
        if !limiter.allow(8 * len) {
            close_code = ws::CLOSE_RATE_LIMITED;
            close_reason = ws::REASON_RATE_LIMITED;
            stats::add(&state.counters.rate_limit_exceeded, 1);
            break;
        }
        // Frames that arrive before the bridge dials in are discarded.
        if !connection.forward_to_bridge(message).await {
            break;
        }
    }

    bridge.remove_connection(&connection_id).await;
    connection.close(close_code, close_reason).await;
    tracing::debug!(connection_id = %connection_id, "remote controller closed");
}
