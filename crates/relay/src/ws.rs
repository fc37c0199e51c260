// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Websocket plumbing shared by the endpoint handlers: split-half type
//! aliases, wire close codes, and small frame helpers.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;

/// Write half of an accepted websocket. Shared sinks live behind a mutex;
/// holding that mutex is what serialises writes on the socket.
pub type WsSink = SplitSink<WebSocket, Message>;

/// Normal teardown of either side of a connection.
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Force-close for status subscribers.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// A newer bridge registered under the same bridge id.
pub const CLOSE_KICKED: u16 = 3000;
/// A session drained its token bucket.
pub const CLOSE_RATE_LIMITED: u16 = 3001;

pub const REASON_CLOSING: &str = "Closing";
pub const REASON_KICKED: &str = "Kicked out by other bridge";
pub const REASON_RATE_LIMITED: &str = "Rate limit exceeded";

/// Send a close frame and drop the sink. Failures are ignored; the peer may
/// already be gone.
pub async fn close(mut sink: WsSink, code: u16, reason: &str) {
    let frame = CloseFrame { code, reason: reason.to_owned().into() };
    let _ = sink.send(Message::Close(Some(frame))).await;
}

/// Payload length of a data-carrying frame; `None` for control frames.
pub fn payload_len(message: &Message) -> Option<usize> {
    match message {
        Message::Text(text) => Some(text.len()),
        Message::Binary(data) => Some(data.len()),
        _ => None,
    }
}
