// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A rendezvoused duplex pipe: one remote controller, one bridge data stream.

use std::sync::Arc;

use axum::extract::ws::Message;
use futures_util::SinkExt;
use tokio::sync::Mutex;

use crate::limiter::RateLimiter;
use crate::ws::{self, WsSink};

/// One remote controller paired with one bridge data stream.
///
/// The mutex over the two sink references doubles as the close latch: a
/// sink leaves its `Option` exactly once, so each underlying socket is
/// closed at most once no matter how many teardown paths race.
pub struct Connection {
    pipe: Mutex<Pipe>,
    limiter: Arc<RateLimiter>,
}

struct Pipe {
    remote_controller: Option<WsSink>,
    bridge_data: Option<WsSink>,
}

impl Connection {
    /// A half-open connection: the remote controller is attached, the bridge
    /// data leg is not yet dialled in.
    pub fn new(remote_controller: WsSink, limiter: RateLimiter) -> Self {
        Self {
            pipe: Mutex::new(Pipe {
                remote_controller: Some(remote_controller),
                bridge_data: None,
            }),
            limiter: Arc::new(limiter),
        }
    }

    /// The session rate limiter, shared by both forwarding loops.
    pub fn limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }

    /// Install the bridge data sink, completing the rendezvous.
    pub async fn attach_bridge_data(&self, sink: WsSink) {
        self.pipe.lock().await.bridge_data = Some(sink);
    }

    /// Write through to the remote controller if that leg is still open.
    /// Write failures are left to the peer's own read loop to observe.
    pub async fn forward_to_remote_controller(&self, message: Message) {
        let mut pipe = self.pipe.lock().await;
        if let Some(sink) = pipe.remote_controller.as_mut() {
            let _ = sink.send(message).await;
        }
    }

    /// Write through to the bridge data leg. Returns false when the leg has
    /// not been dialled in (or is gone); the message is discarded.
    pub async fn forward_to_bridge(&self, message: Message) -> bool {
        let mut pipe = self.pipe.lock().await;
        match pipe.bridge_data.as_mut() {
            Some(sink) => {
                let _ = sink.send(message).await;
                true
            }
            None => false,
        }
    }

    /// Close both legs with the given code and reason. Idempotent; the close
    /// I/O happens after the latch is released.
    pub async fn close(&self, code: u16, reason: &str) {
        let (remote_controller, bridge_data) = {
            let mut pipe = self.pipe.lock().await;
            (pipe.remote_controller.take(), pipe.bridge_data.take())
        };
        if let Some(sink) = remote_controller {
            ws::close(sink, code, reason).await;
        }
        if let Some(sink) = bridge_data {
            ws::close(sink, code, reason).await;
        }
    }
}
