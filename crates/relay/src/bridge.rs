// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-bridge-id aggregate: the control socket, the connection table, and
//! the status subscriber set.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Message;
use futures_util::SinkExt;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::connection::Connection;
use crate::ws::{self, WsSink};

/// Control-channel messages sent by the relay to a bridge.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlMessage {
    /// A remote controller was accepted; the bridge should dial the data
    /// endpoint for this connection id.
    Connect { data: ConnectData },
    /// The first status subscriber attached.
    StartStatus,
    /// The last status subscriber left.
    StopStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectData {
    pub connection_id: String,
}

impl ControlMessage {
    fn to_frame(&self) -> Message {
        Message::Text(serde_json::to_string(self).unwrap_or_default().into())
    }
}

/// A registered bridge.
///
/// One mutex guards every mutable field; holding it also serialises writes
/// on the control socket and on each subscriber socket. Lock order is
/// Bridge before Connection, never the reverse.
pub struct Bridge {
    id: String,
    inner: Mutex<BridgeInner>,
}

struct BridgeInner {
    control: Option<WsSink>,
    connections: HashMap<String, Arc<Connection>>,
    subscribers: HashMap<u64, WsSink>,
    next_subscriber_id: u64,
}

impl Bridge {
    pub fn new(id: String, control: WsSink) -> Self {
        Self {
            id,
            inner: Mutex::new(BridgeInner {
                control: Some(control),
                connections: HashMap::new(),
                subscribers: HashMap::new(),
                next_subscriber_id: 0,
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn detached(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            inner: Mutex::new(BridgeInner {
                control: None,
                connections: HashMap::new(),
                subscribers: HashMap::new(),
                next_subscriber_id: 0,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Insert a pending connection and notify the bridge over the control
    /// socket so it can dial the matching data channel. The write happens
    /// under the bridge mutex; a write failure is ignored (the control
    /// loop's own read will observe the broken socket).
    pub async fn register_connection(&self, connection_id: &str, connection: Arc<Connection>) {
        let mut inner = self.inner.lock().await;
        inner.connections.insert(connection_id.to_owned(), connection);
        let notify = ControlMessage::Connect {
            data: ConnectData { connection_id: connection_id.to_owned() },
        };
        if let Some(control) = inner.control.as_mut() {
            let _ = control.send(notify.to_frame()).await;
        }
    }

    /// Install the data sink on a pending connection. Returns the sink back
    /// when no such connection exists so the caller can close it.
    pub async fn attach_data_socket(
        &self,
        connection_id: &str,
        sink: WsSink,
    ) -> Result<Arc<Connection>, WsSink> {
        let inner = self.inner.lock().await;
        match inner.connections.get(connection_id) {
            Some(connection) => {
                let connection = Arc::clone(connection);
                connection.attach_bridge_data(sink).await;
                Ok(connection)
            }
            None => Err(sink),
        }
    }

    /// Drop a connection from the table. No-op when already removed.
    pub async fn remove_connection(&self, connection_id: &str) -> Option<Arc<Connection>> {
        self.inner.lock().await.connections.remove(connection_id)
    }

    /// Fan a control-socket frame out to every status subscriber, preserving
    /// the original frame type. A failed write is not retried; the
    /// subscriber's own read loop tears it down.
    pub async fn fan_out(&self, message: Message) {
        let mut inner = self.inner.lock().await;
        for subscriber in inner.subscribers.values_mut() {
            let _ = subscriber.send(message.clone()).await;
        }
    }

    /// Add a status subscriber. On the 0 → 1 edge the bridge is told to
    /// start publishing. Refused (sink returned) when the control socket is
    /// already gone.
    pub async fn add_subscriber(&self, sink: WsSink) -> Result<u64, WsSink> {
        let mut inner = self.inner.lock().await;
        if inner.control.is_none() {
            return Err(sink);
        }
        if inner.subscribers.is_empty() {
            if let Some(control) = inner.control.as_mut() {
                let _ = control.send(ControlMessage::StartStatus.to_frame()).await;
            }
        }
        let id = inner.next_subscriber_id;
        inner.next_subscriber_id += 1;
        inner.subscribers.insert(id, sink);
        Ok(id)
    }

    /// Remove a status subscriber; on the 1 → 0 edge the bridge is told to
    /// stop publishing. Returns the sink for the caller to close.
    pub async fn remove_subscriber(&self, id: u64) -> Option<WsSink> {
        let mut inner = self.inner.lock().await;
        let sink = inner.subscribers.remove(&id);
        if sink.is_some() && inner.subscribers.is_empty() {
            if let Some(control) = inner.control.as_mut() {
                let _ = control.send(ControlMessage::StopStatus.to_frame()).await;
            }
        }
        sink
    }

    /// Tear the bridge down: close the control socket (`3000` when kicked),
    /// every member connection, and every status subscriber. Everything is
    /// drained out of the lock first; the close I/O runs unlocked.
    /// Idempotent.
    pub async fn shutdown(&self, kicked: bool) {
        let mut inner = self.inner.lock().await;
        let control = inner.control.take();
        let connections: Vec<_> = inner.connections.drain().map(|(_, c)| c).collect();
        let subscribers: Vec<_> = inner.subscribers.drain().map(|(_, s)| s).collect();
        drop(inner);
        if let Some(sink) = control {
            if kicked {
                ws::close(sink, ws::CLOSE_KICKED, ws::REASON_KICKED).await;
            } else {
                ws::close(sink, ws::CLOSE_GOING_AWAY, ws::REASON_CLOSING).await;
            }
        }
        for connection in connections {
            connection.close(ws::CLOSE_GOING_AWAY, ws::REASON_CLOSING).await;
        }
        for subscriber in subscribers {
            ws::close(subscriber, ws::CLOSE_ABNORMAL, "").await;
        }
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
