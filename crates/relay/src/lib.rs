// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! bridge-relay: websocket rendezvous relay pairing NAT-bound bridges with
//! transient remote controllers.

pub mod bridge;
pub mod config;
pub mod connection;
pub mod limiter;
pub mod registry;
pub mod state;
pub mod stats;
pub mod transport;
pub mod ws;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::state::RelayState;
use crate::transport::build_router;

/// Run the relay server until shutdown.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let state = Arc::new(RelayState::new(config, shutdown.clone()));

    stats::spawn_sampler(Arc::clone(&state));

    let addr = state.config.listen_addr();
    let router = build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("bridge-relay listening on {addr}");
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
