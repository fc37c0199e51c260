// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + websocket transport for the relay.

pub mod control;
pub mod data;
pub mod http;
pub mod remote;
pub mod status;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::RelayState;

/// Build the axum `Router` with all relay routes.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        // Bridge side
        .route("/bridge/control/{bridge_id}", get(control::control_handler))
        .route("/bridge/data/{bridge_id}/{connection_id}", get(data::data_handler))
        // Remote-controller side
        .route("/remote-controller/{bridge_id}", get(remote::remote_controller_handler))
        // Observers
        .route("/status/{bridge_id}", get(status::status_handler))
        .route("/stats.json", get(http::stats_json))
        // Static dashboard
        .fallback_service(ServeDir::new(&state.config.static_dir))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
