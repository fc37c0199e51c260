// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain HTTP handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::state::RelayState;

/// `GET /stats.json` — counters and bitrate gauges.
pub async fn stats_json(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    Json(state.snapshot().await)
}
