// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::registry::BridgeRegistry;
use crate::stats::{Counters, StatsSnapshot};

/// Shared relay state.
pub struct RelayState {
    pub registry: BridgeRegistry,
    pub counters: Counters,
    pub config: RelayConfig,
    pub shutdown: CancellationToken,
}

impl RelayState {
    pub fn new(config: RelayConfig, shutdown: CancellationToken) -> Self {
        Self {
            registry: BridgeRegistry::default(),
            counters: Counters::default(),
            config,
            shutdown,
        }
    }

    /// Stats snapshot including the live bridge count.
    pub async fn snapshot(&self) -> StatsSnapshot {
        self.counters.snapshot(self.registry.count().await as u64)
    }
}
