// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide counters and the bitrate sampler behind `/stats.json`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::state::RelayState;

/// Monotonic tallies plus the sampled bitrate gauges.
///
/// Counters only increase. Writes use release ordering and reads acquire,
/// so a snapshot never observes a counter ahead of the work it tallies.
#[derive(Default)]
pub struct Counters {
    pub accepted_bridge_control_websockets: AtomicU64,
    pub accepted_bridge_data_websockets: AtomicU64,
    pub kicked_bridges: AtomicU64,
    pub accepted_remote_controller_websockets: AtomicU64,
    pub rejected_remote_controller_websockets_no_bridge: AtomicU64,
    pub rate_limit_exceeded: AtomicU64,
    pub bridge_to_remote_controller_bytes: AtomicU64,
    pub remote_controller_to_bridge_bytes: AtomicU64,
    pub bridge_to_remote_controller_bitrate: AtomicU64,
    pub remote_controller_to_bridge_bitrate: AtomicU64,
}

/// Add to a counter.
pub fn add(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Release);
}

/// Read a counter or gauge.
pub fn read(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Acquire)
}

impl Counters {
    /// Point-in-time copy of every counter and gauge.
    pub fn snapshot(&self, bridges_connected: u64) -> StatsSnapshot {
        StatsSnapshot {
            bridges_connected,
            accepted_bridge_control_websockets: read(&self.accepted_bridge_control_websockets),
            accepted_bridge_data_websockets: read(&self.accepted_bridge_data_websockets),
            kicked_bridges: read(&self.kicked_bridges),
            accepted_remote_controller_websockets: read(
                &self.accepted_remote_controller_websockets,
            ),
            rejected_remote_controller_websockets_no_bridge: read(
                &self.rejected_remote_controller_websockets_no_bridge,
            ),
            rate_limit_exceeded: read(&self.rate_limit_exceeded),
            bridge_to_remote_controller_bytes: read(&self.bridge_to_remote_controller_bytes),
            remote_controller_to_bridge_bytes: read(&self.remote_controller_to_bridge_bytes),
            bridge_to_remote_controller_bitrate: read(&self.bridge_to_remote_controller_bitrate),
            remote_controller_to_bridge_bitrate: read(&self.remote_controller_to_bridge_bitrate),
        }
    }
}

/// Wire shape of `/stats.json`. All values are non-negative integers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub bridges_connected: u64,
    pub accepted_bridge_control_websockets: u64,
    pub accepted_bridge_data_websockets: u64,
    pub kicked_bridges: u64,
    pub accepted_remote_controller_websockets: u64,
    pub rejected_remote_controller_websockets_no_bridge: u64,
    pub rate_limit_exceeded: u64,
    pub bridge_to_remote_controller_bytes: u64,
    pub remote_controller_to_bridge_bytes: u64,
    pub bridge_to_remote_controller_bitrate: u64,
    pub remote_controller_to_bridge_bitrate: u64,
}

/// Derives the bitrate gauges from byte-counter deltas, one tick per second.
#[derive(Default)]
pub(crate) struct BitrateSampler {
    prev_bridge_to_remote_controller_bytes: u64,
    prev_remote_controller_to_bridge_bytes: u64,
}

impl BitrateSampler {
    /// Publish `8 × bytes moved since the previous tick` into each gauge.
    /// The first tick after start reports against a zero seed.
    pub(crate) fn tick(&mut self, counters: &Counters) {
        let bytes = read(&counters.bridge_to_remote_controller_bytes);
        counters.bridge_to_remote_controller_bitrate.store(
            8 * bytes.saturating_sub(self.prev_bridge_to_remote_controller_bytes),
            Ordering::Release,
        );
        self.prev_bridge_to_remote_controller_bytes = bytes;

        let bytes = read(&counters.remote_controller_to_bridge_bytes);
        counters.remote_controller_to_bridge_bitrate.store(
            8 * bytes.saturating_sub(self.prev_remote_controller_to_bridge_bytes),
            Ordering::Release,
        );
        self.prev_remote_controller_to_bridge_bytes = bytes;
    }
}

/// Spawn the sampler task. Runs until the shutdown token fires.
pub fn spawn_sampler(state: Arc<RelayState>) {
    tokio::spawn(async move {
        let mut sampler = BitrateSampler::default();
        let mut ticks = tokio::time::interval(Duration::from_secs(1));
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = ticks.tick() => sampler.tick(&state.counters),
            }
        }
    });
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
