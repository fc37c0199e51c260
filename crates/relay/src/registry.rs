// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent bridge-id → [`Bridge`] table.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bridge::Bridge;

/// The registry behind every lookup and every replace-and-evict.
///
/// A single lock makes `load_and_store`, `load`, and `remove_if_current`
/// linearizable with respect to each other. No operation performs socket
/// I/O while holding it; eviction teardown happens off the critical
/// section.
#[derive(Default)]
pub struct BridgeRegistry {
    bridges: Mutex<HashMap<String, Arc<Bridge>>>,
}

impl BridgeRegistry {
    /// Bind `bridge` to `id`, returning the previous binding if any.
    pub async fn load_and_store(&self, id: &str, bridge: Arc<Bridge>) -> Option<Arc<Bridge>> {
        self.bridges.lock().await.insert(id.to_owned(), bridge)
    }

    /// Current binding for `id`.
    pub async fn load(&self, id: &str) -> Option<Arc<Bridge>> {
        self.bridges.lock().await.get(id).cloned()
    }

    /// Delete the entry only when `bridge` is still the current binding.
    /// Returns whether the entry was removed.
    pub async fn remove_if_current(&self, id: &str, bridge: &Arc<Bridge>) -> bool {
        let mut bridges = self.bridges.lock().await;
        match bridges.get(id) {
            Some(current) if Arc::ptr_eq(current, bridge) => {
                bridges.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Number of bridges currently registered.
    pub async fn count(&self) -> usize {
        self.bridges.lock().await.len()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
