// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

/// Configuration for the relay server.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "bridge-relay", about = "Websocket rendezvous relay for NAT-bound bridges")]
pub struct RelayConfig {
    /// HTTP listen address. A bare `:port` binds all interfaces.
    #[arg(long, default_value = ":8080", env = "BRIDGE_RELAY_ADDRESS")]
    pub address: String,

    /// Directory served on the HTTP root.
    #[arg(long, default_value = "./static", env = "BRIDGE_RELAY_STATIC_DIR")]
    pub static_dir: PathBuf,
}

impl RelayConfig {
    /// Listen address with the bare `:port` form normalised for the binder.
    pub fn listen_addr(&self) -> String {
        if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
