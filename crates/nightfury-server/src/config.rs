//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the nightfury server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (default `5624`; `0` auto-assigns).
    pub port: u16,
    /// Outbound frames buffered per session before new ones are dropped.
    pub max_send_queue: usize,
    /// Peer messages buffered per client partition before new ones are dropped.
    pub max_partition_queue: usize,
    /// Interval between WebSocket pings in seconds.
    pub heartbeat_interval_secs: u64,
    /// How long shutdown waits for the HTTP listener to wind down.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5624,
            max_send_queue: 256,
            max_partition_queue: 1024,
            heartbeat_interval_secs: 30,
            shutdown_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
