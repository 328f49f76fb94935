//! Runtime configuration for the relay and the bridge.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the broadcast relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind: String,
    pub port: u16,
    /// A peer's read loop exits once its failure count exceeds this.
    pub max_read_failures: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8000,
            max_read_failures: 8,
        }
    }
}

impl RelayConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Configuration for one participant's bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// `host:port` of the relay.
    pub relay_addr: String,
    /// Media handed to the player on launch.
    pub media: Option<String>,
    pub player_binary: String,
    /// Control socket path. A random temp path is used when unset.
    pub socket_path: Option<PathBuf>,
    /// Attach to an already running player instead of spawning one.
    pub launch_player: bool,
    /// How long a command we issued waits for its echo before the pending
    /// suppression lapses.
    pub echo_timeout: Duration,
    /// How long to wait for a freshly spawned player to open its socket.
    pub connect_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            relay_addr: "127.0.0.1:8000".into(),
            media: None,
            player_binary: "mpv".into(),
            socket_path: None,
            launch_player: true,
            echo_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
        }
    }
}
