// Slotbridge - Peripheral Card Link Emulator
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Card configuration: link endpoints, ROM image and trace toggles.
//!
//! Loaded from a YAML manifest or built programmatically. Defaults match the
//! physical card's fixed constants (receive port 22129, peer on localhost
//! port 22130).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

pub const DEFAULT_LISTEN_PORT: u16 = 22129;
pub const DEFAULT_PEER_PORT: u16 = 22130;
pub const DEFAULT_PEER_HOST: &str = "127.0.0.1";

/// Per-card diagnostic toggles, passed in at construction instead of living
/// in process-global state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceOptions {
    /// Log every dispatched register access.
    pub io: bool,
    /// Log firmware-window reads.
    pub firmware: bool,
    /// Log decoded handshake line transitions.
    pub handshake: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardConfig {
    /// Local UDP port the listener binds; 0 picks an ephemeral port.
    pub listen_port: u16,
    pub peer_host: String,
    pub peer_port: u16,
    /// Firmware ROM image; when absent the firmware windows read as zero.
    pub rom: Option<PathBuf>,
    pub trace: TraceOptions,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            peer_host: DEFAULT_PEER_HOST.to_string(),
            peer_port: DEFAULT_PEER_PORT,
            rom: None,
            trace: TraceOptions::default(),
        }
    }
}

impl CardConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config {:?}", path))
    }

    /// Local bind address for the receive socket.
    pub fn listen_addr(&self) -> SocketAddr {
        (Ipv4Addr::UNSPECIFIED, self.listen_port).into()
    }

    /// Peer destination in `host:port` form, resolved by the transport.
    pub fn peer_addr(&self) -> String {
        format!("{}:{}", self.peer_host, self.peer_port)
    }
}
