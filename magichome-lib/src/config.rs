use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 5577;
pub const DISCOVERY_PORT: u16 = 48899;

/// Top level configuration. Every section falls back to its defaults, so a
/// partial file is fine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub discovery: DiscoveryConfig,
    pub reconnect: ReconnectPolicy,
}

/// TCP settings for one controller connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub port: u16,
    pub connect_timeout_ms: u64,
    /// Upper bound for collecting one complete response.
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            port: DEFAULT_PORT,
            connect_timeout_ms: 3000,
            read_timeout_ms: 2000,
            write_timeout_ms: 2000,
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// UDP settings for a discovery scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Local address the scan socket binds to.
    pub bind_address: SocketAddr,
    /// Where the discovery token is sent.
    pub target_address: SocketAddr,
    /// Longest single wait for a reply before re-checking the deadline and
    /// broadcasting again.
    pub receive_wait_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DISCOVERY_PORT)),
            target_address: SocketAddr::from((Ipv4Addr::BROADCAST, DISCOVERY_PORT)),
            receive_wait_ms: 1000,
        }
    }
}

impl DiscoveryConfig {
    pub fn receive_wait(&self) -> Duration {
        Duration::from_millis(self.receive_wait_ms)
    }
}

/// When the polling host should give up on a flaky link. Nothing in the
/// session consults this; see [`crate::util::health::LinkHealth`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Consecutive failed refreshes before the host forces a reconnect.
    pub max_consecutive_failures: u32,
    /// Seconds without a successful refresh before the device is reported
    /// offline.
    pub offline_after_secs: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            max_consecutive_failures: 3,
            offline_after_secs: 60,
        }
    }
}

impl ReconnectPolicy {
    pub fn offline_after(&self) -> Duration {
        Duration::from_secs(self.offline_after_secs)
    }
}
