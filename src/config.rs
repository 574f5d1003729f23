//! Peer Seed Server Configuration
//!
//! Loaded from TOML, then overridden by command-line flags.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;

use crate::types::{parse_address, PeerRecord, SERVICE_BITS_MASK};

/// Upper bound for `recrawl_interval_secs` (one week)
pub const MAX_RECRAWL_INTERVAL_SECS: u64 = 7 * 24 * 3600;

/// Main configuration for the peer seed server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedServerConfig {
    // === HTTP ===

    /// Address the HTTP API binds to
    pub bind_address: IpAddr,

    /// Port for the HTTP API
    pub api_port: u16,

    /// Prefix all routes are mounted under ("/" for none)
    pub base_path: String,

    // === Seed contents ===

    /// Network name embedded in signed peer lists ("main", "test", ...)
    pub network_name: String,

    /// Port assumed when `/lookup` or `/force` omit one
    pub default_port: u16,

    /// Maximum peers returned by `/peers`
    pub max_peers_in_response: usize,

    /// `max-age` of the Cache-Control header on `/peers` (seconds)
    pub cache_max_age_secs: u64,

    // === Crawler ===

    /// Timeout for a single connection attempt (seconds)
    pub connect_timeout_secs: u64,

    /// Connection attempts allowed in flight at once
    pub max_concurrent_connects: usize,

    /// Pending connection attempts before new ones are dropped
    pub connect_queue_size: usize,

    /// Delay before an attempted address is crawled again (seconds)
    pub recrawl_interval_secs: u64,

    /// Interval for draining due recrawls (seconds)
    pub maintenance_interval_secs: u64,

    /// Peers loaded into the address book at startup
    pub peers: Vec<StaticPeer>,
}

/// A peer known ahead of time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticPeer {
    /// `host` or `host:port`
    pub address: String,

    /// Advertised service bits
    #[serde(default)]
    pub services: u32,

    /// Peer answers getutxo queries
    #[serde(default)]
    pub supports_getutxo: bool,
}

impl Default for SeedServerConfig {
    fn default() -> Self {
        Self {
            // HTTP
            bind_address: IpAddr::from([0, 0, 0, 0]),
            api_port: 8080,
            base_path: "/".to_string(),

            // Seed contents
            network_name: "main".to_string(),
            default_port: 8333,
            max_peers_in_response: 30,
            cache_max_age_secs: 90,

            // Crawler
            connect_timeout_secs: 10,
            max_concurrent_connects: 32,
            connect_queue_size: 1024,
            recrawl_interval_secs: 600,  // 10 minutes
            maintenance_interval_secs: 30,

            peers: vec![],
        }
    }
}

impl SeedServerConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    // Builder-style methods for CLI overrides

    pub fn with_api_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.api_port = port;
        }
        self
    }

    pub fn with_base_path(mut self, base_path: Option<String>) -> Self {
        if let Some(base_path) = base_path {
            self.base_path = base_path;
        }
        self
    }

    pub fn with_network_name(mut self, network_name: Option<String>) -> Self {
        if let Some(network_name) = network_name {
            self.network_name = network_name;
        }
        self
    }

    /// Static peers as address book records
    pub fn static_peer_records(&self) -> anyhow::Result<Vec<PeerRecord>> {
        self.peers
            .iter()
            .map(|p| -> anyhow::Result<PeerRecord> {
                let address = parse_address(&p.address, self.default_port)?;
                Ok(PeerRecord::new(address, p.services, p.supports_getutxo))
            })
            .collect()
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.base_path.starts_with('/') {
            anyhow::bail!("base_path ({}) must start with '/'", self.base_path);
        }

        if self.base_path.len() > 1 && self.base_path.ends_with('/') {
            anyhow::bail!("base_path ({}) must not end with '/'", self.base_path);
        }

        if self.network_name.is_empty() {
            anyhow::bail!("network_name must not be empty");
        }

        if self.default_port == 0 {
            anyhow::bail!("default_port must not be 0");
        }

        if self.max_peers_in_response == 0 {
            anyhow::bail!("max_peers_in_response must be greater than 0");
        }

        if self.connect_timeout_secs == 0 || self.maintenance_interval_secs == 0 {
            anyhow::bail!("connect_timeout_secs and maintenance_interval_secs must be greater than 0");
        }

        if self.recrawl_interval_secs > MAX_RECRAWL_INTERVAL_SECS {
            anyhow::bail!(
                "recrawl_interval_secs ({}) must not exceed {}",
                self.recrawl_interval_secs,
                MAX_RECRAWL_INTERVAL_SECS
            );
        }

        if self.max_concurrent_connects == 0 || self.connect_queue_size == 0 {
            anyhow::bail!("max_concurrent_connects and connect_queue_size must be greater than 0");
        }

        for peer in &self.peers {
            if peer.services & !SERVICE_BITS_MASK != 0 {
                anyhow::bail!(
                    "peer {} advertises services {:#x} outside the low 24 bits",
                    peer.address,
                    peer.services
                );
            }
        }
        self.static_peer_records()?;

        Ok(())
    }
}
