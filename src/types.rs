//! Core types for peer seed distribution
//!
//! Domain records handed to us by the crawler, the per-request seed message,
//! and the protobuf wire messages that nodes decode on the other side.

use chrono::{DateTime, Utc};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

// =============================================================================
// SERVICE BITS
// =============================================================================

/// Only the low 24 bits of a service field are meaningful
pub const SERVICE_BITS_MASK: u32 = 0x00FF_FFFF;

/// Peer serves the full chain
pub const NODE_NETWORK: u32 = 1 << 0;

/// Peer answers getutxo queries
pub const NODE_GETUTXO: u32 = 1 << 1;

/// Both bits a getutxo-capable full node must advertise
pub const GETUTXO_SERVICES: u32 = NODE_NETWORK | NODE_GETUTXO;

// =============================================================================
// PEER RECORDS (owned by the crawler, read-only here)
// =============================================================================

/// Reachability of an address as last observed by the crawler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    /// Never probed
    Untested,

    /// Last connection attempt succeeded
    Reachable,

    /// Last connection attempt failed or timed out
    Unreachable,
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeerStatus::Untested => "UNTESTED",
            PeerStatus::Reachable => "OK",
            PeerStatus::Unreachable => "UNREACHABLE",
        };
        f.write_str(s)
    }
}

/// What the crawler knows about one address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    /// Address the peer listens on
    pub address: SocketAddr,

    /// Advertised service bits (24 significant bits)
    pub service_bits: u32,

    /// Whether the peer actually answered a getutxo query
    pub supports_getutxo: bool,

    /// Last observed reachability
    pub status: PeerStatus,

    /// When the status was last updated
    pub last_crawl: Option<DateTime<Utc>>,
}

impl PeerRecord {
    pub fn new(address: SocketAddr, service_bits: u32, supports_getutxo: bool) -> Self {
        Self {
            address,
            service_bits: service_bits & SERVICE_BITS_MASK,
            supports_getutxo,
            status: PeerStatus::Untested,
            last_crawl: None,
        }
    }

    /// Whether this record can be handed out to bootstrapping nodes
    pub fn is_usable(&self) -> bool {
        self.status != PeerStatus::Unreachable
    }
}

impl fmt::Display for PeerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} status={} services={:#08x} getutxo={}",
            self.address, self.status, self.service_bits, self.supports_getutxo
        )?;
        match self.last_crawl {
            Some(at) => write!(f, " last_crawl={}", at.to_rfc3339()),
            None => write!(f, " last_crawl=never"),
        }
    }
}

// =============================================================================
// PER-REQUEST SEED MESSAGE
// =============================================================================

/// Peer list assembled for a single `/peers` response. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSeedsMessage {
    pub peers: Vec<PeerRecord>,
    /// Unix epoch seconds
    pub timestamp: i64,
    pub network_name: String,
}

impl PeerSeedsMessage {
    /// Comma-joined IP strings, the `.txt` representation
    pub fn to_ip_list(&self) -> String {
        self.peers
            .iter()
            .map(|p| p.address.ip().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Protobuf form of this message
    pub fn to_wire(&self) -> PeerSeeds {
        PeerSeeds {
            seed: self.peers.iter().map(PeerSeedData::from).collect(),
            timestamp: self.timestamp,
            net: self.network_name.clone(),
        }
    }
}

// =============================================================================
// WIRE FORMAT (protobuf)
// =============================================================================

/// One peer entry on the wire
#[derive(Clone, PartialEq, prost::Message)]
pub struct PeerSeedData {
    #[prost(string, tag = "1")]
    pub ip_address: String,
    #[prost(uint32, tag = "2")]
    pub port: u32,
    #[prost(uint32, tag = "3")]
    pub services: u32,
}

impl From<&PeerRecord> for PeerSeedData {
    fn from(record: &PeerRecord) -> Self {
        Self {
            ip_address: record.address.ip().to_string(),
            port: u32::from(record.address.port()),
            services: record.service_bits & SERVICE_BITS_MASK,
        }
    }
}

/// Signed payload: the peer list with its generation time and network
#[derive(Clone, PartialEq, prost::Message)]
pub struct PeerSeeds {
    #[prost(message, repeated, tag = "1")]
    pub seed: Vec<PeerSeedData>,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
    #[prost(string, tag = "3")]
    pub net: String,
}

/// Outer envelope. `signature` covers SHA-256 of exactly `peer_seeds`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SignedPeerSeeds {
    #[prost(bytes = "vec", tag = "1")]
    pub peer_seeds: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub pubkey: Vec<u8>,
}

// =============================================================================
// ADDRESSES
// =============================================================================

/// Parse `host` or `host:port` into a socket address.
///
/// Accepts IPv4 (`1.2.3.4`, `1.2.3.4:8333`), bracketed IPv6 (`[::1]`,
/// `[::1]:8333`) and bare IPv6 (`::1`). Hostnames are rejected.
pub fn parse_address(input: &str, default_port: u16) -> Result<SocketAddr, AddressError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AddressError::Empty);
    }

    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }

    // `[v6]` without a port
    if let Some(inner) = input.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if let Ok(ip) = inner.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, default_port));
        }
    }

    Err(AddressError::Invalid(input.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("empty address")]
    Empty,

    #[error("invalid address: {0}")]
    Invalid(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    fn record(addr: &str, services: u32) -> PeerRecord {
        PeerRecord::new(addr.parse().unwrap(), services, false)
    }

    #[test]
    fn test_parse_address_forms() {
        assert_eq!(
            parse_address("1.2.3.4", 8333).unwrap(),
            "1.2.3.4:8333".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_address(" 1.2.3.4:18333 ", 8333).unwrap(),
            "1.2.3.4:18333".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_address("[2001:db8::1]:9000", 8333).unwrap(),
            "[2001:db8::1]:9000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_address("[2001:db8::1]", 8333).unwrap(),
            "[2001:db8::1]:8333".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_address("2001:db8::1", 8333).unwrap(),
            "[2001:db8::1]:8333".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        assert_eq!(parse_address("", 8333), Err(AddressError::Empty));
        assert!(parse_address("seed.example.org", 8333).is_err());
        assert!(parse_address("1.2.3.4:notaport", 8333).is_err());
        assert!(parse_address("1.2.3.4:70000", 8333).is_err());
    }

    #[test]
    fn test_record_masks_service_bits() {
        let r = record("1.2.3.4:8333", 0x7F00_0001);
        assert_eq!(r.service_bits, 0x0000_0001);
    }

    #[test]
    fn test_ip_list_omits_ports() {
        let msg = PeerSeedsMessage {
            peers: vec![record("1.2.3.4:8333", 1), record("5.6.7.8:8333", 1)],
            timestamp: 0,
            network_name: "main".to_string(),
        };
        assert_eq!(msg.to_ip_list(), "1.2.3.4,5.6.7.8");
    }

    #[test]
    fn test_wire_message_fields() {
        let msg = PeerSeedsMessage {
            peers: vec![record("1.2.3.4:8333", 0x409)],
            timestamp: 1_700_000_000,
            network_name: "test".to_string(),
        };

        let wire = msg.to_wire();
        let decoded = PeerSeeds::decode(wire.encode_to_vec().as_slice()).unwrap();

        assert_eq!(decoded.net, "test");
        assert_eq!(decoded.timestamp, 1_700_000_000);
        assert_eq!(decoded.seed.len(), 1);
        assert_eq!(decoded.seed[0].ip_address, "1.2.3.4");
        assert_eq!(decoded.seed[0].port, 8333);
        assert_eq!(decoded.seed[0].services, 0x409);
    }

    #[test]
    fn test_record_display() {
        let r = record("9.9.9.9:8333", 1);
        let s = r.to_string();
        assert!(s.starts_with("9.9.9.9:8333 status=UNTESTED"));
        assert!(s.ends_with("last_crawl=never"));
    }
}
