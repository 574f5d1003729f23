//! Crawler Interface
//!
//! The HTTP front-end never owns peer state. Everything it serves comes from
//! a `Crawler`, which keeps its own address table and recrawl queue and is
//! free to mutate them concurrently. Implementations are responsible for
//! giving readers a consistent snapshot.
//!
//! `AddressBook` is the in-process implementation used by the binary.

mod address_book;
mod executor;

pub use address_book::{run_recrawl_loop, AddressBook};
pub use executor::{run_dispatcher, ConnectExecutor};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::net::SocketAddr;

use crate::types::{PeerRecord, GETUTXO_SERVICES, SERVICE_BITS_MASK};

/// Service requirement passed to `Crawler::get_some_peers`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceFilter {
    /// No filtering, every usable peer qualifies
    Any,

    /// Peer must advertise all of these bits (already masked to 24 bits)
    Require(u32),
}

impl ServiceFilter {
    /// Build a filter from a raw client-supplied mask
    pub fn from_raw(raw: i64) -> Self {
        ServiceFilter::Require((raw & i64::from(SERVICE_BITS_MASK)) as u32)
    }

    /// Whether a peer advertising `service_bits` passes this filter
    pub fn matches(&self, service_bits: u32) -> bool {
        match self {
            ServiceFilter::Any => true,
            ServiceFilter::Require(mask) => service_bits & mask == *mask,
        }
    }

    /// Whether both the network and getutxo bits are requested.
    /// `Any` counts as all bits set.
    pub fn requests_getutxo(&self) -> bool {
        match self {
            ServiceFilter::Any => true,
            ServiceFilter::Require(mask) => mask & GETUTXO_SERVICES == GETUTXO_SERVICES,
        }
    }
}

/// One entry of the pending recrawl queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecrawlItem {
    pub address: SocketAddr,
    pub due: DateTime<Utc>,
}

impl fmt::Display for RecrawlItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} due {}", self.address, self.due.to_rfc3339())
    }
}

/// Read and trigger operations the front-end needs from the crawler
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Port assumed when a client omits one
    fn default_port(&self) -> u16;

    /// Up to `count` usable peers matching `filter`, in a stable order
    async fn get_some_peers(
        &self,
        count: usize,
        filter: ServiceFilter,
    ) -> Result<Vec<(SocketAddr, PeerRecord)>, CrawlerError>;

    /// Current record for `address`, if the crawler knows it
    async fn address_lookup(&self, address: &SocketAddr) -> Result<Option<PeerRecord>, CrawlerError>;

    /// Copy of the pending recrawl queue at call time
    async fn snapshot_recrawl_queue(&self) -> Result<Vec<RecrawlItem>, CrawlerError>;

    /// Queue a connection attempt. Must not block and reports nothing back.
    fn attempt_connect(&self, address: SocketAddr);
}

#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error("crawler unavailable: {0}")]
    Unavailable(String),
}
