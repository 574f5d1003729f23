//! Recording crawler stub for handler tests

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Mutex;

use crate::crawler::{Crawler, CrawlerError, RecrawlItem, ServiceFilter};
use crate::types::PeerRecord;

#[derive(Default)]
pub struct StubCrawler {
    peers: Vec<PeerRecord>,
    recrawls: Vec<RecrawlItem>,
    failing: bool,
    panicking: bool,
    last_request: Mutex<Option<(usize, ServiceFilter)>>,
    connects: Mutex<Vec<SocketAddr>>,
}

impl StubCrawler {
    pub fn with_peers(peers: Vec<PeerRecord>) -> Self {
        Self {
            peers,
            ..Default::default()
        }
    }

    pub fn with_recrawls(mut self, recrawls: Vec<RecrawlItem>) -> Self {
        self.recrawls = recrawls;
        self
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panicking: true,
            ..Default::default()
        }
    }

    pub fn last_request(&self) -> Option<(usize, ServiceFilter)> {
        *self.last_request.lock().unwrap()
    }

    pub fn connects(&self) -> Vec<SocketAddr> {
        self.connects.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), CrawlerError> {
        if self.failing {
            return Err(CrawlerError::Unavailable("stub failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Crawler for StubCrawler {
    fn default_port(&self) -> u16 {
        8333
    }

    async fn get_some_peers(
        &self,
        count: usize,
        filter: ServiceFilter,
    ) -> Result<Vec<(SocketAddr, PeerRecord)>, CrawlerError> {
        if self.panicking {
            panic!("stub crawler panicked");
        }
        *self.last_request.lock().unwrap() = Some((count, filter));
        self.check()?;

        Ok(self
            .peers
            .iter()
            .filter(|p| filter.matches(p.service_bits))
            .take(count)
            .map(|p| (p.address, p.clone()))
            .collect())
    }

    async fn address_lookup(&self, address: &SocketAddr) -> Result<Option<PeerRecord>, CrawlerError> {
        self.check()?;
        Ok(self.peers.iter().find(|p| &p.address == address).cloned())
    }

    async fn snapshot_recrawl_queue(&self) -> Result<Vec<RecrawlItem>, CrawlerError> {
        self.check()?;
        Ok(self.recrawls.clone())
    }

    fn attempt_connect(&self, address: SocketAddr) {
        self.connects.lock().unwrap().push(address);
    }
}
