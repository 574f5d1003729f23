//! In-memory Address Book
//!
//! Address table plus pending recrawl queue, both behind `tokio::sync::RwLock`.
//! Readers clone what they need under a read lock, so every answer is a
//! snapshot even while probe results are being written back.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::executor::ConnectExecutor;
use super::{Crawler, CrawlerError, RecrawlItem, ServiceFilter};
use crate::config::MAX_RECRAWL_INTERVAL_SECS;
use crate::types::{PeerRecord, PeerStatus};

/// Address table and recrawl schedule
pub struct AddressBook {
    /// Known addresses
    peers: RwLock<HashMap<SocketAddr, PeerRecord>>,

    /// Pending recrawls keyed by (due time, address) so iteration is in due order
    recrawls: RwLock<BTreeSet<(DateTime<Utc>, SocketAddr)>>,

    /// Where `attempt_connect` sends work
    executor: ConnectExecutor,

    default_port: u16,

    /// Delay before an attempted address is crawled again
    recrawl_interval: Duration,

    /// Set during shutdown, reads fail afterwards
    closed: AtomicBool,
}

impl AddressBook {
    pub fn new(executor: ConnectExecutor, default_port: u16, recrawl_interval_secs: u64) -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            recrawls: RwLock::new(BTreeSet::new()),
            executor,
            default_port,
            recrawl_interval: Duration::seconds(
                recrawl_interval_secs.min(MAX_RECRAWL_INTERVAL_SECS) as i64,
            ),
            closed: AtomicBool::new(false),
        }
    }

    /// Add a peer if unknown and schedule it for an immediate crawl
    pub async fn insert(&self, record: PeerRecord) {
        let address = record.address;
        {
            let mut peers = self.peers.write().await;
            if peers.contains_key(&address) {
                return;
            }
            peers.insert(address, record);
        }
        self.schedule(address, Utc::now()).await;
        debug!("Added {} to address book", address);
    }

    /// Record the outcome of a connection attempt and reschedule the address
    pub async fn record_attempt(&self, address: SocketAddr, reachable: bool) {
        let now = Utc::now();
        {
            let mut peers = self.peers.write().await;
            let entry = peers
                .entry(address)
                .or_insert_with(|| PeerRecord::new(address, 0, false));
            entry.status = if reachable {
                PeerStatus::Reachable
            } else {
                PeerStatus::Unreachable
            };
            entry.last_crawl = Some(now);
        }
        let due = now
            .checked_add_signed(self.recrawl_interval)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.schedule(address, due).await;
    }

    /// Remove and return every recrawl whose due time has passed
    pub async fn take_due_recrawls(&self, now: DateTime<Utc>) -> Vec<SocketAddr> {
        let mut recrawls = self.recrawls.write().await;
        let due: Vec<_> = recrawls
            .iter()
            .take_while(|(at, _)| *at <= now)
            .cloned()
            .collect();

        for key in &due {
            recrawls.remove(key);
        }

        due.into_iter().map(|(_, addr)| addr).collect()
    }

    /// Hand due recrawls to the executor. Rejected ones stay scheduled.
    /// Returns how many were accepted.
    pub async fn submit_due_recrawls(&self, now: DateTime<Utc>) -> usize {
        let due = self.take_due_recrawls(now).await;
        let mut accepted = 0;
        let mut rejected = Vec::new();

        for address in due {
            if self.executor.submit(address) {
                accepted += 1;
            } else {
                rejected.push(address);
            }
        }

        if !rejected.is_empty() {
            let mut recrawls = self.recrawls.write().await;
            for address in rejected {
                // A probe result may have rescheduled it in the meantime
                if !recrawls.iter().any(|(_, addr)| *addr == address) {
                    recrawls.insert((now, address));
                }
            }
        }

        accepted
    }

    /// Number of known addresses
    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Stop serving reads
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        info!("📕 Address book closed");
    }

    async fn schedule(&self, address: SocketAddr, due: DateTime<Utc>) {
        let mut recrawls = self.recrawls.write().await;
        recrawls.retain(|(_, addr)| *addr != address);
        recrawls.insert((due, address));
    }

    fn ensure_open(&self) -> Result<(), CrawlerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CrawlerError::Unavailable("address book is closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Crawler for AddressBook {
    fn default_port(&self) -> u16 {
        self.default_port
    }

    async fn get_some_peers(
        &self,
        count: usize,
        filter: ServiceFilter,
    ) -> Result<Vec<(SocketAddr, PeerRecord)>, CrawlerError> {
        self.ensure_open()?;

        let peers = self.peers.read().await;
        let mut selected: Vec<_> = peers
            .values()
            .filter(|p| p.is_usable() && filter.matches(p.service_bits))
            .map(|p| (p.address, p.clone()))
            .collect();

        selected.sort_by_key(|(addr, _)| *addr);
        selected.truncate(count);

        Ok(selected)
    }

    async fn address_lookup(&self, address: &SocketAddr) -> Result<Option<PeerRecord>, CrawlerError> {
        self.ensure_open()?;
        Ok(self.peers.read().await.get(address).cloned())
    }

    async fn snapshot_recrawl_queue(&self) -> Result<Vec<RecrawlItem>, CrawlerError> {
        self.ensure_open()?;
        let recrawls = self.recrawls.read().await;
        Ok(recrawls
            .iter()
            .map(|(due, address)| RecrawlItem {
                address: *address,
                due: *due,
            })
            .collect())
    }

    fn attempt_connect(&self, address: SocketAddr) {
        self.executor.submit(address);
    }
}

/// Drain due recrawls into the executor every `interval_secs`
pub async fn run_recrawl_loop(book: Arc<AddressBook>, interval_secs: u64) -> anyhow::Result<()> {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let accepted = book.submit_due_recrawls(Utc::now()).await;
        if accepted > 0 {
            debug!("🔁 Submitted {} due recrawls", accepted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NODE_GETUTXO, NODE_NETWORK};

    fn book() -> AddressBook {
        let (executor, _rx) = ConnectExecutor::channel(16);
        AddressBook::new(executor, 8333, 600)
    }

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_get_some_peers_is_sorted_and_limited() {
        let book = book();
        book.insert(PeerRecord::new(addr("5.6.7.8:8333"), NODE_NETWORK, false)).await;
        book.insert(PeerRecord::new(addr("1.2.3.4:8333"), NODE_NETWORK, false)).await;
        book.insert(PeerRecord::new(addr("3.3.3.3:8333"), NODE_NETWORK, false)).await;

        let peers = book.get_some_peers(2, ServiceFilter::Any).await.unwrap();
        let addrs: Vec<_> = peers.iter().map(|(a, _)| *a).collect();
        assert_eq!(addrs, vec![addr("1.2.3.4:8333"), addr("3.3.3.3:8333")]);
    }

    #[tokio::test]
    async fn test_filter_and_unreachable_excluded() {
        let book = book();
        book.insert(PeerRecord::new(addr("1.1.1.1:8333"), NODE_NETWORK | NODE_GETUTXO, true)).await;
        book.insert(PeerRecord::new(addr("2.2.2.2:8333"), NODE_NETWORK, false)).await;
        book.insert(PeerRecord::new(addr("3.3.3.3:8333"), NODE_NETWORK | NODE_GETUTXO, true)).await;
        book.record_attempt(addr("3.3.3.3:8333"), false).await;

        let peers = book
            .get_some_peers(30, ServiceFilter::Require(NODE_NETWORK | NODE_GETUTXO))
            .await
            .unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].0, addr("1.1.1.1:8333"));
    }

    #[tokio::test]
    async fn test_lookup_reflects_attempts() {
        let book = book();
        let a = addr("9.9.9.9:8333");
        assert!(book.address_lookup(&a).await.unwrap().is_none());

        book.record_attempt(a, true).await;
        let record = book.address_lookup(&a).await.unwrap().unwrap();
        assert_eq!(record.status, PeerStatus::Reachable);
        assert!(record.last_crawl.is_some());
    }

    #[tokio::test]
    async fn test_recrawl_queue_snapshot_and_drain() {
        let book = book();
        book.insert(PeerRecord::new(addr("1.2.3.4:8333"), NODE_NETWORK, false)).await;
        book.insert(PeerRecord::new(addr("1.2.3.4:8333"), NODE_NETWORK, false)).await;
        book.record_attempt(addr("5.6.7.8:8333"), false).await;

        let snapshot = book.snapshot_recrawl_queue().await.unwrap();
        assert_eq!(snapshot.len(), 2);

        let due = book.take_due_recrawls(Utc::now()).await;
        assert_eq!(due, vec![addr("1.2.3.4:8333")]);

        // The earlier snapshot is unaffected by the drain
        assert_eq!(snapshot.len(), 2);
        assert_eq!(book.snapshot_recrawl_queue().await.unwrap().len(), 1);
        assert_eq!(book.len().await, 2);
    }

    #[tokio::test]
    async fn test_rejected_recrawls_stay_scheduled() {
        let (executor, mut rx) = ConnectExecutor::channel(1);
        let book = AddressBook::new(executor, 8333, 600);
        book.insert(PeerRecord::new(addr("1.2.3.4:8333"), NODE_NETWORK, false)).await;
        book.insert(PeerRecord::new(addr("5.6.7.8:8333"), NODE_NETWORK, false)).await;

        let now = Utc::now();
        assert_eq!(book.submit_due_recrawls(now).await, 1);

        let queued = rx.try_recv().unwrap();
        let pending = book.snapshot_recrawl_queue().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_ne!(pending[0].address, queued);

        // Next pass picks up the one that did not fit
        assert_eq!(book.submit_due_recrawls(now).await, 1);
        assert_eq!(rx.try_recv().unwrap(), pending[0].address);
        assert!(book.snapshot_recrawl_queue().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_huge_recrawl_interval_does_not_panic() {
        let (executor, _rx) = ConnectExecutor::channel(1);
        let book = AddressBook::new(executor, 8333, u64::MAX);
        book.record_attempt(addr("1.2.3.4:8333"), true).await;

        let pending = book.snapshot_recrawl_queue().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].due > Utc::now());
    }

    #[tokio::test]
    async fn test_closed_book_fails_reads() {
        let book = book();
        book.close();
        assert!(book.get_some_peers(30, ServiceFilter::Any).await.is_err());
        assert!(book.snapshot_recrawl_queue().await.is_err());
    }
}
