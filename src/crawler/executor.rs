//! Connection Attempt Executor
//!
//! Forced and scheduled recrawls are queued here and run in the background.
//! Submitting never blocks: when the queue is full the attempt is dropped.
//! An attempt is a bare TCP connect with a timeout; the outcome is written
//! back to the address book.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, warn};

use super::AddressBook;

/// Handle used to queue connection attempts
#[derive(Clone)]
pub struct ConnectExecutor {
    tx: mpsc::Sender<SocketAddr>,
}

impl ConnectExecutor {
    /// Create a handle and the receiving end for `run_dispatcher`
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SocketAddr>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue an attempt. Returns immediately, `false` if the attempt was dropped.
    pub fn submit(&self, address: SocketAddr) -> bool {
        match self.tx.try_send(address) {
            Ok(()) => {
                debug!("Queued connection attempt to {}", address);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Connect queue full, dropping attempt to {}", address);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Connect executor stopped, dropping attempt to {}", address);
                false
            }
        }
    }
}

/// Pull queued addresses and probe them, at most `max_concurrent` at a time
pub async fn run_dispatcher(
    mut rx: mpsc::Receiver<SocketAddr>,
    book: Arc<AddressBook>,
    connect_timeout: Duration,
    max_concurrent: usize,
) -> anyhow::Result<()> {
    let permits = Arc::new(Semaphore::new(max_concurrent));

    while let Some(address) = rx.recv().await {
        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("Connect semaphore closed: {}", e);
                break;
            }
        };
        let book = book.clone();

        tokio::spawn(async move {
            let reachable = probe(address, connect_timeout).await;
            book.record_attempt(address, reachable).await;
            drop(permit);
        });
    }

    Ok(())
}

async fn probe(address: SocketAddr, connect_timeout: Duration) -> bool {
    match tokio::time::timeout(connect_timeout, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => {
            debug!("✅ {} is reachable", address);
            true
        }
        Ok(Err(e)) => {
            debug!("❌ {} refused: {}", address, e);
            false
        }
        Err(_) => {
            debug!("⌛ {} timed out", address);
            false
        }
    }
}
