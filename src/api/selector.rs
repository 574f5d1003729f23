//! Peer selection for `/peers`
//!
//! Turns parsed query parameters into a crawler call and applies the
//! getutxo strengthening: a client asking for both the network and getutxo
//! service bits with `getutxo=true` only gets peers that really answered a
//! getutxo query, not merely ones that advertise the bit.

use std::sync::Arc;

use super::query::PeersQuery;
use crate::crawler::{Crawler, CrawlerError};
use crate::types::PeerRecord;

pub async fn select_peers(
    crawler: &Arc<dyn Crawler>,
    query: &PeersQuery,
    max_peers: usize,
) -> Result<Vec<PeerRecord>, CrawlerError> {
    let peers = crawler.get_some_peers(max_peers, query.filter).await?;
    let strict_getutxo = query.getutxo && query.filter.requests_getutxo();

    Ok(peers
        .into_iter()
        .map(|(_, record)| record)
        .filter(|record| !strict_getutxo || record.supports_getutxo)
        .collect())
}
