//! Metrics Collection
//!
//! Request counters for the seed front-end.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Metrics collector for the seed server
#[derive(Default)]
pub struct Metrics {
    /// Start time for uptime calculation
    start_time: Option<Instant>,

    /// `/peers` requests answered
    pub peer_requests: AtomicU64,

    /// Peer records handed out across all `/peers` responses
    pub peers_served: AtomicU64,

    /// `/lookup` requests answered
    pub lookups: AtomicU64,

    /// `/force` submissions
    pub forced_recrawls: AtomicU64,

    /// Requests rejected with 400
    pub bad_requests: AtomicU64,

    /// Requests failed with 500
    pub internal_errors: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    pub fn record_peers(&self, count: usize) {
        self.peer_requests.fetch_add(1, Ordering::Relaxed);
        self.peers_served.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn inc_lookups(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_forced_recrawls(&self) {
        self.forced_recrawls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bad_requests(&self) {
        self.bad_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_internal_errors(&self) {
        self.internal_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Export metrics in Prometheus format
    pub fn to_prometheus(&self) -> String {
        let series = [
            ("uptime_seconds", "gauge", "Seed server uptime in seconds", self.uptime_secs()),
            (
                "peer_requests_total",
                "counter",
                "Peer list requests answered",
                self.peer_requests.load(Ordering::Relaxed),
            ),
            (
                "peers_served_total",
                "counter",
                "Peer records handed out",
                self.peers_served.load(Ordering::Relaxed),
            ),
            (
                "lookups_total",
                "counter",
                "Address lookups answered",
                self.lookups.load(Ordering::Relaxed),
            ),
            (
                "forced_recrawls_total",
                "counter",
                "Forced recrawls submitted",
                self.forced_recrawls.load(Ordering::Relaxed),
            ),
            (
                "bad_requests_total",
                "counter",
                "Requests rejected as malformed",
                self.bad_requests.load(Ordering::Relaxed),
            ),
            (
                "internal_errors_total",
                "counter",
                "Requests failed with an internal error",
                self.internal_errors.load(Ordering::Relaxed),
            ),
        ];

        let mut output = String::new();
        for (name, kind, help, value) in series {
            output.push_str(&format!(
                "# HELP kratos_peer_seeds_{name} {help}\n\
                 # TYPE kratos_peer_seeds_{name} {kind}\n\
                 kratos_peer_seeds_{name} {value}\n\n"
            ));
        }
        output
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "uptime_secs": self.uptime_secs(),
            "peers": {
                "requests": self.peer_requests.load(Ordering::Relaxed),
                "served": self.peers_served.load(Ordering::Relaxed),
            },
            "lookups": self.lookups.load(Ordering::Relaxed),
            "forced_recrawls": self.forced_recrawls.load(Ordering::Relaxed),
            "errors": {
                "bad_request": self.bad_requests.load(Ordering::Relaxed),
                "internal": self.internal_errors.load(Ordering::Relaxed),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_peers() {
        let metrics = Metrics::new();

        metrics.record_peers(30);
        metrics.record_peers(2);

        assert_eq!(metrics.peer_requests.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.peers_served.load(Ordering::Relaxed), 32);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.inc_lookups();
        metrics.inc_bad_requests();

        let output = metrics.to_prometheus();

        assert!(output.contains("kratos_peer_seeds_lookups_total 1"));
        assert!(output.contains("kratos_peer_seeds_bad_requests_total 1"));
        assert!(output.contains("# TYPE kratos_peer_seeds_uptime_seconds gauge"));
    }

    #[test]
    fn test_json_format() {
        let metrics = Metrics::new();
        metrics.inc_forced_recrawls();
        metrics.inc_internal_errors();

        let json = metrics.to_json();

        assert_eq!(json["forced_recrawls"], 1);
        assert_eq!(json["errors"]["internal"], 1);
    }
}
