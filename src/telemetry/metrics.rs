//! Counters for a replay run.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Process-wide counters, shared between setup and the replay loop.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Lines read from input.
    pub lines_read: Counter,
    /// Lines handed to the egress device.
    pub lines_sent: Counter,
    /// Lines dropped because of a timestamp or size error.
    pub lines_skipped: Counter,
    /// Frame bytes accepted by the egress device.
    pub bytes_sent: Counter,
    /// Frames the egress device refused.
    pub tx_errors: Counter,
    /// ARP requests broadcast during neighbor discovery.
    pub discovery_requests: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame accepted by the device.
    pub fn record_tx(&self, bytes: usize) {
        self.lines_sent.inc();
        self.bytes_sent.add(bytes as u64);
    }

    /// Logs a one-line summary of the run.
    pub fn log_summary(&self) {
        info!(
            read = self.lines_read.get(),
            sent = self.lines_sent.get(),
            skipped = self.lines_skipped.get(),
            bytes = self.bytes_sent.get(),
            tx_errors = self.tx_errors.get(),
            arp_requests = self.discovery_requests.get(),
            "replay finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        counter.inc();
        counter.add(41);
        assert_eq!(counter.get(), 42);
    }

    #[test]
    fn test_record_tx() {
        let metrics = Metrics::new();
        metrics.record_tx(60);
        metrics.record_tx(90);

        assert_eq!(metrics.lines_sent.get(), 2);
        assert_eq!(metrics.bytes_sent.get(), 150);
        assert_eq!(metrics.lines_skipped.get(), 0);
    }
}
