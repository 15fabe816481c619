//! Broadcaster statistics collection.
//!
//! Counters are updated from the tick loop and from sink delivery tasks:
//! - Ticks produced, fields that failed to encode and messages that failed to serialize
//! - Live subscriber count and subscribers dropped on send failure
//! - External sink deliveries that succeeded or failed
//! - Uptime

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Point-in-time view of the counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastStatistics {
    pub ticks: u64,
    pub encode_failures: u64,
    pub serialize_failures: u64,
    pub subscribers: usize,
    pub subscribers_dropped: u64,
    pub sink_deliveries: u64,
    pub sink_failures: u64,
    /// Seconds since the collector was created.
    pub uptime: u64,
}

/// Collects and tracks broadcaster statistics.
pub struct StatisticsCollector {
    start_time: Instant,
    ticks: AtomicU64,
    encode_failures: AtomicU64,
    serialize_failures: AtomicU64,
    subscribers: AtomicUsize,
    subscribers_dropped: AtomicU64,
    sink_deliveries: AtomicU64,
    sink_failures: AtomicU64,
}

impl StatisticsCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            ticks: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            serialize_failures: AtomicU64::new(0),
            subscribers: AtomicUsize::new(0),
            subscribers_dropped: AtomicU64::new(0),
            sink_deliveries: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
        }
    }

    /// Record one completed tick and how many fields it failed to encode.
    pub fn record_tick(&self, encode_failures: usize) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.encode_failures
            .fetch_add(encode_failures as u64, Ordering::Relaxed);
    }

    /// Record a tick whose push message could not be serialized.
    pub fn record_serialize_failure(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.serialize_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Set the live subscriber count.
    pub fn set_subscribers(&self, count: usize) {
        self.subscribers.store(count, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, count: usize) {
        self.subscribers_dropped
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_sink_delivery(&self) {
        self.sink_deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics snapshot.
    pub fn snapshot(&self) -> BroadcastStatistics {
        BroadcastStatistics {
            ticks: self.ticks.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            serialize_failures: self.serialize_failures.load(Ordering::Relaxed),
            subscribers: self.subscribers.load(Ordering::Relaxed),
            subscribers_dropped: self.subscribers_dropped.load(Ordering::Relaxed),
            sink_deliveries: self.sink_deliveries.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            uptime: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for StatisticsCollector {
    fn default() -> Self {
        Self::new()
    }
}
