//! In this module, we implement all the monitoring logic for the acquisition loop.
//! Nothing that goes wrong on a single datagram is fatal, so instead of errors we
//! keep counters that can be polled from any thread while the loop is running.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

use chrono::{DateTime, Utc};

#[derive(Debug, Default)]
pub struct Stats {
    datagrams: AtomicU64,
    samples: AtomicU64,
    timeouts: AtomicU64,
    recv_errors: AtomicU64,
    dropped_bytes: AtomicU64,
    truncated: AtomicU64,
    consumer_panics: AtomicU64,
    last_datagram: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time copy of [`Stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub datagrams: u64,
    pub samples: u64,
    pub timeouts: u64,
    pub recv_errors: u64,
    /// Trailing bytes of odd-length datagrams that could not form a sample
    pub dropped_bytes: u64,
    /// Datagrams that filled the whole receive buffer and were likely cut short
    pub truncated: u64,
    pub consumer_panics: u64,
    pub last_datagram: Option<DateTime<Utc>>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one received datagram of `len` bytes
    pub(crate) fn record_datagram(&self, len: usize) {
        self.datagrams.fetch_add(1, Ordering::Relaxed);
        self.samples.fetch_add((len / 2) as u64, Ordering::Relaxed);
        self.dropped_bytes
            .fetch_add((len % 2) as u64, Ordering::Relaxed);
        if let Ok(mut last) = self.last_datagram.lock() {
            *last = Some(Utc::now());
        }
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recv_error(&self) {
        self.recv_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_truncated(&self) {
        self.truncated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_consumer_panic(&self) {
        self.consumer_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
            dropped_bytes: self.dropped_bytes.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
            consumer_panics: self.consumer_panics.load(Ordering::Relaxed),
            last_datagram: self.last_datagram.lock().ok().and_then(|last| *last),
        }
    }
}

impl StatsSnapshot {
    /// Counter deltas since `earlier`, used for rate reporting
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            datagrams: self.datagrams.saturating_sub(earlier.datagrams),
            samples: self.samples.saturating_sub(earlier.samples),
            timeouts: self.timeouts.saturating_sub(earlier.timeouts),
            recv_errors: self.recv_errors.saturating_sub(earlier.recv_errors),
            dropped_bytes: self.dropped_bytes.saturating_sub(earlier.dropped_bytes),
            truncated: self.truncated.saturating_sub(earlier.truncated),
            consumer_panics: self.consumer_panics.saturating_sub(earlier.consumer_panics),
            last_datagram: self.last_datagram,
        }
    }
}
