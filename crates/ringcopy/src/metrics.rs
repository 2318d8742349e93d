use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared progress counters of one copy.
///
/// Written by the ring handles (bytes, waits) and the orchestrator (total
/// size), read by the monitor without taking the ring lock. All accesses are
/// relaxed: the numbers are advisory and never used for synchronization.
/// Each hot counter sits on its own cache line so the producer and consumer
/// do not false-share.
#[derive(Debug, Default)]
pub struct Metrics {
    bytes_produced: CachePadded<AtomicU64>,
    bytes_consumed: CachePadded<AtomicU64>,
    blocks_produced: CachePadded<AtomicU64>,
    blocks_consumed: CachePadded<AtomicU64>,
    read_waits: CachePadded<AtomicU64>,
    write_waits: CachePadded<AtomicU64>,
    total_size: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the expected number of input bytes (0 when unknown).
    pub fn set_total_size(&self, bytes: u64) {
        self.total_size.store(bytes, Ordering::Relaxed);
    }

    pub fn total_size(&self) -> u64 {
        self.total_size.load(Ordering::Relaxed)
    }

    pub(crate) fn add_produced(&self, bytes: u64) {
        self.bytes_produced.fetch_add(bytes, Ordering::Relaxed);
        self.blocks_produced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_consumed(&self, bytes: u64) {
        self.bytes_consumed.fetch_add(bytes, Ordering::Relaxed);
        self.blocks_consumed.fetch_add(1, Ordering::Relaxed);
    }

    /// Producer suspended waiting for a free slot.
    pub(crate) fn add_read_wait(&self) {
        self.read_waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Consumer suspended waiting for a published slot.
    pub(crate) fn add_write_wait(&self) {
        self.write_waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Best-effort copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_produced: self.bytes_produced.load(Ordering::Relaxed),
            bytes_consumed: self.bytes_consumed.load(Ordering::Relaxed),
            blocks_produced: self.blocks_produced.load(Ordering::Relaxed),
            blocks_consumed: self.blocks_consumed.load(Ordering::Relaxed),
            read_waits: self.read_waits.load(Ordering::Relaxed),
            write_waits: self.write_waits.load(Ordering::Relaxed),
            total_size: self.total_size.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Bytes read from the input and published as data blocks.
    pub bytes_produced: u64,
    /// Bytes of data blocks released by the consumer.
    pub bytes_consumed: u64,
    /// Data blocks published (end marker excluded).
    pub blocks_produced: u64,
    /// Data blocks released (end marker excluded).
    pub blocks_consumed: u64,
    /// Times the producer suspended on a full ring.
    pub read_waits: u64,
    /// Times the consumer suspended on an empty ring.
    pub write_waits: u64,
    /// Expected input size, 0 if unknown.
    pub total_size: u64,
}

impl MetricsSnapshot {
    /// Integer percentage of the input read so far.
    pub fn read_percent(&self) -> u64 {
        percent(self.bytes_produced, self.total_size)
    }

    /// Integer percentage of the input written so far.
    pub fn write_percent(&self) -> u64 {
        percent(self.bytes_consumed, self.total_size)
    }
}

/// `part * 100 / total`, capped at 100; an empty or unknown total counts as
/// done. The total is sampled at open time, so an input that grows while it
/// is copied would otherwise report more than 100.
fn percent(part: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    (u128::from(part) * 100 / u128::from(total)).min(100) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_updates() {
        let metrics = Metrics::new();
        metrics.set_total_size(1000);
        metrics.add_produced(400);
        metrics.add_produced(100);
        metrics.add_consumed(250);
        metrics.add_read_wait();
        metrics.add_write_wait();
        metrics.add_write_wait();

        let snap = metrics.snapshot();
        assert_eq!(snap.bytes_produced, 500);
        assert_eq!(snap.blocks_produced, 2);
        assert_eq!(snap.bytes_consumed, 250);
        assert_eq!(snap.blocks_consumed, 1);
        assert_eq!(snap.read_waits, 1);
        assert_eq!(snap.write_waits, 2);
        assert_eq!(snap.read_percent(), 50);
        assert_eq!(snap.write_percent(), 25);
    }

    #[test]
    fn test_zero_total_reports_complete() {
        let snap = MetricsSnapshot::default();
        assert_eq!(snap.read_percent(), 100);
        assert_eq!(snap.write_percent(), 100);
    }

    #[test]
    fn test_percent_truncates_and_does_not_overflow() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(u64::MAX, u64::MAX), 100);
        assert_eq!(percent(u64::MAX / 2, u64::MAX), 49);
    }

    #[test]
    fn test_percent_caps_when_input_outgrows_total() {
        assert_eq!(percent(150, 100), 100);
        assert_eq!(percent(u64::MAX, 1), 100);

        let snap = MetricsSnapshot {
            bytes_produced: 4096,
            bytes_consumed: 2048,
            total_size: 1024,
            ..MetricsSnapshot::default()
        };
        assert_eq!(snap.read_percent(), 100);
        assert_eq!(snap.write_percent(), 100);
    }
}
