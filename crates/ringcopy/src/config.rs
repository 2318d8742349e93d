use crate::ConfigError;
use std::time::Duration;

/// Default block size: 1 MiB.
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// Default number of blocks in the ring.
pub const DEFAULT_CAPACITY: usize = 10;

/// Default delay between two progress lines (1/8 s).
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_micros(1_000_000 / 8);

/// What the consumer does when writing a block fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteErrorPolicy {
    /// Stop the copy on the first write error.
    #[default]
    Abort,
    /// Log the error, keep draining the ring, and report the first error once
    /// the input is exhausted.
    Continue,
}

/// Configuration for a block copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyConfig {
    /// Bytes per block (maximum bytes moved by one read or write).
    pub block_size: usize,
    /// Number of blocks in the ring.
    pub capacity: usize,
    /// Delay between two progress samples.
    pub progress_interval: Duration,
    /// Reaction to output write failures.
    pub write_error_policy: WriteErrorPolicy,
}

impl CopyConfig {
    /// Creates a configuration with the given geometry and default policies.
    pub const fn new(block_size: usize, capacity: usize) -> Self {
        Self {
            block_size,
            capacity,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            write_error_policy: WriteErrorPolicy::Abort,
        }
    }

    /// Small ring of small blocks: fast first output, little memory.
    pub const fn low_latency() -> Self {
        Self::new(64 * 1024, 4)
    }

    /// Large ring of large blocks for bulk device-to-device copies.
    pub const fn high_throughput() -> Self {
        Self::new(4 * 1024 * 1024, 16)
    }

    /// Total ring payload in bytes, `None` on overflow.
    #[inline]
    pub const fn buffer_size(&self) -> Option<usize> {
        self.block_size.checked_mul(self.capacity)
    }

    /// Checks that the configuration describes a usable ring.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.buffer_size().is_none() {
            return Err(ConfigError::BufferTooLarge {
                block_size: self.block_size,
                capacity: self.capacity,
            });
        }
        if self.progress_interval.is_zero() {
            return Err(ConfigError::ZeroProgressInterval);
        }
        Ok(())
    }

    /// Sets the block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Sets the number of blocks.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the progress interval.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Sets the write error policy.
    pub fn with_write_error_policy(mut self, policy: WriteErrorPolicy) -> Self {
        self.write_error_policy = policy;
        self
    }
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE, DEFAULT_CAPACITY)
    }
}
