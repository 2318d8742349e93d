//! Error types for ring and copy operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Invalid copy configuration. Detected before any resource is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Block size of zero bytes.
    #[error("block size must be positive")]
    ZeroBlockSize,
    /// Ring with zero blocks.
    #[error("number of blocks must be positive")]
    ZeroCapacity,
    /// `block_size * capacity` does not fit in memory addresses.
    #[error("ring of {capacity} blocks of {block_size} bytes is too large")]
    BufferTooLarge {
        /// Requested block size.
        block_size: usize,
        /// Requested number of blocks.
        capacity: usize,
    },
    /// Progress interval of zero would spin the monitor.
    #[error("progress interval must be positive")]
    ZeroProgressInterval,
}

/// Errors raised by the block ring and its handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// The ring geometry is invalid.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// The byte region could not be allocated.
    #[error("failed to allocate a {bytes} byte ring buffer")]
    Allocation {
        /// Size of the failed allocation.
        bytes: usize,
    },

    /// The other side of the ring was dropped.
    #[error("ring peer disconnected")]
    Disconnected,

    /// The end marker has already been published (producer) or consumed
    /// (consumer).
    #[error("end of stream already reached")]
    Finished,

    /// Attempt to publish more bytes than a block holds.
    #[error("cannot publish {attempted} bytes into a {block_size} byte block")]
    Oversized {
        /// Number of bytes attempted.
        attempted: usize,
        /// Capacity of one block.
        block_size: usize,
    },
}

/// Errors that end a copy.
#[derive(Debug, Error)]
pub enum CopyError {
    /// Configuration rejected before starting.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// Ring setup or protocol failure.
    #[error(transparent)]
    Ring(RingError),

    /// The input could not be opened.
    #[error("couldn't open input file {}: {source}", .path.display())]
    OpenInput {
        /// Input path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The output could not be opened or created.
    #[error("couldn't open output file {}: {source}", .path.display())]
    OpenOutput {
        /// Output path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Reading the input failed mid-copy.
    #[error("read error: {0}")]
    Read(#[source] io::Error),

    /// Writing the output failed mid-copy.
    #[error("write error: {0}")]
    Write(#[source] io::Error),

    /// Flushing the output after the last block failed.
    #[error("flush error: {0}")]
    Flush(#[source] io::Error),

    /// A copy thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        /// Thread role.
        name: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A worker thread panicked.
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
}

impl From<RingError> for CopyError {
    fn from(err: RingError) -> Self {
        match err {
            RingError::InvalidConfig(config) => Self::InvalidConfig(config),
            other => Self::Ring(other),
        }
    }
}

impl CopyError {
    /// Returns `true` if the copy never started moving data: bad
    /// configuration, unopenable files, a failed ring allocation or a thread
    /// that could not be spawned.
    #[inline]
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::OpenInput { .. }
                | Self::OpenOutput { .. }
                | Self::Ring(RingError::Allocation { .. })
                | Self::Spawn { .. }
        )
    }

    /// Process exit status for this error: `-1` for setup errors, `1` for
    /// failures that happened while copying.
    #[inline]
    pub fn exit_code(&self) -> i32 {
        if self.is_setup_error() {
            -1
        } else {
            1
        }
    }
}
