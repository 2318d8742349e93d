//! ringcopy - Block-Level Stream Copy Through a Bounded Ring
//!
//! Copies bytes from one stream to another through a fixed-capacity ring of
//! fixed-size blocks. A producer thread reads the input into successive ring
//! slots, a consumer thread writes them out, and a monitor thread prints a
//! progress line from shared counters.
//!
//! # Key Features
//!
//! - Single-producer single-consumer ring enforced by the type system
//! - Blocking backpressure in both directions (mutex + condition variables)
//! - Payload I/O outside the lock; the lock guards queue metadata only
//! - Explicit end-of-stream marker and peer disconnection
//! - Cooperative monitor shutdown; worker errors decide the exit status
//!
//! # Example
//!
//! ```
//! use ringcopy::{copy_stream, CopyConfig};
//! use std::io::Cursor;
//!
//! let input = vec![7u8; 10_000];
//! let config = CopyConfig::new(4096, 4);
//! let mut output = Vec::new();
//! let report = copy_stream(
//!     Cursor::new(input.clone()),
//!     &mut output,
//!     input.len() as u64,
//!     &config,
//!     None,
//! )
//! .unwrap();
//!
//! assert_eq!(report.bytes_written, 10_000);
//! assert_eq!(output, input);
//! ```

mod config;
mod consumer;
mod copy;
mod error;
mod invariants;
mod metrics;
mod monitor;
mod producer;
mod ring;

pub use config::{
    CopyConfig, WriteErrorPolicy, DEFAULT_BLOCK_SIZE, DEFAULT_CAPACITY, DEFAULT_PROGRESS_INTERVAL,
};
pub use consumer::{run_consumer, ConsumerReport};
pub use copy::{copy_file, copy_stream, BlockCopy, CopyReport, FileCopy};
pub use error::{ConfigError, CopyError, RingError};
pub use metrics::{Metrics, MetricsSnapshot};
pub use monitor::{render_progress, Monitor, StopSignal};
pub use producer::{run_producer, ProducerReport};
pub use ring::{BlockConsumer, BlockProducer, BlockRing, ReadSlot, Slot, WriteSlot};
