use crate::{
    run_consumer, run_producer, BlockRing, ConsumerReport, CopyConfig, CopyError, Metrics,
    Monitor, ProducerReport, RingError, StopSignal,
};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};
use std::time::{Duration, Instant};

/// Outcome of a completed copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyReport {
    /// Bytes read from the input.
    pub bytes_read: u64,
    /// Bytes written to the output.
    pub bytes_written: u64,
    /// Data blocks moved through the ring.
    pub blocks: u64,
    /// Times the producer waited on a full ring.
    pub read_waits: u64,
    /// Times the consumer waited on an empty ring.
    pub write_waits: u64,
    /// Wall-clock duration of the copy.
    pub elapsed: Duration,
}

/// One prepared copy: configuration validated and ring allocated.
///
/// Splitting preparation from [`run`](BlockCopy::run) lets callers allocate
/// the ring before creating the output, so a failed allocation leaves no file
/// behind.
pub struct BlockCopy {
    config: CopyConfig,
    ring: BlockRing,
    metrics: Arc<Metrics>,
}

impl BlockCopy {
    /// Validates `config` and allocates the ring.
    pub fn new(config: &CopyConfig) -> Result<Self, CopyError> {
        config.validate()?;
        let metrics = Arc::new(Metrics::new());
        let ring = BlockRing::with_metrics(config.block_size, config.capacity, Arc::clone(&metrics))?;
        Ok(Self {
            config: *config,
            ring,
            metrics,
        })
    }

    /// Shared counters of this copy.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Copies `input` to `output` and waits for completion.
    ///
    /// Starts the monitor (when `progress` is given), then the producer and
    /// consumer threads; joins both workers, then stops and joins the monitor.
    /// `total_size` only feeds the progress percentages; 0 means unknown.
    pub fn run<R, W>(
        self,
        input: R,
        output: W,
        total_size: u64,
        progress: Option<&mut (dyn Write + Send)>,
    ) -> Result<CopyReport, CopyError>
    where
        R: Read + Send,
        W: Write + Send,
    {
        let Self {
            config,
            ring,
            metrics,
        } = self;
        metrics.set_total_size(total_size);
        let (producer, consumer) = ring.split();
        let stop = Arc::new(StopSignal::new());
        let policy = config.write_error_policy;

        tracing::info!(
            block_size = config.block_size,
            capacity = config.capacity,
            total_size,
            "starting block copy"
        );
        let start = Instant::now();

        let (produced, consumed) = thread::scope(|scope| {
            let monitor = progress.map(|out| {
                let monitor =
                    Monitor::new(Arc::clone(&metrics), Arc::clone(&stop), config.progress_interval, out);
                thread::Builder::new()
                    .name("ringcopy-monitor".into())
                    .spawn_scoped(scope, move || monitor.run())
            });

            let workers = thread::Builder::new()
                .name("ringcopy-producer".into())
                .spawn_scoped(scope, move || run_producer(input, producer))
                .map_err(|source| CopyError::Spawn {
                    name: "producer",
                    source,
                })
                .and_then(|producer| {
                    thread::Builder::new()
                        .name("ringcopy-consumer".into())
                        .spawn_scoped(scope, move || run_consumer(output, consumer, policy))
                        .map(|consumer| (producer, consumer))
                        .map_err(|source| CopyError::Spawn {
                            name: "consumer",
                            source,
                        })
                });

            // The monitor is stopped only after both workers are joined.
            let outcome = workers.map(|(producer, consumer)| {
                (
                    join_worker(producer, "producer"),
                    join_worker(consumer, "consumer"),
                )
            });
            stop.stop();
            if let Some(monitor) = monitor {
                finish_monitor(monitor);
            }
            outcome
        })?;

        let (produced, consumed) = settle(produced, consumed)?;
        let snapshot = metrics.snapshot();
        let report = CopyReport {
            bytes_read: produced.bytes,
            bytes_written: consumed.bytes,
            blocks: consumed.blocks,
            read_waits: snapshot.read_waits,
            write_waits: snapshot.write_waits,
            elapsed: start.elapsed(),
        };
        tracing::info!(
            bytes = report.bytes_written,
            blocks = report.blocks,
            read_waits = report.read_waits,
            write_waits = report.write_waits,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "block copy complete"
        );
        Ok(report)
    }
}

/// Copies `input` to `output` through a ring configured by `config`.
pub fn copy_stream<R, W>(
    input: R,
    output: W,
    total_size: u64,
    config: &CopyConfig,
    progress: Option<&mut (dyn Write + Send)>,
) -> Result<CopyReport, CopyError>
where
    R: Read + Send,
    W: Write + Send,
{
    BlockCopy::new(config)?.run(input, output, total_size, progress)
}

/// A file copy with its input, ring and output in place, ready to run.
pub struct FileCopy {
    copy: BlockCopy,
    input: File,
    output: File,
    total_size: u64,
}

impl FileCopy {
    /// Acquires everything a copy needs, in this order: configuration,
    /// input, ring, output. A missing input therefore never creates the
    /// output, and an existing output is truncated only once everything
    /// else is in place.
    pub fn open(
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        config: &CopyConfig,
    ) -> Result<Self, CopyError> {
        let (input_path, output_path) = (input.as_ref(), output.as_ref());
        config.validate()?;

        let open_input_error = |source| CopyError::OpenInput {
            path: input_path.to_path_buf(),
            source,
        };
        let mut input = File::open(input_path).map_err(open_input_error)?;
        let total_size = input_size(&mut input).map_err(open_input_error)?;
        tracing::debug!(path = %input_path.display(), total_size, "input opened");

        let copy = BlockCopy::new(config)?;

        let output = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(output_path)
            .map_err(|source| CopyError::OpenOutput {
                path: output_path.to_path_buf(),
                source,
            })?;
        tracing::debug!(path = %output_path.display(), "output opened");

        Ok(Self {
            copy,
            input,
            output,
            total_size,
        })
    }

    /// Input size found at open time, 0 if unknown.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Runs the copy. See [`BlockCopy::run`].
    pub fn run(self, progress: Option<&mut (dyn Write + Send)>) -> Result<CopyReport, CopyError> {
        self.copy
            .run(self.input, self.output, self.total_size, progress)
    }
}

/// Copies the file (or device) at `input` to `output`.
///
/// Shorthand for [`FileCopy::open`] followed by [`FileCopy::run`].
pub fn copy_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &CopyConfig,
    progress: Option<&mut (dyn Write + Send)>,
) -> Result<CopyReport, CopyError> {
    FileCopy::open(input, output, config)?.run(progress)
}

/// Number of bytes the input is expected to yield.
///
/// Regular files report it in their metadata. Block devices report 0 there,
/// so their end is found by seeking. Pipes and other unseekable inputs are
/// reported as 0 (unknown).
fn input_size(file: &mut File) -> io::Result<u64> {
    let metadata = file.metadata()?;
    if metadata.is_file() {
        return Ok(metadata.len());
    }
    match file.seek(SeekFrom::End(0)) {
        Ok(len) => {
            file.seek(SeekFrom::Start(0))?;
            Ok(len)
        }
        Err(err) => {
            tracing::debug!(error = %err, "input size unknown");
            Ok(0)
        }
    }
}

fn join_worker<T>(
    handle: ScopedJoinHandle<'_, Result<T, CopyError>>,
    name: &'static str,
) -> Result<T, CopyError> {
    handle.join().unwrap_or_else(|_| {
        tracing::error!(thread = name, "worker panicked");
        Err(CopyError::WorkerPanicked(name))
    })
}

fn finish_monitor(monitor: io::Result<ScopedJoinHandle<'_, io::Result<u64>>>) {
    match monitor.map(ScopedJoinHandle::join) {
        Ok(Ok(Ok(lines))) => tracing::debug!(lines, "monitor stopped"),
        Ok(Ok(Err(err))) => tracing::warn!(error = %err, "progress output failed"),
        Ok(Err(_)) => tracing::warn!("monitor panicked"),
        Err(err) => tracing::warn!(error = %err, "failed to spawn monitor"),
    }
}

/// Picks the error that explains a failed copy.
///
/// When one side fails, the other usually sees the ring disconnect; that
/// disconnect is an echo, not the cause.
fn settle(
    produced: Result<ProducerReport, CopyError>,
    consumed: Result<ConsumerReport, CopyError>,
) -> Result<(ProducerReport, ConsumerReport), CopyError> {
    match (produced, consumed) {
        (Ok(produced), Ok(consumed)) => Ok((produced, consumed)),
        (Err(CopyError::Ring(RingError::Disconnected)), Err(err)) | (Ok(_), Err(err)) => Err(err),
        (Err(err), _) => Err(err),
    }
}
