use crate::{BlockConsumer, CopyError, WriteErrorPolicy};
use std::io::{self, Write};

/// What the consumer wrote out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Data blocks written (end marker excluded).
    pub blocks: u64,
    /// Bytes successfully written to the output.
    pub bytes: u64,
}

/// Drains the ring into `output` until the end marker.
///
/// Each block is written with `write_all`, so short writes are continued
/// rather than dropped. On a write error the consumer follows `policy`:
/// [`WriteErrorPolicy::Abort`] returns immediately, which disconnects the
/// ring and stops the producer; [`WriteErrorPolicy::Continue`] keeps draining
/// and returns the first error once the end marker arrives.
pub fn run_consumer<W: Write>(
    mut output: W,
    mut consumer: BlockConsumer,
    policy: WriteErrorPolicy,
) -> Result<ConsumerReport, CopyError> {
    let mut report = ConsumerReport::default();
    let mut first_error: Option<io::Error> = None;

    loop {
        let slot = consumer.recv()?;
        if slot.is_end() {
            break;
        }

        match output.write_all(slot.as_slice()) {
            Ok(()) => {
                report.blocks += 1;
                report.bytes += slot.len() as u64;
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    block = slot.index(),
                    bytes = report.bytes,
                    "write error"
                );
                match policy {
                    WriteErrorPolicy::Abort => return Err(CopyError::Write(err)),
                    WriteErrorPolicy::Continue => {
                        first_error.get_or_insert(err);
                    }
                }
            }
        }
    }

    output.flush().map_err(CopyError::Flush)?;
    tracing::debug!(
        blocks = report.blocks,
        bytes = report.bytes,
        "output complete"
    );

    match first_error {
        Some(err) => Err(CopyError::Write(err)),
        None => Ok(report),
    }
}
