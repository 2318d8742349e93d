use crate::{BlockProducer, CopyError};
use std::io::{self, Read};

/// What the producer moved into the ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerReport {
    /// Data blocks published (end marker excluded).
    pub blocks: u64,
    /// Bytes read from the input.
    pub bytes: u64,
}

/// Reads `input` block by block into the ring until end of stream.
///
/// Every run ends with exactly one published end marker, also when reading
/// fails; the consumer then drains what was published and stops. A read
/// error is returned as [`CopyError::Read`]. If the consumer goes away
/// first, the ring error is returned and no end marker is published.
pub fn run_producer<R: Read>(
    mut input: R,
    mut producer: BlockProducer,
) -> Result<ProducerReport, CopyError> {
    let mut report = ProducerReport::default();

    loop {
        let mut slot = producer.reserve()?;

        match read_block(&mut input, slot.as_mut_slice()) {
            Ok(0) => {
                slot.publish_end();
                tracing::debug!(
                    blocks = report.blocks,
                    bytes = report.bytes,
                    "input exhausted"
                );
                return Ok(report);
            }
            Ok(n) => {
                slot.try_publish(n)?;
                report.blocks += 1;
                report.bytes += n as u64;
            }
            Err(err) => {
                slot.publish_end();
                tracing::error!(error = %err, bytes = report.bytes, "read error");
                return Err(CopyError::Read(err));
            }
        }
    }
}

/// One read of up to `buf.len()` bytes, retrying interrupted calls.
fn read_block<R: Read>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match input.read(buf) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}
