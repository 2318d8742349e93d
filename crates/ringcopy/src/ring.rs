use crate::invariants::{
    debug_assert_bounded_occupancy, debug_assert_cursor_step, debug_assert_not_finished,
    debug_assert_slot_fits,
};
use crate::{ConfigError, Metrics, RingError};
use std::cell::UnsafeCell;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

// =============================================================================
// SYNCHRONIZATION STRATEGY
// =============================================================================
//
// The ring is a single-producer single-consumer bounded queue of fixed-size
// blocks. One mutex guards the queue metadata; two condition variables carry
// the wake-ups in each direction:
//
// - `space_available`: signalled by the consumer after releasing a block,
//   waited on by the producer while `queued == capacity`.
// - `data_available`: signalled by the producer after publishing a block,
//   waited on by the consumer while `queued == 0`.
//
// Both waits re-check their predicate after every wake-up, so spurious
// wake-ups are harmless.
//
// ## Payload Ownership
//
// The byte region and slot descriptors are NOT behind the mutex. Reads and
// writes of block payloads happen outside the lock. Exclusivity comes from
// the cursor protocol:
//
// - The producer only touches block `p` while `queued < capacity`. The
//   consumer only touches block `c` while `queued > 0`, and keeps it counted
//   in `queued` until it releases it. Hence `p == c` implies either
//   `queued == 0` (consumer holds nothing) or `queued == capacity` (producer
//   is waiting), never both sides at once.
// - Descriptor and payload writes by the producer happen-before the mutex
//   release in `publish()`; the consumer acquires the same mutex before it
//   reads them. The reverse edge holds for `release()`.
//
// ## Single-Writer Handles
//
// `BlockRing::split()` consumes the ring and returns exactly one
// `BlockProducer` and one `BlockConsumer`. Each handle owns its cursor, so the
// single-producer single-consumer assumption is enforced by ownership rather
// than by convention.
//
// ## Disconnection
//
// Dropping a handle marks its side closed and wakes the peer. A producer
// waiting for space gets `RingError::Disconnected` once the consumer is gone.
// A consumer first drains every published block and only then observes the
// producer's disconnection.
//
// =============================================================================

/// Descriptor of one ring slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slot {
    /// Number of payload bytes in the block.
    pub size: usize,
    /// Whether this slot is the end-of-stream marker.
    pub is_end: bool,
}

impl Slot {
    /// The end-of-stream marker: no payload, always the last slot.
    pub const END: Self = Self {
        size: 0,
        is_end: true,
    };

    /// A data slot carrying `size` bytes.
    pub const fn data(size: usize) -> Self {
        Self {
            size,
            is_end: false,
        }
    }
}

#[derive(Debug, Default)]
struct RingState {
    /// Blocks published and not yet released.
    queued: usize,
    producer_closed: bool,
    consumer_closed: bool,
}

struct RingInner {
    state: Mutex<RingState>,
    space_available: Condvar,
    data_available: Condvar,
    metrics: Arc<Metrics>,
    block_size: usize,
    capacity: usize,
    /// One descriptor per block.
    slots: Box<[UnsafeCell<Slot>]>,
    /// `capacity * block_size` bytes; block `i` starts at `i * block_size`.
    data: Box<[UnsafeCell<u8>]>,
}

// Safety: the UnsafeCell contents are only accessed under the cursor protocol
// described above; all other state is behind the mutex or atomic.
unsafe impl Send for RingInner {}
unsafe impl Sync for RingInner {}

impl RingInner {
    fn lock(&self) -> MutexGuard<'_, RingState> {
        // The state is a counter and two flags, each updated in one step, so a
        // panic elsewhere cannot leave it half-written.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks while the ring is full. Counts one read wait per call that
    /// actually suspended.
    fn wait_until_space_available(&self) -> Result<(), RingError> {
        let mut state = self.lock();
        let mut waited = false;
        loop {
            if state.consumer_closed {
                return Err(RingError::Disconnected);
            }
            if state.queued < self.capacity {
                return Ok(());
            }
            if !waited {
                self.metrics.add_read_wait();
                waited = true;
            }
            state = self
                .space_available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks while the ring is empty. Counts one write wait per call that
    /// actually suspended.
    fn wait_until_data_available(&self) -> Result<(), RingError> {
        let mut state = self.lock();
        let mut waited = false;
        loop {
            if state.queued > 0 {
                return Ok(());
            }
            if state.producer_closed {
                return Err(RingError::Disconnected);
            }
            if !waited {
                self.metrics.add_write_wait();
                waited = true;
            }
            state = self
                .data_available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn publish(&self, index: usize) {
        let mut state = self.lock();
        state.queued += 1;
        debug_assert_bounded_occupancy!(state.queued, self.capacity);
        tracing::trace!(index, queued = state.queued, "block published");
        drop(state);
        self.data_available.notify_one();
    }

    fn release(&self, index: usize) {
        let mut state = self.lock();
        debug_assert!(state.queued > 0, "released block {index} from an empty ring");
        state.queued -= 1;
        tracing::trace!(index, queued = state.queued, "block released");
        drop(state);
        self.space_available.notify_one();
    }

    fn close_producer(&self) {
        self.lock().producer_closed = true;
        self.data_available.notify_one();
    }

    fn close_consumer(&self) {
        self.lock().consumer_closed = true;
        self.space_available.notify_one();
    }

    fn queued(&self) -> usize {
        self.lock().queued
    }

    #[inline]
    fn slot_ptr(&self, index: usize) -> *mut Slot {
        self.slots[index].get()
    }

    #[inline]
    fn block_ptr(&self, index: usize) -> *mut u8 {
        debug_assert!(index < self.capacity);
        // SAFETY: index < capacity, so the offset stays inside the region.
        unsafe { UnsafeCell::raw_get(self.data.as_ptr()).add(index * self.block_size) }
    }
}

/// Allocates a boxed slice without aborting the process on failure.
fn try_alloc<T>(
    len: usize,
    bytes: usize,
    init: impl FnMut() -> T,
) -> Result<Box<[T]>, RingError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| RingError::Allocation { bytes })?;
    buffer.resize_with(len, init);
    Ok(buffer.into_boxed_slice())
}

/// Fixed-capacity ring of fixed-size blocks.
///
/// Construct it, then [`split`](BlockRing::split) it into its producer and
/// consumer handles. The handles share the ring through an `Arc`; the memory
/// is released when both are dropped.
pub struct BlockRing {
    inner: Arc<RingInner>,
}

impl BlockRing {
    /// Creates a ring of `capacity` blocks of `block_size` bytes each.
    pub fn new(block_size: usize, capacity: usize) -> Result<Self, RingError> {
        Self::with_metrics(block_size, capacity, Arc::new(Metrics::new()))
    }

    /// Creates a ring that reports into an existing set of counters.
    pub fn with_metrics(
        block_size: usize,
        capacity: usize,
        metrics: Arc<Metrics>,
    ) -> Result<Self, RingError> {
        if block_size == 0 {
            return Err(ConfigError::ZeroBlockSize.into());
        }
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity.into());
        }
        let bytes = block_size
            .checked_mul(capacity)
            .ok_or(ConfigError::BufferTooLarge {
                block_size,
                capacity,
            })?;

        let slots = try_alloc(capacity, bytes, || UnsafeCell::new(Slot::default()))?;
        let data = try_alloc(bytes, bytes, || UnsafeCell::new(0u8))?;
        tracing::debug!(block_size, capacity, bytes, "block ring allocated");

        Ok(Self {
            inner: Arc::new(RingInner {
                state: Mutex::new(RingState::default()),
                space_available: Condvar::new(),
                data_available: Condvar::new(),
                metrics,
                block_size,
                capacity,
                slots,
                data,
            }),
        })
    }

    /// Number of blocks in the ring.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Bytes per block.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.inner.block_size
    }

    /// Shared counters of this ring.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    /// Splits the ring into its only producer and only consumer.
    pub fn split(self) -> (BlockProducer, BlockConsumer) {
        let producer = BlockProducer {
            ring: Arc::clone(&self.inner),
            index: 0,
            finished: false,
        };
        let consumer = BlockConsumer {
            ring: self.inner,
            index: 0,
            finished: false,
        };
        (producer, consumer)
    }
}

// ---------------------------------------------------------------------
// PRODUCER
// ---------------------------------------------------------------------

/// Writing end of a [`BlockRing`].
pub struct BlockProducer {
    ring: Arc<RingInner>,
    /// Next slot to fill.
    index: usize,
    /// End marker published.
    finished: bool,
}

impl BlockProducer {
    /// Waits for a free block and returns it for filling.
    ///
    /// Fails with [`RingError::Disconnected`] if the consumer is gone and
    /// [`RingError::Finished`] once the end marker has been published.
    pub fn reserve(&mut self) -> Result<WriteSlot<'_>, RingError> {
        if self.finished {
            return Err(RingError::Finished);
        }
        self.ring.wait_until_space_available()?;
        Ok(WriteSlot { producer: self })
    }

    /// Index of the next slot to be filled.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.ring.block_size
    }

    /// Blocks currently published and not yet released.
    pub fn queued(&self) -> usize {
        self.ring.queued()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.ring.metrics
    }

    /// Whether the end marker has been published.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn commit(&mut self, slot: Slot) {
        debug_assert_not_finished!("producer", self.finished);

        // SAFETY: the producer owns slot `index` until `publish` hands it over.
        unsafe {
            *self.ring.slot_ptr(self.index) = slot;
        }
        self.ring.publish(self.index);

        if slot.is_end {
            self.finished = true;
            return;
        }
        self.ring.metrics.add_produced(slot.size as u64);
        let next = (self.index + 1) % self.ring.capacity;
        debug_assert_cursor_step!("producer", self.index, next, self.ring.capacity);
        self.index = next;
    }
}

impl Drop for BlockProducer {
    fn drop(&mut self) {
        self.ring.close_producer();
    }
}

/// A free block reserved by the producer.
///
/// Dropping it without publishing leaves the producer cursor where it was.
pub struct WriteSlot<'a> {
    producer: &'a mut BlockProducer,
}

impl WriteSlot<'_> {
    /// Ring index of this block.
    #[inline]
    pub fn index(&self) -> usize {
        self.producer.index
    }

    /// Maximum payload of this block.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.producer.ring.block_size
    }

    /// The whole block, for filling.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let ring = &self.producer.ring;
        // SAFETY: the block at `index` is free (checked by `reserve`) and the
        // consumer will not read it before `publish`.
        unsafe { std::slice::from_raw_parts_mut(ring.block_ptr(self.producer.index), ring.block_size) }
    }

    /// Publishes the first `len` bytes of the block as a data slot.
    ///
    /// Returns [`RingError::Oversized`] if `len` exceeds the block size; the
    /// slot stays unpublished in that case.
    pub fn try_publish(self, len: usize) -> Result<(), RingError> {
        let block_size = self.capacity();
        if len > block_size {
            return Err(RingError::Oversized {
                attempted: len,
                block_size,
            });
        }
        self.producer.commit(Slot::data(len));
        Ok(())
    }

    /// Publishes the end-of-stream marker. No further block can be reserved.
    pub fn publish_end(self) {
        self.producer.commit(Slot::END);
    }
}

// ---------------------------------------------------------------------
// CONSUMER
// ---------------------------------------------------------------------

/// Reading end of a [`BlockRing`].
pub struct BlockConsumer {
    ring: Arc<RingInner>,
    /// Next slot to drain.
    index: usize,
    /// End marker received.
    finished: bool,
}

impl BlockConsumer {
    /// Waits for the next published block.
    ///
    /// Fails with [`RingError::Disconnected`] once the producer is gone and
    /// every block it published has been received, and with
    /// [`RingError::Finished`] after the end marker.
    pub fn recv(&mut self) -> Result<ReadSlot<'_>, RingError> {
        if self.finished {
            return Err(RingError::Finished);
        }
        self.ring.wait_until_data_available()?;

        // SAFETY: the slot was published; the producer will not rewrite it
        // until we release it.
        let slot = unsafe { *self.ring.slot_ptr(self.index) };
        debug_assert_slot_fits!(slot.size, self.ring.block_size);
        Ok(ReadSlot {
            consumer: self,
            slot,
        })
    }

    /// Index of the next slot to be drained.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.ring.block_size
    }

    /// Blocks currently published and not yet released.
    pub fn queued(&self) -> usize {
        self.ring.queued()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.ring.metrics
    }

    /// Whether the end marker has been received.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn finish_slot(&mut self, slot: Slot) {
        debug_assert_not_finished!("consumer", self.finished);

        if slot.is_end {
            // Nobody waits for the end marker's block.
            self.finished = true;
            return;
        }
        self.ring.release(self.index);
        self.ring.metrics.add_consumed(slot.size as u64);
        let next = (self.index + 1) % self.ring.capacity;
        debug_assert_cursor_step!("consumer", self.index, next, self.ring.capacity);
        self.index = next;
    }
}

impl Drop for BlockConsumer {
    fn drop(&mut self) {
        self.ring.close_consumer();
    }
}

/// A published block being drained by the consumer.
///
/// Dropping it releases the block back to the producer.
pub struct ReadSlot<'a> {
    consumer: &'a mut BlockConsumer,
    slot: Slot,
}

impl ReadSlot<'_> {
    /// Ring index of this block.
    #[inline]
    pub fn index(&self) -> usize {
        self.consumer.index
    }

    /// Descriptor of this block.
    #[inline]
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.slot.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slot.size == 0
    }

    /// Whether this is the end-of-stream marker.
    #[inline]
    pub fn is_end(&self) -> bool {
        self.slot.is_end
    }

    /// The published payload.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        let ring = &self.consumer.ring;
        // SAFETY: the block was published with `size <= block_size` bytes and
        // stays ours until this guard is dropped.
        unsafe { std::slice::from_raw_parts(ring.block_ptr(self.consumer.index), self.slot.size) }
    }

    /// Releases the block. Same as dropping the guard.
    pub fn release(self) {}
}

impl Drop for ReadSlot<'_> {
    fn drop(&mut self) {
        self.consumer.finish_slot(self.slot);
    }
}
