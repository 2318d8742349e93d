//! Loom-based concurrency tests for the block ring's wait protocol.
//!
//! Run with: `cargo test --features loom --test loom_tests --release`
//!
//! The ring coordinates through one mutex and two condition variables while
//! block payloads are written and read outside the lock. This file models
//! that protocol with loom's primitives and a tiny capacity so the
//! exhaustive search stays tractable. Payloads live in loom's `UnsafeCell`,
//! so loom flags any access that is not ordered by `publish`/`release`.

#![cfg(feature = "loom")]

use loom::cell::UnsafeCell;
use loom::sync::{Arc, Condvar, Mutex};
use loom::thread;

const CAPACITY: usize = 2;

#[derive(Default)]
struct State {
    queued: usize,
    producer_closed: bool,
    consumer_closed: bool,
}

struct LoomRing {
    state: Mutex<State>,
    space_available: Condvar,
    data_available: Condvar,
    /// Payload per slot, outside the mutex; `None` is the end marker.
    slots: [UnsafeCell<Option<u64>>; CAPACITY],
}

// Safety: slot access follows the cursor protocol, the same as the ring.
unsafe impl Send for LoomRing {}
unsafe impl Sync for LoomRing {}

#[derive(Debug, PartialEq)]
enum Closed {
    Disconnected,
}

impl LoomRing {
    fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            space_available: Condvar::new(),
            data_available: Condvar::new(),
            slots: std::array::from_fn(|_| UnsafeCell::new(None)),
        }
    }

    fn wait_until_space_available(&self) -> Result<(), Closed> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.consumer_closed {
                return Err(Closed::Disconnected);
            }
            if state.queued < CAPACITY {
                return Ok(());
            }
            state = self.space_available.wait(state).unwrap();
        }
    }

    fn wait_until_data_available(&self) -> Result<(), Closed> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.queued > 0 {
                return Ok(());
            }
            if state.producer_closed {
                return Err(Closed::Disconnected);
            }
            state = self.data_available.wait(state).unwrap();
        }
    }

    fn publish_slot(&self) {
        let mut state = self.state.lock().unwrap();
        state.queued += 1;
        assert!(state.queued <= CAPACITY);
        drop(state);
        self.data_available.notify_one();
    }

    fn release_slot(&self) {
        let mut state = self.state.lock().unwrap();
        state.queued -= 1;
        drop(state);
        self.space_available.notify_one();
    }

    /// Producer side: waits for space, fills `index` unlocked, publishes it.
    fn publish(&self, index: usize, value: Option<u64>) -> Result<(), Closed> {
        self.wait_until_space_available()?;
        // SAFETY: the slot is free; the consumer does not touch it until
        // `publish_slot`.
        self.slots[index].with_mut(|slot| unsafe { *slot = value });
        self.publish_slot();
        Ok(())
    }

    /// Consumer side: waits for data, reads `index` unlocked, releases it.
    fn take(&self, index: usize) -> Result<Option<u64>, Closed> {
        self.wait_until_data_available()?;
        // SAFETY: the slot was published; the producer does not rewrite it
        // until `release_slot`.
        let value = self.slots[index].with(|slot| unsafe { *slot });
        self.release_slot();
        Ok(value)
    }

    fn close_producer(&self) {
        self.state.lock().unwrap().producer_closed = true;
        self.data_available.notify_all();
    }

    fn close_consumer(&self) {
        self.state.lock().unwrap().consumer_closed = true;
        self.space_available.notify_all();
    }
}

/// Every value arrives in order, followed by the end marker, with the
/// producer wrapping around a full ring and rewriting released slots.
#[test]
fn loom_blocks_arrive_in_order() {
    loom::model(|| {
        let ring = Arc::new(LoomRing::new());
        let producer_ring = Arc::clone(&ring);

        let producer = thread::spawn(move || {
            let mut index = 0;
            for value in [10, 20, 30] {
                producer_ring.publish(index, Some(value)).unwrap();
                index = (index + 1) % CAPACITY;
            }
            producer_ring.publish(index, None).unwrap();
            producer_ring.close_producer();
        });

        let mut received = Vec::new();
        let mut index = 0;
        while let Some(value) = ring.take(index).unwrap() {
            received.push(value);
            index = (index + 1) % CAPACITY;
        }

        producer.join().unwrap();
        assert_eq!(received, vec![10, 20, 30]);
    });
}

/// A consumer that goes away releases a producer blocked on a full ring.
#[test]
fn loom_consumer_close_wakes_producer() {
    loom::model(|| {
        let ring = Arc::new(LoomRing::new());
        let producer_ring = Arc::clone(&ring);

        let producer = thread::spawn(move || {
            let mut index = 0;
            for value in 0.. {
                if let Err(err) = producer_ring.publish(index, Some(value)) {
                    return (value, err);
                }
                index = (index + 1) % CAPACITY;
            }
            unreachable!()
        });

        ring.close_consumer();

        let (attempted, err) = producer.join().unwrap();
        assert_eq!(err, Closed::Disconnected);
        assert!(attempted as usize <= CAPACITY);
    });
}

/// Blocks published before the producer closes are still drained.
#[test]
fn loom_producer_close_drains_first() {
    loom::model(|| {
        let ring = Arc::new(LoomRing::new());
        let producer_ring = Arc::clone(&ring);

        let producer = thread::spawn(move || {
            producer_ring.publish(0, Some(7)).unwrap();
            producer_ring.close_producer();
        });

        assert_eq!(ring.take(0), Ok(Some(7)));
        assert_eq!(ring.take(1), Err(Closed::Disconnected));
        producer.join().unwrap();
    });
}
