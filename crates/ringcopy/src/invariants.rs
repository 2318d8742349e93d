//! Debug assertion macros for block ring invariants.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.
//!
//! Used by `BlockRing` and its producer/consumer handles.

// =============================================================================
// Bounded Occupancy
// =============================================================================

/// Assert that the number of queued blocks never exceeds the ring capacity.
///
/// **Invariant**: `0 ≤ queued ≤ capacity`
///
/// Used in: `publish()` after incrementing, `release()` before decrementing
macro_rules! debug_assert_bounded_occupancy {
    ($queued:expr, $capacity:expr) => {
        debug_assert!(
            $queued <= $capacity,
            "bounded occupancy violated: {} blocks queued in a ring of {}",
            $queued,
            $capacity
        )
    };
}

// =============================================================================
// Cyclic Cursor Advance
// =============================================================================

/// Assert that a slot cursor moved by exactly one position modulo capacity.
///
/// **Invariant**: `new == (old + 1) mod capacity`
///
/// Used in: producer and consumer cursor advance
macro_rules! debug_assert_cursor_step {
    ($name:literal, $old:expr, $new:expr, $capacity:expr) => {
        debug_assert!(
            $new == ($old + 1) % $capacity,
            "{} cursor skipped: moved from {} to {} in a ring of {}",
            $name,
            $old,
            $new,
            $capacity
        )
    };
}

// =============================================================================
// Slot Payload Bound
// =============================================================================

/// Assert that a published slot never claims more bytes than one block.
///
/// **Invariant**: `slot.size ≤ block_size`
///
/// Used in: `ReadSlot` construction before slicing the payload
macro_rules! debug_assert_slot_fits {
    ($size:expr, $block_size:expr) => {
        debug_assert!(
            $size <= $block_size,
            "slot claims {} bytes in a {} byte block",
            $size,
            $block_size
        )
    };
}

// =============================================================================
// Single Terminal Marker
// =============================================================================

/// Assert that nothing is produced or consumed after the end marker.
///
/// **Invariant**: the end marker is the last slot processed by both sides.
///
/// Used in: producer `commit()` and consumer `finish_slot()`
macro_rules! debug_assert_not_finished {
    ($side:literal, $finished:expr) => {
        debug_assert!(
            !$finished,
            "{} touched the ring after the end marker",
            $side
        )
    };
}

pub(crate) use debug_assert_bounded_occupancy;
pub(crate) use debug_assert_cursor_step;
pub(crate) use debug_assert_not_finished;
pub(crate) use debug_assert_slot_fits;
