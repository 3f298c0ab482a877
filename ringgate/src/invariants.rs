//! Debug assertion macros for ring coordination invariants.
//!
//! Active only in debug builds (`#[cfg(debug_assertions)]`), so there is zero
//! overhead in release builds. Each macro is tagged with the invariant it
//! checks so a failing assertion names exactly what broke.

// =============================================================================
// INV-SEQ-01: Monotonic Progress
// =============================================================================

/// Assert that a sequence only ever increases.
///
/// Used in: `Sequence::set`, `Sequencer::publish`.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "INV-SEQ-01 violated: {} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

// =============================================================================
// INV-SEQ-02: Bounded Claim
// =============================================================================

/// Assert that a producer never claims further ahead than the ring can hold
/// given the slowest gating consumer.
///
/// Used in: `Sequencer::next_n` / `try_next_n` after resolving the cached or
/// freshly scanned gating minimum.
macro_rules! debug_assert_bounded_claim {
    ($wrap_point:expr, $min_gating:expr) => {
        debug_assert!(
            $wrap_point <= $min_gating,
            "INV-SEQ-02 violated: wrap point {} ahead of slowest gating sequence {}",
            $wrap_point,
            $min_gating
        )
    };
}

// =============================================================================
// INV-INIT-01: Initialized Range Check
// =============================================================================

/// Assert that a read only ever touches a slot the barrier has reported
/// published.
///
/// Used in: `RingBuffer::read`.
macro_rules! debug_assert_initialized_read {
    ($sequence:expr, $published_up_to:expr) => {
        debug_assert!(
            $sequence <= $published_up_to,
            "INV-INIT-01 violated: reading sequence {} ahead of published cursor {}",
            $sequence,
            $published_up_to
        )
    };
}

// =============================================================================
// INV-RES-01: Exactly-Once Terminal
// =============================================================================

/// Assert that a result cell's terminal hook fires at most once.
///
/// Used in: `ResultCell::fire_done_hook`, guarded by the `done_called` CAS.
macro_rules! debug_assert_terminal_once {
    ($already_called:expr) => {
        debug_assert!(
            !$already_called,
            "INV-RES-01 violated: terminal hook fired more than once"
        )
    };
}

pub(crate) use debug_assert_bounded_claim;
pub(crate) use debug_assert_initialized_read;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_terminal_once;
