//! Coarse-grained tracing spans for the non-hot-path lifecycle events.
//!
//! Nothing in the claim/publish/drain loop is instrumented here — `onEvent`
//! runs once per slot and must stay free of this overhead. Disabled by
//! default; compiles to nothing when the `tracing` feature is off.

#[cfg(feature = "tracing")]
#[inline]
pub fn record_barrier_alert() {
    tracing::trace_span!("barrier_alert").in_scope(|| {});
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_barrier_alert() {}

#[cfg(feature = "tracing")]
#[inline]
pub fn record_barrier_clear() {
    tracing::trace_span!("barrier_clear_alert").in_scope(|| {});
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_barrier_clear() {}

#[cfg(feature = "tracing")]
#[inline]
pub fn record_processor_start() {
    tracing::debug_span!("processor_start").in_scope(|| {});
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_processor_start() {}

#[cfg(feature = "tracing")]
#[inline]
pub fn record_processor_halt() {
    tracing::debug_span!("processor_halt").in_scope(|| {});
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_processor_halt() {}

#[cfg(feature = "tracing")]
#[inline]
pub fn record_handler_exception(sequence: i64) {
    tracing::warn_span!("handler_exception", sequence).in_scope(|| {});
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_handler_exception(_sequence: i64) {}

#[cfg(feature = "tracing")]
#[inline]
pub fn record_gating_sequences_changed(count: usize) {
    tracing::trace_span!("gating_sequences_changed", count).in_scope(|| {});
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_gating_sequences_changed(_count: usize) {}

#[cfg(feature = "tracing")]
#[inline]
pub fn record_result_cell_terminal(cancelled: bool) {
    tracing::debug_span!("result_cell_terminal", cancelled).in_scope(|| {});
}

#[cfg(not(feature = "tracing"))]
#[inline(always)]
pub fn record_result_cell_terminal(_cancelled: bool) {}
