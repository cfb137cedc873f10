//! RT-safe invariant signaling for the tick path.
//!
//! This module provides a two-tier invariant system:
//! - **Tier 1 (RT-safe)**: Lock-free signaling of invariant IDs from the tick
//! - **Tier 2 (Non-RT)**: Verification and contract testing on the staging side
//!
//! RT code **signals facts**. Non-RT code **judges correctness**.
//!
//! # Example
//!
//! ```ignore
//! // Controller signals that a sample was emitted
//! signal_invariant(&mut invariant_tx, INV_SAMPLE_EMITTED);
//!
//! // Staging side verifies contracts
//! let signals = drain_invariant_signals(&mut invariant_rx);
//! assert!(signals.contains(&INV_SAMPLE_EMITTED));
//! ```

use rtrb::{Consumer, Producer, RingBuffer};

// ============================================================================
// RT-Safe Invariant IDs (Tier 1)
// ============================================================================
// These are integer IDs, not strings. No allocation, no formatting.

/// A scaled waveform sample was emitted while executing.
pub const INV_SAMPLE_EMITTED: u8 = 1;

/// Playback reached its requested loop count and paused.
pub const INV_PLAYBACK_EXHAUSTED: u8 = 2;

/// A configuration or load event was applied outside `Executing`.
pub const INV_EVENT_APPLIED: u8 = 3;

/// A configuration or load event arrived while executing and was deferred.
pub const INV_EVENT_DEFERRED: u8 = 4;

/// The active waveform was exchanged for a provided one.
pub const INV_WAVEFORM_EXCHANGED: u8 = 5;

/// A period change forced the controller into `Paused`.
pub const INV_PERIOD_CHANGE_PAUSED: u8 = 6;

/// A paused tick emitted zero without moving the cursor.
pub const INV_PAUSED_SILENT: u8 = 7;

/// A tick panicked and was contained.
pub const INV_TICK_CONTAINED: u8 = 8;

// ============================================================================
// Invariant Signal Queue
// ============================================================================

/// Capacity for invariant signal queue.
/// Should be large enough to hold signals from many ticks between drains.
pub const INVARIANT_QUEUE_CAPACITY: usize = 256;

/// Creates a new invariant signal queue pair.
///
/// Returns (producer for RT, consumer for the staging side).
pub fn new_invariant_queue() -> (Producer<u8>, Consumer<u8>) {
    RingBuffer::new(INVARIANT_QUEUE_CAPACITY)
}

/// Signals an invariant was observed in the RT path.
///
/// # RT Safety
/// - No allocation
/// - No locking
/// - No panics
/// - If queue is full, signal is dropped (preferable to blocking)
#[inline]
pub fn signal_invariant(tx: &mut Producer<u8>, id: u8) {
    let _ = tx.push(id);
}

// ============================================================================
// Non-RT Verification (Tier 2)
// ============================================================================

/// Drains all pending invariant signals from the queue.
pub fn drain_invariant_signals(rx: &mut Consumer<u8>) -> Vec<u8> {
    let mut signals = Vec::with_capacity(rx.slots());
    while let Ok(id) = rx.pop() {
        signals.push(id);
    }
    signals
}

/// Counts occurrences of each invariant ID in a signal list.
pub fn count_invariant_signals(signals: &[u8]) -> [usize; 256] {
    let mut counts = [0usize; 256];
    for &id in signals {
        counts[id as usize] += 1;
    }
    counts
}

/// Contract verification: asserts that required invariants were signaled.
///
/// # Panics
/// Panics if any required invariant was not signaled at least once.
#[cfg(any(test, feature = "ppt"))]
pub fn contract_test_rt(contract_name: &str, signals: &[u8], required: &[u8]) {
    let counts = count_invariant_signals(signals);
    let missing: Vec<&str> = required
        .iter()
        .filter(|&&id| counts[id as usize] == 0)
        .map(|&id| invariant_name(id))
        .collect();

    if !missing.is_empty() {
        let present: std::collections::BTreeSet<&str> =
            signals.iter().map(|&id| invariant_name(id)).collect();

        panic!(
            "RT Contract '{}' missing invariants: {:?}. Present: {:?}",
            contract_name, missing, present
        );
    }
}

/// Maps invariant ID to human-readable name (for diagnostics only).
pub const fn invariant_name(id: u8) -> &'static str {
    match id {
        INV_SAMPLE_EMITTED => "SAMPLE_EMITTED",
        INV_PLAYBACK_EXHAUSTED => "PLAYBACK_EXHAUSTED",
        INV_EVENT_APPLIED => "EVENT_APPLIED",
        INV_EVENT_DEFERRED => "EVENT_DEFERRED",
        INV_WAVEFORM_EXCHANGED => "WAVEFORM_EXCHANGED",
        INV_PERIOD_CHANGE_PAUSED => "PERIOD_CHANGE_PAUSED",
        INV_PAUSED_SILENT => "PAUSED_SILENT",
        INV_TICK_CONTAINED => "TICK_CONTAINED",
        _ => "UNKNOWN",
    }
}
