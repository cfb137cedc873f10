//! Control message types for staging → controller communication.
//!
//! These messages are sent via lock-free SPSC queue from the non-RT staging
//! side to the controller, and are drained at the start of every tick,
//! strictly between ticks. They replace GUI signal/slot callbacks: nothing
//! re-enters the tick path.
//!
//! A waveform travels inside [`ControlMsg::Provide`] by move. Pushing and
//! popping the message copies only the `Vec` header; the sample memory is
//! never copied or freed on the RT side.

use crate::waveform::Waveform;
use rtrb::{Consumer, Producer, RingBuffer};

/// Capacity for control message queue.
pub const CONTROL_QUEUE_CAPACITY: usize = 64;

/// Capacity for the queue carrying replaced waveforms back to staging.
pub const RETURN_QUEUE_CAPACITY: usize = 4;

/// Creates a new control message queue pair.
///
/// Returns (producer for staging, consumer for the controller).
pub fn new_control_queue() -> (Producer<ControlMsg>, Consumer<ControlMsg>) {
    RingBuffer::new(CONTROL_QUEUE_CAPACITY)
}

/// Creates the queue pair for waveforms handed back by the controller.
///
/// Returns (producer for the controller, consumer for staging).
pub fn new_return_queue() -> (Producer<Waveform>, Consumer<Waveform>) {
    RingBuffer::new(RETURN_QUEUE_CAPACITY)
}

/// Events delivered to the controller.
#[derive(Debug)]
pub enum ControlMsg {
    /// A load completed; exchange this waveform in.
    Provide(Waveform),

    /// Hand the active waveform back to staging, leaving it empty.
    Reclaim,

    /// Set the gain factor.
    SetGain {
        /// Output multiplier (0.0 mutes, negative inverts)
        gain: f64,
    },

    /// Set the requested loop count.
    SetLoops {
        /// Loop count, 0 = forever
        loops: u32,
    },

    /// Host paused the module.
    Pause,

    /// Host resumed the module.
    Resume,

    /// Host tick period changed; re-read the clock.
    PeriodChanged,
}

impl ControlMsg {
    /// True for events that mutate the waveform or configuration and must
    /// therefore wait while executing.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ControlMsg::Provide(_)
                | ControlMsg::Reclaim
                | ControlMsg::SetGain { .. }
                | ControlMsg::SetLoops { .. }
        )
    }

    /// Returns a human-readable description (for debugging).
    pub fn description(&self) -> &'static str {
        match self {
            ControlMsg::Provide(_) => "Provide",
            ControlMsg::Reclaim => "Reclaim",
            ControlMsg::SetGain { .. } => "SetGain",
            ControlMsg::SetLoops { .. } => "SetLoops",
            ControlMsg::Pause => "Pause",
            ControlMsg::Resume => "Resume",
            ControlMsg::PeriodChanged => "PeriodChanged",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_queue_preserves_order() {
        let (mut tx, mut rx) = new_control_queue();

        tx.push(ControlMsg::SetGain { gain: 0.5 }).unwrap();
        tx.push(ControlMsg::Provide(Waveform::from_samples(vec![1.0, 2.0])))
            .unwrap();
        tx.push(ControlMsg::Resume).unwrap();

        assert!(matches!(rx.pop().unwrap(), ControlMsg::SetGain { gain } if (gain - 0.5).abs() < 1e-12));
        match rx.pop().unwrap() {
            ControlMsg::Provide(w) => assert_eq!(w.samples(), &[1.0, 2.0]),
            other => panic!("unexpected {}", other.description()),
        }
        assert!(matches!(rx.pop().unwrap(), ControlMsg::Resume));
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_mutation_classification() {
        assert!(ControlMsg::SetLoops { loops: 2 }.is_mutation());
        assert!(ControlMsg::Reclaim.is_mutation());
        assert!(!ControlMsg::Pause.is_mutation());
        assert!(!ControlMsg::PeriodChanged.is_mutation());
    }

    #[test]
    fn test_control_queue_full_hands_back_message() {
        let (mut tx, _rx) = new_control_queue();
        for _ in 0..CONTROL_QUEUE_CAPACITY {
            tx.push(ControlMsg::Pause).unwrap();
        }
        let err = tx.push(ControlMsg::Resume).unwrap_err();
        let rtrb::PushError::Full(msg) = err;
        assert_eq!(msg.description(), "Resume");
    }
}
