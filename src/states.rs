//! Lifecycle states of the playback controller.

// IMPORTANT: Do not call assert_invariant or any PPT logging in RT paths to avoid locks/allocs.

/// Controller lifecycle state.
///
/// `Executing` and `Paused` are steady; the others are transient and are
/// resolved within the tick that observes them. There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PlaybackState {
    /// Constructed; waveform and configuration not yet acquired.
    Init = 0,
    /// Emitting one scaled sample per tick.
    Executing = 1,
    /// Emitting zero; cursor parked at the start.
    Paused = 2,
    /// Transient: host asked to resume.
    Resuming = 3,
    /// Transient: configuration or waveform is being applied.
    Reconfiguring = 4,
    /// Transient: host tick period changed.
    PeriodChanging = 5,
}

impl PlaybackState {
    /// True for states that a tick can rest in.
    #[inline]
    pub fn is_steady(self) -> bool {
        matches!(self, PlaybackState::Executing | PlaybackState::Paused)
    }

    /// True unless executing; waveform and configuration may change only then.
    #[inline]
    pub fn accepts_mutation(self) -> bool {
        self != PlaybackState::Executing
    }

    #[inline]
    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => PlaybackState::Init,
            1 => PlaybackState::Executing,
            3 => PlaybackState::Resuming,
            4 => PlaybackState::Reconfiguring,
            5 => PlaybackState::PeriodChanging,
            _ => PlaybackState::Paused,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_u8_roundtrip() {
        for state in [
            PlaybackState::Init,
            PlaybackState::Executing,
            PlaybackState::Paused,
            PlaybackState::Resuming,
            PlaybackState::Reconfiguring,
            PlaybackState::PeriodChanging,
        ] {
            assert_eq!(PlaybackState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn only_executing_rejects_mutation() {
        assert!(!PlaybackState::Executing.accepts_mutation());
        assert!(PlaybackState::Paused.accepts_mutation());
        assert!(PlaybackState::Init.accepts_mutation());
        assert!(PlaybackState::Paused.is_steady());
        assert!(!PlaybackState::Resuming.is_steady());
    }
}
