//! Playback engine: cursor arithmetic and the per-tick step.

// IMPORTANT: Do not call assert_invariant or any PPT logging in RT paths to avoid locks/allocs.

use crate::params::Config;
use crate::waveform::Waveform;

/// Position within the waveform plus completed passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackCursor {
    pub index: usize,
    pub loops_completed: u64,
}

/// Result of one engine step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// A scaled sample was produced.
    Emit(f64),
    /// The requested loop count is reached; nothing was produced.
    Exhausted,
}

/// Owns the active waveform and advances through it one sample per step.
#[derive(Debug, Default)]
pub struct PlaybackEngine {
    waveform: Waveform,
    cursor: PlaybackCursor,
}

impl PlaybackEngine {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            cursor: PlaybackCursor::default(),
        }
    }

    /// Advance by one tick.
    ///
    /// Emits `waveform[index] * gain`, then moves the cursor, wrapping to 0
    /// at the end and counting the pass when the loop count is bounded. An
    /// empty waveform is reported as exhausted.
    #[inline]
    pub fn step(&mut self, config: &Config) -> Step {
        let len = self.waveform.len();
        let bounded = config.requested_loops > 0;
        if len == 0
            || (bounded && self.cursor.loops_completed >= u64::from(config.requested_loops))
        {
            return Step::Exhausted;
        }

        let sample = self.waveform.samples()[self.cursor.index];
        self.cursor.index += 1;
        if self.cursor.index >= len {
            self.cursor.index = 0;
            if bounded {
                self.cursor.loops_completed += 1;
            }
        }
        Step::Emit(sample * config.gain)
    }

    /// Park the cursor at the start with no completed loops.
    #[inline]
    pub fn rewind(&mut self) {
        self.cursor = PlaybackCursor::default();
    }

    /// Swap in a new waveform, returning the previous one. Rewinds.
    #[inline]
    pub fn exchange(&mut self, waveform: Waveform) -> Waveform {
        self.rewind();
        std::mem::replace(&mut self.waveform, waveform)
    }

    #[inline]
    pub fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    #[inline]
    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.waveform.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.waveform.is_empty()
    }
}
