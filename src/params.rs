//! Parameter store: user-set scalars and the published readback.
//!
//! [`Config`] holds what the host UI may set (`Gain`, `Loops`). [`Readback`]
//! is what the controller publishes back (`Length (s)`, state, cursor); it
//! is written with relaxed atomics from the tick path and read from anywhere.

use crate::states::PlaybackState;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};

/// Default loop count: play the waveform once.
pub const DEFAULT_LOOPS: u32 = 1;

/// User-configurable playback parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Multiplier applied to every emitted sample. Not validated.
    pub gain: f64,
    /// Number of passes through the waveform; 0 loops forever.
    pub requested_loops: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gain: 1.0,
            requested_loops: DEFAULT_LOOPS,
        }
    }
}

impl Config {
    pub fn new(gain: f64, requested_loops: u32) -> Self {
        Self {
            gain,
            requested_loops,
        }
    }

    /// True when playback never exhausts.
    #[inline]
    pub fn loops_forever(&self) -> bool {
        self.requested_loops == 0
    }
}

/// A configuration change not yet applied. Fields left `None` are unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfigPatch {
    pub gain: Option<f64>,
    pub requested_loops: Option<u32>,
}

impl ConfigPatch {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.gain.is_none() && self.requested_loops.is_none()
    }

    /// Fold a later patch over this one; later values win.
    #[inline]
    pub fn merge(&mut self, later: ConfigPatch) {
        if later.gain.is_some() {
            self.gain = later.gain;
        }
        if later.requested_loops.is_some() {
            self.requested_loops = later.requested_loops;
        }
    }

    #[inline]
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(gain) = self.gain {
            config.gain = gain;
        }
        if let Some(loops) = self.requested_loops {
            config.requested_loops = loops;
        }
    }
}

/// Values published by the controller for the host and staging side.
#[derive(Debug)]
pub struct Readback {
    state: AtomicU8,
    trial_length_bits: AtomicU64,
    period_ns: AtomicU64,
    gain_bits: AtomicU64,
    requested_loops: AtomicU64,
    waveform_len: AtomicUsize,
    index: AtomicUsize,
    loops_completed: AtomicU64,
    ticks: AtomicU64,
}

impl Readback {
    pub(crate) fn new(config: Config) -> Self {
        Self {
            state: AtomicU8::new(PlaybackState::Init.as_u8()),
            trial_length_bits: AtomicU64::new(0.0f64.to_bits()),
            period_ns: AtomicU64::new(0),
            gain_bits: AtomicU64::new(config.gain.to_bits()),
            requested_loops: AtomicU64::new(u64::from(config.requested_loops)),
            waveform_len: AtomicUsize::new(0),
            index: AtomicUsize::new(0),
            loops_completed: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
        }
    }

    /// Last published controller state.
    #[inline]
    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Derived `Length (s)`.
    #[inline]
    pub fn trial_length_seconds(&self) -> f64 {
        f64::from_bits(self.trial_length_bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn period_ns(&self) -> u64 {
        self.period_ns.load(Ordering::Relaxed)
    }

    /// Configuration currently in effect on the controller.
    pub fn config(&self) -> Config {
        Config {
            gain: f64::from_bits(self.gain_bits.load(Ordering::Relaxed)),
            requested_loops: self.requested_loops.load(Ordering::Relaxed) as u32,
        }
    }

    #[inline]
    pub fn waveform_len(&self) -> usize {
        self.waveform_len.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn loops_completed(&self) -> u64 {
        self.loops_completed.load(Ordering::Relaxed)
    }

    /// Number of ticks the controller has run.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn publish_state(&self, state: PlaybackState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    #[inline]
    pub(crate) fn publish_derived(&self, waveform_len: usize, period_ns: u64, trial_length: f64) {
        self.waveform_len.store(waveform_len, Ordering::Relaxed);
        self.period_ns.store(period_ns, Ordering::Relaxed);
        self.trial_length_bits
            .store(trial_length.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn publish_config(&self, config: &Config) {
        self.gain_bits.store(config.gain.to_bits(), Ordering::Relaxed);
        self.requested_loops
            .store(u64::from(config.requested_loops), Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn publish_cursor(&self, index: usize, loops_completed: u64) {
        self.index.store(index, Ordering::Relaxed);
        self.loops_completed.store(loops_completed, Ordering::Relaxed);
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }
}
