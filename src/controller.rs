//! Controller: the lifecycle state machine driven once per host tick.
//!
//! The controller owns the [`PlaybackEngine`] and everything the tick path
//! touches. Events from the staging side are drained at the top of each tick,
//! transient states are resolved, and then the steady state produces exactly
//! one output value.
//!
//! # RT contract
//!
//! [`Controller::tick`] never allocates, frees, locks, logs or blocks.
//! Replaced waveforms leave through the return queue so their memory is
//! released on the staging side. A waveform event that would displace a
//! waveform while the return queue is full is held back and retried once
//! [`Staging::take_waveform`] makes room; other events keep flowing.

// IMPORTANT: Do not call assert_invariant or any PPT logging in RT paths to avoid locks/allocs.

use crate::clock::Clock;
use crate::control::{new_control_queue, new_return_queue, ControlMsg};
use crate::engine::{PlaybackCursor, PlaybackEngine, Step};
use crate::invariant_rt::{
    new_invariant_queue, signal_invariant, INV_EVENT_APPLIED, INV_EVENT_DEFERRED,
    INV_PAUSED_SILENT, INV_PERIOD_CHANGE_PAUSED, INV_PLAYBACK_EXHAUSTED, INV_SAMPLE_EMITTED,
    INV_TICK_CONTAINED, INV_WAVEFORM_EXCHANGED,
};
use crate::params::{Config, ConfigPatch, Readback};
use crate::staging::Staging;
use crate::states::PlaybackState;
use crate::waveform::{trial_length_seconds, Preview, Waveform};
use rtrb::{Consumer, Producer};
use std::sync::Arc;

/// Mutations waiting for a non-executing tick.
#[derive(Debug, Default)]
struct Pending {
    waveform: Option<Waveform>,
    reclaim: bool,
    patch: ConfigPatch,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.waveform.is_none() && !self.reclaim && self.patch.is_empty()
    }

    /// Return-queue slots needed to apply this.
    fn slots_needed(&self) -> usize {
        usize::from(self.reclaim) + usize::from(self.waveform.is_some())
    }
}

/// Real-time side of the replay engine.
pub struct Controller<C: Clock> {
    clock: C,
    engine: PlaybackEngine,
    config: Config,
    state: PlaybackState,
    period_ns: u64,
    trial_length_seconds: f64,
    pending: Pending,
    /// Waveform event waiting for return-queue room.
    held: Option<ControlMsg>,
    inbox: Consumer<ControlMsg>,
    returns: Producer<Waveform>,
    readback: Arc<Readback>,
    invariant_tx: Producer<u8>,
}

impl<C: Clock> Controller<C> {
    /// Create a controller and the staging handle that feeds it.
    ///
    /// The controller starts in `Init`; waveform and parameter events sent
    /// through the staging handle before the first tick are acquired by it.
    pub fn new_with_channels(clock: C, config: Config) -> (Self, Staging) {
        let (outbox, inbox) = new_control_queue();
        let (returns, returned) = new_return_queue();
        let (invariant_tx, invariant_rx) = new_invariant_queue();
        let readback = Arc::new(Readback::new(config));

        let controller = Self {
            clock,
            engine: PlaybackEngine::default(),
            config,
            state: PlaybackState::Init,
            period_ns: 0,
            trial_length_seconds: 0.0,
            pending: Pending::default(),
            held: None,
            inbox,
            returns,
            readback: Arc::clone(&readback),
            invariant_tx,
        };
        let staging = Staging::new(outbox, returned, invariant_rx, readback);
        (controller, staging)
    }

    /// Run one tick and return its output value.
    ///
    /// Zero whenever paused or exhausted.
    pub fn tick(&mut self) -> f64 {
        self.drain_events();
        self.settle();

        let output = match self.state {
            PlaybackState::Executing => match self.engine.step(&self.config) {
                Step::Emit(value) => {
                    signal_invariant(&mut self.invariant_tx, INV_SAMPLE_EMITTED);
                    value
                }
                Step::Exhausted => {
                    signal_invariant(&mut self.invariant_tx, INV_PLAYBACK_EXHAUSTED);
                    self.enter_paused();
                    0.0
                }
            },
            _ => {
                if !self.pending.is_empty() {
                    self.state = PlaybackState::Reconfiguring;
                    self.settle();
                }
                signal_invariant(&mut self.invariant_tx, INV_PAUSED_SILENT);
                0.0
            }
        };

        let cursor = self.engine.cursor();
        self.readback.publish_state(self.state);
        self.readback
            .publish_cursor(cursor.index, cursor.loops_completed);
        output
    }

    /// Run one tick with panic containment.
    ///
    /// A panicking tick fails closed: output is zero and the controller is
    /// left `Paused` with a rewound cursor.
    pub fn tick_safe(&mut self) -> f64 {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.tick()));
        match result {
            Ok(output) => output,
            Err(_) => {
                signal_invariant(&mut self.invariant_tx, INV_TICK_CONTAINED);
                self.enter_paused();
                self.readback.publish_state(self.state);
                0.0
            }
        }
    }

    /// Resolve `Init` without spending a tick.
    ///
    /// Drains queued events first, so a waveform provided before this call
    /// is acquired. Calling it again later is harmless.
    pub fn initialize(&mut self) {
        self.drain_events();
        self.settle();
    }

    fn drain_events(&mut self) {
        if let Some(msg) = self.held.take() {
            if self.would_block(&msg) {
                self.held = Some(msg);
            } else {
                self.handle(msg);
            }
        }

        loop {
            let blocked = match self.inbox.peek() {
                Ok(next) => self.would_block(next),
                Err(_) => break,
            };
            // Waveform events stay in order behind a held one.
            if self.held.is_some() && self.inbox.peek().is_ok_and(is_waveform_event) {
                break;
            }
            let Ok(msg) = self.inbox.pop() else {
                break;
            };
            if blocked {
                self.held = Some(msg);
            } else {
                self.handle(msg);
            }
        }
    }

    /// True when stashing `msg` would push a waveform into a full return queue.
    fn would_block(&self, msg: &ControlMsg) -> bool {
        is_waveform_event(msg) && self.pending.waveform.is_some() && self.returns.slots() == 0
    }

    fn handle(&mut self, msg: ControlMsg) {
        // Host events act on an initialized controller; mutations queued
        // ahead of them are acquired first.
        if self.state == PlaybackState::Init && !msg.is_mutation() {
            self.settle();
        }
        match msg {
            ControlMsg::Pause => {
                if self.state == PlaybackState::Executing {
                    self.enter_paused();
                }
            }
            ControlMsg::Resume => {
                if self.state == PlaybackState::Paused {
                    self.state = PlaybackState::Resuming;
                    self.settle();
                }
            }
            ControlMsg::PeriodChanged => {
                self.state = PlaybackState::PeriodChanging;
                self.settle();
            }
            mutation => {
                self.stash(mutation);
                match self.state {
                    PlaybackState::Executing => {
                        signal_invariant(&mut self.invariant_tx, INV_EVENT_DEFERRED);
                    }
                    PlaybackState::Paused => {
                        self.state = PlaybackState::Reconfiguring;
                        self.settle();
                    }
                    _ => {}
                }
            }
        }
    }

    fn stash(&mut self, msg: ControlMsg) {
        match msg {
            ControlMsg::Provide(waveform) => {
                if let Some(superseded) = self.pending.waveform.replace(waveform) {
                    self.give_back(superseded);
                }
            }
            ControlMsg::Reclaim => {
                if let Some(unused) = self.pending.waveform.take() {
                    self.give_back(unused);
                }
                self.pending.reclaim = true;
            }
            ControlMsg::SetGain { gain } => self.pending.patch.merge(ConfigPatch {
                gain: Some(gain),
                requested_loops: None,
            }),
            ControlMsg::SetLoops { loops } => self.pending.patch.merge(ConfigPatch {
                gain: None,
                requested_loops: Some(loops),
            }),
            ControlMsg::Pause | ControlMsg::Resume | ControlMsg::PeriodChanged => {}
        }
    }

    /// Resolve transient states until the controller rests in a steady one.
    fn settle(&mut self) {
        loop {
            match self.state {
                PlaybackState::Executing | PlaybackState::Paused => break,
                PlaybackState::Init => self.run_init(),
                PlaybackState::Resuming => self.run_resume(),
                PlaybackState::Reconfiguring => self.run_reconfigure(),
                PlaybackState::PeriodChanging => self.run_period_change(),
            }
        }
        self.readback.publish_state(self.state);
    }

    fn run_init(&mut self) {
        self.period_ns = self.clock.period_ns();
        self.apply_pending();
        self.recompute_derived();
        if self.engine.is_empty() {
            self.enter_paused();
        } else {
            self.engine.rewind();
            self.state = PlaybackState::Executing;
        }
    }

    fn run_resume(&mut self) {
        if self.engine.is_empty() {
            self.enter_paused();
        } else {
            self.state = PlaybackState::Executing;
        }
    }

    fn run_reconfigure(&mut self) {
        self.apply_pending();
        self.recompute_derived();
        self.enter_paused();
    }

    fn run_period_change(&mut self) {
        self.period_ns = self.clock.period_ns();
        self.recompute_derived();
        signal_invariant(&mut self.invariant_tx, INV_PERIOD_CHANGE_PAUSED);
        self.enter_paused();
    }

    /// Apply stashed mutations if the return path has room for what they
    /// displace; otherwise leave them for a later paused tick.
    fn apply_pending(&mut self) {
        if self.pending.is_empty() || self.returns.slots() < self.pending.slots_needed() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);

        pending.patch.apply_to(&mut self.config);
        self.readback.publish_config(&self.config);

        if pending.reclaim {
            let active = self.engine.exchange(Waveform::new());
            self.give_back(active);
        }
        if let Some(waveform) = pending.waveform {
            let previous = self.engine.exchange(waveform);
            self.give_back(previous);
            signal_invariant(&mut self.invariant_tx, INV_WAVEFORM_EXCHANGED);
        }
        self.engine.rewind();
        signal_invariant(&mut self.invariant_tx, INV_EVENT_APPLIED);
    }

    /// Send a displaced waveform back to staging. Callers check for room.
    fn give_back(&mut self, waveform: Waveform) {
        if waveform.holds_allocation() {
            let _ = self.returns.push(waveform);
        }
    }

    fn enter_paused(&mut self) {
        self.engine.rewind();
        self.state = PlaybackState::Paused;
    }

    fn recompute_derived(&mut self) {
        self.trial_length_seconds = trial_length_seconds(self.engine.len(), self.period_ns);
        self.readback
            .publish_derived(self.engine.len(), self.period_ns, self.trial_length_seconds);
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[inline]
    pub fn cursor(&self) -> PlaybackCursor {
        self.engine.cursor()
    }

    #[inline]
    pub fn config(&self) -> Config {
        self.config
    }

    /// Tick period last read from the clock.
    #[inline]
    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    /// Derived `Length (s)`.
    #[inline]
    pub fn trial_length_seconds(&self) -> f64 {
        self.trial_length_seconds
    }

    /// The active waveform (read-only).
    #[inline]
    pub fn waveform(&self) -> &Waveform {
        self.engine.waveform()
    }

    /// `(time, amplitude)` pairs for the active waveform at the current period.
    pub fn preview(&self) -> Preview<'_> {
        self.engine.waveform().preview(self.period_ns)
    }

    /// Shared readback, for hosts that poll from another thread.
    pub fn readback(&self) -> Arc<Readback> {
        Arc::clone(&self.readback)
    }
}

fn is_waveform_event(msg: &ControlMsg) -> bool {
    matches!(msg, ControlMsg::Provide(_) | ControlMsg::Reclaim)
}

impl<C: Clock> std::fmt::Debug for Controller<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("state", &self.state)
            .field("cursor", &self.engine.cursor())
            .field("config", &self.config)
            .field("period_ns", &self.period_ns)
            .field("waveform_len", &self.engine.len())
            .field("held", &self.held.as_ref().map(ControlMsg::description))
            .finish()
    }
}

/// Render `ticks` outputs offline.
pub fn render_offline<C: Clock>(controller: &mut Controller<C>, ticks: usize) -> Vec<f64> {
    let mut output = Vec::with_capacity(ticks);
    for _ in 0..ticks {
        output.push(controller.tick());
    }
    output
}
