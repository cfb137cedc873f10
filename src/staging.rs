//! Staging: the non-RT side of the replay engine.
//!
//! `Staging` loads waveforms, holds at most one staged waveform, and talks to
//! the controller only through queues: events go out, replaced waveforms come
//! back, invariant signals come back. It also reads the controller's
//! published [`Readback`], which is how hand-off is gated on the
//! non-executing state.

use crate::control::ControlMsg;
use crate::invariant_ppt::{
    assert_invariant, HANDOFF_DELIVERED, HANDOFF_GATED, SOURCE_REMEMBERED, WAVEFORM_RECLAIMED,
};
use crate::invariant_rt::drain_invariant_signals;
use crate::params::{Config, Readback};
use crate::states::PlaybackState;
use crate::waveform::{LoadError, Preview, Waveform};
use rtrb::{Consumer, Producer, PushError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors from handing events or waveforms to the controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandoffError {
    /// The controller reports `Executing`; the waveform stays staged.
    #[error("controller is executing; pause it before providing a waveform")]
    Executing,

    /// The control queue is full; the named event was not sent.
    #[error("control queue full, dropped {0} event")]
    QueueFull(&'static str),

    /// `commit` was called with nothing staged.
    #[error("no waveform is staged")]
    NothingStaged,
}

/// Where the staged waveform was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Text(PathBuf),
    Wav(PathBuf),
}

/// Non-RT handle paired with a [`Controller`](crate::controller::Controller).
pub struct Staging {
    staged: Option<Waveform>,
    source: Option<Source>,
    outbox: Producer<ControlMsg>,
    returns: Consumer<Waveform>,
    invariant_rx: Consumer<u8>,
    readback: Arc<Readback>,
}

impl Staging {
    pub(crate) fn new(
        outbox: Producer<ControlMsg>,
        returns: Consumer<Waveform>,
        invariant_rx: Consumer<u8>,
        readback: Arc<Readback>,
    ) -> Self {
        Self {
            staged: None,
            source: None,
            outbox,
            returns,
            invariant_rx,
            readback,
        }
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Load a whitespace-separated text waveform into the staging slot.
    pub fn load_text(&mut self, path: impl AsRef<Path>) -> Result<&Waveform, LoadError> {
        let path = path.as_ref();
        let waveform = Waveform::load_text(path)?;
        self.remember(Source::Text(path.to_path_buf()));
        Ok(&*self.staged.insert(waveform))
    }

    /// Load the first channel of a WAV file into the staging slot.
    pub fn load_wav(&mut self, path: impl AsRef<Path>) -> Result<&Waveform, LoadError> {
        let path = path.as_ref();
        let waveform = Waveform::load_wav(path)?;
        self.remember(Source::Wav(path.to_path_buf()));
        Ok(&*self.staged.insert(waveform))
    }

    /// Re-read the last loaded source, e.g. after the host period changed.
    pub fn reload(&mut self) -> Result<&Waveform, LoadError> {
        match self.source.clone() {
            Some(Source::Text(path)) => self.load_text(path),
            Some(Source::Wav(path)) => self.load_wav(path),
            None => Err(LoadError::NoSource),
        }
    }

    fn remember(&mut self, source: Source) {
        log::debug!("Remembering waveform source {:?}", source);
        self.source = Some(source);
        assert_invariant(
            SOURCE_REMEMBERED,
            self.source.is_some(),
            "Successful load records its source",
            Some("remember"),
        );
    }

    /// Put a waveform built in memory into the staging slot.
    ///
    /// Replaces any staged waveform and forgets the remembered source.
    pub fn stage(&mut self, waveform: Waveform) {
        self.source = None;
        self.staged = Some(waveform);
    }

    pub fn staged(&self) -> Option<&Waveform> {
        self.staged.as_ref()
    }

    pub fn take_staged(&mut self) -> Option<Waveform> {
        self.staged.take()
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    /// `(time, amplitude)` pairs for the staged waveform at the published period.
    ///
    /// Times are all zero until the controller has read its clock.
    pub fn preview(&self) -> Option<Preview<'_>> {
        let period_ns = self.readback.period_ns();
        self.staged.as_ref().map(|w| w.preview(period_ns))
    }

    // ------------------------------------------------------------------
    // Ownership hand-off
    // ------------------------------------------------------------------

    /// Hand the staged waveform to the controller.
    pub fn commit(&mut self) -> Result<(), HandoffError> {
        let waveform = self.staged.take().ok_or(HandoffError::NothingStaged)?;
        self.provide_waveform(waveform)
    }

    /// Move `waveform` into the controller.
    ///
    /// Refused while the controller reports `Executing`. On any refusal the
    /// waveform is kept in the staging slot, replacing what was there.
    pub fn provide_waveform(&mut self, waveform: Waveform) -> Result<(), HandoffError> {
        let state = self.readback.state();
        if state == PlaybackState::Executing {
            log::debug!("Hand-off of {} samples refused while executing", waveform.len());
            self.staged = Some(waveform);
            assert_invariant(
                HANDOFF_GATED,
                self.staged.is_some(),
                "Refused waveform stays staged",
                Some("provide_waveform"),
            );
            return Err(HandoffError::Executing);
        }

        let len = waveform.len();
        self.send(ControlMsg::Provide(waveform))?;
        assert_invariant(
            HANDOFF_DELIVERED,
            state.accepts_mutation(),
            "Waveform handed off outside Executing",
            Some("provide_waveform"),
        );
        log::info!("Handed off {} samples (controller {:?})", len, state);
        Ok(())
    }

    /// Take back a waveform the controller has released, if any.
    ///
    /// Waveforms come back when replaced by a later hand-off or on
    /// [`Staging::reclaim`]. Dropping them here frees their memory off the
    /// tick path.
    pub fn take_waveform(&mut self) -> Option<Waveform> {
        let waveform = self.returns.pop().ok()?;
        assert_invariant(
            WAVEFORM_RECLAIMED,
            waveform.holds_allocation(),
            "Only allocated waveforms are returned",
            Some("take_waveform"),
        );
        log::debug!("Reclaimed {} samples from controller", waveform.len());
        Some(waveform)
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Ask the controller to release its active waveform.
    pub fn reclaim(&mut self) -> Result<(), HandoffError> {
        self.send(ControlMsg::Reclaim)
    }

    /// Set `Gain`. Deferred by the controller while executing.
    pub fn set_gain(&mut self, gain: f64) -> Result<(), HandoffError> {
        self.send(ControlMsg::SetGain { gain })
    }

    /// Set `Loops` (0 = forever). Deferred by the controller while executing.
    pub fn set_loops(&mut self, loops: u32) -> Result<(), HandoffError> {
        self.send(ControlMsg::SetLoops { loops })
    }

    pub fn pause(&mut self) -> Result<(), HandoffError> {
        self.send(ControlMsg::Pause)
    }

    pub fn resume(&mut self) -> Result<(), HandoffError> {
        self.send(ControlMsg::Resume)
    }

    /// Report that the host tick period changed.
    pub fn period_changed(&mut self) -> Result<(), HandoffError> {
        self.send(ControlMsg::PeriodChanged)
    }

    /// Send a raw event. A refused `Provide` puts its waveform back in the
    /// staging slot.
    pub fn send(&mut self, msg: ControlMsg) -> Result<(), HandoffError> {
        log::trace!("Sending {} event", msg.description());
        match self.outbox.push(msg) {
            Ok(()) => Ok(()),
            Err(PushError::Full(msg)) => {
                let description = msg.description();
                log::warn!("Control queue full, {} event not sent", description);
                if let ControlMsg::Provide(waveform) = msg {
                    self.staged = Some(waveform);
                }
                Err(HandoffError::QueueFull(description))
            }
        }
    }

    // ------------------------------------------------------------------
    // Readback
    // ------------------------------------------------------------------

    /// Last state published by the controller.
    pub fn state(&self) -> PlaybackState {
        self.readback.state()
    }

    /// Published `Length (s)`.
    pub fn trial_length_seconds(&self) -> f64 {
        self.readback.trial_length_seconds()
    }

    pub fn period_ns(&self) -> u64 {
        self.readback.period_ns()
    }

    /// Configuration currently in effect on the controller.
    pub fn config(&self) -> Config {
        self.readback.config()
    }

    pub fn readback(&self) -> &Readback {
        &self.readback
    }

    /// Drain invariant signals raised by the controller since the last call.
    pub fn drain_invariant_signals(&mut self) -> Vec<u8> {
        drain_invariant_signals(&mut self.invariant_rx)
    }
}

impl std::fmt::Debug for Staging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Staging")
            .field("staged_len", &self.staged.as_ref().map(Waveform::len))
            .field("source", &self.source)
            .field("state", &self.readback.state())
            .finish()
    }
}
