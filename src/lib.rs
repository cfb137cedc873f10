//! Periodic waveform replay engine for fixed-period real-time loops.
//!
//! A [`Controller`] is ticked once per host period and emits one scaled
//! sample per tick. Its paired [`Staging`] handle loads waveforms and sends
//! configuration events between ticks.

pub mod clock;
pub mod control;
pub mod controller;
pub mod engine;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod invariant_rt;
pub mod params;
pub mod staging;
pub mod states;
pub mod waveform;

pub use clock::{Clock, FixedClock, HostClock};
pub use control::ControlMsg;
pub use controller::{render_offline, Controller};
pub use engine::{PlaybackCursor, PlaybackEngine, Step};
pub use params::{Config, ConfigPatch, Readback};
pub use staging::{HandoffError, Source, Staging};
pub use states::PlaybackState;
pub use waveform::{trial_length_seconds, write_wav, LoadError, Preview, Waveform};
