//! Clock adapter: the host scheduler's tick period, injected as a capability.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of the current tick period.
///
/// Queried by the controller at init and whenever the host reports a period
/// change. Implementations must be wait-free; the query runs on the tick path.
pub trait Clock: Send {
    /// Current tick period in nanoseconds.
    fn period_ns(&self) -> u64;
}

/// A clock with a period fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    period_ns: u64,
}

impl FixedClock {
    pub fn new(period_ns: u64) -> Self {
        Self { period_ns }
    }

    /// Period for a given tick rate in Hz (rounded to the nearest ns).
    pub fn from_rate_hz(rate_hz: f64) -> Self {
        Self::new((1e9 / rate_hz).round() as u64)
    }
}

impl Clock for FixedClock {
    #[inline]
    fn period_ns(&self) -> u64 {
        self.period_ns
    }
}

/// A clock whose period the host can change at runtime.
///
/// Clones share the same period cell: the host keeps one clone, the
/// controller owns another. After [`HostClock::set_period_ns`] the host must
/// still deliver `ControlMsg::PeriodChanged` so the controller re-reads it.
#[derive(Debug, Clone)]
pub struct HostClock {
    period_ns: Arc<AtomicU64>,
}

impl HostClock {
    pub fn new(period_ns: u64) -> Self {
        Self {
            period_ns: Arc::new(AtomicU64::new(period_ns)),
        }
    }

    /// Host side: record a new period.
    pub fn set_period_ns(&self, period_ns: u64) {
        self.period_ns.store(period_ns, Ordering::Release);
    }
}

impl Clock for HostClock {
    #[inline]
    fn period_ns(&self) -> u64 {
        self.period_ns.load(Ordering::Acquire)
    }
}

impl<C: Clock + Sync> Clock for Arc<C> {
    #[inline]
    fn period_ns(&self) -> u64 {
        (**self).period_ns()
    }
}
