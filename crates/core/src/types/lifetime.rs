//! Order time-to-live arithmetic and the clock abstraction.
//!
//! An order created at `t0` with TTL `T` is live for every instant
//! `t < t0 + T` and expired for every `t >= t0 + T`. The remaining time is
//! reported in whole seconds, rounded so that a live order always reports at
//! least one second and an expired one reports zero.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Uniform lifetime applied to every order from its creation timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderTtl(Duration);

impl OrderTtl {
    /// Five minutes.
    pub const DEFAULT_SECS: u64 = 300;

    /// Create a TTL of `secs` seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// TTL in whole seconds.
    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0.as_secs()
    }

    fn as_delta(self) -> TimeDelta {
        TimeDelta::from_std(self.0).unwrap_or(TimeDelta::MAX)
    }

    /// Orders created at or before this instant are expired at `now`.
    #[must_use]
    pub fn cutoff(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.as_delta())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Whether an order created at `created_at` is expired at `now`.
    #[must_use]
    pub fn is_expired(self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        created_at <= self.cutoff(now)
    }

    /// Seconds left before an order created at `created_at` expires, as seen
    /// at `now`. Never exceeds the TTL, even if `created_at` lies in the
    /// future because of clock skew.
    #[must_use]
    pub fn time_remaining(self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
        let age_ms = (now - created_at).num_milliseconds().max(0);
        let age_secs = u64::try_from(age_ms / 1000).unwrap_or(u64::MAX);
        if self.is_expired(created_at, now) {
            0
        } else {
            self.as_secs().saturating_sub(age_secs).max(1)
        }
    }

    /// Instant at which an order created at `created_at` expires.
    #[must_use]
    pub fn expires_at(self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at
            .checked_add_signed(self.as_delta())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for OrderTtl {
    fn default() -> Self {
        Self::from_secs(Self::DEFAULT_SECS)
    }
}

impl fmt::Display for OrderTtl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs())
    }
}

/// Source of the current time.
///
/// Services take a clock instead of calling `Utc::now()` directly so that TTL
/// behavior can be tested deterministically.
pub trait Clock: Send + Sync + fmt::Debug {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now = now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// Jump to an arbitrary instant (may move backwards).
    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
