//! Utilities to deal with wall clock time in milliseconds, the unit browsers report.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// A unix timestamp in milliseconds (elapsed since 1970-01-01 00:00 UTC).
///
/// This is the resolution of `Date.now()` and the unit in which session records are persisted.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct UnixMillis(u64);

impl UnixMillis {
    /// Creates a timestamp from the given number of milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Creates a timestamp from the given system time.
    pub fn from_system(time: SystemTime) -> Self {
        let millis = time
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();

        Self(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Returns the current timestamp.
    #[inline]
    pub fn now() -> Self {
        Self::from_system(SystemTime::now())
    }

    /// Returns the number of milliseconds since the UNIX epoch start.
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns the number of nanoseconds since the UNIX epoch start.
    pub const fn as_nanos(self) -> u64 {
        self.0.saturating_mul(1_000_000)
    }

    /// Adds the duration, saturating at the maximum representable timestamp.
    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }

    /// Returns the time elapsed since `earlier`, or zero if `earlier` is later than `self`.
    pub fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Debug for UnixMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnixMillis({})", self.as_millis())
    }
}

impl fmt::Display for UnixMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_millis().fmt(f)
    }
}

impl std::ops::Add<Duration> for UnixMillis {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

/// A source of wall clock time.
///
/// Components that persist or compare timestamps take a clock instead of calling
/// [`UnixMillis::now`] so that expiry can be tested without sleeping.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current time.
    fn now(&self) -> UnixMillis;
}

/// The system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UnixMillis {
        UnixMillis::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    /// Creates a clock that starts at `start`.
    pub fn new(start: UnixMillis) -> Self {
        Self(Arc::new(AtomicU64::new(start.as_millis())))
    }

    /// Moves the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.0.fetch_add(millis, Ordering::Relaxed);
    }

    /// Sets the clock to `time`.
    pub fn set(&self, time: UnixMillis) {
        self.0.store(time.as_millis(), Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> UnixMillis {
        UnixMillis(self.0.load(Ordering::Relaxed))
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> UnixMillis {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new(UnixMillis::from_millis(1_000));
        let other = clock.clone();

        other.advance(Duration::from_secs(2));
        assert_eq!(clock.now(), UnixMillis::from_millis(3_000));

        clock.set(UnixMillis::from_millis(10));
        assert_eq!(other.now().as_millis(), 10);
    }

    #[test]
    fn test_saturating_arithmetic() {
        let late = UnixMillis::from_millis(u64::MAX - 1);
        assert_eq!(late + Duration::from_secs(1), UnixMillis::from_millis(u64::MAX));

        let early = UnixMillis::from_millis(5);
        assert_eq!(early.saturating_duration_since(late), Duration::ZERO);
        assert_eq!(
            late.saturating_duration_since(early),
            Duration::from_millis(u64::MAX - 6)
        );
    }

    #[test]
    fn test_serde_transparent() {
        let ts: UnixMillis = serde_json::from_str("1700000000000").unwrap();
        assert_eq!(ts.as_millis(), 1_700_000_000_000);
        assert_eq!(ts.as_nanos(), 1_700_000_000_000_000_000);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "1700000000000");
    }
}
