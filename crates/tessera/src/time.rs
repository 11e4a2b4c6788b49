use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use portable_atomic::{AtomicU64, Ordering};

/// A trait for time sources that return a wall-clock timestamp.
///
/// This abstraction allows you to plug in the real system clock or a mocked
/// time source in tests. The unit is **milliseconds** since the Unix epoch.
///
/// Wall clocks are allowed to move backwards (NTP steps, VM migration). The
/// generator classifies every reading with [`ClockStep::observe`] and applies
/// its rollback policy.
///
/// # Example
///
/// ```
/// use tessera::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource<u64> for FixedTime {
///     fn current_millis(&self) -> u64 {
///         1234
///     }
/// }
///
/// let time = FixedTime;
/// assert_eq!(time.current_millis(), 1234);
/// ```
pub trait TimeSource<T> {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn current_millis(&self) -> T;
}

impl<T, S> TimeSource<T> for Arc<S>
where
    S: TimeSource<T> + ?Sized,
{
    fn current_millis(&self) -> T {
        (**self).current_millis()
    }
}

/// Reads `SystemTime::now()` on every call.
///
/// A system clock set before 1970 reads as `0`, which the generator then
/// treats as a rollback against any previously used timestamp.
#[derive(Default, Clone, Copy, Debug)]
pub struct SystemClock;

impl TimeSource<u64> for SystemClock {
    fn current_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same reading, so a test can keep one handle and hand the
/// other to a generator.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(millis: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(millis)),
        }
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::Release);
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::AcqRel);
    }

    pub fn rewind(&self, millis: u64) {
        self.now.fetch_sub(millis, Ordering::AcqRel);
    }
}

impl TimeSource<u64> for ManualClock {
    fn current_millis(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}

/// How a fresh clock reading relates to the last timestamp a lane used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockStep {
    /// The clock moved into a new millisecond.
    Forward,
    /// Same millisecond as the last emitted id.
    Same,
    /// The clock went backwards by `by` milliseconds.
    Backward { by: u64 },
}

impl ClockStep {
    #[inline]
    pub fn observe(now: u64, last: u64) -> Self {
        match now.cmp(&last) {
            core::cmp::Ordering::Greater => Self::Forward,
            core::cmp::Ordering::Equal => Self::Same,
            core::cmp::Ordering::Less => Self::Backward { by: last - now },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_after_2020() {
        let now: u64 = SystemClock.current_millis();
        assert!(now > 1_577_836_800_000);
    }

    #[test]
    fn manual_clock_clones_share_reading() {
        let clock = ManualClock::new(100);
        let handle = clock.clone();
        handle.advance(5);
        assert_eq!(clock.current_millis(), 105);
        handle.rewind(10);
        assert_eq!(clock.current_millis(), 95);
        handle.set(7);
        assert_eq!(clock.current_millis(), 7);
    }

    #[test]
    fn observe_classifies_readings() {
        assert_eq!(ClockStep::observe(11, 10), ClockStep::Forward);
        assert_eq!(ClockStep::observe(10, 10), ClockStep::Same);
        assert_eq!(ClockStep::observe(4, 10), ClockStep::Backward { by: 6 });
    }
}
