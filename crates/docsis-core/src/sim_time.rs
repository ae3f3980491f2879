use core::fmt;
use core::ops::{Add, AddAssign, Sub};
use std::time::Duration;

/// Point on the virtual clock, in nanoseconds since the start of the simulation
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub const fn from_nanos(ns: u64) -> Self {
        SimTime(ns)
    }

    pub const fn from_micros(us: u64) -> Self {
        SimTime(us * 1_000)
    }

    pub const fn from_millis(ms: u64) -> Self {
        SimTime(ms * 1_000_000)
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }

    /// Time elapsed since the start of the simulation
    pub fn since_start(self) -> Duration {
        Duration::from_nanos(self.0)
    }

    /// Duration from `earlier` to self, zero if `earlier` lies in the future
    pub fn saturating_duration_since(self, earlier: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// Move back by `d`, or None if that would be before the start of the simulation
    pub fn checked_sub(self, d: Duration) -> Option<SimTime> {
        self.0.checked_sub(duration_nanos(d)).map(SimTime)
    }
}

#[inline]
fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl Add<Duration> for SimTime {
    type Output = SimTime;
    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0.saturating_add(duration_nanos(rhs)))
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;
    fn sub(self, rhs: SimTime) -> Duration {
        self.saturating_duration_since(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // seconds with microsecond resolution, e.g. 0.012500
        write!(f, "{}.{:06}", self.0 / 1_000_000_000, (self.0 % 1_000_000_000) / 1_000)
    }
}

impl fmt::Debug for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arith() {
        let t = SimTime::from_millis(10) + Duration::from_micros(500);
        assert_eq!(t.as_nanos(), 10_500_000);
        assert_eq!(t - SimTime::from_millis(10), Duration::from_micros(500));
        assert_eq!(SimTime::from_millis(1) - SimTime::from_millis(2), Duration::ZERO);
        assert_eq!(SimTime::from_millis(1).checked_sub(Duration::from_millis(2)), None);
        assert_eq!(t.to_string(), "0.010500");
    }
}
