//! Microsecond-resolution time types used throughout the controller.
//!
//! These are tailored to the Link Layer: 32-bit arithmetic everywhere, which
//! covers about an hour, far more than any air-interface interval.

use core::fmt;
use core::ops::{Add, AddAssign, Sub, SubAssign};

/// A duration with microsecond resolution.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(u32);

impl Duration {
    /// The zero-length duration.
    pub const ZERO: Self = Duration(0);

    /// The inter-frame spacing between consecutive BLE packets.
    pub const T_IFS: Self = Duration(150);

    /// Creates a `Duration` from a number of microseconds.
    pub fn from_micros(micros: u32) -> Self {
        Duration(micros)
    }

    /// Creates a `Duration` from a number of milliseconds.
    pub fn from_millis(millis: u16) -> Self {
        Duration(u32::from(millis) * 1_000)
    }

    /// Returns the number of microseconds in `self`.
    pub fn as_micros(&self) -> u32 {
        self.0
    }
}

impl Add for Duration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Duration(self.0.checked_add(rhs.0).expect("duration overflow"))
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Duration {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Duration(self.0.checked_sub(rhs.0).expect("duration underflow"))
    }
}

impl SubAssign for Duration {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_micros(self.0, f)
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}

/// A point in time, relative to an unspecified epoch.
///
/// Obtained from a [`Timer`]. The value wraps after about an hour; two
/// `Instant`s may only be compared when they were taken close enough together
/// that at most one wraparound lies between them.
///
/// [`Timer`]: trait.Timer.html
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Instant(u32);

impl Instant {
    /// Creates an `Instant` from raw microseconds since the timer's epoch.
    ///
    /// This should only be called from a [`Timer`] implementation.
    ///
    /// [`Timer`]: trait.Timer.html
    pub fn from_raw_micros(micros: u32) -> Self {
        Instant(micros)
    }

    /// Returns the raw microsecond value backing this `Instant`.
    pub fn raw_micros(&self) -> u32 {
        self.0
    }

    /// Computes the time that passed between `earlier` and `self`.
    ///
    /// Both instants must come from the same [`Timer`] and must be close
    /// enough together that the counter wrapped at most once between them.
    ///
    /// [`Timer`]: trait.Timer.html
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        Duration(self.0.wrapping_sub(earlier.0))
    }
}

impl Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.duration_since(rhs)
    }
}

impl Add<Duration> for Instant {
    type Output = Self;

    fn add(self, d: Duration) -> Self {
        Instant(self.0.wrapping_add(d.as_micros()))
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, d: Duration) {
        *self = *self + d;
    }
}

impl Sub<Duration> for Instant {
    type Output = Self;

    fn sub(self, d: Duration) -> Self {
        Instant(self.0.wrapping_sub(d.as_micros()))
    }
}

impl SubAssign<Duration> for Instant {
    fn sub_assign(&mut self, d: Duration) {
        *self = *self - d;
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_micros(self.0, f)
    }
}

impl fmt::Debug for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}

/// Formats a microsecond count using the largest fitting unit.
fn fmt_micros(micros: u32, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if micros >= 1_000_000 && micros % 1_000_000 == 0 {
        write!(f, "{}s", micros / 1_000_000)
    } else if micros >= 1_000 && micros % 1_000 == 0 {
        write!(f, "{}ms", micros / 1_000)
    } else {
        write!(f, "{}µs", micros)
    }
}

/// Trait for time providers.
///
/// The platform supplies a `Timer` with microsecond accuracy; reception
/// timestamps ([`RxInfo`]) are taken from it.
///
/// [`RxInfo`]: ../buffer/struct.RxInfo.html
pub trait Timer {
    /// Obtains the current time.
    ///
    /// Returned values must never move backwards, except by wrapping around.
    fn now(&self) -> Instant;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(Duration::from_millis(50).as_micros(), 50_000);
        assert_eq!(Duration::ZERO.as_micros(), 0);
        assert_eq!(Duration::T_IFS.as_micros(), 150);
    }

    #[test]
    fn instant_arithmetic() {
        let t0 = Instant::from_raw_micros(u32::max_value() - 10);
        let t1 = t0 + Duration::from_micros(30);
        assert_eq!(t1.duration_since(t0), Duration::from_micros(30));
        assert_eq!(t1 - t0, Duration::from_micros(30));
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", Duration::from_micros(80)), "80µs");
        assert_eq!(format!("{}", Duration::from_millis(50)), "50ms");
        assert_eq!(format!("{}", Duration::from_micros(2_000_000)), "2s");
    }

    struct FixedTimer(u32);

    impl Timer for FixedTimer {
        fn now(&self) -> Instant {
            Instant::from_raw_micros(self.0)
        }
    }

    #[test]
    fn timer_source() {
        let timer = FixedTimer(500);
        assert_eq!(timer.now().raw_micros(), 500);
    }
}
