//! Virtual time
//!
//! The coordinator never reads a wall clock. Every instant it deals with is a
//! [`Timestamp`] handed out by the external scheduler, measured as an offset
//! from the start of the run.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::time::Duration;

/// A point in virtual time, measured from the start of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp(Duration);

impl Timestamp {
    /// Start of the run
    pub const ZERO: Timestamp = Timestamp(Duration::ZERO);

    /// Create a timestamp from an offset since the start of the run
    pub const fn from_offset(offset: Duration) -> Self {
        Self(offset)
    }

    /// Create a timestamp from microseconds since the start of the run
    pub const fn from_micros(us: u64) -> Self {
        Self(Duration::from_micros(us))
    }

    /// Create a timestamp from nanoseconds since the start of the run
    pub const fn from_nanos(ns: u64) -> Self {
        Self(Duration::from_nanos(ns))
    }

    /// Offset since the start of the run
    pub const fn as_offset(&self) -> Duration {
        self.0
    }

    /// Whole microseconds since the start of the run
    ///
    /// Saturates at `u64::MAX`.
    pub fn as_micros(&self) -> u64 {
        u64::try_from(self.0.as_micros()).unwrap_or(u64::MAX)
    }

    /// Time elapsed from `earlier` to `self`, or zero if `earlier` is later
    pub fn saturating_since(&self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }

    /// Move this timestamp forward by `d`, or `None` past the end of time
    pub fn checked_add(&self, d: Duration) -> Option<Timestamp> {
        self.0.checked_add(d).map(Timestamp)
    }

    /// Move this timestamp forward by `d`, clamping at the largest instant
    pub fn saturating_add(&self, d: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(d))
    }

    /// Move this timestamp back by `d`, clamping at the start of the run
    pub fn saturating_sub(&self, d: Duration) -> Timestamp {
        Timestamp(self.0.saturating_sub(d))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 + rhs)
    }
}

impl AddAssign<Duration> for Timestamp {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs;
    }
}

impl Sub for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Timestamp) -> Duration {
        self.saturating_since(rhs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = self.0.as_nanos();
        if ns % 1_000 == 0 {
            write!(f, "{}us", ns / 1_000)
        } else {
            write!(f, "{}ns", ns)
        }
    }
}
