// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! Monotonic time handling.
//!
//! The source this was ground on asserts "no wrap around" inside its
//! `QuicTimeDiff64` helper (see spec §9 REDESIGN FLAGS). Rather than assert
//! and crash, [`Timestamp`] represents time as microseconds since an
//! arbitrary epoch and does all arithmetic with saturating operations, so a
//! clock anomaly degrades timer precision instead of taking down the
//! connection.

use core::{
    ops::{Add, Sub},
    time::Duration,
};

/// A monotonic point in time, expressed as microseconds since the clock's
/// epoch (typically process start). Never compared across processes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn from_micros(micros: u64) -> Self {
        Timestamp(micros)
    }

    pub const fn as_micros(self) -> u64 {
        self.0
    }

    pub fn saturating_add(self, duration: Duration) -> Self {
        Timestamp(self.0.saturating_add(duration.as_micros() as u64))
    }

    pub fn saturating_sub(self, duration: Duration) -> Self {
        Timestamp(self.0.saturating_sub(duration.as_micros() as u64))
    }

    /// Saturating duration since an earlier timestamp; zero if `earlier` is
    /// actually later (clock anomaly), never a panic or wraparound.
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }

    pub fn has_elapsed(self, since: Timestamp, duration: Duration) -> bool {
        self.saturating_duration_since(since) >= duration
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        self.saturating_add(rhs)
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Timestamp {
        self.saturating_sub(rhs)
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Timestamp) -> Duration {
        self.saturating_duration_since(rhs)
    }
}

/// A clock source abstraction so the send engine and recovery code never
/// call `Instant::now()` directly, keeping them deterministically testable.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

#[cfg(feature = "std")]
pub mod std_clock {
    use super::*;
    use std::time::Instant;

    /// Wall-clock [`Clock`] anchored to the moment it was constructed.
    #[derive(Debug, Clone)]
    pub struct StdClock {
        epoch: Instant,
    }

    impl Default for StdClock {
        fn default() -> Self {
            Self { epoch: Instant::now() }
        }
    }

    impl Clock for StdClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_micros(self.epoch.elapsed().as_micros() as u64)
        }
    }
}

/// Single-shot timer, matching the "Cancellation & timeouts" model in spec
/// §5: every timer in the send engine (idle, PTO, delayed-ack, key-update,
/// close) is armed once and fires at most once per arming.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Timestamp>,
}

impl Timer {
    pub fn set(&mut self, deadline: Timestamp) {
        self.deadline = Some(deadline);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        self.deadline
    }

    /// Returns `true` and disarms the timer exactly once if `now` has
    /// reached the deadline.
    pub fn poll_expiration(&mut self, now: Timestamp) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_sub_never_wraps() {
        let earlier = Timestamp::from_micros(100);
        let later = Timestamp::from_micros(10);
        assert_eq!(later.saturating_duration_since(earlier), Duration::ZERO);
    }

    #[test]
    fn timer_fires_once() {
        let mut timer = Timer::default();
        timer.set(Timestamp::from_micros(100));
        assert!(!timer.poll_expiration(Timestamp::from_micros(50)));
        assert!(timer.poll_expiration(Timestamp::from_micros(100)));
        assert!(!timer.poll_expiration(Timestamp::from_micros(200)));
    }
}
