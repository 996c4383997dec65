// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9002 §5: round-trip time estimation, and the PTO/persistent-congestion
//! thresholds it feeds (spec §4.1.4).

use crate::{number::PacketNumberSpace, time::Timestamp};
use core::{
    cmp::{max, min},
    time::Duration,
};

/// RFC 9002 §6.2.2: with no samples yet, assume 333ms (a 1s initial PTO,
/// matching TCP's initial RTO recommendation).
pub const DEFAULT_INITIAL_RTT: Duration = Duration::from_millis(333);

/// The lowest RTT value the estimator will report.
pub const MIN_RTT: Duration = Duration::from_micros(1);

const ZERO_DURATION: Duration = Duration::from_millis(0);

/// RFC 9002 §6.1.2: recommended timer granularity.
pub const K_GRANULARITY: Duration = Duration::from_millis(1);

/// RFC 9002 §7.6.1: recommended persistent congestion threshold, in PTOs.
const K_PERSISTENT_CONGESTION_THRESHOLD: u64 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RttEstimator {
    latest_rtt: Duration,
    min_rtt: Duration,
    smoothed_rtt: Duration,
    rttvar: Duration,
    /// The peer's `max_ack_delay` transport parameter, or zero until the
    /// handshake supplies it.
    max_ack_delay: Duration,
    first_rtt_sample: Option<Timestamp>,
}

impl Default for RttEstimator {
    fn default() -> Self {
        RttEstimator::new(DEFAULT_INITIAL_RTT)
    }
}

impl RttEstimator {
    /// `on_max_ack_delay` must be called once the peer's `max_ack_delay`
    /// transport parameter is known to fill it in.
    #[inline]
    pub fn new(initial_rtt: Duration) -> Self {
        Self::new_with_max_ack_delay(Duration::ZERO, initial_rtt)
    }

    #[inline]
    fn new_with_max_ack_delay(max_ack_delay: Duration, initial_rtt: Duration) -> Self {
        let initial_rtt = initial_rtt.max(MIN_RTT);

        // RFC 9002 §5.3: smoothed_rtt = kInitialRtt, rttvar = kInitialRtt / 2.
        let smoothed_rtt = initial_rtt;
        let rttvar = initial_rtt / 2;

        Self { latest_rtt: initial_rtt, min_rtt: initial_rtt, smoothed_rtt, rttvar, max_ack_delay, first_rtt_sample: None }
    }

    /// An estimator for a new path, carrying over this one's `max_ack_delay`
    /// but resetting the RTT samples to `initial_rtt`.
    pub fn for_new_path(&self, initial_rtt: Duration) -> Self {
        Self::new_with_max_ack_delay(self.max_ack_delay, initial_rtt)
    }

    #[inline]
    pub fn latest_rtt(&self) -> Duration {
        self.latest_rtt
    }

    #[inline]
    pub fn smoothed_rtt(&self) -> Duration {
        self.smoothed_rtt
    }

    #[inline]
    pub fn min_rtt(&self) -> Duration {
        self.min_rtt
    }

    #[inline]
    pub fn rttvar(&self) -> Duration {
        self.rttvar
    }

    #[inline]
    pub fn first_rtt_sample(&self) -> Option<Timestamp> {
        self.first_rtt_sample
    }

    #[inline]
    pub fn max_ack_delay(&self) -> Duration {
        self.max_ack_delay
    }

    /// RFC 9002 §6.2.1: `PTO = smoothed_rtt + max(4*rttvar, kGranularity) +
    /// max_ack_delay`, doubled per consecutive timeout, with `max_ack_delay`
    /// zeroed outside the application data space (the peer does not
    /// intentionally delay Initial/Handshake acks).
    #[inline]
    pub fn pto_period(&self, pto_backoff: u32, space: PacketNumberSpace) -> Duration {
        let mut pto_period = self.smoothed_rtt().as_micros() as u64;

        pto_period += max(self.rttvar_4x().as_micros() as u64, K_GRANULARITY.as_micros() as u64);

        if space.is_application_data() {
            pto_period += self.max_ack_delay.as_micros() as u64;
        }

        pto_period *= pto_backoff as u64;

        Duration::from_micros(pto_period)
    }

    pub fn on_max_ack_delay(&mut self, max_ack_delay: Duration) {
        self.max_ack_delay = max_ack_delay;
    }

    /// Folds one RTT sample (RFC 9002 §5.3), `ack_delay` already decoded from
    /// the ACK frame's `ack_delay` field (already descaled to a `Duration`).
    #[inline]
    pub fn update_rtt(
        &mut self,
        mut ack_delay: Duration,
        rtt_sample: Duration,
        timestamp: Timestamp,
        is_handshake_confirmed: bool,
        space: PacketNumberSpace,
    ) {
        self.latest_rtt = rtt_sample.max(MIN_RTT);

        if self.first_rtt_sample.is_none() {
            self.first_rtt_sample = Some(timestamp);
            self.min_rtt = self.latest_rtt;
            self.smoothed_rtt = self.latest_rtt;
            self.rttvar = self.latest_rtt / 2;
            return;
        }

        self.min_rtt = min(self.min_rtt, self.latest_rtt);

        // Initial packets are never intentionally delayed by the peer.
        if space.is_initial() {
            ack_delay = ZERO_DURATION;
        }

        if is_handshake_confirmed {
            ack_delay = min(ack_delay, self.max_ack_delay);
        }

        let mut adjusted_rtt = self.latest_rtt;

        if self.min_rtt + ack_delay < self.latest_rtt {
            adjusted_rtt -= ack_delay;
        } else if !is_handshake_confirmed {
            // Prior to confirmation, an out-of-range delay just drops the sample.
            return;
        }

        let rttvar_sample = abs_difference(self.smoothed_rtt, adjusted_rtt);
        self.rttvar = weighted_average(self.rttvar, rttvar_sample, 4);
        self.smoothed_rtt = weighted_average(self.smoothed_rtt, adjusted_rtt, 8);
    }

    /// RFC 9002 §7.6.1: `(smoothed_rtt + max(4*rttvar, kGranularity) +
    /// max_ack_delay) * kPersistentCongestionThreshold`, unlike PTO this
    /// always includes `max_ack_delay` regardless of packet number space.
    #[inline]
    pub fn persistent_congestion_threshold(&self) -> Duration {
        Duration::from_millis(
            (self.smoothed_rtt.as_millis() as u64
                + max(self.rttvar_4x().as_millis() as u64, K_GRANULARITY.as_millis() as u64)
                + self.max_ack_delay.as_millis() as u64)
                * K_PERSISTENT_CONGESTION_THRESHOLD,
        )
    }

    /// RFC 9002 §6.1.2: `max(9/8 * max(smoothed_rtt, latest_rtt), kGranularity)`.
    #[inline]
    pub fn loss_time_threshold(&self) -> Duration {
        let mut time_threshold = max(self.smoothed_rtt().as_nanos() as u64, self.latest_rtt().as_nanos() as u64);
        time_threshold += time_threshold / 8;
        let time_threshold = max(time_threshold, K_GRANULARITY.as_nanos() as u64);
        Duration::from_nanos(time_threshold)
    }

    /// Lets `min_rtt`/`smoothed_rtt` be overwritten by the next sample after
    /// persistent congestion is declared (RFC 9002 §5.2).
    #[inline]
    pub fn on_persistent_congestion(&mut self) {
        self.first_rtt_sample = None;
    }

    #[inline]
    fn rttvar_4x(&self) -> Duration {
        Duration::from_micros(4 * self.rttvar.as_micros() as u64)
    }
}

#[inline]
fn abs_difference<T: core::ops::Sub + PartialOrd>(a: T, b: T) -> <T as core::ops::Sub>::Output {
    if a > b {
        a - b
    } else {
        b - a
    }
}

#[inline]
fn weighted_average(a: Duration, b: Duration, weight: u64) -> Duration {
    let mut a = a.as_nanos() as u64;
    a /= weight;
    a *= weight - 1;

    let mut b = b.as_nanos() as u64;
    b /= weight;

    Duration::from_nanos(a + b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INITIAL_PTO_BACKOFF: u32 = 1;

    #[test]
    fn default_pto_period_uses_initial_rtt() {
        let rtt_estimator = RttEstimator::default();
        assert_eq!(
            Duration::from_millis(333) + K_GRANULARITY,
            rtt_estimator.pto_period(INITIAL_PTO_BACKOFF, PacketNumberSpace::Initial),
        );
    }

    #[test]
    fn application_data_space_includes_max_ack_delay() {
        let mut rtt_estimator = RttEstimator::default();
        rtt_estimator.on_max_ack_delay(Duration::from_millis(10));
        let with_delay = rtt_estimator.pto_period(INITIAL_PTO_BACKOFF, PacketNumberSpace::ApplicationData);
        let without_delay = rtt_estimator.pto_period(INITIAL_PTO_BACKOFF, PacketNumberSpace::Initial);
        assert_eq!(with_delay, without_delay + Duration::from_millis(10));
    }

    #[test]
    fn first_sample_initializes_all_fields() {
        let mut rtt_estimator = RttEstimator::new(Duration::from_millis(0));
        let now = Timestamp::from_micros(1_000_000);
        rtt_estimator.update_rtt(Duration::ZERO, Duration::from_millis(100), now, true, PacketNumberSpace::ApplicationData);
        assert_eq!(rtt_estimator.latest_rtt(), Duration::from_millis(100));
        assert_eq!(rtt_estimator.min_rtt(), Duration::from_millis(100));
        assert_eq!(rtt_estimator.smoothed_rtt(), Duration::from_millis(100));
        assert_eq!(rtt_estimator.first_rtt_sample(), Some(now));
    }

    #[test]
    fn subsequent_sample_updates_smoothed_rtt_towards_the_sample() {
        let mut rtt_estimator = RttEstimator::new(Duration::from_millis(0));
        let t0 = Timestamp::from_micros(1_000_000);
        let t1 = Timestamp::from_micros(2_000_000);
        rtt_estimator.update_rtt(Duration::ZERO, Duration::from_millis(100), t0, true, PacketNumberSpace::ApplicationData);
        let smoothed_before = rtt_estimator.smoothed_rtt();
        rtt_estimator.update_rtt(Duration::ZERO, Duration::from_millis(200), t1, true, PacketNumberSpace::ApplicationData);
        assert!(rtt_estimator.smoothed_rtt() > smoothed_before);
        assert!(rtt_estimator.smoothed_rtt() < Duration::from_millis(200));
    }

    #[test]
    fn persistent_congestion_reset_clears_first_sample() {
        let mut rtt_estimator = RttEstimator::new(Duration::from_millis(0));
        let now = Timestamp::from_micros(1_000_000);
        rtt_estimator.update_rtt(Duration::ZERO, Duration::from_millis(100), now, true, PacketNumberSpace::ApplicationData);
        assert!(rtt_estimator.first_rtt_sample().is_some());
        rtt_estimator.on_persistent_congestion();
        assert!(rtt_estimator.first_rtt_sample().is_none());
    }
}
