// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9002 Appendix B's reference congestion controller: slow start,
//! congestion avoidance, and a single recovery period per loss event.

use crate::recovery::{congestion_controller::CongestionController, RttEstimator};
use crate::time::Timestamp;
use core::cmp::{max, min};

/// RFC 9002 §7.2: floor the window can never shrink below, so at least two
/// datagrams remain in flight even after a loss collapses it.
const MINIMUM_WINDOW_PACKETS: u32 = 2;

/// RFC 9002 §7.3.3: half the window on each congestion event.
const LOSS_REDUCTION_FACTOR: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    SlowStart,
    /// Holds the time the recovery period began; an ack for a packet sent
    /// after that time ends it (RFC 9002 §7.3.2).
    Recovery(Timestamp),
    CongestionAvoidance,
}

/// New Reno (RFC 9002 Appendix B): exponential growth in slow start, linear
/// growth in congestion avoidance, a single multiplicative decrease per
/// contiguous loss/ECN event.
#[derive(Clone, Debug)]
pub struct NewReno {
    max_datagram_size: u16,
    congestion_window: u32,
    slow_start_threshold: u32,
    bytes_in_flight: u32,
    state: State,
}

impl NewReno {
    pub fn new(max_datagram_size: u16) -> Self {
        Self {
            max_datagram_size,
            congestion_window: Self::initial_window(max_datagram_size),
            slow_start_threshold: u32::MAX,
            bytes_in_flight: 0,
            state: State::SlowStart,
        }
    }

    /// RFC 9002 §7.2: ten datagrams, bounded to at least 14720 bytes (or
    /// twice a datagram, if larger).
    fn initial_window(max_datagram_size: u16) -> u32 {
        const INITIAL_WINDOW_LIMIT: u32 = 14720;
        min(10 * max_datagram_size as u32, max(INITIAL_WINDOW_LIMIT, 2 * max_datagram_size as u32))
    }

    fn minimum_window(&self) -> u32 {
        MINIMUM_WINDOW_PACKETS * self.max_datagram_size as u32
    }

    fn on_congestion_event(&mut self, event_time: Timestamp) {
        if matches!(self.state, State::Recovery(_)) {
            return;
        }

        self.state = State::Recovery(event_time);
        self.slow_start_threshold = ((self.congestion_window as f32) * LOSS_REDUCTION_FACTOR) as u32;
        self.congestion_window = max(self.slow_start_threshold, self.minimum_window());
    }

    /// Recalculates the initial window if the path's maximum datagram size
    /// changes, as recommended by RFC 9002 §7.2 / RFC 8899 §3.
    pub fn on_mtu_update(&mut self, max_datagram_size: u16) {
        let old = self.max_datagram_size;
        self.max_datagram_size = max_datagram_size;

        if max_datagram_size < old {
            self.congestion_window = Self::initial_window(max_datagram_size);
        } else {
            self.congestion_window = ((self.congestion_window as f32 / old as f32) * max_datagram_size as f32) as u32;
        }
    }
}

impl CongestionController for NewReno {
    fn congestion_window(&self) -> u32 {
        self.congestion_window
    }

    fn bytes_in_flight(&self) -> u32 {
        self.bytes_in_flight
    }

    fn is_congestion_limited(&self) -> bool {
        let available = self.congestion_window.saturating_sub(self.bytes_in_flight);
        available < self.max_datagram_size as u32
    }

    fn requires_fast_retransmission(&self) -> bool {
        false
    }

    fn on_packet_sent(&mut self, _time_sent: Timestamp, sent_bytes: usize) {
        if sent_bytes == 0 {
            // Pure-ACK packets are never congestion controlled.
            return;
        }
        self.bytes_in_flight = self.bytes_in_flight.saturating_add(sent_bytes as u32);
    }

    fn on_rtt_update(&mut self, _time_sent: Timestamp, _now: Timestamp, _rtt_estimator: &RttEstimator) {}

    fn on_ack(&mut self, newest_acked_time_sent: Timestamp, bytes_acknowledged: usize, _now: Timestamp) {
        self.bytes_in_flight = self.bytes_in_flight.saturating_sub(bytes_acknowledged as u32);

        if let State::Recovery(recovery_start_time) = self.state {
            if newest_acked_time_sent > recovery_start_time {
                // RFC 9002 §7.3.2: the recovery period ends once a packet
                // sent during it is acknowledged.
                self.state = State::CongestionAvoidance;
            }
            return;
        }

        match self.state {
            State::SlowStart => {
                // RFC 9002 §7.3.1: exponential growth, one datagram per acked datagram.
                self.congestion_window = self.congestion_window.saturating_add(bytes_acknowledged as u32);
                if self.congestion_window >= self.slow_start_threshold {
                    self.state = State::CongestionAvoidance;
                }
            }
            State::CongestionAvoidance => {
                // RFC 9002 §7.3.3: `cwnd += max_datagram_size * bytes_acked / cwnd`.
                let increase = (self.max_datagram_size as u64 * bytes_acknowledged as u64) / self.congestion_window as u64;
                self.congestion_window = self.congestion_window.saturating_add(increase as u32);
            }
            State::Recovery(_) => unreachable!("handled above"),
        }
    }

    fn on_packet_lost(&mut self, _lost_bytes: u32, time_sent: Timestamp, persistent_congestion: bool, _now: Timestamp) {
        self.on_congestion_event(time_sent);

        if persistent_congestion {
            // RFC 9002 §7.6.2: collapse straight to the floor and restart slow start.
            self.congestion_window = self.minimum_window();
            self.slow_start_threshold = u32::MAX;
            self.state = State::SlowStart;
        }
    }

    fn on_explicit_congestion(&mut self, time_sent: Timestamp, _now: Timestamp) {
        self.on_congestion_event(time_sent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_window_is_bounded_by_the_rfc_limit() {
        let controller = NewReno::new(1200);
        assert_eq!(controller.congestion_window(), 12_000);

        let controller = NewReno::new(100);
        assert_eq!(controller.congestion_window(), 14_720);
    }

    #[test]
    fn slow_start_grows_by_the_full_acked_amount() {
        let mut controller = NewReno::new(1200);
        let before = controller.congestion_window();
        controller.on_packet_sent(Timestamp::from_micros(0), 1200);
        controller.on_ack(Timestamp::from_micros(0), 1200, Timestamp::from_micros(10));
        assert_eq!(controller.congestion_window(), before + 1200);
    }

    #[test]
    fn loss_halves_the_window_and_enters_recovery() {
        let mut controller = NewReno::new(1200);
        let before = controller.congestion_window();
        controller.on_packet_lost(1200, Timestamp::from_micros(100), false, Timestamp::from_micros(200));
        assert_eq!(controller.congestion_window(), max((before as f32 * 0.5) as u32, 2 * 1200));
        assert!(matches!(controller.state, State::Recovery(_)));
    }

    #[test]
    fn a_second_loss_during_recovery_does_not_reduce_the_window_again() {
        let mut controller = NewReno::new(1200);
        controller.on_packet_lost(1200, Timestamp::from_micros(100), false, Timestamp::from_micros(200));
        let after_first = controller.congestion_window();
        controller.on_packet_lost(1200, Timestamp::from_micros(150), false, Timestamp::from_micros(250));
        assert_eq!(controller.congestion_window(), after_first);
    }

    #[test]
    fn ack_for_a_packet_sent_during_recovery_exits_to_congestion_avoidance() {
        let mut controller = NewReno::new(1200);
        controller.on_packet_lost(1200, Timestamp::from_micros(100), false, Timestamp::from_micros(200));
        controller.on_ack(Timestamp::from_micros(150), 1200, Timestamp::from_micros(300));
        assert_eq!(controller.state, State::CongestionAvoidance);
    }

    #[test]
    fn persistent_congestion_collapses_to_the_minimum_window() {
        let mut controller = NewReno::new(1200);
        controller.on_packet_lost(1200, Timestamp::from_micros(100), true, Timestamp::from_micros(200));
        assert_eq!(controller.congestion_window(), 2 * 1200);
        assert_eq!(controller.state, State::SlowStart);
    }
}
