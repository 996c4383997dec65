// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9002 §6.2: probe timeout — when no ack-eliciting packet in a space
//! has been acknowledged within `pto_period`, the sender probes rather than
//! waiting indefinitely for a retransmission timeout.
//!
//! REDESIGN: the source wires `Pto` into a `timer::Provider` /
//! `transmission::Provider` pair so the connection's timer wheel and frame
//! writer can poll it generically across every packet space. This crate has
//! no such generic writer/timer-query framework (spec §5's "Cancellation &
//! timeouts" model polls each [`crate::time::Timer`] directly), so `Pto`
//! here is a plain state machine the send engine polls and drives by hand.

use crate::time::{Timer, Timestamp};
use core::time::Duration;

#[derive(Debug, Default)]
pub struct Pto {
    timer: Timer,
    transmissions_remaining: u8,
}

impl Pto {
    /// Polls the timer; if it just expired, arms the required probe count
    /// and returns `true`. RFC 9002 §6.2.4: one probe if no packets are in
    /// flight (the path can't yet send anyway), two if there are (resilience
    /// against a single lost datagram).
    pub fn on_timeout(&mut self, packets_in_flight: bool, now: Timestamp) -> bool {
        if !self.timer.poll_expiration(now) {
            return false;
        }

        self.transmissions_remaining = if packets_in_flight { 2 } else { 1 };
        true
    }

    /// RFC 9002 §6.2.1: restart the timer whenever an ack-eliciting packet
    /// is sent or acknowledged, or Initial/Handshake keys are discarded.
    pub fn update(&mut self, base_timestamp: Timestamp, pto_period: Duration) {
        self.timer.set(base_timestamp + pto_period);
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn transmissions_remaining(&self) -> u8 {
        self.transmissions_remaining
    }

    /// The send engine consumed one probe transmission.
    pub fn on_transmit(&mut self) {
        self.transmissions_remaining = self.transmissions_remaining.saturating_sub(1);
    }

    /// Forces a single probe even outside an expired timer (used when
    /// Initial/Handshake keys are discarded while anti-amplification still
    /// applies).
    pub fn force_transmit(&mut self) {
        if self.transmissions_remaining == 0 {
            self.transmissions_remaining = 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiration_arms_two_probes_when_packets_are_in_flight() {
        let mut pto = Pto::default();
        pto.update(Timestamp::from_micros(0), Duration::from_millis(100));
        assert!(!pto.on_timeout(true, Timestamp::from_micros(50_000)));
        assert!(pto.on_timeout(true, Timestamp::from_micros(100_000)));
        assert_eq!(pto.transmissions_remaining(), 2);
    }

    #[test]
    fn expiration_arms_one_probe_when_idle() {
        let mut pto = Pto::default();
        pto.update(Timestamp::from_micros(0), Duration::from_millis(100));
        assert!(pto.on_timeout(false, Timestamp::from_micros(100_000)));
        assert_eq!(pto.transmissions_remaining(), 1);
    }

    #[test]
    fn on_transmit_decrements_the_remaining_count() {
        let mut pto = Pto::default();
        pto.update(Timestamp::from_micros(0), Duration::from_millis(100));
        pto.on_timeout(true, Timestamp::from_micros(100_000));
        pto.on_transmit();
        assert_eq!(pto.transmissions_remaining(), 1);
        pto.on_transmit();
        assert_eq!(pto.transmissions_remaining(), 0);
    }

    #[test]
    fn cancel_disarms_the_timer() {
        let mut pto = Pto::default();
        pto.update(Timestamp::from_micros(0), Duration::from_millis(100));
        assert!(pto.is_armed());
        pto.cancel();
        assert!(!pto.is_armed());
    }
}
