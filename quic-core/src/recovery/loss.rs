// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9002 §6.1: a sent packet is declared lost once it's either far enough
//! behind the largest acknowledged packet number (packet threshold) or old
//! enough (time threshold).

use crate::{number::PacketNumber, time::Timestamp};
use core::time::Duration;

/// RFC 9002 §6.1.1: the recommended reordering threshold, in packets.
const K_PACKET_THRESHOLD: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not yet lost, but will be at `lost_time` if still unacknowledged.
    NotLost { lost_time: Timestamp },
    Lost,
}

/// Stateless: every sent, still-in-flight packet is checked independently
/// against the current largest acknowledged packet number and time
/// threshold.
#[derive(Debug, Default)]
pub struct Detector;

impl Detector {
    /// `time_threshold` comes from [`crate::recovery::RttEstimator::loss_time_threshold`].
    pub fn check(
        &self,
        time_threshold: Duration,
        time_sent: Timestamp,
        packet_number: PacketNumber,
        largest_acked_packet_number: PacketNumber,
        now: Timestamp,
    ) -> Outcome {
        let packet_lost_time = time_sent + time_threshold;
        let time_threshold_exceeded = now >= packet_lost_time;

        let packet_number_threshold_exceeded =
            largest_acked_packet_number.as_u64().saturating_sub(packet_number.as_u64()) >= K_PACKET_THRESHOLD;

        // RFC 9002 §6.1: lost if sent kPacketThreshold packets before an
        // acked packet, or sent long enough in the past — whichever fires
        // first.
        if time_threshold_exceeded || packet_number_threshold_exceeded {
            Outcome::Lost
        } else {
            Outcome::NotLost { lost_time: packet_lost_time }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::PacketNumberSpace;

    fn pn(value: u64) -> PacketNumber {
        PacketNumber::new(PacketNumberSpace::ApplicationData, value)
    }

    #[test]
    fn packet_threshold_declares_loss_regardless_of_time() {
        let detector = Detector::default();
        let outcome = detector.check(
            Duration::from_secs(10),
            Timestamp::from_micros(0),
            pn(1),
            pn(4),
            Timestamp::from_micros(1),
        );
        assert_eq!(outcome, Outcome::Lost);
    }

    #[test]
    fn time_threshold_declares_loss_once_elapsed() {
        let detector = Detector::default();
        let outcome = detector.check(
            Duration::from_millis(100),
            Timestamp::from_micros(0),
            pn(5),
            pn(6),
            Timestamp::from_micros(100_000),
        );
        assert_eq!(outcome, Outcome::Lost);
    }

    #[test]
    fn neither_threshold_exceeded_reports_a_future_lost_time() {
        let detector = Detector::default();
        let outcome = detector.check(
            Duration::from_millis(100),
            Timestamp::from_micros(0),
            pn(5),
            pn(6),
            Timestamp::from_micros(1),
        );
        assert_eq!(outcome, Outcome::NotLost { lost_time: Timestamp::from_micros(100_000) });
    }
}
