// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! Per-encryption-level sent-packet bookkeeping: the log an ACK frame walks
//! to find newly-acknowledged and newly-lost packets (spec §4.1.3), wired
//! into [`quic_core::recovery`]'s RTT/loss/PTO/congestion primitives.

use quic_core::number::{PacketNumber, PacketNumberSpace};
use quic_core::recovery::{
    congestion_controller::NewReno, loss::Detector as LossDetector, pto::Pto, CongestionController, RttEstimator,
};
use quic_core::stream_id::StreamId;
use quic_core::time::Timestamp;
use std::collections::VecDeque;

/// What retransmittable content, if any, a sent packet carried — enough to
/// either free it (acked) or reschedule it (lost) without re-parsing the
/// packet itself (spec §4.1.3).
#[derive(Debug, Clone)]
pub enum SentFrameRecord {
    Crypto { space: PacketNumberSpace, offset: u64, len: u64 },
    Stream { id: StreamId, offset: u64, len: u64 },
}

/// One packet's worth of outstanding bookkeeping, kept until it is
/// acknowledged or declared lost (spec §3.1 "per-level sent packet log
/// {bytes, sent_time, ack_eliciting, retransmittable}").
#[derive(Debug, Clone)]
pub struct SentPacketInfo {
    pub packet_number: PacketNumber,
    pub sent_time: Timestamp,
    pub bytes: u32,
    pub ack_eliciting: bool,
    /// `false` for packets that carry only ACK/CONNECTION_CLOSE frames,
    /// which loss detection ignores even if they go unacknowledged (spec
    /// §4.1.2: these frames bypass congestion control and never need
    /// retransmitting themselves).
    pub retransmittable: bool,
    /// CRYPTO/STREAM chunks this packet carried, walked on ack (free the
    /// data) or loss (reschedule it) by the caller.
    pub frames: Vec<SentFrameRecord>,
}

/// What a caller should do in response to newly observed acks and losses.
#[derive(Debug, Default)]
pub struct AckOutcome {
    pub newly_acked: Vec<SentPacketInfo>,
    pub newly_lost: Vec<SentPacketInfo>,
    /// Non-`None` once a packet is still outstanding but not yet past its
    /// loss-time threshold; the caller arms a timer for it.
    pub earliest_loss_time: Option<Timestamp>,
}

/// The loss-recovery state for a single packet number space (spec §4.1.3).
#[derive(Debug)]
pub struct SentPacketLog {
    space: PacketNumberSpace,
    outstanding: VecDeque<SentPacketInfo>,
    largest_acked: Option<PacketNumber>,
    largest_sent: Option<PacketNumber>,
    rtt_estimator: RttEstimator,
    pto: Pto,
    congestion: NewReno,
    loss_detector: LossDetector,
    handshake_confirmed: bool,
}

impl SentPacketLog {
    pub fn new(space: PacketNumberSpace, initial_rtt: std::time::Duration, max_datagram_size: u16) -> Self {
        Self {
            space,
            outstanding: VecDeque::new(),
            largest_acked: None,
            largest_sent: None,
            rtt_estimator: RttEstimator::new(initial_rtt),
            pto: Pto::default(),
            congestion: NewReno::new(max_datagram_size),
            loss_detector: LossDetector::default(),
            handshake_confirmed: false,
        }
    }

    /// The handshake has confirmed (spec §4.1.6's Handshake-key discard
    /// condition); from here on the peer's `max_ack_delay` applies and
    /// out-of-range ack delays no longer drop the RTT sample.
    pub fn on_handshake_confirmed(&mut self) {
        self.handshake_confirmed = true;
    }

    pub fn rtt_estimator(&self) -> &RttEstimator {
        &self.rtt_estimator
    }

    pub fn congestion_window(&self) -> u32 {
        self.congestion.congestion_window()
    }

    pub fn bytes_in_flight(&self) -> u32 {
        self.congestion.bytes_in_flight()
    }

    pub fn is_congestion_limited(&self) -> bool {
        self.congestion.is_congestion_limited()
    }

    pub fn pto_mut(&mut self) -> &mut Pto {
        &mut self.pto
    }

    /// Records a packet as sent, arming the PTO timer and charging
    /// congestion-controlled bytes (pure-ACK packets pass `bytes = 0` and
    /// `ack_eliciting = false`, so they never touch the congestion window,
    /// per spec §4.1.2 "ACK/CLOSE frames bypass CC").
    pub fn on_packet_sent(&mut self, info: SentPacketInfo, now: Timestamp) {
        self.largest_sent = Some(self.largest_sent.map_or(info.packet_number, |p| p.max(info.packet_number)));
        if info.ack_eliciting {
            self.congestion.on_packet_sent(now, info.bytes as usize);
            let pto_period = self.rtt_estimator.pto_period(0, self.space);
            self.pto.update(now, pto_period);
        }
        self.outstanding.push_back(info);
    }

    /// Processes newly-decoded ACK ranges against the outstanding log.
    /// `ack_delay` is the peer's reported delay, already decoded from the
    /// frame's varint.
    pub fn on_ack_ranges(
        &mut self,
        ranges: &[core::ops::RangeInclusive<u64>],
        ack_delay: std::time::Duration,
        now: Timestamp,
    ) -> AckOutcome {
        let mut outcome = AckOutcome::default();
        let largest_in_ranges = ranges.iter().map(|r| *r.end()).max();

        let mut remaining = VecDeque::new();
        let mut newest_acked_time_sent = None;
        let mut total_acked_bytes = 0usize;

        while let Some(sent) = self.outstanding.pop_front() {
            let pn = sent.packet_number.as_u64();
            if ranges.iter().any(|r| r.contains(&pn)) {
                if newest_acked_time_sent.map_or(true, |_| Some(sent.packet_number) == self.largest_sent) {
                    newest_acked_time_sent = Some(sent.sent_time);
                }
                if sent.ack_eliciting {
                    total_acked_bytes += sent.bytes as usize;
                }
                outcome.newly_acked.push(sent);
            } else {
                remaining.push_back(sent);
            }
        }
        self.outstanding = remaining;

        if let Some(largest) = largest_in_ranges {
            let largest = PacketNumber::new(self.space, largest);
            self.largest_acked = Some(self.largest_acked.map_or(largest, |p| p.max(largest)));

            if let Some(newest_sent_time) = newest_acked_time_sent {
                self.rtt_estimator.update_rtt(
                    ack_delay,
                    now.saturating_duration_since(newest_sent_time),
                    now,
                    self.handshake_confirmed,
                    self.space,
                );
                self.congestion.on_rtt_update(newest_sent_time, now, &self.rtt_estimator);
            }
        }

        if total_acked_bytes > 0 {
            if let Some(newest_sent_time) = newest_acked_time_sent {
                self.congestion.on_ack(newest_sent_time, total_acked_bytes, now);
            }
        }

        if !outcome.newly_acked.is_empty() {
            let pto_period = self.rtt_estimator.pto_period(0, self.space);
            self.pto.update(now, pto_period);
        }

        self.detect_losses(now, &mut outcome);
        outcome
    }

    /// Re-walks the outstanding log for packets that are now lost by packet-
    /// or time-threshold, without requiring a fresh ACK (used on PTO
    /// expiry and periodic timer polls).
    pub fn detect_losses(&mut self, now: Timestamp, outcome: &mut AckOutcome) {
        let Some(largest_acked) = self.largest_acked else { return };
        let time_threshold = self.rtt_estimator.loss_time_threshold();

        let mut remaining = VecDeque::new();
        let mut earliest_loss_time = None;
        let mut lost_bytes = 0u32;
        let mut latest_lost_sent_time = None;

        while let Some(sent) = self.outstanding.pop_front() {
            if sent.packet_number >= largest_acked {
                remaining.push_back(sent);
                continue;
            }
            match self.loss_detector.check(time_threshold, sent.sent_time, sent.packet_number, largest_acked, now) {
                quic_core::recovery::loss::Outcome::Lost => {
                    if sent.ack_eliciting {
                        lost_bytes += sent.bytes;
                        latest_lost_sent_time = Some(sent.sent_time);
                    }
                    outcome.newly_lost.push(sent);
                }
                quic_core::recovery::loss::Outcome::NotLost { lost_time } => {
                    earliest_loss_time = Some(earliest_loss_time.map_or(lost_time, |t: Timestamp| t.min(lost_time)));
                    remaining.push_back(sent);
                }
            }
        }
        self.outstanding = remaining;
        outcome.earliest_loss_time = earliest_loss_time;

        if lost_bytes > 0 {
            if let Some(sent_time) = latest_lost_sent_time {
                let persistent_congestion = now.saturating_duration_since(sent_time)
                    >= self.rtt_estimator.persistent_congestion_threshold();
                self.congestion.on_packet_lost(lost_bytes, sent_time, persistent_congestion, now);
            }
        }
    }

    pub fn has_in_flight(&self) -> bool {
        self.outstanding.iter().any(|p| p.ack_eliciting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pn(space: PacketNumberSpace, v: u64) -> PacketNumber {
        PacketNumber::new(space, v)
    }

    #[test]
    fn acked_packets_leave_the_outstanding_log() {
        let mut log = SentPacketLog::new(PacketNumberSpace::ApplicationData, std::time::Duration::from_millis(100), 1200);
        log.on_packet_sent(
            SentPacketInfo {
                packet_number: pn(PacketNumberSpace::ApplicationData, 0),
                sent_time: Timestamp::from_micros(0),
                bytes: 1200,
                ack_eliciting: true,
                retransmittable: true,
                frames: Vec::new(),
            },
            Timestamp::from_micros(0),
        );
        assert!(log.has_in_flight());
        let outcome = log.on_ack_ranges(&[0..=0], std::time::Duration::from_millis(1), Timestamp::from_micros(50_000));
        assert_eq!(outcome.newly_acked.len(), 1);
        assert!(!log.has_in_flight());
    }

    #[test]
    fn packet_threshold_declares_older_unacked_packets_lost() {
        let mut log = SentPacketLog::new(PacketNumberSpace::ApplicationData, std::time::Duration::from_millis(100), 1200);
        for n in 0..5 {
            log.on_packet_sent(
                SentPacketInfo {
                    packet_number: pn(PacketNumberSpace::ApplicationData, n),
                    sent_time: Timestamp::from_micros(0),
                    bytes: 1200,
                    ack_eliciting: true,
                    retransmittable: true,
                    frames: Vec::new(),
                },
                Timestamp::from_micros(0),
            );
        }
        let outcome = log.on_ack_ranges(&[4..=4], std::time::Duration::from_millis(1), Timestamp::from_micros(1));
        assert!(outcome.newly_lost.iter().any(|p| p.packet_number.as_u64() == 0));
    }
}
