// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! The pluggable congestion window algorithm (spec §4.1.4).
//!
//! REDESIGN: the source's `CongestionController` trait is parameterized over
//! a `Publisher` used to emit slow-start/pacing/BBR-state telemetry events,
//! and over a per-implementation `PacketInfo` associated type carried through
//! the sent-packet history for BBR's delivery-rate sampling. Neither applies
//! here: there's no event/metrics subsystem, and [`new_reno`] is the only
//! implementation this crate carries, so the trait drops both in favor of the
//! plain RFC 9002 Appendix B signature.

use crate::{recovery::RttEstimator, time::Timestamp};
use core::fmt::Debug;

pub mod new_reno;

pub use new_reno::NewReno;

/// An algorithm for sizing the congestion window (RFC 9002 §7).
pub trait CongestionController: Debug {
    /// The current congestion window, in bytes.
    fn congestion_window(&self) -> u32;

    /// Bytes sent but not yet acknowledged or declared lost.
    fn bytes_in_flight(&self) -> u32;

    /// `true` if the window has no room left for another maximum-sized
    /// datagram given the current bytes in flight.
    fn is_congestion_limited(&self) -> bool;

    /// `true` if recovery requires a packet sent outside the window (a
    /// single retransmission permitted under loss).
    fn requires_fast_retransmission(&self) -> bool;

    /// A packet of `sent_bytes` was just sent. Pure-ACK packets (0 bytes)
    /// never pass through here: congestion control must not itself impede
    /// the feedback it depends on.
    fn on_packet_sent(&mut self, time_sent: Timestamp, sent_bytes: usize);

    /// The newest-acknowledged packet in an ACK frame produced a fresh RTT
    /// sample.
    fn on_rtt_update(&mut self, time_sent: Timestamp, now: Timestamp, rtt_estimator: &RttEstimator);

    /// One or more previously-unacknowledged packets were acknowledged;
    /// `bytes_acknowledged` is the total newly-acked across all of them.
    fn on_ack(&mut self, newest_acked_time_sent: Timestamp, bytes_acknowledged: usize, now: Timestamp);

    /// A packet was declared lost. `persistent_congestion` collapses the
    /// window to the minimum (RFC 9002 §7.6.2).
    fn on_packet_lost(&mut self, lost_bytes: u32, time_sent: Timestamp, persistent_congestion: bool, now: Timestamp);

    /// ECN CE marks arrived; treated identically to a loss by RFC 9002 §7.3.2.
    fn on_explicit_congestion(&mut self, time_sent: Timestamp, now: Timestamp);
}
