// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! Loss recovery and congestion control (RFC 9002; spec §4.1.4).
//!
//! [`rtt_estimator`] tracks round-trip time samples and derives the PTO and
//! loss-time thresholds; [`loss`] turns a set of acknowledged ranges into the
//! newly-lost packets of a sent-packet history; [`pto`] counts the
//! consecutive probe timeouts that drive persistent-congestion detection;
//! [`congestion_controller`] is the pluggable window trait plus a New Reno
//! implementation (RFC 9002 Appendix B).

pub mod congestion_controller;
pub mod loss;
pub mod pto;
pub mod rtt_estimator;

pub use congestion_controller::CongestionController;
pub use rtt_estimator::RttEstimator;
