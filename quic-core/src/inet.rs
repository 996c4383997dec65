// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! Network-address types shared between the datapath binding (§4.3) and the
//! path manager (§4.1.5).

use core::fmt;
use std::net::SocketAddr;

/// Explicit Congestion Notification codepoint, carried alongside every
/// received datagram (RFC 9000 §13.4) so the congestion controller can react
/// to CE marks without re-deriving it from IP header bits itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExplicitCongestionNotification {
    #[default]
    NotEct,
    Ect0,
    Ect1,
    Ce,
}

impl ExplicitCongestionNotification {
    pub fn from_tos_byte(tos: u8) -> Self {
        match tos & 0b11 {
            0b01 => Self::Ect1,
            0b10 => Self::Ect0,
            0b11 => Self::Ce,
            _ => Self::NotEct,
        }
    }

    pub fn to_tos_bits(self) -> u8 {
        match self {
            Self::NotEct => 0b00,
            Self::Ect1 => 0b01,
            Self::Ect0 => 0b10,
            Self::Ce => 0b11,
        }
    }
}

/// The local/remote address pair a datagram was sent or received on. Two
/// datapath bindings with different 4-tuples are different paths for the
/// purposes of path validation (§4.1.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FourTuple {
    pub local: SocketAddr,
    pub remote: SocketAddr,
}

impl fmt::Display for FourTuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} <-> {}", self.local, self.remote)
    }
}
