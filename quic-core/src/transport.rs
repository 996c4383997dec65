// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! The connection-level error taxonomy (spec §7) and the RFC 9000 §20.1
//! transport error codes it maps onto for CONNECTION_CLOSE.
//!
//! Distinct from [`crate::crypto::Error`], which covers only AEAD/key
//! derivation failures internal to the packet key hierarchy: every
//! `crypto::Error` becomes a [`Error::Crypto`] once it crosses into the
//! connection's error handling.

use crate::varint::VarInt;
use core::fmt;
use s2n_codec::DecoderError;

/// QUIC transport error codes (RFC 9000 §20.1) carried in a QUIC-layer
/// CONNECTION_CLOSE frame.
pub mod code {
    use crate::varint::VarInt;

    pub const NO_ERROR: VarInt = VarInt::from_u32(0x0);
    pub const INTERNAL_ERROR: VarInt = VarInt::from_u32(0x1);
    pub const FLOW_CONTROL_ERROR: VarInt = VarInt::from_u32(0x3);
    pub const STREAM_STATE_ERROR: VarInt = VarInt::from_u32(0x5);
    pub const FRAME_ENCODING_ERROR: VarInt = VarInt::from_u32(0x7);
    pub const PROTOCOL_VIOLATION: VarInt = VarInt::from_u32(0xa);
    /// Base of the 256-value range reserved for TLS alerts (RFC 9001 §4.8):
    /// the wire code is `CRYPTO_ERROR_BASE | alert`.
    pub const CRYPTO_ERROR_BASE: u32 = 0x100;
}

/// What went wrong, independent of whether it is fatal to the connection
/// (spec §7's taxonomy is kinds, not a single wire-error type).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Peer behavior that violates the protocol but isn't covered by a more
    /// specific kind below (RFC 9000 PROTOCOL_VIOLATION).
    ProtocolViolation(&'static str),
    /// The TLS bridge surfaced a handshake alert (spec §4.4.7).
    CryptoError { alert: u8, reason: &'static str },
    /// A peer sent more data than its advertised MAX_DATA/MAX_STREAM_DATA
    /// permitted (spec §4.1.4).
    FlowControlError(&'static str),
    /// A frame arrived for a stream not in a state that permits it (RFC
    /// 9000 §3).
    StreamStateError(&'static str),
    /// A local invariant was violated; not attributable to the peer.
    InternalError(&'static str),
    /// Transient: the datapath had no send buffers available (spec §4.1.6).
    NoBuffers,
    /// Transient: the datapath reported the destination as unreachable.
    Unreachable,
    /// Binding setup only: the requested local address is already bound.
    AddressInUse,
    /// The operation was cancelled by its caller, not by a protocol event.
    Cancelled,
}

impl Error {
    /// Transient errors are restored to the send-flag state and retried by
    /// the caller; everything else closes the connection (spec §4.1.6,
    /// §7).
    pub fn is_transient(self) -> bool {
        matches!(self, Error::NoBuffers | Error::Unreachable)
    }

    /// The RFC 9000 §20.1 wire code this kind closes the connection with,
    /// or `None` for kinds that never reach CONNECTION_CLOSE (transient
    /// errors, and setup-only `AddressInUse`).
    pub fn transport_code(self) -> Option<VarInt> {
        match self {
            Error::ProtocolViolation(_) => Some(code::PROTOCOL_VIOLATION),
            Error::CryptoError { alert, .. } => {
                Some(VarInt::from_u32(code::CRYPTO_ERROR_BASE | u32::from(alert)))
            }
            Error::FlowControlError(_) => Some(code::FLOW_CONTROL_ERROR),
            Error::StreamStateError(_) => Some(code::STREAM_STATE_ERROR),
            Error::InternalError(_) => Some(code::INTERNAL_ERROR),
            Error::Cancelled => Some(code::NO_ERROR),
            Error::NoBuffers | Error::Unreachable | Error::AddressInUse => None,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Error::ProtocolViolation(reason)
            | Error::CryptoError { reason, .. }
            | Error::FlowControlError(reason)
            | Error::StreamStateError(reason)
            | Error::InternalError(reason) => reason,
            Error::NoBuffers => "no send buffers available",
            Error::Unreachable => "destination unreachable",
            Error::AddressInUse => "address already in use",
            Error::Cancelled => "operation cancelled",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.reason())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl From<DecoderError> for Error {
    fn from(err: DecoderError) -> Self {
        match err {
            DecoderError::InvariantViolation(reason) => Error::ProtocolViolation(reason),
            _ => Error::ProtocolViolation("malformed packet"),
        }
    }
}

impl From<crate::crypto::Error> for Error {
    fn from(err: crate::crypto::Error) -> Self {
        Error::CryptoError { alert: 0, reason: err.reason() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_do_not_carry_a_transport_code() {
        assert_eq!(Error::NoBuffers.transport_code(), None);
        assert_eq!(Error::Unreachable.transport_code(), None);
        assert!(Error::NoBuffers.is_transient());
        assert!(!Error::ProtocolViolation("x").is_transient());
    }

    #[test]
    fn crypto_error_code_is_offset_by_alert() {
        let err = Error::CryptoError { alert: 0x28, reason: "handshake failure" };
        assert_eq!(err.transport_code().unwrap().as_u64(), 0x100 | 0x28);
    }
}
