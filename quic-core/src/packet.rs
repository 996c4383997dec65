// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! QUIC packet headers (RFC 9000 §17): the header form a datagram carries,
//! and the mapping from that form to an encryption level and packet number
//! space (spec §4.2, §9 REDESIGN on `QuicEncryptLevelToPacketType` /
//! `QuicPacketTypeToKeyType`).
//!
//! REDESIGN: the source's key-type lookup maps `RETRY` to `INITIAL`, so a
//! Retry packet's (nonexistent) payload protection would silently reuse the
//! Initial secret derived from the client's destination connection ID.
//! Retry carries no packet number and no regular AEAD payload at all — it is
//! authenticated solely by the fixed integrity key in [`crate::crypto::retry`].
//! [`Type::encryption_level`] and [`Type::packet_number_space`] therefore
//! return `None` for `Retry` and `VersionNegotiation` rather than coercing
//! them onto `EncryptionLevel::Initial`.

use crate::{crypto::EncryptionLevel, number::PacketNumberSpace};
use s2n_codec::DecoderError;

/// The only version this crate speaks (RFC 9000 is "QUIC version 1").
pub const QUIC_VERSION_1: u32 = 1;

pub const HEADER_FORM_BIT: u8 = 0x80;
pub const FIXED_BIT: u8 = 0x40;
pub const LONG_PACKET_TYPE_MASK: u8 = 0x30;
pub const LONG_PACKET_TYPE_OFFSET: u8 = 4;
pub const RESERVED_BITS_MASK: u8 = 0x0c;
pub const PACKET_NUMBER_LEN_MASK: u8 = 0x03;
pub const SHORT_HEADER_SPIN_BIT: u8 = 0x20;
pub const SHORT_HEADER_KEY_PHASE_BIT: u8 = 0x04;

/// Maximum connection ID length a version-1 long header packet may carry
/// (RFC 9000 §17.2).
pub const MAX_LONG_HEADER_CONNECTION_ID_LEN: usize = 20;

/// RFC 9000 Table 5: the four long-header packet types, plus the implicit
/// short header used once 1-RTT keys are installed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Type {
    Initial,
    ZeroRtt,
    Handshake,
    Retry,
    VersionNegotiation,
    OneRtt,
}

impl Type {
    /// Reads the first byte of a datagram and classifies its header, without
    /// validating anything past that byte. Returns `None` if the fixed bit
    /// is unset on a long header (always invalid) — except Version
    /// Negotiation, which is exempt from the fixed bit per RFC 9000 §17.2.1.
    pub fn from_first_byte(byte: u8) -> Option<Self> {
        if byte & HEADER_FORM_BIT == 0 {
            return Some(Type::OneRtt);
        }

        // Version Negotiation is distinguished by its Version field being
        // zero, which this function cannot see; callers that have peeked
        // the version must use `from_first_byte_and_version` instead.
        if byte & FIXED_BIT == 0 {
            return None;
        }

        let long_type = (byte & LONG_PACKET_TYPE_MASK) >> LONG_PACKET_TYPE_OFFSET;
        Some(match long_type {
            0b00 => Type::Initial,
            0b01 => Type::ZeroRtt,
            0b10 => Type::Handshake,
            0b11 => Type::Retry,
            _ => unreachable!("two bits cannot exceed 0b11"),
        })
    }

    /// Long-header classification once the version field (the 4 bytes after
    /// the first byte) is also known: a version of zero always means
    /// Version Negotiation regardless of the fixed bit or long-type bits
    /// (RFC 9000 §17.2.1).
    pub fn from_first_byte_and_version(byte: u8, version: u32) -> Result<Self, DecoderError> {
        if byte & HEADER_FORM_BIT == 0 {
            return Ok(Type::OneRtt);
        }
        if version == 0 {
            return Ok(Type::VersionNegotiation);
        }
        Self::from_first_byte(byte).ok_or(DecoderError::InvariantViolation("fixed bit must be set on a long header"))
    }

    pub fn is_long_header(self) -> bool {
        !matches!(self, Type::OneRtt)
    }

    /// The encryption level a packet of this type is protected under, or
    /// `None` for the two types that carry no AEAD-protected payload at all
    /// (Version Negotiation is cleartext; Retry uses the standalone
    /// integrity key in [`crate::crypto::retry`], never a `PacketKey`).
    pub fn encryption_level(self) -> Option<EncryptionLevel> {
        match self {
            Type::Initial => Some(EncryptionLevel::Initial),
            Type::ZeroRtt => Some(EncryptionLevel::ZeroRtt),
            Type::Handshake => Some(EncryptionLevel::Handshake),
            Type::OneRtt => Some(EncryptionLevel::OneRtt),
            Type::Retry | Type::VersionNegotiation => None,
        }
    }

    /// The packet number space this type's packet numbers are drawn from,
    /// or `None` for the two types with no packet number field.
    pub fn packet_number_space(self) -> Option<PacketNumberSpace> {
        match self {
            Type::Initial => Some(PacketNumberSpace::Initial),
            Type::Handshake => Some(PacketNumberSpace::Handshake),
            Type::ZeroRtt | Type::OneRtt => Some(PacketNumberSpace::ApplicationData),
            Type::Retry | Type::VersionNegotiation => None,
        }
    }
}

impl From<EncryptionLevel> for Type {
    fn from(level: EncryptionLevel) -> Self {
        match level {
            EncryptionLevel::Initial => Type::Initial,
            EncryptionLevel::ZeroRtt => Type::ZeroRtt,
            EncryptionLevel::Handshake => Type::Handshake,
            EncryptionLevel::OneRtt => Type::OneRtt,
        }
    }
}

/// Header protection samples 16 ciphertext bytes starting 4 bytes past the
/// end of the (assumed maximum-length) packet number field (RFC 9001
/// §5.4.2), regardless of packet type.
pub const HEADER_PROTECTION_SAMPLE_OFFSET: usize = 4;
pub const HEADER_PROTECTION_SAMPLE_LEN: usize = 16;

pub fn sample_offset(packet_number_offset: usize) -> usize {
    packet_number_offset + HEADER_PROTECTION_SAMPLE_OFFSET
}

/// The destination and source connection ID slices of a long header, read
/// after the version field. Does not interpret type-specific fields (token,
/// length, packet number) that follow.
#[derive(Debug, PartialEq, Eq)]
pub struct LongHeaderConnectionIds<'a> {
    pub destination: &'a [u8],
    pub source: &'a [u8],
}

/// Parses the destination/source connection ID pair immediately following a
/// long header's version field, returning the remaining bytes.
pub fn parse_long_header_connection_ids(
    buffer: &[u8],
) -> Result<(LongHeaderConnectionIds<'_>, &[u8]), DecoderError> {
    let too_short = || DecoderError::UnexpectedEof(1);

    let (&dcid_len, rest) = buffer.split_first().ok_or_else(too_short)?;
    let dcid_len = dcid_len as usize;
    if dcid_len > MAX_LONG_HEADER_CONNECTION_ID_LEN {
        return Err(DecoderError::InvariantViolation("destination connection id exceeds max length"));
    }
    if rest.len() < dcid_len {
        return Err(too_short());
    }
    let (destination, rest) = rest.split_at(dcid_len);

    let (&scid_len, rest) = rest.split_first().ok_or_else(too_short)?;
    let scid_len = scid_len as usize;
    if scid_len > MAX_LONG_HEADER_CONNECTION_ID_LEN {
        return Err(DecoderError::InvariantViolation("source connection id exceeds max length"));
    }
    if rest.len() < scid_len {
        return Err(too_short());
    }
    let (source, rest) = rest.split_at(scid_len);

    Ok((LongHeaderConnectionIds { destination, source }, rest))
}

/// Builds the Retry pseudo-packet (RFC 9001 §5.8) fed to
/// [`crate::crypto::retry::compute_integrity_tag`]: the original
/// destination connection ID, length-prefixed, followed by the Retry
/// header and payload exactly as transmitted, minus the trailing tag.
pub fn build_retry_pseudo_packet(
    original_destination_connection_id: &[u8],
    retry_header_and_payload: &[u8],
) -> crate::core_alloc::vec::Vec<u8> {
    let mut pseudo_packet = crate::core_alloc::vec::Vec::with_capacity(
        1 + original_destination_connection_id.len() + retry_header_and_payload.len(),
    );
    pseudo_packet.push(original_destination_connection_id.len() as u8);
    pseudo_packet.extend_from_slice(original_destination_connection_id);
    pseudo_packet.extend_from_slice(retry_header_and_payload);
    pseudo_packet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_header_type_bits() {
        // 1st byte of an Initial packet: form=1, fixed=1, type=00, rest arbitrary
        assert_eq!(Type::from_first_byte(0b1100_0000), Some(Type::Initial));
        assert_eq!(Type::from_first_byte(0b1101_0000), Some(Type::ZeroRtt));
        assert_eq!(Type::from_first_byte(0b1110_0000), Some(Type::Handshake));
        assert_eq!(Type::from_first_byte(0b1111_0000), Some(Type::Retry));
    }

    #[test]
    fn short_header_has_no_form_bit() {
        assert_eq!(Type::from_first_byte(0b0100_0001), Some(Type::OneRtt));
    }

    #[test]
    fn missing_fixed_bit_is_rejected() {
        assert_eq!(Type::from_first_byte(0b1000_0000), None);
    }

    #[test]
    fn zero_version_is_always_version_negotiation() {
        assert_eq!(Type::from_first_byte_and_version(0b1000_0000, 0).unwrap(), Type::VersionNegotiation);
    }

    #[test]
    fn retry_and_version_negotiation_have_no_key_type() {
        assert_eq!(Type::Retry.encryption_level(), None);
        assert_eq!(Type::VersionNegotiation.encryption_level(), None);
        assert_eq!(Type::Retry.packet_number_space(), None);
    }

    #[test]
    fn parses_connection_ids() {
        let buffer = [8u8, 1, 2, 3, 4, 5, 6, 7, 8, 4, 9, 10, 11, 12, 0xff];
        let (ids, rest) = parse_long_header_connection_ids(&buffer).unwrap();
        assert_eq!(ids.destination, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(ids.source, &[9, 10, 11, 12]);
        assert_eq!(rest, &[0xff]);
    }

    #[test]
    fn retry_pseudo_packet_is_length_prefixed() {
        let pseudo = build_retry_pseudo_packet(&[1, 2, 3], &[0xaa, 0xbb]);
        assert_eq!(pseudo, vec![3, 1, 2, 3, 0xaa, 0xbb]);
    }
}
