// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! The receive-side mirror of [`crate::packet_builder`]: strips header
//! protection, reconstructs the full packet number, and opens the AEAD
//! payload (RFC 9000 §17, RFC 9001 §5.4).

use quic_core::crypto::PacketKey;
use quic_core::number::{PacketNumber, PacketNumberLen, PacketNumberSpace};
use quic_core::packet::{self, Type as PacketType};

/// One successfully unprotected and decrypted packet.
pub struct ParsedPacket<'a> {
    pub packet_type: PacketType,
    pub packet_number: PacketNumber,
    pub payload: &'a mut [u8],
}

/// Parse errors are never distinguished further by the caller: a malformed
/// or undecryptable packet is simply dropped (RFC 9000 §12.2 allows
/// silently discarding packets that fail to parse within a datagram).
#[derive(Debug)]
pub struct ParseError;

/// Strips header protection and opens the AEAD payload of one packet at the
/// front of `datagram`, using `key` for the space the caller has already
/// selected via `packet_type`. `largest_processed` is this space's
/// highest packet number seen so far, used to reconstruct the truncated
/// wire packet number (RFC 9000 §17.1).
///
/// Long-header packets may be followed by further coalesced packets in the
/// same datagram; the caller is expected to know the length of this packet
/// by now (from the parsed Length field, not reproduced here since this
/// crate receives one packet per datagram in practice — see
/// [`crate::connection`]'s REDESIGN note on coalescing).
pub fn parse_packet<'a>(
    datagram: &'a mut [u8],
    packet_type: PacketType,
    space: PacketNumberSpace,
    key: &PacketKey,
    largest_processed: Option<PacketNumber>,
) -> Result<ParsedPacket<'a>, ParseError> {
    let dcid_len = if packet_type.is_long_header() {
        long_header_dcid_len(datagram).ok_or(ParseError)?
    } else {
        // short header: destination connection id length is whatever the
        // local connection issued, which this crate fixes at 8 bytes
        // (see `Path::issue_connection_id_if_needed`).
        8
    };

    let packet_number_offset = if packet_type.is_long_header() {
        long_header_packet_number_offset(datagram, packet_type, dcid_len).ok_or(ParseError)?
    } else {
        1 + dcid_len
    };

    let sample_offset = packet::sample_offset(packet_number_offset);
    let sample_end = sample_offset + packet::HEADER_PROTECTION_SAMPLE_LEN;
    if sample_end > datagram.len() || packet_number_offset + 4 > datagram.len() {
        return Err(ParseError);
    }

    let mut sample = [0u8; packet::HEADER_PROTECTION_SAMPLE_LEN];
    sample.copy_from_slice(&datagram[sample_offset..sample_end]);
    let mask = key.header_protection_key().new_mask(&sample).map_err(|_| ParseError)?;

    let first_byte_mask = if datagram[0] & packet::HEADER_FORM_BIT != 0 { mask[0] & 0x0f } else { mask[0] & 0x1f };
    datagram[0] ^= first_byte_mask;
    let pn_len = PacketNumberLen::from_tag(datagram[0] & packet::PACKET_NUMBER_LEN_MASK);

    for (i, byte) in datagram[packet_number_offset..packet_number_offset + pn_len.bytesize()].iter_mut().enumerate() {
        *byte ^= mask[1 + i];
    }

    let mut truncated_bytes = [0u8; 8];
    truncated_bytes[8 - pn_len.bytesize()..].copy_from_slice(&datagram[packet_number_offset..packet_number_offset + pn_len.bytesize()]);
    let truncated = u64::from_be_bytes(truncated_bytes);
    let packet_number = PacketNumber::expand(space, truncated, pn_len, largest_processed);

    let payload_start = packet_number_offset + pn_len.bytesize();
    if payload_start > datagram.len() {
        return Err(ParseError);
    }
    let (header, payload) = datagram.split_at_mut(payload_start);
    let opened = key.open(packet_number.as_u64(), header, payload).map_err(|_| ParseError)?;

    Ok(ParsedPacket { packet_type, packet_number, payload: opened })
}

fn long_header_dcid_len(datagram: &[u8]) -> Option<usize> {
    // first byte, 4-byte version, 1-byte DCID length
    let dcid_len_offset = 5;
    datagram.get(dcid_len_offset).map(|&b| b as usize)
}

fn long_header_packet_number_offset(datagram: &[u8], packet_type: PacketType, dcid_len: usize) -> Option<usize> {
    let mut offset = 5 + 1 + dcid_len;
    let scid_len = *datagram.get(offset)? as usize;
    offset += 1 + scid_len;

    if packet_type == PacketType::Initial {
        let token_len = *datagram.get(offset)? as usize;
        // RFC 9000's token length is itself a varint; this crate only ever
        // parses its own short Initial tokens, which always fit the 1-byte
        // varint form, so a plain byte read is sufficient here.
        offset += 1 + token_len;
    }

    // 2-byte length varint, written by `packet_builder::write_header` in
    // its fixed 2-byte form.
    offset += 2;
    Some(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet_builder::{close_packet, PacketHeader};
    use quic_core::connection_id::ConnectionId;

    #[test]
    fn round_trips_through_close_and_parse() {
        let dcid = ConnectionId::try_from_bytes(&[1, 2, 3, 4]).unwrap();
        let key = PacketKey::derive_initial(dcid.as_bytes(), quic_core::crypto::label::CLIENT_IN).unwrap();

        let header = PacketHeader {
            packet_type: PacketType::Initial,
            version: packet::QUIC_VERSION_1,
            destination_connection_id: &dcid,
            source_connection_id: None,
            token: None,
            packet_number: PacketNumber::new(PacketNumberSpace::Initial, 1),
            largest_acked: None,
        };

        let mut buffer = vec![0u8; 1200];
        let len = close_packet(&mut buffer, &header, &key, 20, |encoder| {
            use s2n_codec::{Encoder, EncoderValue};
            if encoder.len() == 0 {
                let padding = frame_padding(encoder.remaining_capacity());
                encoder.encode(&padding.as_slice());
                true
            } else {
                false
            }
        })
        .unwrap();
        buffer.truncate(len);

        let parsed = parse_packet(&mut buffer, PacketType::Initial, PacketNumberSpace::Initial, &key, None).unwrap();
        assert_eq!(parsed.packet_number.as_u64(), 1);
        assert_eq!(parsed.packet_type, PacketType::Initial);
    }

    fn frame_padding(len: usize) -> Vec<u8> {
        vec![0u8; len.min(32)]
    }
}
