// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! Closes out one packet: writes the long/short header, the frames the
//! flush algorithm selected, then applies AEAD protection and the header
//! protection mask (spec §4.1.2 "AEAD + header protection packet closing",
//! RFC 9000 §17, RFC 9001 §5.4).

use quic_core::connection_id::ConnectionId;
use quic_core::crypto::PacketKey;
use quic_core::number::{PacketNumber, PacketNumberLen};
use quic_core::packet::{self, Type as PacketType};
use quic_core::varint::VarInt;
use s2n_codec::{Encoder, EncoderBuffer, EncoderValue};

/// Everything needed to write one packet's header, independent of its
/// frames.
pub struct PacketHeader<'a> {
    pub packet_type: PacketType,
    pub version: u32,
    pub destination_connection_id: &'a ConnectionId,
    pub source_connection_id: Option<&'a ConnectionId>,
    pub token: Option<&'a [u8]>,
    pub packet_number: PacketNumber,
    pub largest_acked: Option<PacketNumber>,
}

/// Writes the header into `buffer`, returning the offset its length field
/// (long headers only) and packet number field start, plus how many bytes
/// the header itself consumed.
struct HeaderLayout {
    header_len: usize,
    length_field_offset: Option<usize>,
    packet_number_offset: usize,
    packet_number_len: PacketNumberLen,
}

fn write_header(buffer: &mut [u8], header: &PacketHeader<'_>) -> Option<HeaderLayout> {
    let (pn_value, pn_len) = header.packet_number.truncate(header.largest_acked);
    let mut encoder = EncoderBuffer::new(buffer);

    if header.packet_type.is_long_header() {
        let first_byte = packet::HEADER_FORM_BIT
            | packet::FIXED_BIT
            | (long_header_type_bits(header.packet_type) << packet::LONG_PACKET_TYPE_OFFSET)
            | pn_len.tag_bits();
        encoder.encode(&first_byte);
        encoder.encode(&header.version);
        encoder.encode(&(header.destination_connection_id.len() as u8));
        encoder.encode(&header.destination_connection_id.as_bytes());
        let source = header.source_connection_id.map(|cid| cid.as_bytes()).unwrap_or(&[]);
        encoder.encode(&(source.len() as u8));
        encoder.encode(&source);

        if header.packet_type == PacketType::Initial {
            let token = header.token.unwrap_or(&[]);
            encoder.encode(&VarInt::new(token.len() as u64).ok()?);
            encoder.encode(&token);
        }

        // Placeholder for the payload-length varint, always encoded with
        // the 2-byte form (§5.2.2 of RFC 9000's varint encoding allows this
        // unconditionally) so it can be patched in place without shifting
        // anything written after it.
        let length_field_offset = encoder.len();
        encoder.write_repeated(2, 0);
        let packet_number_offset = encoder.len();
        encode_packet_number(&mut encoder, pn_value, pn_len);

        Some(HeaderLayout {
            header_len: encoder.len(),
            length_field_offset: Some(length_field_offset),
            packet_number_offset,
            packet_number_len: pn_len,
        })
    } else {
        let first_byte = packet::FIXED_BIT | pn_len.tag_bits();
        encoder.encode(&first_byte);
        encoder.encode(&header.destination_connection_id.as_bytes());
        let packet_number_offset = encoder.len();
        encode_packet_number(&mut encoder, pn_value, pn_len);

        Some(HeaderLayout {
            header_len: encoder.len(),
            length_field_offset: None,
            packet_number_offset,
            packet_number_len: pn_len,
        })
    }
}

/// Writes one complete packet into `buffer`: header, frames (via
/// `write_frames`, called repeatedly against a plaintext scratch encoder
/// until it returns `false`), AEAD seal, then header protection. Returns
/// the total datagram length, or `None` if `buffer` was too small to fit
/// `min_payload_len` bytes of frames.
pub fn close_packet(
    buffer: &mut [u8],
    header: &PacketHeader<'_>,
    key: &PacketKey,
    min_payload_len: usize,
    mut write_frames: impl FnMut(&mut EncoderBuffer<'_>) -> bool,
) -> Option<usize> {
    let layout = write_header(buffer, header)?;
    let payload_start = layout.header_len;
    let payload_capacity = buffer.len().saturating_sub(payload_start).saturating_sub(key.tag_len());
    if payload_capacity < min_payload_len {
        return None;
    }

    let mut plaintext = vec![0u8; payload_capacity];
    let mut payload_encoder = EncoderBuffer::new(&mut plaintext);
    while write_frames(&mut payload_encoder) {}
    let payload_len = payload_encoder.len();
    if payload_len < min_payload_len {
        return None;
    }
    plaintext.truncate(payload_len);

    if let Some(length_field_offset) = layout.length_field_offset {
        let length = (payload_len + key.tag_len()) as u64;
        let length_varint = VarInt::new(length).ok()?;
        patch_varint_2byte(&mut buffer[length_field_offset..length_field_offset + 2], length_varint);
    }

    key.seal(header.packet_number.as_u64(), &buffer[..payload_start], &mut plaintext).ok()?;

    let total_len = payload_start + plaintext.len();
    if total_len > buffer.len() {
        return None;
    }
    buffer[payload_start..total_len].copy_from_slice(&plaintext);

    apply_header_protection(buffer, layout.packet_number_offset, layout.packet_number_len, key).ok()?;
    Some(total_len)
}

fn long_header_type_bits(packet_type: PacketType) -> u8 {
    match packet_type {
        PacketType::Initial => 0b00,
        PacketType::ZeroRtt => 0b01,
        PacketType::Handshake => 0b10,
        PacketType::Retry => 0b11,
        PacketType::OneRtt | PacketType::VersionNegotiation => {
            unreachable!("not a long header type this crate sends")
        }
    }
}

fn encode_packet_number(encoder: &mut EncoderBuffer<'_>, value: u64, len: PacketNumberLen) {
    let bytes = value.to_be_bytes();
    encoder.encode(&&bytes[8 - len.bytesize()..]);
}

/// Patches a 2-byte RFC 9000 varint (top bits `01`) in place.
fn patch_varint_2byte(dest: &mut [u8], value: VarInt) {
    let v = value.as_u64() as u16 | (0b01 << 14);
    dest.copy_from_slice(&v.to_be_bytes());
}

/// RFC 9001 §5.4.1: mask the first byte's low bits and every packet number
/// byte with the header protection sample taken 4 bytes past the start of
/// a maximum-length (4-byte) packet number field.
fn apply_header_protection(
    buffer: &mut [u8],
    packet_number_offset: usize,
    pn_len: PacketNumberLen,
    key: &PacketKey,
) -> Result<(), quic_core::crypto::Error> {
    let sample_offset = packet::sample_offset(packet_number_offset);
    let sample_end = sample_offset + packet::HEADER_PROTECTION_SAMPLE_LEN;
    if sample_end > buffer.len() {
        return Err(quic_core::crypto::Error::KEY_DERIVATION_FAILURE);
    }
    let mut sample = [0u8; packet::HEADER_PROTECTION_SAMPLE_LEN];
    sample.copy_from_slice(&buffer[sample_offset..sample_end]);
    let mask = key.header_protection_key().new_mask(&sample)?;

    let first_byte_mask = if buffer[0] & packet::HEADER_FORM_BIT != 0 { mask[0] & 0x0f } else { mask[0] & 0x1f };
    buffer[0] ^= first_byte_mask;

    for (i, byte) in buffer[packet_number_offset..packet_number_offset + pn_len.bytesize()].iter_mut().enumerate() {
        *byte ^= mask[1 + i];
    }
    Ok(())
}
