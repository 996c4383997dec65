// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! QUIC frames (RFC 9000 §19): the payload units the send engine packs into
//! a packet (spec §4.1.2) and the transport layer dispatches on receipt.
//!
//! REDESIGN: the upstream split this into a doubly generic `Frame<'a, Ack,
//! Data>` so the same enum could carry either a borrowed decode view or an
//! in-place mutable view. A single connection here always decodes into one
//! mutable scratch buffer per datagram, so `FrameMut<'a>` is the only shape
//! this crate needs; the `try_fit`-style incremental capacity fitting that
//! upstream frames expose is likewise left to the send engine, which sizes
//! frames against remaining capacity directly rather than through a
//! per-frame helper.

use crate::varint::VarInt;
use s2n_codec::{DecoderBufferMut, DecoderBufferMutResult, DecoderError};

pub(crate) type Tag = u8;

pub mod ack;
pub mod ack_elicitation;
pub mod connection_close;
pub mod crypto;
pub mod data_blocked;
pub mod handshake_done;
pub mod max_data;
pub mod max_stream_data;
pub mod max_streams;
pub mod new_connection_id;
pub mod padding;
pub mod path_challenge;
pub mod path_response;
pub mod ping;
pub mod reset_stream;
pub mod retire_connection_id;
pub mod stop_sending;
pub mod stream;
pub mod stream_data_blocked;
pub mod streams_blocked;

pub use ack::Ack;
pub use ack_elicitation::{AckElicitable, AckElicitation};
pub use connection_close::ConnectionClose;
pub use crypto::Crypto;
pub use data_blocked::DataBlocked;
pub use handshake_done::HandshakeDone;
pub use max_data::MaxData;
pub use max_stream_data::MaxStreamData;
pub use max_streams::MaxStreams;
pub use new_connection_id::NewConnectionId;
pub use padding::Padding;
pub use path_challenge::PathChallenge;
pub use path_response::PathResponse;
pub use ping::Ping;
pub use reset_stream::ResetStream;
pub use retire_connection_id::RetireConnectionId;
pub use stop_sending::StopSending;
pub use stream::Stream;
pub use stream_data_blocked::StreamDataBlocked;
pub use streams_blocked::StreamsBlocked;

/// Every frame type this crate understands, decoded in place from a
/// datagram's mutable scratch buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    Padding(Padding),
    Ping(Ping),
    Ack(Ack),
    ResetStream(ResetStream),
    StopSending(StopSending),
    Crypto(Crypto<'a>),
    Stream(Stream<'a>),
    MaxData(MaxData),
    MaxStreamData(MaxStreamData),
    MaxStreams(MaxStreams),
    DataBlocked(DataBlocked),
    StreamDataBlocked(StreamDataBlocked),
    StreamsBlocked(StreamsBlocked),
    NewConnectionId(NewConnectionId<'a>),
    RetireConnectionId(RetireConnectionId),
    PathChallenge(PathChallenge<'a>),
    PathResponse(PathResponse<'a>),
    ConnectionClose(ConnectionClose<'a>),
    HandshakeDone(HandshakeDone),
}

impl<'a> Frame<'a> {
    pub fn ack_elicitation(&self) -> AckElicitation {
        match self {
            Frame::Padding(_) | Frame::Ack(_) | Frame::ConnectionClose(_) => AckElicitation::NonEliciting,
            _ => AckElicitation::Eliciting,
        }
    }

    /// Whether this frame is allowed to be bundled with other frames from
    /// the peer's point of view congestion-blind (RFC 9002 §7: ACK,
    /// CONNECTION_CLOSE, and PADDING never consume congestion window).
    pub fn is_congestion_controlled(&self) -> bool {
        !matches!(self, Frame::Ack(_) | Frame::ConnectionClose(_) | Frame::Padding(_))
    }
}

/// Decodes a single frame from the front of `buffer`, dispatching on its tag
/// byte (RFC 9000 §12.4 frame type table).
pub fn decode_frame(buffer: DecoderBufferMut<'_>) -> DecoderBufferMutResult<'_, Frame<'_>> {
    let tag = buffer.peek_byte(0)?;
    match tag {
        0x00 => {
            let (frame, buffer) = buffer.decode()?;
            Ok((Frame::Padding(frame), buffer))
        }
        0x01 => {
            let buffer = buffer.skip(1)?;
            Ok((Frame::Ping(Ping), buffer))
        }
        0x02 | 0x03 => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode_parameterized(tag)?;
            Ok((Frame::Ack(frame), buffer))
        }
        0x04 => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode()?;
            Ok((Frame::ResetStream(frame), buffer))
        }
        0x05 => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode()?;
            Ok((Frame::StopSending(frame), buffer))
        }
        0x06 => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode()?;
            Ok((Frame::Crypto(frame), buffer))
        }
        0x08..=0x0f => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode_parameterized(tag)?;
            Ok((Frame::Stream(frame), buffer))
        }
        0x10 => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode()?;
            Ok((Frame::MaxData(frame), buffer))
        }
        0x11 => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode()?;
            Ok((Frame::MaxStreamData(frame), buffer))
        }
        0x12 | 0x13 => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode_parameterized(tag)?;
            Ok((Frame::MaxStreams(frame), buffer))
        }
        0x14 => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode()?;
            Ok((Frame::DataBlocked(frame), buffer))
        }
        0x15 => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode()?;
            Ok((Frame::StreamDataBlocked(frame), buffer))
        }
        0x16 | 0x17 => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode_parameterized(tag)?;
            Ok((Frame::StreamsBlocked(frame), buffer))
        }
        0x18 => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode()?;
            Ok((Frame::NewConnectionId(frame), buffer))
        }
        0x19 => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode()?;
            Ok((Frame::RetireConnectionId(frame), buffer))
        }
        0x1a => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode()?;
            Ok((Frame::PathChallenge(frame), buffer))
        }
        0x1b => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode()?;
            Ok((Frame::PathResponse(frame), buffer))
        }
        0x1c | 0x1d => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode_parameterized(tag)?;
            Ok((Frame::ConnectionClose(frame), buffer))
        }
        0x1e => {
            let buffer = buffer.skip(1)?;
            let (frame, buffer) = buffer.decode()?;
            Ok((Frame::HandshakeDone(frame), buffer))
        }
        _ => Err(DecoderError::InvariantViolation("unsupported or extension frame type")),
    }
}

// Shared by the VarInt-only frame types: decode each field in declaration
// order behind a fixed tag, encode the tag followed by the same fields.
macro_rules! simple_frame_codec {
    ($name:ident { $($field:ident),* }, $tag:expr) => {
        s2n_codec::decoder_value!(
            impl<'a> $name {
                fn decode(buffer: Buffer) -> Result<Self> {
                    $(
                        let ($field, buffer) = buffer.decode()?;
                    )*
                    Ok(($name { $($field),* }, buffer))
                }
            }
        );

        impl s2n_codec::EncoderValue for $name {
            fn encode<E: s2n_codec::Encoder>(&self, buffer: &mut E) {
                buffer.encode(&$tag);
                $(
                    buffer.encode(&self.$field);
                )*
            }
        }
    };
}

pub(crate) use simple_frame_codec;
