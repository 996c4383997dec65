// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §19.8: STREAM (type=0x08..0x0f). Carries stream data; the low
//! three tag bits select which optional fields are present.

use crate::{stream_id::StreamId, varint::VarInt};
use s2n_codec::{decoder_parameterized_value, DecoderBufferMut, Encoder, EncoderValue};

const STREAM_TAG: u8 = 0x08;
const OFF_BIT: u8 = 0x04;
const LEN_BIT: u8 = 0x02;
const FIN_BIT: u8 = 0x01;

#[derive(Debug, PartialEq, Eq)]
pub struct Stream<'a> {
    pub stream_id: StreamId,
    pub offset: VarInt,
    /// Set when this frame is the last frame in its packet, so its data
    /// extends to the end of the packet with no explicit length field.
    pub is_last_frame: bool,
    pub is_fin: bool,
    pub data: DecoderBufferMut<'a>,
}

impl<'a> Stream<'a> {
    pub fn tag(&self) -> u8 {
        let mut tag = STREAM_TAG;
        if self.offset.as_u64() != 0 {
            tag |= OFF_BIT;
        }
        if !self.is_last_frame {
            tag |= LEN_BIT;
        }
        if self.is_fin {
            tag |= FIN_BIT;
        }
        tag
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_less_safe_slice()
    }
}

decoder_parameterized_value!(
    impl<'a> Stream<'a> {
        fn decode(tag: crate::frame::Tag, buffer: Buffer) -> Result<Self> {
            let (stream_id, buffer) = buffer.decode::<StreamId>()?;

            let (offset, buffer) = if tag & OFF_BIT != 0 {
                buffer.decode::<VarInt>()?
            } else {
                (VarInt::ZERO, buffer)
            };

            let is_last_frame = tag & LEN_BIT == 0;
            let (data, buffer) = if is_last_frame {
                buffer.decode::<DecoderBufferMut<'a>>()?
            } else {
                buffer.decode_with_len_prefix::<VarInt, DecoderBufferMut<'a>>()?
            };

            let is_fin = tag & FIN_BIT != 0;

            Ok((
                Stream { stream_id, offset, is_last_frame, is_fin, data },
                buffer,
            ))
        }
    }
);

impl<'a> EncoderValue for Stream<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.stream_id);
        if self.offset.as_u64() != 0 {
            buffer.encode(&self.offset);
        }
        if self.is_last_frame {
            buffer.encode(&self.data());
        } else {
            buffer.encode_with_len_prefix::<VarInt, _>(&self.data());
        }
    }
}
