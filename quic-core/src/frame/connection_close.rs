// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §19.19: CONNECTION_CLOSE (type=0x1c transport, 0x1d
//! application). Spec §7's transport error taxonomy is carried as
//! `error_code` here; `frame_type` distinguishes a QUIC-layer close from an
//! application-layer one.

use crate::varint::VarInt;
use s2n_codec::{decoder_parameterized_value, Encoder, EncoderValue};

const QUIC_ERROR_TAG: u8 = 0x1c;
const APPLICATION_ERROR_TAG: u8 = 0x1d;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionClose<'a> {
    pub error_code: VarInt,
    /// Present only on a QUIC-layer close; identifies the frame type that
    /// triggered the error (0 if unknown).
    pub frame_type: Option<VarInt>,
    pub reason: Option<&'a [u8]>,
}

impl ConnectionClose<'_> {
    pub fn tag(&self) -> u8 {
        if self.frame_type.is_some() {
            QUIC_ERROR_TAG
        } else {
            APPLICATION_ERROR_TAG
        }
    }

    pub fn is_application_error(&self) -> bool {
        self.frame_type.is_none()
    }
}

decoder_parameterized_value!(
    impl<'a> ConnectionClose<'a> {
        fn decode(tag: crate::frame::Tag, buffer: Buffer) -> Result<Self> {
            let (error_code, buffer) = buffer.decode::<VarInt>()?;

            let (frame_type, buffer) = if tag == QUIC_ERROR_TAG {
                let (frame_type, buffer) = buffer.decode::<VarInt>()?;
                (Some(frame_type), buffer)
            } else {
                (None, buffer)
            };

            let (reason, buffer) = buffer.decode_slice_with_len_prefix::<VarInt>()?;
            let reason = reason.into_less_safe_slice();
            let reason = if reason.is_empty() { None } else { Some(reason) };

            Ok((ConnectionClose { error_code, frame_type, reason }, buffer))
        }
    }
);

impl EncoderValue for ConnectionClose<'_> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.error_code);
        if let Some(frame_type) = &self.frame_type {
            buffer.encode(frame_type);
        }
        if let Some(reason) = &self.reason {
            buffer.encode_with_len_prefix::<VarInt, _>(reason);
        } else {
            buffer.encode(&0u8);
        }
    }
}
