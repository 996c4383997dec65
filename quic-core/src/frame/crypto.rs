// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §19.6: CRYPTO (type=0x06). Carries a slice of one encryption
//! level's TLS handshake byte stream (spec §4.4.2 epoch-separated crypto
//! streams) at `offset`.

use crate::varint::VarInt;
use s2n_codec::{decoder_value, DecoderBufferMut, Encoder, EncoderValue};

#[derive(Debug, PartialEq, Eq)]
pub struct Crypto<'a> {
    pub offset: VarInt,
    pub data: DecoderBufferMut<'a>,
}

impl<'a> Crypto<'a> {
    pub const fn tag(&self) -> u8 {
        0x06
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_less_safe_slice()
    }
}

decoder_value!(
    impl<'a> Crypto<'a> {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (offset, buffer) = buffer.decode::<VarInt>()?;
            let (data, buffer) = buffer.decode_with_len_prefix::<VarInt, DecoderBufferMut<'a>>()?;
            Ok((Crypto { offset, data }, buffer))
        }
    }
);

impl<'a> EncoderValue for Crypto<'a> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.offset);
        buffer.encode_with_len_prefix::<VarInt, _>(&self.data());
    }
}
