// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §19.17: PATH_CHALLENGE (type=0x1a). Carries 8 bytes of
//! unpredictable data the peer must echo back in a PATH_RESPONSE (spec
//! §4.1.5 path validation).

use core::convert::TryInto;
use s2n_codec::{decoder_value, Encoder, EncoderValue};

pub const DATA_LEN: usize = 8;

#[derive(Debug, PartialEq, Eq)]
pub struct PathChallenge<'a> {
    pub data: &'a [u8; DATA_LEN],
}

impl PathChallenge<'_> {
    pub const fn tag(&self) -> u8 {
        0x1a
    }
}

decoder_value!(
    impl<'a> PathChallenge<'a> {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (data, buffer) = buffer.decode_slice(DATA_LEN)?;
            let data: &[u8] = data.into_less_safe_slice();
            let data = data.try_into().expect("length already verified above");
            Ok((PathChallenge { data }, buffer))
        }
    }
);

impl EncoderValue for PathChallenge<'_> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.data.as_ref());
    }
}
