// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §19.18: PATH_RESPONSE (type=0x1b). Echoes a PATH_CHALLENGE's
//! data back, proving the sender can receive at the path it was sent on.

use crate::frame::path_challenge::{PathChallenge, DATA_LEN};
use core::convert::TryInto;
use s2n_codec::{decoder_value, Encoder, EncoderValue};

#[derive(Debug, PartialEq, Eq)]
pub struct PathResponse<'a> {
    pub data: &'a [u8; DATA_LEN],
}

impl PathResponse<'_> {
    pub const fn tag(&self) -> u8 {
        0x1b
    }
}

impl<'a> From<PathChallenge<'a>> for PathResponse<'a> {
    fn from(path_challenge: PathChallenge<'a>) -> Self {
        Self { data: path_challenge.data }
    }
}

decoder_value!(
    impl<'a> PathResponse<'a> {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (data, buffer) = buffer.decode_slice(DATA_LEN)?;
            let data: &[u8] = data.into_less_safe_slice();
            let data = data.try_into().expect("length already verified above");
            Ok((PathResponse { data }, buffer))
        }
    }
);

impl EncoderValue for PathResponse<'_> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.data.as_ref());
    }
}
