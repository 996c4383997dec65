// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §19.15: NEW_CONNECTION_ID (type=0x18). Provides an alternative
//! connection ID and its stateless reset token, for the path manager's CID
//! registry (spec §4.1.5, `quic-core::connection_id::ConnectionIdRegistry`).

use crate::varint::VarInt;
use core::{convert::TryInto, mem::size_of};
use s2n_codec::{decoder_invariant, decoder_value, Encoder, EncoderValue};

pub const STATELESS_RESET_TOKEN_LEN: usize = size_of::<u128>();

#[derive(Debug, PartialEq, Eq)]
pub struct NewConnectionId<'a> {
    pub sequence_number: VarInt,
    pub retire_prior_to: VarInt,
    pub connection_id: &'a [u8],
    pub stateless_reset_token: &'a [u8; STATELESS_RESET_TOKEN_LEN],
}

impl NewConnectionId<'_> {
    pub const fn tag(&self) -> u8 {
        0x18
    }
}

decoder_value!(
    impl<'a> NewConnectionId<'a> {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (sequence_number, buffer) = buffer.decode::<VarInt>()?;
            let (retire_prior_to, buffer) = buffer.decode::<VarInt>()?;

            decoder_invariant!(retire_prior_to.as_u64() <= sequence_number.as_u64(), "invalid retire prior to value");

            let (connection_id_len, buffer) = buffer.decode::<u8>()?;
            decoder_invariant!((1..=20).contains(&connection_id_len), "invalid connection id length");

            let (connection_id, buffer) = buffer.decode_slice(connection_id_len.into())?;
            let connection_id = connection_id.into_less_safe_slice();

            let (stateless_reset_token, buffer) = buffer.decode_slice(STATELESS_RESET_TOKEN_LEN)?;
            let stateless_reset_token: &[u8] = stateless_reset_token.into_less_safe_slice();
            let stateless_reset_token = stateless_reset_token.try_into().expect("length already verified above");

            Ok((
                NewConnectionId { sequence_number, retire_prior_to, connection_id, stateless_reset_token },
                buffer,
            ))
        }
    }
);

impl EncoderValue for NewConnectionId<'_> {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());
        buffer.encode(&self.sequence_number);
        buffer.encode(&self.retire_prior_to);
        buffer.encode_with_len_prefix::<u8, _>(&self.connection_id);
        buffer.encode(&self.stateless_reset_token.as_ref());
    }
}
