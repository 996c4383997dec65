// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §19.1: PADDING (type=0x00). A run of zero bytes with no other
//! content; used to pad Initial packets to the minimum datagram size and to
//! probe PMTU.

use s2n_codec::{decoder_value, Encoder, EncoderValue};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Padding {
    pub length: usize,
}

impl Padding {
    pub const fn tag(self) -> u8 {
        0x00
    }
}

decoder_value!(
    impl<'a> Padding {
        fn decode(buffer: Buffer) -> Result<Self> {
            let mut length = 0;
            let mut remaining = buffer;
            while remaining.peek_byte(0) == Ok(0x00) {
                remaining = remaining.skip(1)?;
                length += 1;
            }
            Ok((Padding { length }, remaining))
        }
    }
);

impl EncoderValue for Padding {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        for _ in 0..self.length {
            buffer.encode(&0x00u8);
        }
    }

    fn encoding_size(&self) -> usize {
        self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use s2n_codec::DecoderBufferMut;

    #[test]
    fn decodes_run_of_zero_bytes() {
        let mut data = [0u8, 0, 0, 0x01];
        let buffer = DecoderBufferMut::new(&mut data);
        let (padding, remaining): (Padding, _) = buffer.decode().unwrap();
        assert_eq!(padding.length, 3);
        assert_eq!(remaining.len(), 1);
    }
}
