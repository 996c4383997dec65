// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §16 variable-length integer encoding.
//!
//! QUIC reserves the two most significant bits of the first encoded byte to
//! record the base-2 logarithm of the encoding length, leaving 6/14/30/62
//! usable bits for the value itself.

use core::{convert::TryFrom, fmt};
use s2n_codec::{decoder_value, Encoder, EncoderValue};

/// Largest value representable by a QUIC variable-length integer (2^62 - 1).
pub const MAX_VARINT_VALUE: u64 = 4_611_686_018_427_387_903;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarIntError;

impl fmt::Display for VarIntError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "value exceeds the maximum representable varint")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for VarIntError {}

/// A validated QUIC variable-length integer in `[0, MAX_VARINT_VALUE]`.
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct VarInt(u64);

impl VarInt {
    pub const MAX: VarInt = VarInt(MAX_VARINT_VALUE);
    pub const ZERO: VarInt = VarInt(0);

    #[inline]
    pub const fn from_u32(value: u32) -> Self {
        // every u32 fits in the 62-bit range
        VarInt(value as u64)
    }

    #[inline]
    pub fn new(value: u64) -> Result<Self, VarIntError> {
        if value > MAX_VARINT_VALUE {
            Err(VarIntError)
        } else {
            Ok(VarInt(value))
        }
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn checked_add(self, other: impl Into<VarInt>) -> Option<Self> {
        self.0.checked_add(other.into().0).and_then(|v| VarInt::new(v).ok())
    }

    #[inline]
    pub fn checked_sub(self, other: impl Into<VarInt>) -> Option<Self> {
        self.0.checked_sub(other.into().0).map(VarInt)
    }

    /// Number of bytes needed to encode `self` on the wire.
    #[inline]
    pub const fn encoding_size(self) -> usize {
        encoding_size(self.0)
    }
}

#[inline(always)]
const fn encoding_size(value: u64) -> usize {
    if value <= 63 {
        1
    } else if value <= 16_383 {
        2
    } else if value <= 1_073_741_823 {
        4
    } else {
        8
    }
}

impl fmt::Debug for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<VarInt> for u64 {
    fn from(v: VarInt) -> u64 {
        v.0
    }
}

impl From<u8> for VarInt {
    fn from(value: u8) -> Self {
        VarInt(value as u64)
    }
}

impl From<u16> for VarInt {
    fn from(value: u16) -> Self {
        VarInt(value as u64)
    }
}

impl From<u32> for VarInt {
    fn from(value: u32) -> Self {
        VarInt(value as u64)
    }
}

impl TryFrom<u64> for VarInt {
    type Error = VarIntError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        VarInt::new(value)
    }
}

impl TryFrom<usize> for VarInt {
    type Error = VarIntError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        VarInt::new(value as u64)
    }
}

impl EncoderValue for VarInt {
    fn encode<E: Encoder>(&self, encoder: &mut E) {
        let value = self.0;
        match encoding_size(value) {
            1 => encoder.encode(&(value as u8)),
            2 => encoder.encode(&(0b01 << 14 | value as u16)),
            4 => encoder.encode(&(0b10 << 30 | value as u32)),
            _ => encoder.encode(&(0b11u64 << 62 | value)),
        }
    }

    fn encoding_size(&self) -> usize {
        encoding_size(self.0)
    }
}

decoder_value!(
    impl<'a> VarInt {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (first, _) = buffer.peek().decode::<u8>()?;
            let tag = first >> 6;

            let (value, buffer) = match tag {
                0b00 => {
                    let (v, buffer) = buffer.decode::<u8>()?;
                    ((v & 0x3f) as u64, buffer)
                }
                0b01 => {
                    let (v, buffer) = buffer.decode::<u16>()?;
                    ((v & 0x3fff) as u64, buffer)
                }
                0b10 => {
                    let (v, buffer) = buffer.decode::<u32>()?;
                    ((v & 0x3fff_ffff) as u64, buffer)
                }
                _ => {
                    let (v, buffer) = buffer.decode::<u64>()?;
                    (v & 0x3fff_ffff_ffff_ffff, buffer)
                }
            };

            Ok((VarInt(value), buffer))
        }
    }
);

#[cfg(test)]
mod tests {
    use super::*;
    use s2n_codec::{DecoderBuffer, EncoderBuffer};

    #[test]
    fn round_trip() {
        for value in [0u64, 1, 63, 64, 16_383, 16_384, 1_073_741_823, 1_073_741_824, MAX_VARINT_VALUE] {
            let varint = VarInt::new(value).unwrap();
            let mut buf = [0u8; 8];
            let mut encoder = EncoderBuffer::new(&mut buf);
            encoder.encode(&varint);
            let len = encoder.len();

            let decoder = DecoderBuffer::new(&buf[..len]);
            let (decoded, _) = decoder.decode::<VarInt>().unwrap();
            assert_eq!(decoded.as_u64(), value);
        }
    }

    #[test]
    fn encoding_size_boundaries() {
        assert_eq!(VarInt::new(63).unwrap().encoding_size(), 1);
        assert_eq!(VarInt::new(64).unwrap().encoding_size(), 2);
        assert_eq!(VarInt::new(16_383).unwrap().encoding_size(), 2);
        assert_eq!(VarInt::new(16_384).unwrap().encoding_size(), 4);
        assert_eq!(VarInt::new(1_073_741_823).unwrap().encoding_size(), 4);
        assert_eq!(VarInt::new(1_073_741_824).unwrap().encoding_size(), 8);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(VarInt::new(MAX_VARINT_VALUE + 1).is_err());
    }
}
