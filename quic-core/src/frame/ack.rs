// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §19.3: ACK (type=0x02 plain, 0x03 with ECN counts). Tells the
//! peer's send engine (spec §4.1.4 loss recovery) which packet numbers have
//! been received.
//!
//! REDESIGN: upstream decodes ack ranges into a lazy `AckRangesDecoder` that
//! replays gap/length subtraction on each iteration so it can be generic over
//! borrowed and owned ack range storage. This crate only ever decodes into a
//! single owned `Vec`, so the ranges are expanded once at decode time and
//! loss recovery walks a plain slice.

use crate::core_alloc::vec::Vec;
use crate::varint::VarInt;
use core::ops::RangeInclusive;
use s2n_codec::{decoder_invariant, decoder_parameterized_value, decoder_value, DecoderError, Encoder, EncoderValue};

const ACK_TAG: u8 = 0x02;
const ACK_W_ECN_TAG: u8 = 0x03;

const ACK_RANGE_DECODING_ERROR: DecoderError = DecoderError::InvariantViolation("invalid ACK ranges");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Delay in microseconds between receipt of the largest acknowledged
    /// packet and when this frame was sent, scaled by the peer's
    /// `ack_delay_exponent` transport parameter (RFC 9000 §13.2.5).
    pub ack_delay: VarInt,

    /// Inclusive packet number ranges, descending, each `start..=end`.
    /// `ack_ranges[0]` always contains `largest_acknowledged()`.
    pub ack_ranges: Vec<RangeInclusive<VarInt>>,

    pub ecn_counts: Option<EcnCounts>,
}

impl Ack {
    pub fn tag(&self) -> u8 {
        if self.ecn_counts.is_some() { ACK_W_ECN_TAG } else { ACK_TAG }
    }

    pub fn ack_delay(&self) -> core::time::Duration {
        core::time::Duration::from_micros(self.ack_delay.as_u64())
    }

    pub fn largest_acknowledged(&self) -> VarInt {
        *self.ack_ranges.first().expect("ack frame always has at least one range").end()
    }

    pub fn smallest_acknowledged(&self) -> VarInt {
        *self.ack_ranges.last().expect("ack frame always has at least one range").start()
    }

    pub fn contains(&self, packet_number: VarInt) -> bool {
        self.ack_ranges.iter().any(|r| r.contains(&packet_number))
    }
}

decoder_parameterized_value!(
    impl<'a> Ack {
        fn decode(tag: crate::frame::Tag, buffer: Buffer) -> Result<Self> {
            let (largest_acknowledged, buffer) = buffer.decode::<VarInt>()?;
            let (ack_delay, buffer) = buffer.decode::<VarInt>()?;
            let (ack_range_count, buffer) = buffer.decode::<VarInt>()?;
            let (first_ack_range, buffer) = buffer.decode::<VarInt>()?;

            let smallest_in_first_range = largest_acknowledged
                .checked_sub(first_ack_range)
                .ok_or(ACK_RANGE_DECODING_ERROR)?;

            let mut ack_ranges = Vec::new();
            ack_ranges.push(smallest_in_first_range..=largest_acknowledged);

            let mut largest = smallest_in_first_range;
            let mut buffer = buffer;

            for _ in 0..ack_range_count.as_u64() {
                let (gap, next_buffer) = buffer.decode::<VarInt>()?;
                let (range_len, next_buffer) = next_buffer.decode::<VarInt>()?;
                buffer = next_buffer;

                // RFC 9000 §19.3.1: largest = previous_smallest - gap - 2
                let range_largest = largest
                    .checked_sub(gap)
                    .and_then(|v| v.checked_sub(VarInt::from(2u8)))
                    .ok_or(ACK_RANGE_DECODING_ERROR)?;
                let range_smallest = range_largest
                    .checked_sub(range_len)
                    .ok_or(ACK_RANGE_DECODING_ERROR)?;

                ack_ranges.push(range_smallest..=range_largest);
                largest = range_smallest;
            }

            let (ecn_counts, buffer) = if tag == ACK_W_ECN_TAG {
                let (ecn_counts, buffer) = buffer.decode::<EcnCounts>()?;
                (Some(ecn_counts), buffer)
            } else {
                (None, buffer)
            };

            decoder_invariant!(!ack_ranges.is_empty(), "ack frame must contain at least one range");

            Ok((Ack { ack_delay, ack_ranges, ecn_counts }, buffer))
        }
    }
);

impl EncoderValue for Ack {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.tag());

        let mut ranges = self.ack_ranges.iter();
        let first = ranges.next().expect("ack frame always has at least one range");
        let (mut smallest, largest_acknowledged) = (*first.start(), *first.end());
        let first_ack_range = largest_acknowledged
            .checked_sub(smallest)
            .expect("ack range start never exceeds its end");

        let ack_range_count: VarInt = VarInt::new(self.ack_ranges.len() as u64 - 1)
            .expect("ack range count cannot exceed VarInt::MAX");

        buffer.encode(&largest_acknowledged);
        buffer.encode(&self.ack_delay);
        buffer.encode(&ack_range_count);
        buffer.encode(&first_ack_range);

        for range in ranges {
            let (start, end) = (*range.start(), *range.end());
            let gap = smallest
                .checked_sub(end)
                .and_then(|v| v.checked_sub(VarInt::from(2u8)))
                .expect("ack ranges are built in strictly descending, non-adjacent order");
            let ack_range = end.checked_sub(start).expect("ack range start never exceeds its end");
            buffer.encode(&gap);
            buffer.encode(&ack_range);
            smallest = start;
        }

        if let Some(ecn_counts) = self.ecn_counts.as_ref() {
            buffer.encode(ecn_counts);
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EcnCounts {
    pub ect_0_count: VarInt,
    pub ect_1_count: VarInt,
    pub ce_count: VarInt,
}

impl EcnCounts {
    pub fn as_option(&self) -> Option<EcnCounts> {
        if *self == Self::default() { None } else { Some(*self) }
    }
}

decoder_value!(
    impl<'a> EcnCounts {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (ect_0_count, buffer) = buffer.decode()?;
            let (ect_1_count, buffer) = buffer.decode()?;
            let (ce_count, buffer) = buffer.decode()?;
            Ok((EcnCounts { ect_0_count, ect_1_count, ce_count }, buffer))
        }
    }
);

impl EncoderValue for EcnCounts {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.ect_0_count);
        buffer.encode(&self.ect_1_count);
        buffer.encode(&self.ce_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecn_counts_as_option() {
        let mut counts = EcnCounts::default();
        assert_eq!(None, counts.as_option());
        counts.ect_0_count = VarInt::from(1u8);
        assert!(counts.as_option().is_some());
    }

    #[test]
    fn largest_and_smallest_acknowledged() {
        let ack = Ack {
            ack_delay: VarInt::from(0u8),
            ack_ranges: vec![
                VarInt::from(10u8)..=VarInt::from(12u8),
                VarInt::from(4u8)..=VarInt::from(6u8),
            ],
            ecn_counts: None,
        };
        assert_eq!(ack.largest_acknowledged(), VarInt::from(12u8));
        assert_eq!(ack.smallest_acknowledged(), VarInt::from(4u8));
        assert!(ack.contains(VarInt::from(5u8)));
        assert!(!ack.contains(VarInt::from(8u8)));
    }
}
