// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! Receiver-side tracking of which packet numbers have arrived in a space,
//! merged into the disjoint descending ranges an ACK frame wants (spec
//! §4.1.2, RFC 9000 §13.2.3).

use quic_core::time::Timestamp;
use quic_core::varint::VarInt;
use std::ops::RangeInclusive;

/// Packet numbers received in one packet number space, folded into the
/// smallest number of disjoint, non-adjacent, descending ranges.
#[derive(Debug, Default)]
pub struct AckRanges {
    /// Descending by `start()`; no two ranges touch or overlap.
    ranges: Vec<RangeInclusive<u64>>,
    largest_received_time: Option<Timestamp>,
    largest: Option<u64>,
    /// `true` once a packet has arrived that no ACK sent so far reports.
    dirty: bool,
}

impl AckRanges {
    /// Records a newly decrypted packet number, merging it into the range
    /// set. `now` is only used when `pn` becomes the new largest, to anchor
    /// the delay reported in the next ACK frame.
    pub fn on_packet_received(&mut self, pn: u64, now: Timestamp) {
        if self.ranges.iter().any(|r| r.contains(&pn)) {
            return;
        }
        self.dirty = true;
        if self.largest.is_none_or(|largest| pn > largest) {
            self.largest = Some(pn);
            self.largest_received_time = Some(now);
        }

        self.ranges.push(pn..=pn);
        self.ranges.sort_unstable_by(|a, b| b.start().cmp(a.start()));

        let mut merged: Vec<RangeInclusive<u64>> = Vec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..) {
            if let Some(last) = merged.last_mut() {
                if range.end().saturating_add(1) >= *last.start() {
                    let start = (*range.start()).min(*last.start());
                    let end = (*range.end()).max(*last.end());
                    *last = start..=end;
                    continue;
                }
            }
            merged.push(range);
        }
        self.ranges = merged;
    }

    /// Drops ranges entirely below `threshold`, once the peer's last ACK
    /// makes them no longer worth re-reporting.
    pub fn forget_below(&mut self, threshold: u64) {
        self.ranges.retain(|r| *r.end() >= threshold);
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// The ranges in the shape an ACK frame wants: descending `VarInt`
    /// ranges, `[0]` containing the largest acknowledged packet number.
    pub fn to_frame_ranges(&self) -> Vec<RangeInclusive<VarInt>> {
        self.ranges
            .iter()
            .map(|r| VarInt::new(*r.start()).unwrap_or(VarInt::ZERO)..=VarInt::new(*r.end()).unwrap_or(VarInt::ZERO))
            .collect()
    }

    pub fn ack_delay(&self, now: Timestamp) -> core::time::Duration {
        self.largest_received_time.map_or(core::time::Duration::ZERO, |t| now.saturating_duration_since(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_adjacent_packet_numbers_into_one_range() {
        let mut ranges = AckRanges::default();
        ranges.on_packet_received(1, Timestamp::from_micros(0));
        ranges.on_packet_received(2, Timestamp::from_micros(1));
        ranges.on_packet_received(3, Timestamp::from_micros(2));
        assert_eq!(ranges.to_frame_ranges(), vec![VarInt::from(1u8)..=VarInt::from(3u8)]);
    }

    #[test]
    fn out_of_order_arrival_keeps_ranges_disjoint_until_the_gap_fills() {
        let mut ranges = AckRanges::default();
        ranges.on_packet_received(5, Timestamp::from_micros(0));
        ranges.on_packet_received(1, Timestamp::from_micros(1));
        assert_eq!(ranges.to_frame_ranges(), vec![VarInt::from(5u8)..=VarInt::from(5u8), VarInt::from(1u8)..=VarInt::from(1u8)]);
        ranges.on_packet_received(2, Timestamp::from_micros(2));
        ranges.on_packet_received(3, Timestamp::from_micros(3));
        ranges.on_packet_received(4, Timestamp::from_micros(4));
        assert_eq!(ranges.to_frame_ranges(), vec![VarInt::from(1u8)..=VarInt::from(5u8)]);
    }

    #[test]
    fn ack_delay_anchors_on_the_largest_packet_number_seen() {
        let mut ranges = AckRanges::default();
        ranges.on_packet_received(1, Timestamp::from_micros(1_000));
        assert_eq!(ranges.ack_delay(Timestamp::from_micros(5_000)), core::time::Duration::from_micros(4_000));
        ranges.on_packet_received(0, Timestamp::from_micros(9_000));
        assert_eq!(ranges.ack_delay(Timestamp::from_micros(10_000)), core::time::Duration::from_micros(9_000));
    }
}
