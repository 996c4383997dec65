// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! Stream identifiers (RFC 9000 §2.1) and the stream send list the send
//! engine schedules flushes from (spec §3.1 `StreamId`, §4.1.1).

use crate::{endpoint::EndpointType, varint::VarInt};
use s2n_codec::{decoder_value, Encoder, EncoderValue};

/// The Stream Type defines whether data can be transmitted in both
/// directions or only in a single direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamType {
    Bidirectional,
    Unidirectional,
}

impl StreamType {
    pub fn is_bidirectional(self) -> bool {
        self == StreamType::Bidirectional
    }

    pub fn is_unidirectional(self) -> bool {
        self == StreamType::Unidirectional
    }
}

/// A stream ID is a 62-bit integer, unique for all streams on a connection.
/// REDESIGN: streams are stored in a slab keyed by this type rather than an
/// intrusive list node embedded in the stream struct; see
/// `quic-transport::stream::StreamSendList`.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
pub struct StreamId(VarInt);

impl From<StreamId> for VarInt {
    fn from(id: StreamId) -> Self {
        id.0
    }
}

impl From<StreamId> for u64 {
    fn from(id: StreamId) -> Self {
        id.0.as_u64()
    }
}

impl StreamId {
    pub const fn from_varint(id: VarInt) -> StreamId {
        StreamId(id)
    }

    pub const fn as_varint(self) -> VarInt {
        self.0
    }

    /// Table 1 of RFC 9000 §2.1: the two least-significant bits of a stream
    /// ID encode who opened it and whether it is bidirectional.
    pub fn initial(initiator: EndpointType, stream_type: StreamType) -> StreamId {
        let bits = match (stream_type == StreamType::Bidirectional, initiator == EndpointType::Client) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        };
        StreamId(VarInt::from_u32(bits))
    }

    /// Streams of a given type are spaced 4 apart; this returns the `n`th
    /// one after the type's initial ID, or `None` on overflow past 2^62-1.
    pub fn nth(initiator: EndpointType, stream_type: StreamType, n: u64) -> Option<StreamId> {
        let initial = Self::initial(initiator, stream_type);
        let id = VarInt::new(n.checked_mul(4)?.checked_add(initial.into())?).ok()?;
        Some(StreamId(id))
    }

    pub fn next_of_type(self) -> Option<StreamId> {
        self.0.checked_add(VarInt::from_u32(4)).map(StreamId::from_varint)
    }

    pub fn initiator(self) -> EndpointType {
        if self.0.as_u64() & 0x1 == 0 {
            EndpointType::Client
        } else {
            EndpointType::Server
        }
    }

    pub fn stream_type(self) -> StreamType {
        if self.0.as_u64() & 0x2 == 0 {
            StreamType::Bidirectional
        } else {
            StreamType::Unidirectional
        }
    }

    /// Whether `initiator` is allowed to accept locally-initiated sends on
    /// this stream (spec §4.1.4: unidirectional streams opened by the peer
    /// are receive-only from the local point of view).
    pub fn is_send_allowed(self, local: EndpointType) -> bool {
        self.stream_type().is_bidirectional() || self.initiator() == local
    }
}

decoder_value!(
    impl<'a> StreamId {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (id, buffer) = buffer.decode::<VarInt>()?;
            Ok((StreamId(id), buffer))
        }
    }
);

impl EncoderValue for StreamId {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.0);
    }

    fn encoding_size(&self) -> usize {
        self.0.encoding_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_ids_match_rfc9000_table_1() {
        assert_eq!(StreamId::initial(EndpointType::Client, StreamType::Bidirectional).as_varint().as_u64(), 0);
        assert_eq!(StreamId::initial(EndpointType::Server, StreamType::Bidirectional).as_varint().as_u64(), 1);
        assert_eq!(StreamId::initial(EndpointType::Client, StreamType::Unidirectional).as_varint().as_u64(), 2);
        assert_eq!(StreamId::initial(EndpointType::Server, StreamType::Unidirectional).as_varint().as_u64(), 3);
    }

    #[test]
    fn nth_spaces_ids_by_four() {
        let first = StreamId::nth(EndpointType::Client, StreamType::Unidirectional, 0).unwrap();
        let second = StreamId::nth(EndpointType::Client, StreamType::Unidirectional, 1).unwrap();
        assert_eq!(second.as_varint().as_u64() - first.as_varint().as_u64(), 4);
    }
}
