// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §19.13: STREAM_DATA_BLOCKED (type=0x15). Sent when a per-stream
//! flow control limit prevented a sender from sending data it otherwise had.

use crate::{frame::simple_frame_codec, stream_id::StreamId, varint::VarInt};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StreamDataBlocked {
    pub stream_id: StreamId,
    pub stream_data_limit: VarInt,
}

impl StreamDataBlocked {
    pub const fn tag(self) -> u8 {
        0x15
    }
}

simple_frame_codec!(StreamDataBlocked { stream_id, stream_data_limit }, 0x15u8);
