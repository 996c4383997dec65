// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §19.10: MAX_STREAM_DATA (type=0x11). Raises the per-stream flow
//! control limit for `stream_id`.

use crate::{frame::simple_frame_codec, stream_id::StreamId, varint::VarInt};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MaxStreamData {
    pub stream_id: StreamId,
    pub maximum_stream_data: VarInt,
}

impl MaxStreamData {
    pub const fn tag(self) -> u8 {
        0x11
    }
}

simple_frame_codec!(MaxStreamData { stream_id, maximum_stream_data }, 0x11u8);
