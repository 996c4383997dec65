// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §19.5: STOP_SENDING (type=0x05). Requests that a peer cease
//! transmission on a stream whose incoming data is being discarded.

use crate::{frame::simple_frame_codec, stream_id::StreamId, varint::VarInt};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StopSending {
    pub stream_id: StreamId,
    pub application_error_code: VarInt,
}

impl StopSending {
    pub const fn tag(self) -> u8 {
        0x05
    }
}

simple_frame_codec!(StopSending { stream_id, application_error_code }, 0x05u8);
