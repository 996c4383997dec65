// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §19.4: RESET_STREAM (type=0x04). Abruptly terminates the
//! sending part of a stream.

use crate::{frame::simple_frame_codec, stream_id::StreamId, varint::VarInt};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResetStream {
    pub stream_id: StreamId,
    pub application_error_code: VarInt,
    pub final_size: VarInt,
}

impl ResetStream {
    pub const fn tag(self) -> u8 {
        0x04
    }
}

simple_frame_codec!(ResetStream { stream_id, application_error_code, final_size }, 0x04u8);
