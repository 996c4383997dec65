// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §19.12: DATA_BLOCKED (type=0x14). Sent when the connection-level
//! flow control limit prevented a sender from sending data it otherwise had
//! (spec §4.1.4).

use crate::{frame::simple_frame_codec, varint::VarInt};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DataBlocked {
    pub data_limit: VarInt,
}

impl DataBlocked {
    pub const fn tag(self) -> u8 {
        0x14
    }
}

simple_frame_codec!(DataBlocked { data_limit }, 0x14u8);
