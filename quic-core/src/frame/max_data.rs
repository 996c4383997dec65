// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §19.9: MAX_DATA (type=0x10). Raises the connection-level flow
//! control limit (spec §4.1.4).

use crate::{frame::simple_frame_codec, varint::VarInt};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MaxData {
    pub maximum_data: VarInt,
}

impl MaxData {
    pub const fn tag(self) -> u8 {
        0x10
    }
}

simple_frame_codec!(MaxData { maximum_data }, 0x10u8);
