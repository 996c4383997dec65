// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! RFC 9000 §19.16: RETIRE_CONNECTION_ID (type=0x19). Asks the peer to stop
//! routing with the connection ID at `sequence_number` (spec §4.2.5 path
//! manager bookkeeping).

use crate::{frame::simple_frame_codec, varint::VarInt};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RetireConnectionId {
    pub sequence_number: VarInt,
}

impl RetireConnectionId {
    pub const fn tag(self) -> u8 {
        0x19
    }
}

simple_frame_codec!(RetireConnectionId { sequence_number }, 0x19u8);
