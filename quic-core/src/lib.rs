// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc as core_alloc;

pub mod connection_id;
pub mod crypto;
pub mod endpoint;
pub mod frame;
pub mod inet;
pub mod number;
pub mod packet;
pub mod random;
pub mod recovery;
pub mod stream_id;
pub mod time;
pub mod transport;
pub mod varint;

pub use varint::VarInt;
