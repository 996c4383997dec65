// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! The per-connection transport state machine: the send engine's flush
//! algorithm (spec §4.1), wire-format packet assembly and parsing, flow
//! control, stream state, and path management, tied together by
//! [`connection::Connection`].

mod ack_ranges;
mod flow_control;
mod packet_builder;
mod packet_parser;
mod path;
mod send_flags;
mod sent_packets;
mod stream;

pub mod connection;
pub mod send_engine;

pub use connection::Connection;
pub use flow_control::{ReceiveWindow, SendWindow};
pub use path::{Path, PathMtuDiscovery, PathValidator, MIN_PLAINTEXT_MTU};
pub use send_engine::{FlushReason, SendEngine, Settings};
pub use send_flags::{ConnectionSendFlags, StreamSendFlags};
pub use sent_packets::{SentPacketInfo, SentPacketLog};
pub use stream::{Stream, StreamSet};
