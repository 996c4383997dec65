// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! The datapath binding (spec §4.3): a UDP I/O surface the send engine
//! drives without knowing the concrete transport. [`datapath`] is the
//! contract; [`tokio_datapath`] is the one reference implementation this
//! workspace carries (spec's Non-goals: no per-OS datapath backends beyond
//! it).

pub mod datapath;

#[cfg(feature = "tokio-runtime")]
pub mod tokio_datapath;

pub use datapath::{Binding, Datapath, Error, Features, ReceiveHandler, RecvDatagram, SendContext};
