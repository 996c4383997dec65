// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! The datapath binding contract (spec §4.3): zero-copy on receive, batched
//! on send.
//!
//! REDESIGN: the source models the receive path as `recv_cb` plus an
//! explicit `return_recv_datagrams` the callee must remember to call once
//! it's done with the chain. [`ReceiveHandler::on_receive`] instead borrows
//! its datagrams for the duration of the call — "owned until released"
//! becomes an ordinary borrow the compiler enforces, not a manually tracked
//! obligation.

use quic_core::inet::ExplicitCongestionNotification;
use std::net::SocketAddr;

/// Datapath capabilities the send engine consults to choose a batching
/// strategy (spec §4.3.1 `get_supported_features`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Features {
    pub recv_side_scaling: bool,
    pub recv_coalescing: bool,
    pub send_segmentation: bool,
}

/// One datagram delivered to a [`ReceiveHandler`].
#[derive(Debug)]
pub struct RecvDatagram<'a> {
    pub payload: &'a [u8],
    pub local_address: SocketAddr,
    pub remote_address: SocketAddr,
    pub ecn: ExplicitCongestionNotification,
}

/// Errors the datapath can report across the send/bind boundary (spec
/// §4.3.3). `NoBuffers` and `Unreachable` are retryable; `AddressInUse` is
/// surfaced distinctly from binding setup (the send engine's port-probe loop
/// depends on telling it apart from a generic bind failure); `Fatal` closes
/// the binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    NoBuffers,
    Unreachable,
    AddressInUse,
    Fatal,
}

impl From<Error> for quic_core::transport::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::NoBuffers => quic_core::transport::Error::NoBuffers,
            Error::Unreachable => quic_core::transport::Error::Unreachable,
            Error::AddressInUse => quic_core::transport::Error::AddressInUse,
            Error::Fatal => quic_core::transport::Error::InternalError("datapath failure"),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let reason = match self {
            Error::NoBuffers => "no send buffers available",
            Error::Unreachable => "destination unreachable",
            Error::AddressInUse => "address already in use",
            Error::Fatal => "fatal datapath failure",
        };
        write!(f, "{reason}")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Invoked by the datapath's receive worker with one batch of datagrams
/// (spec §4.3.1 `recv_cb`). Must not block: implementations typically hand
/// each datagram off to the owning connection's worker queue (spec §5's
/// single-threaded-per-connection scheduling model) and return.
pub trait ReceiveHandler: Send {
    fn on_receive(&mut self, datagrams: &mut dyn Iterator<Item = RecvDatagram<'_>>);

    /// The peer's send failed with an ICMP port-unreachable (or equivalent)
    /// signal on this binding.
    fn on_unreachable(&mut self, remote_address: SocketAddr);
}

/// Accumulates datagrams for one batched send call (spec §4.3.1
/// `binding_alloc_send_context` / `send_context_alloc_datagram`).
///
/// REDESIGN: the source allocates opaque fixed-capacity buffers from a
/// datapath-owned pool and returns handles into it. This reference
/// implementation has no pool to share across bindings, so a `SendContext`
/// just owns its `Vec<Vec<u8>>` directly; the batching *contract* (accumulate
/// datagrams, then hand the whole context to one send call) is unchanged.
#[derive(Debug)]
pub struct SendContext {
    ecn: ExplicitCongestionNotification,
    max_packet_size: u16,
    datagrams: Vec<Vec<u8>>,
}

impl SendContext {
    pub fn new(ecn: ExplicitCongestionNotification, max_packet_size: u16) -> Self {
        Self { ecn, max_packet_size, datagrams: Vec::new() }
    }

    /// Returns contiguous writable space for one more datagram, up to
    /// `max_len` bytes (itself capped by the context's `max_packet_size`).
    /// The caller writes its packet, then `truncate`s the returned `Vec` to
    /// the packet's real length.
    pub fn alloc_datagram(&mut self, max_len: usize) -> &mut Vec<u8> {
        let len = max_len.min(self.max_packet_size as usize);
        self.datagrams.push(vec![0u8; len]);
        self.datagrams.last_mut().expect("just pushed")
    }

    pub fn ecn(&self) -> ExplicitCongestionNotification {
        self.ecn
    }

    pub fn datagrams(&self) -> &[Vec<u8>] {
        &self.datagrams
    }

    pub fn is_empty(&self) -> bool {
        self.datagrams.is_empty()
    }

    /// Drops the most recently allocated datagram, for a caller that called
    /// `alloc_datagram` but then decided nothing fit (e.g. closing the
    /// packet failed and there's nothing worth sending empty).
    pub fn discard_last(&mut self) {
        self.datagrams.pop();
    }
}

/// One bound UDP socket, optionally "connected" to a single remote for
/// address filtering and as the default send destination (spec §4.3.1
/// `binding_create`).
pub trait Binding: Send + Sync {
    fn local_address(&self) -> SocketAddr;
    fn remote_address(&self) -> Option<SocketAddr>;
    fn local_mtu(&self) -> u16;

    fn alloc_send_context(&self, ecn: ExplicitCongestionNotification, max_packet_size: u16) -> SendContext {
        SendContext::new(ecn, max_packet_size)
    }

    /// Consumes `ctx`, sending every accumulated datagram to `remote`.
    async fn send_to(&self, remote: SocketAddr, ctx: SendContext) -> Result<(), Error>;

    /// As `send_to`, but overriding the binding's own source address for
    /// this batch (used by a wildcard-bound listener to answer from the
    /// address a client actually reached).
    async fn send_from_to(&self, local: SocketAddr, remote: SocketAddr, ctx: SendContext) -> Result<(), Error>;
}

/// The datapath binding contract itself (spec §4.3.1 `initialize` /
/// `binding_create` / `binding_delete`).
pub trait Datapath: Send + Sync {
    type Binding: Binding;

    fn supported_features(&self) -> Features;

    /// If `local` is given, binds to it; otherwise an ephemeral port. If
    /// `remote` is given, "connects" for address filtering and as the
    /// default send destination.
    async fn create_binding(
        &self,
        local: Option<SocketAddr>,
        remote: Option<SocketAddr>,
        handler: Box<dyn ReceiveHandler>,
    ) -> Result<Self::Binding, Error>;

    /// Blocks until no receive callback for `binding` is in flight. Must
    /// never be called from inside a receive callback.
    async fn delete_binding(&self, binding: Self::Binding);
}
