// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! The one concrete [`Datapath`] this workspace carries: plain
//! `tokio::net::UdpSocket` send/recv, no GSO/GRO/cmsg offload (spec's
//! Non-goals: no per-OS datapath backends beyond this reference
//! implementation).

use crate::datapath::{Binding, Datapath, Error, Features, ReceiveHandler, RecvDatagram, SendContext};
use quic_core::inet::ExplicitCongestionNotification;
use std::{io, net::SocketAddr, sync::Arc};
use tokio::net::UdpSocket;

/// The largest UDP payload a socket not using jumbograms can deliver.
const MAX_DATAGRAM_SIZE: usize = u16::MAX as usize;

fn map_io_error(err: &io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::AddrInUse => Error::AddressInUse,
        io::ErrorKind::ConnectionRefused => Error::Unreachable,
        io::ErrorKind::WouldBlock => Error::NoBuffers,
        _ => Error::Fatal,
    }
}

/// A single tokio-backed UDP socket, plus the background task draining its
/// receive side.
#[derive(Debug)]
pub struct TokioDatapath;

impl TokioDatapath {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TokioDatapath {
    fn default() -> Self {
        Self::new()
    }
}

impl Datapath for TokioDatapath {
    type Binding = TokioBinding;

    fn supported_features(&self) -> Features {
        // A plain send_to/recv_from socket offers none of the batching
        // fast paths; the send engine falls back to one datagram per call.
        Features::default()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(handler)))]
    async fn create_binding(
        &self,
        local: Option<SocketAddr>,
        remote: Option<SocketAddr>,
        mut handler: Box<dyn ReceiveHandler>,
    ) -> Result<Self::Binding, Error> {
        let bind_addr = local.unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));
        let socket = UdpSocket::bind(bind_addr).await.map_err(|err| map_io_error(&err))?;

        if let Some(remote) = remote {
            socket.connect(remote).await.map_err(|err| map_io_error(&err))?;
        }

        let local_address = socket.local_addr().map_err(|err| map_io_error(&err))?;
        let socket = Arc::new(socket);
        let recv_socket = socket.clone();

        let recv_task = tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            loop {
                match recv_socket.recv_from(&mut buf).await {
                    Ok((len, remote_address)) => {
                        let datagram = RecvDatagram {
                            payload: &buf[..len],
                            local_address,
                            remote_address,
                            // A plain socket carries no ECN codepoint without
                            // OS-specific cmsg plumbing, which is out of scope.
                            ecn: ExplicitCongestionNotification::NotEct,
                        };
                        let mut iter = core::iter::once(datagram);
                        handler.on_receive(&mut iter);
                    }
                    Err(err) if err.kind() == io::ErrorKind::ConnectionRefused => {
                        if let Ok(remote_address) = recv_socket.peer_addr() {
                            handler.on_unreachable(remote_address);
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(TokioBinding { socket, local_address, remote, recv_task })
    }

    async fn delete_binding(&self, binding: Self::Binding) {
        binding.recv_task.abort();
        let _ = binding.recv_task.await;
    }
}

#[derive(Debug)]
pub struct TokioBinding {
    socket: Arc<UdpSocket>,
    local_address: SocketAddr,
    remote: Option<SocketAddr>,
    recv_task: tokio::task::JoinHandle<()>,
}

impl Binding for TokioBinding {
    fn local_address(&self) -> SocketAddr {
        self.local_address
    }

    fn remote_address(&self) -> Option<SocketAddr> {
        self.remote
    }

    fn local_mtu(&self) -> u16 {
        // No path MTU discovery at the socket layer; the send engine owns
        // PMTUD (spec §6 `pmtu_min`/`pmtu_max`) and narrows from here.
        if self.local_address.is_ipv6() { 1232 } else { 1252 }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, ctx), fields(datagrams = ctx.datagrams().len())))]
    async fn send_to(&self, remote: SocketAddr, ctx: SendContext) -> Result<(), Error> {
        for datagram in ctx.datagrams() {
            self.socket.send_to(datagram, remote).await.map_err(|err| map_io_error(&err))?;
        }
        Ok(())
    }

    async fn send_from_to(&self, local: SocketAddr, remote: SocketAddr, ctx: SendContext) -> Result<(), Error> {
        // Overriding the source address per-datagram needs IP_PKTINFO/cmsg,
        // which this reference implementation doesn't carry; a wildcard
        // binding can still answer correctly as long as it was bound to the
        // address the client actually reached.
        if local != self.local_address {
            return Err(Error::Fatal);
        }
        self.send_to(remote, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapath::RecvDatagram as Datagram;
    use std::sync::{Arc as StdArc, Mutex};

    struct RecordingHandler {
        received: StdArc<Mutex<Vec<Vec<u8>>>>,
    }

    impl ReceiveHandler for RecordingHandler {
        fn on_receive(&mut self, datagrams: &mut dyn Iterator<Item = Datagram<'_>>) {
            let mut received = self.received.lock().unwrap();
            for datagram in datagrams {
                received.push(datagram.payload.to_vec());
            }
        }

        fn on_unreachable(&mut self, _remote_address: SocketAddr) {}
    }

    #[tokio::test]
    async fn sends_and_receives_a_datagram() {
        let datapath = TokioDatapath::new();
        let received = StdArc::new(Mutex::new(Vec::new()));

        let server = datapath
            .create_binding(None, None, Box::new(RecordingHandler { received: received.clone() }))
            .await
            .unwrap();
        let server_addr = server.local_address();

        let client = datapath.create_binding(None, Some(server_addr), Box::new(RecordingHandler { received: StdArc::new(Mutex::new(Vec::new())) })).await.unwrap();

        let mut ctx = client.alloc_send_context(ExplicitCongestionNotification::NotEct, 1200);
        let buf = ctx.alloc_datagram(5);
        buf.copy_from_slice(b"hello");
        client.send_to(server_addr, ctx).await.unwrap();

        for _ in 0..50 {
            if !received.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert_eq!(received.lock().unwrap().as_slice(), &[b"hello".to_vec()]);

        datapath.delete_binding(server).await;
        datapath.delete_binding(client).await;
    }

    #[tokio::test]
    async fn address_in_use_is_reported_distinctly() {
        let datapath = TokioDatapath::new();
        let first = datapath.create_binding(None, None, Box::new(RecordingHandler { received: StdArc::new(Mutex::new(Vec::new())) })).await.unwrap();
        let addr = first.local_address();

        let second = datapath.create_binding(Some(addr), None, Box::new(RecordingHandler { received: StdArc::new(Mutex::new(Vec::new())) })).await;
        assert_eq!(second.unwrap_err(), Error::AddressInUse);

        datapath.delete_binding(first).await;
    }
}
