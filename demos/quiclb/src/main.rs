// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! Load-balances UDP traffic from one public listener to a pool of private
//! back ends, NAT'ing a fresh connected socket per client the first time it
//! is seen and routing return traffic back through it.
//!
//! This is ambient tooling around [`quic_platform::datapath`], not part of
//! the send-engine/key/datapath/TLS core — it is the only crate in the
//! workspace that gets an opinion about process argv and stdout.

use clap::Parser;
use quic_core::inet::ExplicitCongestionNotification;
use quic_platform::datapath::{Binding, Datapath, Error, ReceiveHandler, RecvDatagram};
use quic_platform::tokio_datapath::{TokioBinding, TokioDatapath};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Parser, Debug)]
#[command(about = "Load-balances QUIC (or any UDP) traffic across a back-end pool")]
struct Args {
    /// Address this load balancer listens on for public client traffic.
    #[arg(long = "public", value_name = "ADDRESS")]
    public: SocketAddr,

    /// Comma-separated pool of private back-end addresses to distribute to.
    #[arg(long = "private", value_name = "ADDRESS,ADDRESS,...", value_delimiter = ',')]
    private: Vec<SocketAddr>,

    /// Log each new client-to-back-end mapping as it's created.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

/// One hop of traffic the load balancer's actor loop needs to forward.
/// Both the public and private `ReceiveHandler`s just translate a received
/// datagram into one of these and hand it off — neither can do the async
/// binding lookup/creation this demands from inside the handler callback.
enum LbEvent {
    FromClient { client: SocketAddr, payload: Vec<u8> },
    FromBackend { client: SocketAddr, payload: Vec<u8> },
}

struct PublicHandler {
    tx: UnboundedSender<LbEvent>,
}

impl ReceiveHandler for PublicHandler {
    fn on_receive(&mut self, datagrams: &mut dyn Iterator<Item = RecvDatagram<'_>>) {
        for datagram in datagrams {
            let _ = self.tx.send(LbEvent::FromClient { client: datagram.remote_address, payload: datagram.payload.to_vec() });
        }
    }

    fn on_unreachable(&mut self, _remote_address: SocketAddr) {}
}

struct PrivateHandler {
    tx: UnboundedSender<LbEvent>,
    client: SocketAddr,
}

impl ReceiveHandler for PrivateHandler {
    fn on_receive(&mut self, datagrams: &mut dyn Iterator<Item = RecvDatagram<'_>>) {
        for datagram in datagrams {
            let _ = self.tx.send(LbEvent::FromBackend { client: self.client, payload: datagram.payload.to_vec() });
        }
    }

    fn on_unreachable(&mut self, _remote_address: SocketAddr) {}
}

/// Owns the public socket and the NAT table from client address to its
/// assigned private (back-end-connected) socket; single-threaded, matching
/// the workspace's per-actor concurrency model rather than locking a shared
/// map across tasks.
struct LoadBalancer {
    datapath: Arc<TokioDatapath>,
    public: Arc<TokioBinding>,
    backends: Vec<SocketAddr>,
    next_backend: usize,
    clients: HashMap<SocketAddr, Arc<TokioBinding>>,
    tx: UnboundedSender<LbEvent>,
    verbose: bool,
}

impl LoadBalancer {
    async fn run(mut self, mut rx: UnboundedReceiver<LbEvent>) {
        while let Some(event) = rx.recv().await {
            if let Err(err) = self.handle(event).await {
                tracing::warn!(?err, "dropped a datagram");
            }
        }
    }

    async fn handle(&mut self, event: LbEvent) -> Result<(), Error> {
        match event {
            LbEvent::FromClient { client, payload } => {
                let private = match self.clients.get(&client) {
                    Some(private) => private.clone(),
                    None => self.create_private_binding(client).await?,
                };
                let backend = private.remote_address().expect("private bindings are always backend-connected");
                send_payload(&private, backend, &payload).await
            }
            LbEvent::FromBackend { client, payload } => {
                let local = self.public.local_address();
                send_from_to(&self.public, local, client, &payload).await
            }
        }
    }

    async fn create_private_binding(&mut self, client: SocketAddr) -> Result<Arc<TokioBinding>, Error> {
        let backend = self.backends[self.next_backend % self.backends.len()];
        self.next_backend += 1;

        let handler = Box::new(PrivateHandler { tx: self.tx.clone(), client });
        let binding = Arc::new(self.datapath.create_binding(None, Some(backend), handler).await?);
        if self.verbose {
            tracing::info!(%client, %backend, "new private interface");
        }
        self.clients.insert(client, binding.clone());
        Ok(binding)
    }
}

async fn send_payload(binding: &TokioBinding, remote: SocketAddr, payload: &[u8]) -> Result<(), Error> {
    let mut ctx = binding.alloc_send_context(ExplicitCongestionNotification::NotEct, payload.len().min(u16::MAX as usize) as u16);
    ctx.alloc_datagram(payload.len()).copy_from_slice(payload);
    binding.send_to(remote, ctx).await
}

async fn send_from_to(binding: &TokioBinding, local: SocketAddr, remote: SocketAddr, payload: &[u8]) -> Result<(), Error> {
    let mut ctx = binding.alloc_send_context(ExplicitCongestionNotification::NotEct, payload.len().min(u16::MAX as usize) as u16);
    ctx.alloc_datagram(payload.len()).copy_from_slice(payload);
    binding.send_from_to(local, remote, ctx).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    if args.private.is_empty() {
        eprintln!("quiclb: at least one --private address is required");
        std::process::exit(1);
    }

    let datapath = Arc::new(TokioDatapath::new());
    let (tx, rx) = mpsc::unbounded_channel();

    let public_handler = Box::new(PublicHandler { tx: tx.clone() });
    let public = Arc::new(datapath.create_binding(Some(args.public), None, public_handler).await?);
    println!("quiclb listening on {} -> {:?}", public.local_address(), args.private);

    let lb = LoadBalancer {
        datapath: datapath.clone(),
        public: public.clone(),
        backends: args.private,
        next_backend: 0,
        clients: HashMap::new(),
        tx,
        verbose: args.verbose,
    };

    let lb_task = tokio::spawn(lb.run(rx));
    tokio::signal::ctrl_c().await?;
    lb_task.abort();
    Ok(())
}
