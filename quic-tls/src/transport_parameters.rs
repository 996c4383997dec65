// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! QUIC transport parameters as a TLS extension (spec §4.4.4).
//!
//! REDESIGN: the source frames the caller's TP buffer with a small header
//! (extension type, handshake-message type, flags, length) before handing
//! it to the TLS library, because the backend it targets has no built-in
//! notion of this extension. rustls does: the QUIC transport parameters
//! extension (RFC 9001 §8.2, codepoint 0x39) is a first-class constructor
//! argument (`rustls::quic::{Client,Server}Connection::new`) and a
//! first-class getter (`QuicExt::quic_transport_parameters`). The bridge
//! passes the caller's buffer straight through in both directions; no
//! hand-rolled framing is needed.

use crate::config::TransportParametersCallback;
use crate::Error;

/// Ensures the receive-TP callback fires exactly once per connection (spec
/// §4.4.1: "invokes the receive-TP callback exactly once").
pub struct TransportParametersGate {
    delivered: bool,
}

impl TransportParametersGate {
    pub fn new() -> Self {
        Self { delivered: false }
    }

    /// Call once the peer's transport parameters extension is observed
    /// (rustls surfaces it as soon as the ClientHello/EncryptedExtensions
    /// that carries it has been processed). A no-op on every call after the
    /// first.
    pub fn deliver(
        &mut self,
        connection_handle: u64,
        peer_params: &[u8],
        callback: &mut dyn TransportParametersCallback,
    ) -> Result<(), Error> {
        if self.delivered {
            return Ok(());
        }
        self.delivered = true;
        callback
            .on_receive_transport_parameters(connection_handle, peer_params)
            .map_err(|_| Error::MissingTransportParameters)
    }
}

impl Default for TransportParametersGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingCallback(u32);
    impl TransportParametersCallback for CountingCallback {
        fn on_receive_transport_parameters(&mut self, _connection_handle: u64, _peer_params: &[u8]) -> Result<(), Error> {
            self.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn delivers_exactly_once() {
        let mut gate = TransportParametersGate::new();
        let mut callback = CountingCallback(0);
        gate.deliver(0, b"tp", &mut callback).unwrap();
        gate.deliver(0, b"tp", &mut callback).unwrap();
        assert_eq!(callback.0, 1);
    }
}
