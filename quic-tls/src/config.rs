// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! `tls_initialize`'s `config` argument (spec §4.4.1).

use crate::Error;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::RootCertStore;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Invoked exactly once, the first time the peer's QUIC transport
/// parameters extension is parsed out of the handshake (spec §4.4.4).
/// Returning `Err` is fatal and maps to alert 0x2F.
pub trait TransportParametersCallback: Send {
    fn on_receive_transport_parameters(&mut self, connection_handle: u64, peer_params: &[u8]) -> Result<(), Error>;
}

/// Invoked once per new session ticket the server hands out post-handshake
/// (spec §4.4.6).
pub trait TicketCallback: Send {
    fn on_new_ticket(&mut self, connection_handle: u64, ticket: &[u8]);
}

/// Certificate material or verifier for one side of the handshake.
pub enum SecurityConfig {
    Server {
        cert_chain: Vec<CertificateDer<'static>>,
        private_key: PrivateKeyDer<'static>,
    },
    /// A client trusting a fixed root store.
    ClientRoots(RootCertStore),
    /// A client with a caller-supplied verifier (e.g. for self-signed test
    /// certificates, or pinning). Bypasses the usual chain validation.
    ClientVerifier(Arc<dyn rustls::client::danger::ServerCertVerifier>),
}

impl SecurityConfig {
    /// Reads a PEM certificate chain and private key off disk, for the
    /// common case of a server configured from files rather than
    /// already-parsed DER (spec's config layer leans on `rustls-pemfile`
    /// for this rather than hand-rolling a PEM parser).
    pub fn server_from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, Error> {
        let cert_chain = rustls_pemfile::certs(&mut BufReader::new(
            std::fs::File::open(cert_path).map_err(|_| Error::Internal("failed to open certificate file"))?,
        ))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| Error::Internal("malformed PEM certificate chain"))?;

        let private_key = rustls_pemfile::private_key(&mut BufReader::new(
            std::fs::File::open(key_path).map_err(|_| Error::Internal("failed to open private key file"))?,
        ))
        .map_err(|_| Error::Internal("malformed PEM private key"))?
        .ok_or(Error::Internal("no private key found in file"))?;

        Ok(SecurityConfig::Server { cert_chain, private_key })
    }
}

/// `tls_initialize`'s configuration (spec §4.4.1): everything the bridge
/// needs before the first `tls_process_data` call.
pub struct Config {
    pub is_server: bool,
    pub security: SecurityConfig,
    /// The local transport parameters, already encoded, to carry as the
    /// custom TLS extension (spec §4.4.4).
    pub local_transport_parameters: Vec<u8>,
    /// ALPN protocols, most preferred first (spec §4.4.5).
    pub alpn_protocols: Vec<Vec<u8>>,
    /// The name the client validates the server's certificate against, and
    /// the name a client-side bridge looks up tickets by (spec §4.4.6).
    /// Ignored on the server.
    pub server_name: Option<ServerName<'static>>,
    pub on_receive_transport_parameters: Box<dyn TransportParametersCallback>,
    pub on_new_ticket: Box<dyn TicketCallback>,
    /// An opaque token the bridge does not interpret, handed back unchanged
    /// through every callback so the caller can dispatch to the right
    /// connection.
    pub connection_handle: u64,
}
