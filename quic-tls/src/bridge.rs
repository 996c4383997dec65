// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! `Tls`: the handle spec §4.4.1's `tls_initialize` returns, and the
//! `tls_process_data` / `tls_process_data_complete` / `tls_reset` operations
//! that drive it.

use crate::config::{Config, SecurityConfig};
use crate::result_flags::ResultFlags;
use crate::secret_log::{Direction, SecretLog};
use crate::transport_parameters::TransportParametersGate;
use crate::Error;
use quic_core::crypto::{CipherSuite, EncryptionLevel, HashAlgorithm};
use rustls::quic::{self, Version as QuicVersion};
use rustls::{ClientConfig, ServerConfig};
use std::sync::Arc;

fn level_index(level: EncryptionLevel) -> usize {
    match level {
        EncryptionLevel::Initial => 0,
        EncryptionLevel::Handshake => 1,
        EncryptionLevel::ZeroRtt => 2,
        EncryptionLevel::OneRtt => 3,
    }
}

/// A traffic secret exported out of rustls's key log (spec §4.4.3),
/// shaped to feed directly into [`quic_core::crypto::PacketKey::from_traffic_secret`].
#[derive(Clone)]
pub struct ExportedSecret {
    pub hash_alg: HashAlgorithm,
    pub cipher_suite: CipherSuite,
    pub secret: Vec<u8>,
}

/// Which epoch-tagged byte stream a `tls_process_data` call is feeding or
/// draining (spec §4.4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    CryptoData,
    TicketData,
}

/// The `state_inout` argument threaded through every bridge call.
#[derive(Default)]
pub struct ConnectionState {
    /// Handshake bytes produced by the last call, to be segmented by the
    /// connection's crypto-stream machinery at `buffer_offset_handshake`
    /// and `buffer_offset_1rtt` (spec §4.4.2).
    pub buffer: Vec<u8>,
    pub buffer_offset_handshake: usize,
    pub buffer_offset_1rtt: usize,
    pub read_keys: [Option<ExportedSecret>; 4],
    pub write_keys: [Option<ExportedSecret>; 4],
    /// Set alongside `ResultFlags::ERROR` (spec §4.4.7).
    pub alert_code: Option<u8>,
}

impl ConnectionState {
    fn record_secret(level: EncryptionLevel, direction: Direction, secret: ExportedSecret, state: &mut Self) {
        let slot = match direction {
            Direction::Read => &mut state.read_keys,
            Direction::Write => &mut state.write_keys,
        };
        slot[level_index(level)] = Some(secret);
    }
}

enum Role {
    Client(quic::ClientConnection),
    Server(quic::ServerConnection),
}

/// The bridge handle (spec §4.4.1 `Tls`).
pub struct Tls {
    role: Role,
    secret_log: Arc<SecretLog>,
    tp_gate: TransportParametersGate,
    on_receive_transport_parameters: Box<dyn crate::config::TransportParametersCallback>,
    on_new_ticket: Box<dyn crate::config::TicketCallback>,
    connection_handle: u64,
    is_server: bool,
    handshake_was_complete: bool,
}

impl Tls {
    /// `tls_initialize` (spec §4.4.1).
    pub fn initialize(config: Config, state: &mut ConnectionState) -> Result<Self, Error> {
        let secret_log = SecretLog::new(config.is_server);

        let role = if config.is_server {
            let server_config = build_server_config(&config, secret_log.clone())?;
            let conn = quic::ServerConnection::new(Arc::new(server_config), QuicVersion::V1, config.local_transport_parameters.clone())
                .map_err(Error::from)?;
            Role::Server(conn)
        } else {
            let client_config = build_client_config(&config, secret_log.clone())?;
            let server_name = config
                .server_name
                .clone()
                .ok_or(Error::Internal("client configuration is missing a server name"))?;
            let conn = quic::ClientConnection::new(
                Arc::new(client_config),
                QuicVersion::V1,
                server_name,
                config.local_transport_parameters.clone(),
            )
            .map_err(Error::from)?;
            Role::Client(conn)
        };

        let mut tls = Self {
            role,
            secret_log,
            tp_gate: TransportParametersGate::new(),
            on_receive_transport_parameters: config.on_receive_transport_parameters,
            on_new_ticket: config.on_new_ticket,
            connection_handle: config.connection_handle,
            is_server: config.is_server,
            handshake_was_complete: false,
        };

        // Both roles have a self-driven first flight (ClientHello, or a
        // server's ServerHello once it has seen one): pump once with no
        // input so the caller finds it already waiting in `state.buffer`.
        tls.step(&[], state)?;

        Ok(tls)
    }

    /// `tls_process_data` (spec §4.4.1).
    pub fn process_data(&mut self, kind: BufferKind, buffer: &[u8], state: &mut ConnectionState) -> Result<ResultFlags, Error> {
        match kind {
            BufferKind::CryptoData => self.step(buffer, state),
            BufferKind::TicketData => {
                // Ticket material the bridge itself produced is looped back
                // here only so the caller can persist-then-replay it across
                // a restart; the bridge has nothing further to do with it.
                Ok(ResultFlags::empty())
            }
        }
    }

    /// `tls_process_data_complete` (spec §4.4.1). This bridge never returns
    /// `PENDING` from `step` (rustls's handshake processing is entirely
    /// synchronous), so there is never an in-flight async step to finalize;
    /// kept for API completeness against callers written for a backend that
    /// does suspend here (e.g. on an async certificate verifier).
    pub fn process_data_complete(&mut self, consumed: &mut usize) -> Result<ResultFlags, Error> {
        *consumed = 0;
        Ok(ResultFlags::empty())
    }

    /// `tls_reset` (spec §4.4.1): client-only.
    pub fn reset(self, config: Config, state: &mut ConnectionState) -> Result<Self, Error> {
        if self.is_server {
            return Err(Error::Internal("tls_reset is client-only"));
        }
        *state = ConnectionState::default();
        Self::initialize(config, state)
    }

    fn step(&mut self, input: &[u8], state: &mut ConnectionState) -> Result<ResultFlags, Error> {
        let mut flags = ResultFlags::empty();

        if !input.is_empty() {
            let key_change = match &mut self.role {
                Role::Client(conn) => conn.read_hs(input).map_err(Error::from)?,
                Role::Server(conn) => conn.read_hs(input).map_err(Error::from)?,
            };
            self.apply_key_change(key_change, state, &mut flags);
        }

        let alert = match &self.role {
            Role::Client(conn) => conn.alert(),
            Role::Server(conn) => conn.alert(),
        };
        if let Some(alert) = alert {
            state.alert_code = Some(alert.into());
            flags.insert(ResultFlags::ERROR);
            return Ok(flags);
        }

        state.buffer.clear();
        state.buffer_offset_handshake = 0;
        state.buffer_offset_1rtt = 0;

        loop {
            let before = state.buffer.len();
            let key_change = match &mut self.role {
                Role::Client(conn) => conn.write_hs(&mut state.buffer),
                Role::Server(conn) => conn.write_hs(&mut state.buffer),
            };
            if state.buffer.len() > before {
                flags.insert(ResultFlags::DATA);
            }
            let produced_keys = key_change.is_some();
            self.apply_key_change(key_change, state, &mut flags);
            if !produced_keys {
                break;
            }
        }

        for secret in self.secret_log.drain() {
            ConnectionState::record_secret(
                secret.level,
                secret.direction,
                ExportedSecret {
                    hash_alg: self.negotiated_hash_algorithm(),
                    cipher_suite: self.negotiated_cipher_suite(),
                    secret: secret.secret,
                },
                state,
            );
            match secret.direction {
                Direction::Read => flags.insert(ResultFlags::READ_KEY_UPDATED),
                Direction::Write => flags.insert(ResultFlags::WRITE_KEY_UPDATED),
            }
        }

        if let Some(peer_params) = self.peer_transport_parameters() {
            self.tp_gate.deliver(self.connection_handle, peer_params, self.on_receive_transport_parameters.as_mut())?;
        }

        let is_handshaking = match &self.role {
            Role::Client(conn) => conn.is_handshaking(),
            Role::Server(conn) => conn.is_handshaking(),
        };

        if !is_handshaking {
            if !self.handshake_was_complete {
                self.handshake_was_complete = true;
                flags.insert(ResultFlags::COMPLETE);

                let early_data_accepted = match &self.role {
                    Role::Client(conn) => conn.is_early_data_accepted(),
                    Role::Server(conn) => conn.is_early_data_accepted(),
                };
                if self.offered_early_data() {
                    flags.insert(if early_data_accepted { ResultFlags::EARLY_DATA_ACCEPT } else { ResultFlags::EARLY_DATA_REJECT });
                }
            } else if flags.contains(ResultFlags::DATA) {
                // Any further handshake-stream output after completion is a
                // post-handshake message; on QUIC the only one either side
                // sends is NewSessionTicket, so surface it as one (spec
                // §4.4.6). The opaque payload is the raw bytes just
                // produced/consumed, the same ones the caller already has
                // in `state.buffer`.
                flags.insert(ResultFlags::TICKET);
                self.on_new_ticket.on_new_ticket(self.connection_handle, &state.buffer);
            }
        }

        Ok(flags)
    }

    /// Bytes already in `state.buffer` when a key change is reported belong
    /// to the epoch that was active before it; everything written from here
    /// on belongs to the new one. Recording the boundary here is what lets
    /// the caller hand each epoch's slice to the right CRYPTO stream (spec
    /// §4.4.2) instead of treating a whole step's output as one epoch.
    fn apply_key_change(&mut self, key_change: Option<quic::KeyChange>, state: &mut ConnectionState, flags: &mut ResultFlags) {
        match key_change {
            Some(quic::KeyChange::Handshake { .. }) => {
                state.buffer_offset_handshake = state.buffer.len();
                flags.insert(ResultFlags::READ_KEY_UPDATED | ResultFlags::WRITE_KEY_UPDATED);
            }
            Some(quic::KeyChange::OneRtt { .. }) => {
                state.buffer_offset_1rtt = state.buffer.len();
                flags.insert(ResultFlags::READ_KEY_UPDATED | ResultFlags::WRITE_KEY_UPDATED);
            }
            None => {}
        }
    }

    fn peer_transport_parameters(&self) -> Option<&[u8]> {
        match &self.role {
            Role::Client(conn) => conn.quic_transport_parameters(),
            Role::Server(conn) => conn.quic_transport_parameters(),
        }
    }

    fn negotiated_cipher_suite(&self) -> CipherSuite {
        let suite = match &self.role {
            Role::Client(conn) => conn.negotiated_cipher_suite(),
            Role::Server(conn) => conn.negotiated_cipher_suite(),
        };
        match suite.map(|s| s.suite()) {
            Some(rustls::CipherSuite::TLS13_AES_256_GCM_SHA384) => CipherSuite::Aes256Gcm,
            Some(rustls::CipherSuite::TLS13_CHACHA20_POLY1305_SHA256) => CipherSuite::Chacha20Poly1305,
            _ => CipherSuite::Aes128Gcm,
        }
    }

    fn negotiated_hash_algorithm(&self) -> HashAlgorithm {
        let suite = match &self.role {
            Role::Client(conn) => conn.negotiated_cipher_suite(),
            Role::Server(conn) => conn.negotiated_cipher_suite(),
        };
        match suite.map(|s| s.suite()) {
            Some(rustls::CipherSuite::TLS13_AES_256_GCM_SHA384) => HashAlgorithm::Sha384,
            _ => HashAlgorithm::Sha256,
        }
    }

    fn offered_early_data(&self) -> bool {
        !self.is_server
    }
}

fn build_client_config(config: &Config, secret_log: Arc<SecretLog>) -> Result<ClientConfig, Error> {
    let builder = ClientConfig::builder();
    let mut client_config = match &config.security {
        SecurityConfig::ClientRoots(roots) => builder.with_root_certificates(roots.clone()).with_no_client_auth(),
        SecurityConfig::ClientVerifier(verifier) => builder
            .dangerous()
            .with_custom_certificate_verifier(verifier.clone())
            .with_no_client_auth(),
        SecurityConfig::Server { .. } => {
            return Err(Error::Internal("server security config supplied for a client bridge"));
        }
    };

    client_config.alpn_protocols = config.alpn_protocols.clone();
    client_config.enable_early_data = true;
    client_config.key_log = secret_log;
    Ok(client_config)
}

fn build_server_config(config: &Config, secret_log: Arc<SecretLog>) -> Result<ServerConfig, Error> {
    let SecurityConfig::Server { cert_chain, private_key } = &config.security else {
        return Err(Error::Internal("client security config supplied for a server bridge"));
    };

    let mut server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain.clone(), private_key.clone_key())
        .map_err(Error::from)?;

    server_config.alpn_protocols = config.alpn_protocols.clone();
    server_config.max_early_data_size = u32::MAX;
    server_config.key_log = secret_log;
    Ok(server_config)
}
