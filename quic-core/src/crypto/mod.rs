// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! The packet key hierarchy (spec §4.2): key derivation, the header
//! protection mask, key update, and the independent Retry integrity key.

pub mod aead;
pub mod error;
pub mod label;
pub mod packet_key;
pub mod retry;

pub use aead::{CipherSuite, HashAlgorithm};
pub use error::Error;
pub use packet_key::{HeaderProtectionKey, KeyPhase, PacketKey, TrafficSecret, INITIAL_SALT};

use crate::core_alloc::sync::Arc;

/// The four key spaces a connection accumulates keys for over its lifetime
/// (spec §3.1 `EncryptionLevel`). `OneRtt` is the only level that is ever
/// replaced in place via `update()` rather than being derived once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EncryptionLevel {
    Initial,
    Handshake,
    ZeroRtt,
    OneRtt,
}

/// One direction's (read or write) full set of keys for a single
/// encryption level.
#[derive(Clone)]
pub struct DirectionalKeys {
    initial: Option<Arc<PacketKey>>,
    handshake: Option<Arc<PacketKey>>,
    zero_rtt: Option<Arc<PacketKey>>,
    one_rtt: Option<Arc<PacketKey>>,
}

impl Default for DirectionalKeys {
    fn default() -> Self {
        Self { initial: None, handshake: None, zero_rtt: None, one_rtt: None }
    }
}

impl DirectionalKeys {
    pub fn get(&self, level: EncryptionLevel) -> Option<&Arc<PacketKey>> {
        match level {
            EncryptionLevel::Initial => self.initial.as_ref(),
            EncryptionLevel::Handshake => self.handshake.as_ref(),
            EncryptionLevel::ZeroRtt => self.zero_rtt.as_ref(),
            EncryptionLevel::OneRtt => self.one_rtt.as_ref(),
        }
    }

    pub fn install(&mut self, level: EncryptionLevel, key: PacketKey) {
        let key = Arc::new(key);
        match level {
            EncryptionLevel::Initial => self.initial = Some(key),
            EncryptionLevel::Handshake => self.handshake = Some(key),
            EncryptionLevel::ZeroRtt => self.zero_rtt = Some(key),
            EncryptionLevel::OneRtt => self.one_rtt = Some(key),
        }
    }

    /// Drops the keys for a level once the connection provably no longer
    /// needs them (RFC 9001 §4.9: Initial keys after the first Handshake
    /// packet is sent/received, Handshake keys once the handshake confirms).
    pub fn discard(&mut self, level: EncryptionLevel) {
        match level {
            EncryptionLevel::Initial => self.initial = None,
            EncryptionLevel::Handshake => self.handshake = None,
            EncryptionLevel::ZeroRtt => self.zero_rtt = None,
            EncryptionLevel::OneRtt => self.one_rtt = None,
        }
    }

    /// RFC 9001 §6 key update, replacing the 1-RTT key in place. The
    /// previous generation is returned so the caller can keep accepting
    /// packets in the old phase for one PTO (spec §4.2.3).
    pub fn update_one_rtt(&mut self) -> Result<Option<Arc<PacketKey>>, Error> {
        let Some(current) = self.one_rtt.as_ref() else {
            return Ok(None);
        };
        let previous = current.clone();
        let next = current.update()?;
        self.one_rtt = Some(Arc::new(next));
        Ok(Some(previous))
    }
}

/// Both directions' keys for a connection, as installed by the TLS bridge
/// (spec §4.4.3) and consumed by the send engine and the packet decoder.
#[derive(Clone, Default)]
pub struct KeySet {
    pub write: DirectionalKeys,
    pub read: DirectionalKeys,
}

impl KeySet {
    /// Installs the Initial read/write keys derived from `dcid` (spec
    /// §4.2.1). `is_client` selects which direction uses the "client in"
    /// label for writes vs. reads.
    pub fn install_initial(&mut self, dcid: &[u8], is_client: bool) -> Result<(), Error> {
        let client_key = PacketKey::derive_initial(dcid, label::CLIENT_IN)?;
        let server_key = PacketKey::derive_initial(dcid, label::SERVER_IN)?;

        let (write_key, read_key) = if is_client {
            (client_key, server_key)
        } else {
            (server_key, client_key)
        };

        self.write.install(EncryptionLevel::Initial, write_key);
        self.read.install(EncryptionLevel::Initial, read_key);
        Ok(())
    }
}
