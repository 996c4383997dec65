// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! Harvests raw traffic secrets out of rustls via its `KeyLog` hook (spec
//! §4.4.3).
//!
//! rustls's native `quic` module hands back fully-derived `PacketKey`/
//! `HeaderProtectionKey` objects built with its own crypto backend, not the
//! raw secret bytes this bridge needs to feed [`quic_core::crypto`]'s key
//! hierarchy. The secrets themselves are still observable the same way an
//! `SSLKEYLOGFILE` would see them: rustls calls `KeyLog::log` with the
//! standard NSS label for every traffic secret it derives, QUIC connections
//! included. Installing a `KeyLog` that files secrets away by label is the
//! smallest way to get at them without re-deriving the key schedule
//! ourselves.

use quic_core::crypto::EncryptionLevel;
use std::sync::{Arc, Mutex};

/// Which direction a harvested secret belongs to, from this side's
/// perspective.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

#[derive(Clone)]
pub struct HarvestedSecret {
    pub level: EncryptionLevel,
    pub direction: Direction,
    pub secret: Vec<u8>,
}

/// Maps an NSS key-log label to the epoch/direction it belongs to, from the
/// perspective of a connection with the given role.
fn classify(label: &str, is_server: bool) -> Option<(EncryptionLevel, Direction)> {
    use Direction::{Read, Write};
    use EncryptionLevel::*;

    let (level, is_client_secret) = match label {
        "CLIENT_EARLY_TRAFFIC_SECRET" => (ZeroRtt, true),
        "CLIENT_HANDSHAKE_TRAFFIC_SECRET" => (Handshake, true),
        "SERVER_HANDSHAKE_TRAFFIC_SECRET" => (Handshake, false),
        "CLIENT_TRAFFIC_SECRET_0" => (OneRtt, true),
        "SERVER_TRAFFIC_SECRET_0" => (OneRtt, false),
        // Resumption master secrets, exporter secrets, and later
        // generations of the 1-RTT label are not part of the packet-key
        // hierarchy.
        _ => return None,
    };

    let direction = if is_client_secret == is_server { Read } else { Write };
    Some((level, direction))
}

/// A [`rustls::KeyLog`] that forwards every QUIC-relevant secret to a
/// shared buffer instead of a file, for [`crate::bridge::Tls`] to drain
/// after each `read_hs`/`write_hs` call.
pub struct SecretLog {
    is_server: bool,
    harvested: Mutex<Vec<HarvestedSecret>>,
}

impl SecretLog {
    pub fn new(is_server: bool) -> Arc<Self> {
        Arc::new(Self { is_server, harvested: Mutex::new(Vec::new()) })
    }

    /// Removes and returns everything logged since the last drain.
    pub fn drain(&self) -> Vec<HarvestedSecret> {
        core::mem::take(&mut self.harvested.lock().expect("secret log poisoned"))
    }
}

impl rustls::KeyLog for SecretLog {
    fn log(&self, label: &str, _client_random: &[u8], secret: &[u8]) {
        let Some((level, direction)) = classify(label, self.is_server) else {
            return;
        };
        self.harvested
            .lock()
            .expect("secret log poisoned")
            .push(HarvestedSecret { level, direction, secret: secret.to_vec() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_reads_the_clients_handshake_secret_and_writes_its_own() {
        assert_eq!(classify("CLIENT_HANDSHAKE_TRAFFIC_SECRET", true), Some((EncryptionLevel::Handshake, Direction::Read)));
        assert_eq!(classify("SERVER_HANDSHAKE_TRAFFIC_SECRET", true), Some((EncryptionLevel::Handshake, Direction::Write)));
    }

    #[test]
    fn client_writes_its_own_handshake_secret_and_reads_the_servers() {
        assert_eq!(classify("CLIENT_HANDSHAKE_TRAFFIC_SECRET", false), Some((EncryptionLevel::Handshake, Direction::Write)));
        assert_eq!(classify("SERVER_HANDSHAKE_TRAFFIC_SECRET", false), Some((EncryptionLevel::Handshake, Direction::Read)));
    }

    #[test]
    fn exporter_and_resumption_secrets_are_ignored() {
        assert_eq!(classify("EXPORTER_SECRET", true), None);
        assert_eq!(classify("CLIENT_TRAFFIC_SECRET_1", true), None);
    }

    #[test]
    fn drain_empties_the_buffer() {
        let log = SecretLog::new(true);
        log.log("CLIENT_TRAFFIC_SECRET_0", b"", b"secret-bytes");
        assert_eq!(log.drain().len(), 1);
        assert!(log.drain().is_empty());
    }
}
