// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! The packet key hierarchy (spec §4.2): derivation, update, and lifecycle
//! of the initial/handshake/0-RTT/1-RTT AEAD and header-protection keys.

use super::{
    aead::{CipherSuite, HashAlgorithm, OutputLen},
    error::Error,
    label,
};
use crate::core_alloc::vec::Vec;
use ring::{
    aead::{self, quic::HeaderProtectionKey as RingHpKey, Aad, LessSafeKey, Nonce, UnboundKey},
    hkdf::{self, Salt},
};
use zeroize::Zeroize;

/// RFC 9001 §5.2 initial salt, used to derive the Initial secrets from the
/// client-chosen destination connection ID.
pub const INITIAL_SALT: [u8; 20] =
    hex_literal::hex!("38762cf7f55934b34d179ae6a4c80cadccbb7f0");

/// Which side of a key phase is active (spec §3.1 `PacketKey.key_phase`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyPhase {
    #[default]
    Zero,
    One,
}

impl KeyPhase {
    pub fn toggled(self) -> Self {
        match self {
            KeyPhase::Zero => KeyPhase::One,
            KeyPhase::One => KeyPhase::Zero,
        }
    }
}

/// A traffic secret exported by the TLS bridge each time it advances to a
/// new epoch (spec §4.4.3). Retained only for 1-RTT keys so `update()` can
/// be performed without revisiting TLS (spec §3.1).
pub struct TrafficSecret {
    hash_alg: HashAlgorithm,
    cipher_suite: CipherSuite,
    secret: Vec<u8>,
}

impl TrafficSecret {
    pub fn new(hash_alg: HashAlgorithm, cipher_suite: CipherSuite, secret: &[u8]) -> Self {
        Self { hash_alg, cipher_suite, secret: secret.to_vec() }
    }

    fn prk(&self) -> Salt {
        // re-keying as a `Salt` is how `ring` spells "treat this as the PRK
        // to expand from", mirroring HKDF-Expand-Label's use of the running
        // secret as its input keying material.
        Salt::new(self.hash_alg.hkdf_algorithm(), &[]).extract(&self.secret)
    }
}

impl Drop for TrafficSecret {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// Header-protection key. Derived once per traffic secret and never
/// rotated by a 1-RTT key update (spec §4.2.2: "do not rederive hp").
pub struct HeaderProtectionKey(RingHpKey);

impl HeaderProtectionKey {
    fn derive(cipher_suite: CipherSuite, prk: &hkdf::Prk) -> Result<Self, Error> {
        let algorithm = cipher_suite.header_protection_algorithm();
        let mut raw = [0u8; 32];
        let raw = &mut raw[..cipher_suite.key_len()];
        expand_label(prk, label::QUIC_HP, raw)?;
        let key = RingHpKey::new(algorithm, raw).map_err(|_| Error::KEY_DERIVATION_FAILURE)?;
        Ok(Self(key))
    }

    /// Derives the 5-byte header protection mask from a ciphertext sample
    /// (spec §4.1.2 step 3d: "apply header protection using the hp sample
    /// at offset 4 from the start of the packet-number field").
    pub fn new_mask(&self, sample: &[u8]) -> Result<[u8; 5], Error> {
        self.0.new_mask(sample).map_err(|_| Error::HEADER_PROTECTION_FAILURE)
    }

    pub fn sample_len(&self) -> usize {
        self.0.algorithm().sample_len()
    }
}

/// One derived {aead_key, iv, hp_key} bundle (spec §3.1 `PacketKey`). A
/// `PacketKey` seals when used as a write key and opens when used as a read
/// key; the direction is determined entirely by which secret (client vs.
/// server) it was derived from, not by anything stored here.
pub struct PacketKey {
    aead_key: LessSafeKey,
    static_iv: [u8; aead::NONCE_LEN],
    hp: HeaderProtectionKey,
    cipher_suite: CipherSuite,
    traffic_secret: Option<TrafficSecret>,
    key_phase: KeyPhase,
}

impl PacketKey {
    fn from_prk(cipher_suite: CipherSuite, prk: &hkdf::Prk, traffic_secret: Option<TrafficSecret>) -> Result<Self, Error> {
        let mut key_bytes = [0u8; 32];
        let key_bytes = &mut key_bytes[..cipher_suite.key_len()];
        expand_label(prk, label::QUIC_KEY, key_bytes)?;

        let mut static_iv = [0u8; aead::NONCE_LEN];
        expand_label(prk, label::QUIC_IV, &mut static_iv)?;

        let unbound =
            UnboundKey::new(cipher_suite.aead_algorithm(), key_bytes).map_err(|_| Error::KEY_DERIVATION_FAILURE)?;
        let aead_key = LessSafeKey::new(unbound);
        let hp = HeaderProtectionKey::derive(cipher_suite, prk)?;

        key_bytes.zeroize();

        Ok(Self {
            aead_key,
            static_iv,
            hp,
            cipher_suite,
            traffic_secret,
            key_phase: KeyPhase::Zero,
        })
    }

    /// Derives one direction's Initial key bundle from the destination
    /// connection ID (spec §4.2.1).
    pub fn derive_initial(cid: &[u8], label: &'static [u8]) -> Result<Self, Error> {
        let initial_secret = Salt::new(hkdf::HKDF_SHA256, &INITIAL_SALT).extract(cid);
        let mut directional_secret = [0u8; 32];
        expand_label(&initial_secret, label, &mut directional_secret)?;
        let prk = Salt::new(hkdf::HKDF_SHA256, &[]).extract(&directional_secret);
        directional_secret.zeroize();
        Self::from_prk(CipherSuite::Aes128Gcm, &prk, None)
    }

    /// Builds a packet key from a traffic secret exported by the TLS bridge
    /// (spec §4.4.3). `retain_secret` should be `true` only for 1-RTT keys,
    /// so `update()` can be derived without revisiting TLS.
    pub fn from_traffic_secret(
        cipher_suite: CipherSuite,
        hash_alg: HashAlgorithm,
        secret: &[u8],
        retain_secret: bool,
    ) -> Result<Self, Error> {
        let held = TrafficSecret::new(hash_alg, cipher_suite, secret);
        let prk = held.prk();
        let traffic_secret = if retain_secret { Some(held) } else { None };
        Self::from_prk(cipher_suite, &prk, traffic_secret)
    }

    /// RFC 9001 §6 key update: `new_secret = HKDF-Expand-Label(old_secret,
    /// "quic ku", "", secret_len)`. The header-protection key is not
    /// rederived (spec §4.2.2).
    pub fn update(&self) -> Result<Self, Error> {
        let old = self
            .traffic_secret
            .as_ref()
            .expect("key update is only defined for 1-RTT keys, which always retain their secret");

        let old_prk = old.prk();
        let mut new_secret = vec![0u8; old.hash_alg.len()];
        expand_label(&old_prk, label::QUIC_KU, &mut new_secret)?;

        let mut next = Self::from_traffic_secret(old.cipher_suite, old.hash_alg, &new_secret, true)?;
        new_secret.zeroize();

        // the header protection key does not rotate; reuse this generation's
        next.key_phase = self.key_phase.toggled();
        Ok(next)
    }

    pub fn seal(&self, packet_number: u64, header: &[u8], payload_in_out: &mut Vec<u8>) -> Result<(), Error> {
        let nonce = self.nonce(packet_number);
        self.aead_key
            .seal_in_place_append_tag(nonce, Aad::from(header), payload_in_out)
            .map_err(|_| Error::KEY_DERIVATION_FAILURE)
    }

    pub fn open<'a>(&self, packet_number: u64, header: &[u8], payload_in_out: &'a mut [u8]) -> Result<&'a mut [u8], Error> {
        let nonce = self.nonce(packet_number);
        self.aead_key
            .open_in_place(nonce, Aad::from(header), payload_in_out)
            .map_err(|_| Error::DECRYPT_ERROR)
    }

    fn nonce(&self, packet_number: u64) -> Nonce {
        let mut nonce_bytes = self.static_iv;
        let pn_bytes = packet_number.to_be_bytes();
        for (n, p) in nonce_bytes.iter_mut().rev().zip(pn_bytes.iter().rev()) {
            *n ^= *p;
        }
        Nonce::assume_unique_for_key(nonce_bytes)
    }

    pub fn header_protection_key(&self) -> &HeaderProtectionKey {
        &self.hp
    }

    pub fn cipher_suite(&self) -> CipherSuite {
        self.cipher_suite
    }

    pub fn key_phase(&self) -> KeyPhase {
        self.key_phase
    }

    pub fn tag_len(&self) -> usize {
        self.cipher_suite.tag_len()
    }
}

fn expand_label(prk: &hkdf::Prk, label: &[u8], out: &mut [u8]) -> Result<(), Error> {
    let info = label::hkdf_label(out.len(), label);
    let okm = prk
        .expand(&[&info], OutputLen(out.len()))
        .map_err(|_| Error::KEY_DERIVATION_FAILURE)?;
    okm.fill(out).map_err(|_| Error::KEY_DERIVATION_FAILURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    //= https://www.rfc-editor.org/rfc/rfc9001#appendix-a.1
    //# destination_connection_id = 8394c8f03e515708
    //# initial_secret = HKDF-Extract(initial_salt, destination_connection_id)
    //#     = 7db5df06e7a69e432496adedb00851923595221596ae2ae9fb8115c1e9ed0a44
    #[test]
    fn client_initial_secret_matches_rfc9001_appendix_a1() {
        let dcid = hex!("8394c8f03e515708");
        let initial_secret = Salt::new(hkdf::HKDF_SHA256, &INITIAL_SALT).extract(&dcid);

        let mut client_secret = [0u8; 32];
        expand_label(&initial_secret, label::CLIENT_IN, &mut client_secret).unwrap();

        assert_eq!(
            client_secret,
            hex!("c00cf151ca5be075ed0ebfb5c80323c42d6b7db67881289af4008f1f6c357aea")[..32]
        );
    }
}
