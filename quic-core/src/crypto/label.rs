// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! TLS 1.3 `HKDF-Expand-Label` (RFC 8446 §7.1), the keyed derivation
//! function spec §4.2.1/§4.2.2 build every QUIC secret and key from.

/// Builds the `HkdfLabel` structure fed as the `info` parameter to
/// `HKDF-Expand`:
///
/// ```text
/// struct {
///     uint16 length;
///     opaque label<7..255> = "tls13 " + Label;
///     opaque context<0..255>;
/// } HkdfLabel;
/// ```
///
/// QUIC never uses a non-empty context for the labels it defines (`client
/// in`, `server in`, `quic key`, `quic iv`, `quic hp`, `quic ku`), so this
/// helper always encodes an empty context.
pub fn hkdf_label(output_len: usize, label: &[u8]) -> core_alloc::vec::Vec<u8> {
    const TLS13_PREFIX: &[u8] = b"tls13 ";
    debug_assert!(output_len <= u16::MAX as usize);

    let label_len = TLS13_PREFIX.len() + label.len();
    debug_assert!(label_len <= u8::MAX as usize, "label is too long");

    let mut out = core_alloc::vec::Vec::with_capacity(2 + 1 + label_len + 1);
    out.extend_from_slice(&(output_len as u16).to_be_bytes());
    out.push(label_len as u8);
    out.extend_from_slice(TLS13_PREFIX);
    out.extend_from_slice(label);
    out.push(0); // empty context
    out
}

pub const CLIENT_IN: &[u8] = b"client in";
pub const SERVER_IN: &[u8] = b"server in";
pub const QUIC_KEY: &[u8] = b"quic key";
pub const QUIC_IV: &[u8] = b"quic iv";
pub const QUIC_HP: &[u8] = b"quic hp";
pub const QUIC_KU: &[u8] = b"quic ku";

use crate::core_alloc;

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    //= https://www.rfc-editor.org/rfc/rfc9001#appendix-a.1
    //# client in:  00200f746c73313320636c69656e7420696e00
    #[test]
    fn client_in_label() {
        assert_eq!(
            hkdf_label(32, CLIENT_IN),
            hex!("00200f746c73313320636c69656e7420696e00").to_vec()
        );
    }

    //= https://www.rfc-editor.org/rfc/rfc9001#appendix-a.1
    //# quic key:  00100e746c7331332071756963206b657900
    #[test]
    fn quic_key_16_label() {
        assert_eq!(hkdf_label(16, QUIC_KEY), hex!("00100e746c7331332071756963206b657900").to_vec());
    }
}
