// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! Connection IDs and the issuance bookkeeping behind NEW_CONNECTION_ID /
//! RETIRE_CONNECTION_ID (spec §4.1.5).

use core::fmt;

pub const MAX_CONNECTION_ID_LEN: usize = 20;

/// An opaque connection identifier, 0-20 bytes (RFC 9000 §7.2).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    bytes: [u8; MAX_CONNECTION_ID_LEN],
    len: u8,
}

impl ConnectionId {
    pub fn try_from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_CONNECTION_ID_LEN {
            return None;
        }
        let mut buf = [0u8; MAX_CONNECTION_ID_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(Self { bytes: buf, len: bytes.len() as u8 })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConnectionId(")?;
        for byte in self.as_bytes() {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// A 16-byte token a peer can use to recognize our stateless reset for a
/// given connection ID (RFC 9000 §10.3).
pub type StatelessResetToken = [u8; 16];

/// One entry in the set of connection IDs we have issued to our peer via
/// NEW_CONNECTION_ID, up to `active_connection_id_limit` (spec §4.1.5).
#[derive(Clone, Copy, Debug)]
pub struct IssuedConnectionId {
    pub sequence_number: u64,
    pub id: ConnectionId,
    pub stateless_reset_token: StatelessResetToken,
    pub retired: bool,
}

/// Tracks connection IDs we have issued and the peer has not yet retired,
/// and connection IDs the peer has issued to us. Mirrors the responsibility
/// split in spec §4.1.5 but does not itself decide *when* to issue (that is
/// the send engine's call, driven by the peer's advertised
/// `active_connection_id_limit`).
#[derive(Debug, Default)]
pub struct ConnectionIdRegistry {
    issued: core_alloc::vec::Vec<IssuedConnectionId>,
    next_sequence_number: u64,
    peer_active_connection_id_limit: u64,
}

impl ConnectionIdRegistry {
    pub fn new(peer_active_connection_id_limit: u64) -> Self {
        Self {
            issued: core_alloc::vec::Vec::new(),
            next_sequence_number: 0,
            peer_active_connection_id_limit,
        }
    }

    /// Number of connection IDs issued and not yet retired.
    pub fn active_count(&self) -> usize {
        self.issued.iter().filter(|cid| !cid.retired).count()
    }

    /// `true` once the peer is down to its last unused slot and we should
    /// issue a new CID (drives the NEW_CONNECTION_ID send flag).
    pub fn should_issue(&self) -> bool {
        (self.active_count() as u64) < self.peer_active_connection_id_limit
    }

    pub fn issue(&mut self, id: ConnectionId, stateless_reset_token: StatelessResetToken) -> u64 {
        let sequence_number = self.next_sequence_number;
        self.next_sequence_number += 1;
        self.issued.push(IssuedConnectionId {
            sequence_number,
            id,
            stateless_reset_token,
            retired: false,
        });
        sequence_number
    }

    pub fn retire(&mut self, sequence_number: u64) {
        if let Some(entry) = self
            .issued
            .iter_mut()
            .find(|cid| cid.sequence_number == sequence_number)
        {
            entry.retired = true;
        }
    }

    pub fn pending_retirement(&self) -> impl Iterator<Item = &IssuedConnectionId> {
        self.issued.iter().filter(|cid| cid.retired)
    }
}
