// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! Path validation and MTU discovery (spec §4.1.5): PATH_CHALLENGE/RESPONSE
//! on migration, NEW_CONNECTION_ID/RETIRE_CONNECTION_ID issuance via
//! [`quic_core::connection_id::ConnectionIdRegistry`], and PMTUD's binary
//! search from the RFC 9000 minimum up to the locally configured ceiling.

use crate::send_flags::ConnectionSendFlags;
use quic_core::connection_id::{ConnectionId, ConnectionIdRegistry, StatelessResetToken};
use quic_core::random::Random;
use std::collections::VecDeque;
use std::net::SocketAddr;

/// RFC 9000 §14: every QUIC implementation must be able to send a complete
/// Initial packet in a 1200-byte UDP datagram.
pub const MIN_PLAINTEXT_MTU: u16 = 1200;

/// Tracks one outstanding PATH_CHALLENGE, so a PATH_RESPONSE can mirror the
/// most recently issued challenge (spec §4.1.5: "PATH_RESPONSE mirrors the
/// most recent unanswered challenge").
#[derive(Debug, Default)]
pub struct PathValidator {
    outstanding_challenge: Option<[u8; 8]>,
    pending_response: Option<[u8; 8]>,
    validated: bool,
}

impl PathValidator {
    /// Starts (or restarts) path validation after a migration, arming the
    /// PATH_CHALLENGE send flag.
    pub fn start(&mut self, random: &Random, flags: &mut ConnectionSendFlags) {
        let challenge = random.gen_array::<8>();
        self.outstanding_challenge = Some(challenge);
        self.validated = false;
        flags.set(ConnectionSendFlags::PATH_CHALLENGE);
    }

    pub fn outstanding_challenge(&self) -> Option<[u8; 8]> {
        self.outstanding_challenge
    }

    pub fn on_challenge_sent(&mut self) {
        // stays outstanding until a matching response arrives or it times out
    }

    /// A PATH_CHALLENGE arrived from the peer; queue the mirrored response.
    pub fn on_challenge_received(&mut self, data: [u8; 8], flags: &mut ConnectionSendFlags) {
        self.pending_response = Some(data);
        flags.set(ConnectionSendFlags::PATH_RESPONSE);
    }

    pub fn take_pending_response(&mut self) -> Option<[u8; 8]> {
        self.pending_response.take()
    }

    /// A PATH_RESPONSE arrived; validates the path if it echoes our most
    /// recent challenge.
    pub fn on_response_received(&mut self, data: [u8; 8]) -> bool {
        if self.outstanding_challenge == Some(data) {
            self.outstanding_challenge = None;
            self.validated = true;
            true
        } else {
            false
        }
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }
}

/// RFC 9000 §14.3/DPLPMTUD-style binary search between the guaranteed-safe
/// floor and a configured ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeState {
    Idle,
    Probing { low: u16, high: u16, probe_size: u16 },
    Settled,
}

#[derive(Debug)]
pub struct PathMtuDiscovery {
    state: ProbeState,
    discovered_mtu: u16,
    ceiling: u16,
}

impl PathMtuDiscovery {
    pub fn new(ceiling: u16) -> Self {
        Self { state: ProbeState::Idle, discovered_mtu: MIN_PLAINTEXT_MTU, ceiling }
    }

    pub fn current_mtu(&self) -> u16 {
        self.discovered_mtu
    }

    /// Starts the binary search, arming the (lowest-priority) PMTUD send
    /// flag so the probe packs and pads last within its packet (spec
    /// §4.1.2: "PMTUD is the highest-numbered, and therefore
    /// lowest-priority, connection send flag").
    pub fn start(&mut self, flags: &mut ConnectionSendFlags) {
        if self.ceiling <= MIN_PLAINTEXT_MTU {
            self.state = ProbeState::Settled;
            return;
        }
        let probe_size = (MIN_PLAINTEXT_MTU + self.ceiling) / 2;
        self.state = ProbeState::Probing { low: MIN_PLAINTEXT_MTU, high: self.ceiling, probe_size };
        flags.set(ConnectionSendFlags::PMTUD);
    }

    /// The next datagram size to pad a PMTUD probe out to, if a probe is in
    /// flight.
    pub fn next_probe_size(&self) -> Option<u16> {
        match self.state {
            ProbeState::Probing { probe_size, .. } => Some(probe_size),
            _ => None,
        }
    }

    /// A probe of `probed_size` was acknowledged: raise the floor and
    /// continue narrowing, or settle once the window collapses.
    pub fn on_probe_acked(&mut self, probed_size: u16, flags: &mut ConnectionSendFlags) {
        let ProbeState::Probing { high, .. } = self.state else { return };
        self.discovered_mtu = self.discovered_mtu.max(probed_size);
        let low = probed_size;
        if high - low <= 1 {
            self.state = ProbeState::Settled;
            return;
        }
        let probe_size = (low + high) / 2;
        self.state = ProbeState::Probing { low, high, probe_size };
        flags.set(ConnectionSendFlags::PMTUD);
    }

    /// A probe was declared lost: the true MTU is below this size, narrow
    /// the search from the other side.
    pub fn on_probe_lost(&mut self, probed_size: u16, flags: &mut ConnectionSendFlags) {
        let ProbeState::Probing { low, .. } = self.state else { return };
        let high = probed_size;
        if high - low <= 1 {
            self.state = ProbeState::Settled;
            return;
        }
        let probe_size = (low + high) / 2;
        self.state = ProbeState::Probing { low, high, probe_size };
        flags.set(ConnectionSendFlags::PMTUD);
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state, ProbeState::Settled)
    }
}

/// Everything the send engine needs about the current path: validation
/// state, discovered MTU, and connection ID bookkeeping (spec §4.1.5).
#[derive(Debug)]
pub struct Path {
    pub remote_address: SocketAddr,
    pub validator: PathValidator,
    pub mtu: PathMtuDiscovery,
    pub local_connection_ids: ConnectionIdRegistry,
    /// The connection ID the peer asked us to use when addressing them
    /// (their source connection ID from the handshake, or a later
    /// NEW_CONNECTION_ID); this is what goes in outgoing packets'
    /// destination connection ID field.
    peer_connection_id: ConnectionId,
    /// Sequence number of `peer_connection_id`, so a later NEW_CONNECTION_ID
    /// with a lower or stale sequence number is ignored.
    peer_connection_id_sequence: u64,
    /// Connection IDs issued to us via [`Self::issue_connection_id_if_needed`]
    /// not yet packed into a NEW_CONNECTION_ID frame.
    pending_new_connection_ids: VecDeque<(u64, ConnectionId, StatelessResetToken)>,
    /// Sequence numbers of the peer's own issued connection IDs that a
    /// NEW_CONNECTION_ID's `retire_prior_to` told us to stop using, not yet
    /// packed into a RETIRE_CONNECTION_ID frame.
    pending_retire_connection_ids: VecDeque<u64>,
}

impl Path {
    pub fn new(
        remote_address: SocketAddr,
        peer_connection_id: ConnectionId,
        peer_active_connection_id_limit: u64,
        mtu_ceiling: u16,
    ) -> Self {
        Self {
            remote_address,
            validator: PathValidator::default(),
            mtu: PathMtuDiscovery::new(mtu_ceiling),
            local_connection_ids: ConnectionIdRegistry::new(peer_active_connection_id_limit),
            peer_connection_id,
            peer_connection_id_sequence: 0,
            pending_new_connection_ids: VecDeque::new(),
            pending_retire_connection_ids: VecDeque::new(),
        }
    }

    pub fn peer_connection_id(&self) -> &ConnectionId {
        &self.peer_connection_id
    }

    pub fn on_peer_connection_id_updated(&mut self, id: ConnectionId) {
        self.peer_connection_id = id;
    }

    /// Issues a new local connection ID to the peer if the registry says we
    /// should, queuing it for the next NEW_CONNECTION_ID frame.
    pub fn issue_connection_id_if_needed(&mut self, random: &Random, flags: &mut ConnectionSendFlags) {
        if !self.local_connection_ids.should_issue() {
            return;
        }
        let id = ConnectionId::try_from_bytes(&random.gen_array::<8>())
            .expect("8 bytes is a valid connection id length");
        let token = random.gen_array::<16>();
        let sequence_number = self.local_connection_ids.issue(id, token);
        self.pending_new_connection_ids.push_back((sequence_number, id, token));
        flags.set(ConnectionSendFlags::NEW_CONNECTION_ID);
    }

    pub fn take_pending_new_connection_id(&mut self) -> Option<(u64, ConnectionId, StatelessResetToken)> {
        self.pending_new_connection_ids.pop_front()
    }

    /// A NEW_CONNECTION_ID arrived from the peer (spec §4.1.5): adopt it if
    /// it's newer than what we're using, and queue a RETIRE_CONNECTION_ID
    /// for anything the peer asked us to stop using.
    pub fn on_new_connection_id(
        &mut self,
        sequence_number: u64,
        retire_prior_to: u64,
        id: ConnectionId,
        flags: &mut ConnectionSendFlags,
    ) {
        if sequence_number >= self.peer_connection_id_sequence {
            self.peer_connection_id = id;
            self.peer_connection_id_sequence = sequence_number;
        }
        if retire_prior_to > 0 {
            self.pending_retire_connection_ids.push_back(retire_prior_to - 1);
            flags.set(ConnectionSendFlags::RETIRE_CONNECTION_ID);
        }
    }

    pub fn take_pending_retire_connection_id(&mut self) -> Option<u64> {
        self.pending_retire_connection_ids.pop_front()
    }

    /// The peer sent us a RETIRE_CONNECTION_ID for one of our issued IDs.
    pub fn on_retire_connection_id(&mut self, sequence_number: u64) {
        self.local_connection_ids.retire(sequence_number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_validator_mirrors_most_recent_challenge() {
        let random = Random::new();
        let mut flags = ConnectionSendFlags::empty();
        let mut validator = PathValidator::default();
        validator.start(&random, &mut flags);
        let challenge = validator.outstanding_challenge().unwrap();
        assert!(validator.on_response_received(challenge));
        assert!(validator.is_validated());
    }

    #[test]
    fn mismatched_response_does_not_validate() {
        let random = Random::new();
        let mut flags = ConnectionSendFlags::empty();
        let mut validator = PathValidator::default();
        validator.start(&random, &mut flags);
        assert!(!validator.on_response_received([0xff; 8]));
        assert!(!validator.is_validated());
    }

    #[test]
    fn pmtud_narrows_toward_the_ceiling_on_repeated_acks() {
        let mut flags = ConnectionSendFlags::empty();
        let mut mtu = PathMtuDiscovery::new(1500);
        mtu.start(&mut flags);
        let mut guard = 0;
        while !mtu.is_settled() && guard < 32 {
            let probe = mtu.next_probe_size().unwrap();
            mtu.on_probe_acked(probe, &mut flags);
            guard += 1;
        }
        assert!(mtu.is_settled());
        assert!(mtu.current_mtu() > MIN_PLAINTEXT_MTU);
    }

    #[test]
    fn pmtud_is_a_noop_when_ceiling_is_already_the_floor() {
        let mut flags = ConnectionSendFlags::empty();
        let mut mtu = PathMtuDiscovery::new(MIN_PLAINTEXT_MTU);
        mtu.start(&mut flags);
        assert!(mtu.is_settled());
        assert!(!flags.is_set(ConnectionSendFlags::PMTUD));
    }
}
