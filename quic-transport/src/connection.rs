// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! `Connection`: the per-connection entity tying the TLS bridge, key
//! hierarchy, send engine, stream set, and path together (spec §3.1).
//!
//! REDESIGN: a production connection multiplexes many datagrams per
//! `poll_receive` call and may have several paths alive during migration.
//! This type keeps exactly one [`Path`] (full multipath is this crate's
//! explicit Non-goal; single-path migration support is left for later) and
//! processes one datagram at a time, matching the granularity
//! [`quic_platform::datapath::ReceiveHandler`] already hands datagrams in
//! at.

use crate::path::Path;
use crate::send_engine::{FlushReason, SendEngine, Settings};
use crate::stream::{Stream, StreamSet};
use quic_core::connection_id::ConnectionId;
use quic_core::crypto::{EncryptionLevel, KeySet, PacketKey};
use quic_core::endpoint::EndpointType;
use quic_core::frame::{self, Frame};
use quic_core::number::{PacketNumber, PacketNumberSpace};
use quic_core::stream_id::{StreamId, StreamType};
use quic_core::time::Timestamp;
use quic_core::transport::Error;
use quic_core::varint::VarInt;
use quic_platform::datapath::{Binding, Error as DatapathError};
use quic_tls::{BufferKind, ConnectionState as TlsState, ExportedSecret, ResultFlags, Tls};

/// Highest packet number this connection has fully processed, per space —
/// what [`crate::packet_parser::parse_packet`] needs to reconstruct a
/// truncated wire packet number (RFC 9000 §17.1).
#[derive(Debug, Default, Clone, Copy)]
struct LargestProcessed([Option<PacketNumber>; 3]);

impl LargestProcessed {
    fn get(&self, space: PacketNumberSpace) -> Option<PacketNumber> {
        self.0[space.index()]
    }

    fn observe(&mut self, pn: PacketNumber) {
        let slot = &mut self.0[pn.space().index()];
        *slot = Some(slot.map_or(pn, |p| p.max(pn)));
    }
}

/// Index into the TLS bridge's four-epoch key arrays (spec §4.4.2),
/// matching [`EncryptionLevel`] one for one.
fn level_index(level: EncryptionLevel) -> usize {
    match level {
        EncryptionLevel::Initial => 0,
        EncryptionLevel::Handshake => 1,
        EncryptionLevel::ZeroRtt => 2,
        EncryptionLevel::OneRtt => 3,
    }
}

/// A live QUIC connection over one [`Binding`] (spec §3.1).
pub struct Connection<B: Binding> {
    binding: B,
    endpoint_type: EndpointType,
    tls: Tls,
    tls_state: TlsState,
    keys: KeySet,
    send_engine: SendEngine,
    streams: StreamSet,
    path: Path,
    largest_processed: LargestProcessed,
    next_stream_sequence: [u64; 2],
}

impl<B: Binding> Connection<B> {
    /// Builds a connection over an already-established binding, deriving
    /// Initial keys from `peer_connection_id` (spec §4.2.1) and performing
    /// the TLS bridge's first self-driven flight.
    pub fn new(
        binding: B,
        endpoint_type: EndpointType,
        tls_config: quic_tls::Config,
        peer_connection_id: ConnectionId,
        initial_token: Vec<u8>,
        peer_active_connection_id_limit: u64,
    ) -> Result<Self, Error> {
        let mut tls_state = TlsState::default();
        let tls = Tls::initialize(tls_config, &mut tls_state).map_err(|_| Error::InternalError("tls handshake failed to initialize"))?;

        let mut keys = KeySet::default();
        keys.install_initial(peer_connection_id.as_bytes(), endpoint_type.is_client())
            .map_err(|_| Error::InternalError("initial key derivation failed"))?;

        let remote_address = binding.remote_address().ok_or(Error::InternalError("binding has no default remote address"))?;
        let mtu_ceiling = binding.local_mtu();

        let mut connection = Self {
            binding,
            endpoint_type,
            tls,
            tls_state,
            keys,
            send_engine: SendEngine::initialize(initial_token),
            streams: StreamSet::default(),
            path: Path::new(remote_address, peer_connection_id, peer_active_connection_id_limit, mtu_ceiling),
            largest_processed: LargestProcessed::default(),
            next_stream_sequence: [0; 2],
        };
        connection.absorb_tls_progress(ResultFlags::DATA);
        Ok(connection)
    }

    pub fn apply_settings(&mut self, settings: Settings) {
        self.send_engine.apply_settings(settings);
    }

    /// Opens a stream of the given type, returning its ID (spec §3.1
    /// `Stream`, numbered per RFC 9000 §2.1).
    pub fn open_stream(&mut self, stream_type: StreamType, initial_peer_max_stream_data: u64, initial_local_window: u64) -> StreamId {
        let index = stream_type as usize & 1;
        let n = self.next_stream_sequence[index];
        self.next_stream_sequence[index] += 1;
        let id = StreamId::nth(self.endpoint_type, stream_type, n).expect("stream sequence space exhausted");
        self.streams.insert(Stream::new(id, initial_peer_max_stream_data, initial_local_window));
        id
    }

    pub fn queue_stream_data(&mut self, id: StreamId, data: &[u8], is_first_write: bool) {
        if let Some(stream) = self.streams.get_mut(id) {
            stream.queue_data(data, is_first_write);
        }
        self.send_engine.set_stream_send_flag(&mut self.streams, id, crate::send_flags::StreamSendFlags::DATA);
        self.send_engine.queue_flush(FlushReason::ApplicationWrite);
    }

    pub fn close(&mut self, is_application_error: bool, error_code: VarInt, reason: &'static str) {
        self.send_engine.close(is_application_error, error_code, reason);
        self.send_engine.queue_flush(FlushReason::Close);
    }

    /// Runs the flush algorithm and hands anything it produced to the
    /// binding (spec §4.1.1, §4.3.1).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn poll_flush(&mut self, now: Timestamp) -> Result<bool, Error> {
        let ecn = Default::default();
        let max_packet_size = self.path.mtu.current_mtu();
        let mut send_ctx = self.binding.alloc_send_context(ecn, max_packet_size);

        let restored_flags = self.send_engine.send_flags();
        let sent = self.send_engine.process_flush(&self.keys, &mut self.path, &mut self.streams, &quic_core::random::Random::new(), &mut send_ctx, now, false);

        if send_ctx.is_empty() {
            return Ok(false);
        }

        match self.binding.send_to(self.path.remote_address, send_ctx).await {
            Ok(()) => Ok(sent),
            Err(err @ (DatapathError::NoBuffers | DatapathError::Unreachable)) => {
                self.send_engine.on_transient_send_failure(restored_flags)?;
                Err(Error::from(err))
            }
            Err(err) => Err(Error::from(err)),
        }
    }

    /// Decrypts and dispatches every frame in one received datagram (spec
    /// §4.3.1's `recv_cb` granularity, §4.1.2's dispatch).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, datagram), fields(len = datagram.len())))]
    pub fn on_datagram_received(&mut self, datagram: &mut [u8], now: Timestamp) -> Result<(), Error> {
        if datagram.is_empty() {
            return Ok(());
        }
        let Some(packet_type) = quic_core::packet::Type::from_first_byte(datagram[0]) else { return Ok(()) };
        let Some(space) = packet_type.packet_number_space() else { return Ok(()) };
        let Some(level) = packet_type.encryption_level() else { return Ok(()) };
        let Some(key) = self.keys.read.get(level).cloned() else { return Ok(()) };

        let parsed = crate::packet_parser::parse_packet(datagram, packet_type, space, &key, self.largest_processed.get(space))
            .map_err(|_| Error::ProtocolViolation("undecryptable packet"))?;
        self.largest_processed.observe(parsed.packet_number);
        #[cfg(feature = "tracing")]
        tracing::trace!(packet_number = parsed.packet_number.as_u64(), ?packet_type, "packet decrypted");

        let mut buffer = s2n_codec::DecoderBufferMut::new(parsed.payload);
        let mut ack_eliciting = false;
        while !buffer.is_empty() {
            let (decoded, rest) = frame::decode_frame(buffer).map_err(|_| Error::ProtocolViolation("malformed frame"))?;
            ack_eliciting |= self.dispatch_frame(space, decoded, now)?;
            buffer = rest;
        }
        self.send_engine.on_packet_received(space, parsed.packet_number.as_u64(), now, ack_eliciting);
        Ok(())
    }

    /// Applies one decoded frame's effect on connection state, returning
    /// whether it's ack-eliciting (RFC 9000 §13.2: everything but ACK,
    /// PADDING, and CONNECTION_CLOSE).
    fn dispatch_frame(&mut self, space: PacketNumberSpace, frame: Frame<'_>, now: Timestamp) -> Result<bool, Error> {
        let ack_eliciting = !matches!(frame, Frame::Ack(_) | Frame::Padding(_) | Frame::ConnectionClose(_));
        match frame {
            Frame::Padding(_) => {}
            Frame::Ping(_) => {}
            Frame::Ack(ack) => {
                let ranges: Vec<_> = ack.ack_ranges.iter().map(|r| r.start().as_u64()..=r.end().as_u64()).collect();
                self.send_engine.on_ack_frame(space, &mut self.streams, &ranges, ack.ack_delay(), now);
            }
            Frame::Crypto(crypto) => {
                let flags = self
                    .tls
                    .process_data(BufferKind::CryptoData, crypto.data(), &mut self.tls_state)
                    .map_err(|_| Error::CryptoError { alert: 0x28, reason: "tls rejected handshake data" })?;
                self.absorb_tls_progress(flags);
            }
            Frame::Stream(stream_frame) => {
                if self.streams.get_mut(stream_frame.stream_id).is_none() {
                    self.streams.insert(Stream::new(stream_frame.stream_id, 0, 0));
                }
                if let Some(stream) = self.streams.get_mut(stream_frame.stream_id) {
                    let len = stream_frame.data.len() as u64;
                    stream.recv_window().on_receive(len)?;
                }
            }
            Frame::ConnectionClose(_) => self.send_engine.close(false, VarInt::ZERO, "peer closed the connection"),
            Frame::PathChallenge(challenge) => self.send_engine.on_path_challenge_received(&mut self.path, *challenge.data),
            Frame::PathResponse(response) => {
                self.send_engine.on_path_response_received(&mut self.path, *response.data);
            }
            Frame::NewConnectionId(new_id) => {
                if let Some(id) = ConnectionId::try_from_bytes(new_id.connection_id) {
                    self.send_engine.on_new_connection_id(
                        &mut self.path,
                        new_id.sequence_number.as_u64(),
                        new_id.retire_prior_to.as_u64(),
                        id,
                    );
                }
            }
            Frame::RetireConnectionId(retire) => {
                self.path.on_retire_connection_id(retire.sequence_number.as_u64());
            }
            Frame::MaxData(max_data) => {
                self.send_engine.on_peer_max_data(max_data.maximum_data.as_u64());
            }
            Frame::MaxStreamData(max_stream_data) => {
                if let Some(stream) = self.streams.get_mut(max_stream_data.stream_id) {
                    stream.send_window_mut().on_peer_max_data(max_stream_data.maximum_stream_data.as_u64());
                }
            }
            Frame::MaxStreams(max_streams) => {
                self.send_engine.on_peer_max_streams(max_streams.stream_type, max_streams.maximum_streams.as_u64());
            }
            Frame::DataBlocked(_) => {
                self.send_engine.on_peer_data_blocked();
            }
            Frame::StreamDataBlocked(blocked) => {
                self.send_engine.set_stream_send_flag(&mut self.streams, blocked.stream_id, crate::send_flags::StreamSendFlags::MAX_DATA);
            }
            Frame::StreamsBlocked(blocked) => {
                self.send_engine.on_peer_streams_blocked(blocked.stream_type);
            }
            Frame::ResetStream(reset) => {
                if let Some(stream) = self.streams.get_mut(reset.stream_id) {
                    stream.on_peer_reset(reset.application_error_code.as_u64());
                }
            }
            Frame::StopSending(stop) => {
                let has_stream = self.streams.get_mut(stop.stream_id).is_some();
                if has_stream {
                    if let Some(stream) = self.streams.get_mut(stop.stream_id) {
                        stream.queue_reset(stop.application_error_code.as_u64());
                    }
                    self.streams.schedule(stop.stream_id);
                }
            }
            Frame::HandshakeDone(_) => self.confirm_handshake(),
        }
        Ok(ack_eliciting)
    }

    /// Discards Handshake-level keys and tells the send engine the
    /// handshake is confirmed (RFC 9001 §4.9.2): on the server this follows
    /// directly from TLS completion, on the client it waits for an incoming
    /// HandshakeDone frame (spec §4.1.6).
    fn confirm_handshake(&mut self) {
        self.keys.write.discard(EncryptionLevel::Handshake);
        self.keys.read.discard(EncryptionLevel::Handshake);
        self.send_engine.on_handshake_confirmed();
    }

    /// Folds a TLS bridge step's result into this connection's key set and
    /// outgoing CRYPTO data (spec §4.4.1, §4.4.3).
    fn absorb_tls_progress(&mut self, flags: ResultFlags) {
        for level in [EncryptionLevel::Initial, EncryptionLevel::Handshake, EncryptionLevel::ZeroRtt, EncryptionLevel::OneRtt] {
            let idx = level_index(level);
            if let Some(secret) = self.tls_state.write_keys[idx].take() {
                self.install_secret(level, secret, true);
            }
            if let Some(secret) = self.tls_state.read_keys[idx].take() {
                self.install_secret(level, secret, false);
            }
        }

        // `tls_state.buffer` is cleared and refilled fresh by every TLS step
        // (spec §4.4.1); its only epoch boundaries are `buffer_offset_handshake`
        // and `buffer_offset_1rtt` (spec §4.4.2). Copy each segment into the
        // send engine's own per-space CRYPTO stream now, before the next step
        // clears it out from under us.
        if flags.contains(ResultFlags::DATA) && !self.tls_state.buffer.is_empty() {
            let initial_end = self.tls_state.buffer_offset_handshake.min(self.tls_state.buffer.len());
            let handshake_end = self.tls_state.buffer_offset_1rtt.min(self.tls_state.buffer.len()).max(initial_end);
            let (initial, rest) = self.tls_state.buffer.split_at(initial_end);
            let (handshake, one_rtt) = rest.split_at(handshake_end - initial_end);
            self.send_engine.queue_crypto_data(PacketNumberSpace::Initial, initial);
            self.send_engine.queue_crypto_data(PacketNumberSpace::Handshake, handshake);
            self.send_engine.queue_crypto_data(PacketNumberSpace::ApplicationData, one_rtt);
            self.send_engine.queue_flush(FlushReason::KeyUpdate);
        }

        if flags.contains(ResultFlags::COMPLETE) {
            self.keys.write.discard(EncryptionLevel::Initial);
            self.keys.read.discard(EncryptionLevel::Initial);
            if !self.endpoint_type.is_client() {
                self.confirm_handshake();
            }
        }
    }

    fn install_secret(&mut self, level: EncryptionLevel, secret: ExportedSecret, is_write: bool) {
        let Ok(key) = PacketKey::from_traffic_secret(secret.cipher_suite, secret.hash_alg, &secret.secret, level == EncryptionLevel::OneRtt) else {
            return;
        };
        if is_write {
            self.keys.write.install(level, key);
        } else {
            self.keys.read.install(level, key);
        }
    }
}
