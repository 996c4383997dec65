// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! The per-connection flush algorithm (spec §4.1.1-§4.1.3, §4.1.6): decides
//! what's pending, packs it into datagrams within the current budget, and
//! drives loss detection / PTO off the resulting ACKs.
//!
//! REDESIGN: the source's flush loop coalesces every packet number space
//! that currently has keys into as many UDP datagrams as the congestion
//! window and anti-amplification budget allow in one call, GSO-batching
//! them into a single `sendmsg`. This crate's `process_flush` instead closes
//! at most one packet per encryption level per call — still driven by the
//! same per-packet budget and frame-priority order (spec §4.1.2) — and
//! relies on the caller invoking it again (per spec §4.1.1 `queue_flush`'s
//! "may coalesce repeated requests into one flush") rather than coalescing
//! internally. Simpler to reason about per call; costs a few more
//! `send_to` calls under load, not a protocol difference.

use crate::ack_ranges::AckRanges;
use crate::flow_control::{ReceiveWindow, SendWindow};
use crate::packet_builder::{close_packet, PacketHeader};
use crate::path::Path;
use crate::sent_packets::{SentFrameRecord, SentPacketInfo, SentPacketLog};
use crate::send_flags::ConnectionSendFlags;
use crate::stream::{SendBuffer, StreamSet};
use quic_core::crypto::{EncryptionLevel, KeySet};
use quic_core::frame::{self, Frame};
use quic_core::number::{PacketNumber, PacketNumberSpace};
use quic_core::packet::{Type as PacketType, QUIC_VERSION_1};
use quic_core::random::Random;
use quic_core::stream_id::{StreamId, StreamType};
use quic_core::time::Timestamp;
use quic_core::transport::Error;
use quic_core::varint::VarInt;
use quic_platform::datapath::SendContext;
use s2n_codec::{DecoderBufferMut, Encoder, EncoderBuffer, EncoderValue};

#[allow(unused_imports)]
use frame::Frame as _;

/// Why a flush was requested (spec §4.1.1 `queue_flush`'s named reasons);
/// purely diagnostic, the algorithm itself just checks the flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushReason {
    ApplicationWrite,
    AckElicited,
    LossTimer,
    PtoTimer,
    DelayedAckTimer,
    KeyUpdate,
    PathValidation,
    Close,
}

/// Configuration the connection applies once established (spec §4.1.1
/// `apply_settings`).
#[derive(Clone, Debug)]
pub struct Settings {
    pub max_datagram_size: u16,
    pub initial_max_data: u64,
    pub initial_peer_max_data: u64,
    pub initial_max_streams_bidi: u64,
    pub initial_max_streams_uni: u64,
    pub initial_peer_max_streams_bidi: u64,
    pub initial_peer_max_streams_uni: u64,
    pub max_ack_delay: core::time::Duration,
    pub initial_rtt: core::time::Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_datagram_size: 1350,
            initial_max_data: 1 << 20,
            initial_peer_max_data: 0,
            initial_max_streams_bidi: 100,
            initial_max_streams_uni: 100,
            initial_peer_max_streams_bidi: 0,
            initial_peer_max_streams_uni: 0,
            max_ack_delay: core::time::Duration::from_millis(25),
            initial_rtt: quic_core::recovery::rtt_estimator::DEFAULT_INITIAL_RTT,
        }
    }
}

/// One packet-number space's outgoing CRYPTO stream: append-only like a
/// [`crate::stream::Stream`]'s send buffer, but never flow-controlled (spec
/// §4.4.2 — CRYPTO data bypasses connection/stream flow control entirely).
#[derive(Debug, Default)]
struct CryptoSend {
    buffer: SendBuffer,
    /// High-water mark: offset of the first byte never yet packed.
    send_offset: u64,
    /// Lowest offset a loss signal says must be re-packed.
    retransmit_from: Option<u64>,
}

impl CryptoSend {
    fn queue(&mut self, data: &[u8]) {
        self.buffer.push(data);
    }

    fn is_pending(&self) -> bool {
        let buffer_end = self.buffer.base_offset() + self.buffer.len() as u64;
        self.retransmit_from.is_some() || self.send_offset < buffer_end
    }

    fn pack(&mut self, max_len: usize, scratch: &mut Vec<u8>) -> Option<u64> {
        let offset = self.retransmit_from.take().unwrap_or(self.send_offset);
        let packed = self.buffer.read_at(offset, max_len, scratch);
        if packed == 0 {
            if offset < self.send_offset {
                self.retransmit_from = Some(offset);
            }
            return None;
        }
        let new_high_water = offset + packed as u64;
        if new_high_water > self.send_offset {
            self.send_offset = new_high_water;
        } else if new_high_water < self.send_offset {
            self.retransmit_from = Some(new_high_water);
        }
        Some(offset)
    }

    /// Bytes `[offset, ..)` packed from this stream were declared lost.
    fn on_loss(&mut self, offset: u64) {
        if offset < self.send_offset {
            self.retransmit_from = Some(self.retransmit_from.map_or(offset, |r| r.min(offset)));
        }
    }

    /// Bytes `[offset, offset+len)` were acknowledged; drop them for good if
    /// they were the oldest outstanding data.
    fn on_acked(&mut self, offset: u64, len: u64) {
        if offset == self.buffer.base_offset() {
            self.buffer.advance(len);
        }
    }
}

/// The connection-level send engine state (spec §3.1 "Send engine state").
pub struct SendEngine {
    settings: Settings,
    next_packet_number: [u64; 3],
    last_flush_time: Option<Timestamp>,
    tail_loss_probe_needed: bool,
    delayed_ack_timer: quic_core::time::Timer,
    delayed_ack_timer_active: bool,
    flush_operation_pending: bool,
    conn_send_flags: ConnectionSendFlags,
    logs: [SentPacketLog; 3],
    max_data: ReceiveWindow,
    peer_max_data: SendWindow,
    /// Cumulative streams we've told the peer it may open: `[bidi, uni]`.
    max_streams: [ReceiveWindow; 2],
    /// The peer's most recently granted stream limit for us: `[bidi, uni]`.
    peer_max_streams: [u64; 2],
    crypto: [CryptoSend; 3],
    ack_ranges: [AckRanges; 3],
    close_error_code: VarInt,
    close_reason: &'static str,
    initial_token: Vec<u8>,
    consecutive_transient_failures: u8,
    is_closed: bool,
}

/// A transient datapath failure is retried up to this many times before the
/// connection gives up and terminates (spec §4.1.6).
const MAX_TRANSIENT_RETRIES: u8 = 5;

impl SendEngine {
    pub fn initialize(initial_token: Vec<u8>) -> Self {
        let settings = Settings::default();
        Self::with_settings(settings, initial_token)
    }

    fn with_settings(settings: Settings, initial_token: Vec<u8>) -> Self {
        let make_log = |space: PacketNumberSpace| {
            SentPacketLog::new(space, settings.initial_rtt, settings.max_datagram_size)
        };
        Self {
            next_packet_number: [0; 3],
            last_flush_time: None,
            tail_loss_probe_needed: false,
            delayed_ack_timer: quic_core::time::Timer::default(),
            delayed_ack_timer_active: false,
            flush_operation_pending: false,
            conn_send_flags: ConnectionSendFlags::empty(),
            logs: [
                make_log(PacketNumberSpace::Initial),
                make_log(PacketNumberSpace::Handshake),
                make_log(PacketNumberSpace::ApplicationData),
            ],
            max_data: ReceiveWindow::new(settings.initial_max_data),
            peer_max_data: SendWindow::new(settings.initial_peer_max_data),
            max_streams: [
                ReceiveWindow::new(settings.initial_max_streams_bidi),
                ReceiveWindow::new(settings.initial_max_streams_uni),
            ],
            peer_max_streams: [settings.initial_peer_max_streams_bidi, settings.initial_peer_max_streams_uni],
            crypto: Default::default(),
            ack_ranges: Default::default(),
            close_error_code: VarInt::ZERO,
            close_reason: "",
            initial_token,
            consecutive_transient_failures: 0,
            is_closed: false,
            settings,
        }
    }

    /// Applies transport-parameter-derived settings once the handshake
    /// supplies the peer's values (spec §4.1.1 `apply_settings`).
    pub fn apply_settings(&mut self, settings: Settings) {
        self.peer_max_data.on_peer_max_data(settings.initial_peer_max_data);
        self.peer_max_streams[0] = self.peer_max_streams[0].max(settings.initial_peer_max_streams_bidi);
        self.peer_max_streams[1] = self.peer_max_streams[1].max(settings.initial_peer_max_streams_uni);
        self.settings = settings;
    }

    pub fn set_send_flag(&mut self, flag: u32) {
        self.conn_send_flags.set(flag);
    }

    pub fn clear_send_flag(&mut self, flag: u32) {
        self.conn_send_flags.clear(flag);
    }

    pub fn send_flags(&self) -> ConnectionSendFlags {
        self.conn_send_flags
    }

    pub fn set_stream_send_flag(&mut self, streams: &mut StreamSet, id: StreamId, flag: u32) {
        if let Some(stream) = streams.get_mut(id) {
            stream.set_send_flag(flag);
        }
        streams.schedule(id);
    }

    pub fn clear_stream_send_flag(&mut self, streams: &mut StreamSet, id: StreamId, flag: u32) {
        if let Some(stream) = streams.get_mut(id) {
            stream.clear_send_flag(flag);
        }
    }

    /// Queues handshake bytes produced by the TLS bridge for `space` (spec
    /// §4.4.2); the bytes are appended, never overwritten, so a later
    /// retransmit can still find them by absolute offset.
    pub fn queue_crypto_data(&mut self, space: PacketNumberSpace, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.crypto[space.index()].queue(data);
        self.conn_send_flags.set(ConnectionSendFlags::CRYPTO);
    }

    fn any_crypto_pending(&self) -> bool {
        self.crypto.iter().any(CryptoSend::is_pending)
    }

    fn any_ack_pending(&self) -> bool {
        self.ack_ranges.iter().any(AckRanges::is_dirty)
    }

    /// A packet decrypted successfully in `space`; feeds the range tracker
    /// that backs this connection's outgoing ACK frames and, if the packet
    /// was ack-eliciting, arms the delayed ACK timer (spec §4.1.1).
    pub fn on_packet_received(&mut self, space: PacketNumberSpace, packet_number: u64, now: Timestamp, ack_eliciting: bool) {
        self.ack_ranges[space.index()].on_packet_received(packet_number, now);
        if ack_eliciting {
            self.start_delayed_ack_timer(now);
        }
    }

    /// Marks a flush as wanted; the next `process_flush(_, immediate=false)`
    /// call still decides whether now is actually the time to send (spec
    /// §4.1.1: repeated requests before the next flush coalesce into one).
    pub fn queue_flush(&mut self, _reason: FlushReason) {
        self.flush_operation_pending = true;
    }

    pub fn is_flush_pending(&self) -> bool {
        self.flush_operation_pending
    }

    /// Arms the delayed ACK timer (spec §4.1.1 `start_delayed_ack_timer`),
    /// RFC 9000 §13.2.1's recommended maximum of 25ms.
    pub fn start_delayed_ack_timer(&mut self, now: Timestamp) {
        if self.delayed_ack_timer_active {
            return;
        }
        self.delayed_ack_timer_active = true;
        self.delayed_ack_timer.set(now + self.settings.max_ack_delay);
    }

    /// Polls the delayed ACK timer; if it just expired, arms the ACK send
    /// flag and clears the timer (spec §4.1.1 `process_delayed_ack_timer`).
    pub fn process_delayed_ack_timer(&mut self, now: Timestamp) {
        if self.delayed_ack_timer.poll_expiration(now) {
            self.delayed_ack_timer_active = false;
            self.set_send_flag(ConnectionSendFlags::ACK);
            self.queue_flush(FlushReason::DelayedAckTimer);
        }
    }

    /// A PMTUD probe was acknowledged; clears the probe-in-flight marker so
    /// the next `process_flush` can narrow the search further (spec §4.1.1
    /// `on_mtu_probe_acked`).
    pub fn on_mtu_probe_acked(&mut self, path: &mut Path, probed_size: u16) {
        path.mtu.on_probe_acked(probed_size, &mut self.conn_send_flags);
    }

    /// A PATH_CHALLENGE arrived from the peer: queue the mirrored response
    /// (spec §4.1.5).
    pub fn on_path_challenge_received(&mut self, path: &mut Path, data: [u8; 8]) {
        path.validator.on_challenge_received(data, &mut self.conn_send_flags);
        self.queue_flush(FlushReason::PathValidation);
    }

    /// A PATH_RESPONSE arrived; `true` if it validated the path.
    pub fn on_path_response_received(&mut self, path: &mut Path, data: [u8; 8]) -> bool {
        path.validator.on_response_received(data)
    }

    /// A NEW_CONNECTION_ID arrived from the peer (spec §4.1.5).
    pub fn on_new_connection_id(
        &mut self,
        path: &mut Path,
        sequence_number: u64,
        retire_prior_to: u64,
        id: quic_core::connection_id::ConnectionId,
    ) {
        path.on_new_connection_id(sequence_number, retire_prior_to, id, &mut self.conn_send_flags);
    }

    /// A MAX_DATA frame raised how much we're allowed to send (spec
    /// §4.1.4).
    pub fn on_peer_max_data(&mut self, maximum_data: u64) {
        self.peer_max_data.on_peer_max_data(maximum_data);
    }

    /// A MAX_STREAMS frame raised how many streams of `stream_type` we may
    /// open.
    pub fn on_peer_max_streams(&mut self, stream_type: StreamType, maximum_streams: u64) {
        let idx = stream_type as usize & 1;
        self.peer_max_streams[idx] = self.peer_max_streams[idx].max(maximum_streams);
    }

    pub fn peer_max_streams(&self, stream_type: StreamType) -> u64 {
        self.peer_max_streams[stream_type as usize & 1]
    }

    /// The peer told us it's blocked on our connection-level flow control
    /// limit; re-advertise it immediately rather than waiting for the usual
    /// half-window trigger (spec §4.1.4).
    pub fn on_peer_data_blocked(&mut self) {
        self.conn_send_flags.set(ConnectionSendFlags::MAX_DATA);
    }

    /// The peer told us it's blocked on our stream-count limit for
    /// `stream_type`; re-advertise it immediately.
    pub fn on_peer_streams_blocked(&mut self, stream_type: StreamType) {
        self.conn_send_flags.set(match stream_type {
            StreamType::Bidirectional => ConnectionSendFlags::MAX_STREAMS_BIDI,
            StreamType::Unidirectional => ConnectionSendFlags::MAX_STREAMS_UNI,
        });
    }

    /// The handshake is confirmed (spec §4.1.6): the peer's `max_ack_delay`
    /// now applies to every space's RTT sampling.
    pub fn on_handshake_confirmed(&mut self) {
        for log in &mut self.logs {
            log.on_handshake_confirmed();
        }
    }

    fn log_for(&mut self, space: PacketNumberSpace) -> &mut SentPacketLog {
        &mut self.logs[space.index()]
    }

    fn next_packet_number(&mut self, space: PacketNumberSpace) -> PacketNumber {
        let value = self.next_packet_number[space.index()];
        self.next_packet_number[space.index()] += 1;
        PacketNumber::new(space, value)
    }

    /// Handles an ACK frame's decoded ranges for the packet number space it
    /// arrived in: folds RTT/congestion updates, frees acknowledged
    /// CRYPTO/STREAM data, and reschedules whatever was declared lost
    /// (spec §4.1.3).
    pub fn on_ack_frame(
        &mut self,
        space: PacketNumberSpace,
        streams: &mut StreamSet,
        ranges: &[core::ops::RangeInclusive<u64>],
        ack_delay: core::time::Duration,
        now: Timestamp,
    ) {
        let outcome = self.log_for(space).on_ack_ranges(ranges, ack_delay, now);

        for sent in &outcome.newly_acked {
            for record in &sent.frames {
                match record {
                    SentFrameRecord::Crypto { space, offset, len } => self.crypto[space.index()].on_acked(*offset, *len),
                    SentFrameRecord::Stream { id, offset, len } => {
                        if let Some(stream) = streams.get_mut(*id) {
                            stream.on_acked(*offset, *len);
                        }
                    }
                }
            }
        }

        for sent in &outcome.newly_lost {
            for record in &sent.frames {
                match record {
                    SentFrameRecord::Crypto { space, offset, .. } => {
                        self.crypto[space.index()].on_loss(*offset);
                        self.conn_send_flags.set(ConnectionSendFlags::CRYPTO);
                    }
                    SentFrameRecord::Stream { id, offset, .. } => {
                        if let Some(stream) = streams.get_mut(*id) {
                            stream.on_loss(*offset);
                        }
                        streams.reschedule_if_pending(*id);
                    }
                }
            }
        }
    }

    /// Terminates the connection locally, clamping the send flags down to
    /// whatever CONNECTION_CLOSE/APPLICATION_CLOSE is already pending
    /// (spec §3.2 invariant 3).
    pub fn close(&mut self, is_application_error: bool, error_code: VarInt, reason: &'static str) {
        self.is_closed = true;
        self.close_error_code = error_code;
        self.close_reason = reason;
        self.conn_send_flags.mask_for_closed();
        self.conn_send_flags.set(if is_application_error {
            ConnectionSendFlags::APPLICATION_CLOSE
        } else {
            ConnectionSendFlags::CONNECTION_CLOSE
        });
    }

    /// Polls every space's PTO timer, arming a probe (PING, ack-eliciting)
    /// when one has just fired with nothing acknowledged in time (RFC 9002
    /// §6.2).
    fn poll_pto(&mut self, now: Timestamp) {
        let mut fired = false;
        for space in [PacketNumberSpace::Initial, PacketNumberSpace::Handshake, PacketNumberSpace::ApplicationData] {
            let has_in_flight = self.logs[space.index()].has_in_flight();
            if self.logs[space.index()].pto_mut().on_timeout(has_in_flight, now) {
                fired = true;
            }
        }
        if fired {
            self.tail_loss_probe_needed = true;
            self.conn_send_flags.set(ConnectionSendFlags::PING);
            self.queue_flush(FlushReason::PtoTimer);
        }
    }

    /// Runs the flush algorithm once: for every encryption level that
    /// currently has write keys and pending work, packs and seals one
    /// packet into `send_ctx`. Returns `true` if anything was sent.
    ///
    /// `immediate` bypasses the "is it worth flushing yet" pacing check
    /// (spec §4.1.1): set it for a caller-initiated write that must go out
    /// now (e.g. the application closed the connection).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(immediate)))]
    pub fn process_flush(
        &mut self,
        keys: &KeySet,
        path: &mut Path,
        streams: &mut StreamSet,
        random: &Random,
        send_ctx: &mut SendContext,
        now: Timestamp,
        immediate: bool,
    ) -> bool {
        self.flush_operation_pending = false;
        self.last_flush_time = Some(now);

        // A PTO firing this call is itself what may make `has_anything_pending`
        // true below, so it must be polled before that check (spec §4.1.3).
        self.poll_pto(now);

        path.issue_connection_id_if_needed(random, &mut self.conn_send_flags);

        if !immediate && !self.has_anything_pending(streams) {
            return false;
        }

        let mut sent_anything = false;
        for level in [EncryptionLevel::Initial, EncryptionLevel::Handshake, EncryptionLevel::OneRtt] {
            let Some(key) = keys.write.get(level).cloned() else { continue };
            let space = match level {
                EncryptionLevel::Initial => PacketNumberSpace::Initial,
                EncryptionLevel::Handshake => PacketNumberSpace::Handshake,
                EncryptionLevel::ZeroRtt | EncryptionLevel::OneRtt => PacketNumberSpace::ApplicationData,
            };
            let is_one_rtt = level == EncryptionLevel::OneRtt;
            let probe_size = if is_one_rtt { path.mtu.next_probe_size() } else { None };
            let have_connection_level_work = !self.conn_send_flags.is_empty()
                || self.any_crypto_pending()
                || self.ack_ranges[space.index()].is_dirty();
            if !is_one_rtt && !have_connection_level_work {
                continue;
            }

            let max_packet_size = probe_size.unwrap_or_else(|| path.mtu.current_mtu().min(self.settings.max_datagram_size));
            let cwnd_budget = self
                .log_for(space)
                .congestion_window()
                .saturating_sub(self.log_for(space).bytes_in_flight());
            if is_one_rtt && cwnd_budget == 0 && !self.conn_send_flags.is_set(ConnectionSendFlags::ACK) {
                // pure ACKs/CLOSE bypass congestion control; everything else waits
                continue;
            }

            let datagram = send_ctx.alloc_datagram(max_packet_size as usize);
            let packet_number = self.next_packet_number(space);
            let largest_acked = None;
            // Copied out (ConnectionId is Copy) so `path` is free to be
            // borrowed mutably by the frame-writing closure below.
            let destination_connection_id = *path.peer_connection_id();
            let header = PacketHeader {
                packet_type: PacketType::from(level),
                version: QUIC_VERSION_1,
                destination_connection_id: &destination_connection_id,
                source_connection_id: None,
                token: if level == EncryptionLevel::Initial { Some(self.initial_token.as_slice()) } else { None },
                packet_number,
                largest_acked,
            };

            let mut bytes_packed = 0u32;
            let mut ack_eliciting = false;
            let mut scratch = Vec::new();
            let mut frame_records = Vec::new();
            let mut connection_bits = self.conn_send_flags.iter_set().collect::<Vec<_>>().into_iter();
            let conn_flags = &mut self.conn_send_flags;
            let crypto = &mut self.crypto;
            let ack_ranges = &mut self.ack_ranges[space.index()];
            let max_data = &mut self.max_data;
            let peer_max_data = &self.peer_max_data;
            let max_streams = &mut self.max_streams;
            let close_error_code = self.close_error_code;
            let close_reason = self.close_reason;

            let result = close_packet(datagram, &header, &key, 1, |payload_encoder| {
                write_one_frame(
                    payload_encoder,
                    conn_flags,
                    &mut connection_bits,
                    streams,
                    path,
                    crypto,
                    ack_ranges,
                    space,
                    now,
                    max_data,
                    peer_max_data,
                    max_streams,
                    close_error_code,
                    close_reason,
                    is_one_rtt,
                    &mut scratch,
                    &mut bytes_packed,
                    &mut ack_eliciting,
                    &mut frame_records,
                )
            });

            match result {
                Some(len) => {
                    datagram.truncate(len);
                    self.log_for(space).on_packet_sent(
                        SentPacketInfo {
                            packet_number,
                            sent_time: now,
                            bytes: len as u32,
                            ack_eliciting,
                            retransmittable: ack_eliciting,
                            frames: frame_records,
                        },
                        now,
                    );
                    if self.log_for(space).pto_mut().transmissions_remaining() > 0 {
                        self.log_for(space).pto_mut().on_transmit();
                    }
                    sent_anything = true;
                    self.consecutive_transient_failures = 0;
                }
                None => {
                    // nothing fit this level this round; drop the unused allocation
                    send_ctx.discard_last();
                }
            }
        }

        if self.logs.iter_mut().all(|log| log.pto_mut().transmissions_remaining() == 0) {
            self.tail_loss_probe_needed = false;
        }

        sent_anything
    }

    fn has_anything_pending(&self, streams: &StreamSet) -> bool {
        !self.conn_send_flags.is_empty()
            || streams.has_scheduled()
            || self.tail_loss_probe_needed
            || self.any_crypto_pending()
            || self.any_ack_pending()
    }

    /// Called after a datapath send reports a transient error
    /// (`NO_BUFFERS`/`UNREACHABLE`): restores the flags that were cleared
    /// for the dropped attempt and requeues a flush, or gives up after
    /// repeated failures (spec §4.1.6).
    pub fn on_transient_send_failure(&mut self, restored_flags: ConnectionSendFlags) -> Result<(), Error> {
        self.consecutive_transient_failures += 1;
        if self.consecutive_transient_failures >= MAX_TRANSIENT_RETRIES {
            return Err(Error::InternalError("datapath send failed after repeated retries"));
        }
        self.conn_send_flags.set(restored_flags.iter_set().fold(0, |acc, f| acc | f));
        self.queue_flush(FlushReason::LossTimer);
        Ok(())
    }
}

/// Writes the next eligible frame into `payload_encoder` and returns
/// whether the caller should try again (more frames may still fit). Walks
/// connection-level flags in bit order first (spec §4.1.2's "frame order =
/// send-flag bit order"), then drains one stream's pending work per call
/// once the connection-level queue is empty.
#[allow(clippy::too_many_arguments)]
fn write_one_frame(
    payload_encoder: &mut EncoderBuffer<'_>,
    conn_flags: &mut ConnectionSendFlags,
    connection_bits: &mut std::vec::IntoIter<u32>,
    streams: &mut StreamSet,
    path: &mut Path,
    crypto: &mut [CryptoSend; 3],
    ack_ranges: &mut AckRanges,
    space: PacketNumberSpace,
    now: Timestamp,
    max_data: &mut ReceiveWindow,
    peer_max_data: &SendWindow,
    max_streams: &mut [ReceiveWindow; 2],
    close_error_code: VarInt,
    close_reason: &'static str,
    is_one_rtt: bool,
    scratch: &mut Vec<u8>,
    bytes_packed: &mut u32,
    ack_eliciting: &mut bool,
    frame_records: &mut Vec<SentFrameRecord>,
) -> bool {
    for flag in connection_bits.by_ref() {
        let before = payload_encoder.len();
        let wrote = match flag {
            f if f == ConnectionSendFlags::ACK => {
                if ack_ranges.is_empty() {
                    false
                } else {
                    let micros = ack_ranges.ack_delay(now).as_micros().min(VarInt::MAX.as_u64() as u128) as u64;
                    let ack = frame::ack::Ack {
                        ack_delay: VarInt::new(micros).unwrap_or(VarInt::ZERO),
                        ack_ranges: ack_ranges.to_frame_ranges(),
                        ecn_counts: None,
                    };
                    payload_encoder.encode(&ack);
                    ack_ranges.clear_dirty();
                    true
                }
            }
            f if f == ConnectionSendFlags::CRYPTO => {
                let idx = space.index();
                let remaining = payload_encoder.remaining_capacity();
                let mut packed_something = false;
                if remaining > 16 {
                    if let Some(offset) = crypto[idx].pack(remaining - 16, scratch) {
                        if !scratch.is_empty() {
                            let len = scratch.len() as u64;
                            let data = DecoderBufferMut::new(scratch.as_mut_slice());
                            payload_encoder.encode(&frame::crypto::Crypto { offset: VarInt::new(offset).unwrap_or(VarInt::ZERO), data });
                            *ack_eliciting = true;
                            frame_records.push(SentFrameRecord::Crypto { space, offset, len });
                            packed_something = true;
                        }
                    }
                }
                packed_something
            }
            f if f == ConnectionSendFlags::CONNECTION_CLOSE => {
                let close = frame::connection_close::ConnectionClose {
                    error_code: close_error_code,
                    frame_type: Some(VarInt::ZERO),
                    reason: if close_reason.is_empty() { None } else { Some(close_reason.as_bytes()) },
                };
                payload_encoder.encode(&close);
                true
            }
            f if f == ConnectionSendFlags::APPLICATION_CLOSE => {
                let close = frame::connection_close::ConnectionClose {
                    error_code: close_error_code,
                    frame_type: None,
                    reason: if close_reason.is_empty() { None } else { Some(close_reason.as_bytes()) },
                };
                payload_encoder.encode(&close);
                true
            }
            f if f == ConnectionSendFlags::DATA_BLOCKED => {
                payload_encoder.encode(&frame::data_blocked::DataBlocked {
                    data_limit: VarInt::new(peer_max_data.peer_max_data()).unwrap_or(VarInt::MAX),
                });
                *ack_eliciting = true;
                true
            }
            f if f == ConnectionSendFlags::MAX_DATA => {
                let maximum_data = if max_data.should_raise() { max_data.raise() } else { max_data.max_data() };
                payload_encoder.encode(&frame::max_data::MaxData { maximum_data: VarInt::new(maximum_data).unwrap_or(VarInt::MAX) });
                *ack_eliciting = true;
                true
            }
            f if f == ConnectionSendFlags::MAX_STREAMS_BIDI => {
                let window = &mut max_streams[StreamType::Bidirectional as usize & 1];
                let maximum_streams = if window.should_raise() { window.raise() } else { window.max_data() };
                payload_encoder.encode(&frame::max_streams::MaxStreams {
                    stream_type: StreamType::Bidirectional,
                    maximum_streams: VarInt::new(maximum_streams).unwrap_or(VarInt::MAX),
                });
                *ack_eliciting = true;
                true
            }
            f if f == ConnectionSendFlags::MAX_STREAMS_UNI => {
                let window = &mut max_streams[StreamType::Unidirectional as usize & 1];
                let maximum_streams = if window.should_raise() { window.raise() } else { window.max_data() };
                payload_encoder.encode(&frame::max_streams::MaxStreams {
                    stream_type: StreamType::Unidirectional,
                    maximum_streams: VarInt::new(maximum_streams).unwrap_or(VarInt::MAX),
                });
                *ack_eliciting = true;
                true
            }
            f if f == ConnectionSendFlags::NEW_CONNECTION_ID => {
                if let Some((sequence_number, id, token)) = path.take_pending_new_connection_id() {
                    payload_encoder.encode(&frame::new_connection_id::NewConnectionId {
                        sequence_number: VarInt::new(sequence_number).unwrap_or(VarInt::ZERO),
                        retire_prior_to: VarInt::ZERO,
                        connection_id: id.as_bytes(),
                        stateless_reset_token: &token,
                    });
                    *ack_eliciting = true;
                    true
                } else {
                    false
                }
            }
            f if f == ConnectionSendFlags::RETIRE_CONNECTION_ID => {
                if let Some(sequence_number) = path.take_pending_retire_connection_id() {
                    payload_encoder.encode(&frame::retire_connection_id::RetireConnectionId {
                        sequence_number: VarInt::new(sequence_number).unwrap_or(VarInt::ZERO),
                    });
                    *ack_eliciting = true;
                    true
                } else {
                    false
                }
            }
            f if f == ConnectionSendFlags::PATH_CHALLENGE => {
                if let Some(data) = path.validator.outstanding_challenge() {
                    payload_encoder.encode(&frame::path_challenge::PathChallenge { data: &data });
                    path.validator.on_challenge_sent();
                    *ack_eliciting = true;
                    true
                } else {
                    false
                }
            }
            f if f == ConnectionSendFlags::PATH_RESPONSE => {
                if let Some(data) = path.validator.take_pending_response() {
                    payload_encoder.encode(&frame::path_response::PathResponse { data: &data });
                    *ack_eliciting = true;
                    true
                } else {
                    false
                }
            }
            f if f == ConnectionSendFlags::PING => {
                payload_encoder.encode(&frame::ping::Ping);
                *ack_eliciting = true;
                true
            }
            f if f == ConnectionSendFlags::PMTUD => {
                payload_encoder.encode(&frame::ping::Ping);
                let pad_len = payload_encoder.remaining_capacity();
                payload_encoder.write_repeated(pad_len, 0);
                *ack_eliciting = true;
                true
            }
            _ => false,
        };
        if wrote {
            conn_flags.clear(flag);
            *bytes_packed += (payload_encoder.len() - before) as u32;
            return true;
        }
    }

    if is_one_rtt {
        if let Some(id) = streams.pop_scheduled() {
            if let Some(stream) = streams.get_mut(id) {
                let remaining = payload_encoder.remaining_capacity();
                if remaining > 16 {
                    let (offset, is_fin) = stream.pack(remaining - 16, scratch);
                    if !scratch.is_empty() || is_fin {
                        let len = scratch.len() as u64;
                        let data = DecoderBufferMut::new(scratch.as_mut_slice());
                        let stream_frame = frame::stream::Stream {
                            stream_id: id,
                            offset: VarInt::new(offset).unwrap_or(VarInt::ZERO),
                            is_last_frame: true,
                            is_fin,
                            data,
                        };
                        payload_encoder.encode(&stream_frame);
                        *ack_eliciting = true;
                        *bytes_packed += len as u32;
                        if len > 0 {
                            frame_records.push(SentFrameRecord::Stream { id, offset, len });
                        }
                    }
                }
            }
            streams.reschedule_if_pending(id);
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_flush_marks_pending_until_processed() {
        let mut engine = SendEngine::initialize(Vec::new());
        assert!(!engine.is_flush_pending());
        engine.queue_flush(FlushReason::ApplicationWrite);
        assert!(engine.is_flush_pending());
    }

    #[test]
    fn delayed_ack_timer_sets_the_ack_flag_on_expiry() {
        let mut engine = SendEngine::initialize(Vec::new());
        engine.start_delayed_ack_timer(Timestamp::from_micros(0));
        engine.process_delayed_ack_timer(Timestamp::from_micros(1));
        assert!(!engine.send_flags().is_set(ConnectionSendFlags::ACK));
        engine.process_delayed_ack_timer(Timestamp::from_micros(30_000));
        assert!(engine.send_flags().is_set(ConnectionSendFlags::ACK));
    }

    #[test]
    fn repeated_transient_failures_eventually_give_up() {
        let mut engine = SendEngine::initialize(Vec::new());
        for _ in 0..MAX_TRANSIENT_RETRIES - 1 {
            assert!(engine.on_transient_send_failure(ConnectionSendFlags::empty()).is_ok());
        }
        assert!(engine.on_transient_send_failure(ConnectionSendFlags::empty()).is_err());
    }

    #[test]
    fn queued_crypto_data_is_pending_until_packed() {
        let mut engine = SendEngine::initialize(Vec::new());
        assert!(!engine.any_crypto_pending());
        engine.queue_crypto_data(PacketNumberSpace::Initial, b"client hello");
        assert!(engine.any_crypto_pending());
        assert!(engine.send_flags().is_set(ConnectionSendFlags::CRYPTO));
    }

    #[test]
    fn received_packet_marks_the_ack_tracker_dirty() {
        let mut engine = SendEngine::initialize(Vec::new());
        assert!(!engine.any_ack_pending());
        engine.on_packet_received(PacketNumberSpace::ApplicationData, 0, Timestamp::from_micros(0), true);
        assert!(engine.any_ack_pending());
    }
}
