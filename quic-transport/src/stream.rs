// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! Per-stream state and the send-schedule the flush algorithm walks (spec
//! §3.1 `Stream`, §4.1.1, §4.1.4).
//!
//! REDESIGN: the source keeps pending streams on an intrusive list threaded
//! through each stream's own allocation, so scheduling a stream costs no
//! allocation and removal is O(1) from any point in the list. That shape
//! needs the `intrusive-collections` crate's unsafe pinned-node API, and
//! nothing in this workspace's retrieved sources shows the concrete
//! `intrusive_adapter!`/`LinkedList` usage to ground it on. A connection
//! here instead keeps streams in a `HashMap<StreamId, Stream>` and schedules
//! flushes through a plain `Vec<StreamId>` FIFO — O(n) removal instead of
//! O(1), fine at the per-connection stream counts this crate targets.

use crate::flow_control::{ReceiveWindow, SendWindow};
use crate::send_flags::StreamSendFlags;
use quic_core::stream_id::StreamId;
use std::collections::{HashMap, VecDeque};

/// Data queued by the application for this stream but not yet packed into
/// a STREAM frame.
#[derive(Debug, Default)]
pub struct SendBuffer {
    chunks: VecDeque<u8>,
    /// Absolute offset of the first byte still in `chunks`.
    base_offset: u64,
}

impl SendBuffer {
    pub fn push(&mut self, data: &[u8]) {
        self.chunks.extend(data.iter().copied());
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Copies up to `max_len` bytes starting at absolute `offset` into
    /// `scratch`, without removing them (removal happens only once the
    /// bytes are acknowledged, via [`Self::advance`]). `offset` may be
    /// anywhere at or past `base_offset` — this is what lets a retransmit
    /// re-read bytes the stream already packed once.
    pub fn read_at(&self, offset: u64, max_len: usize, scratch: &mut Vec<u8>) -> usize {
        scratch.clear();
        let start = offset.saturating_sub(self.base_offset) as usize;
        if start >= self.chunks.len() {
            return 0;
        }
        let len = max_len.min(self.chunks.len() - start);
        scratch.extend(self.chunks.iter().skip(start).take(len));
        len
    }

    /// Drops `len` acknowledged bytes from the front of the buffer.
    pub fn advance(&mut self, len: u64) {
        let len = len.min(self.chunks.len() as u64) as usize;
        self.chunks.drain(..len);
        self.base_offset += len as u64;
    }
}

/// One stream's full state: the send side the flush algorithm packs frames
/// from, and the receive side that drives MAX_STREAM_DATA issuance.
#[derive(Debug)]
pub struct Stream {
    id: StreamId,
    send_flags: StreamSendFlags,
    send_window: SendWindow,
    send_buffer: SendBuffer,
    /// High-water mark: offset of the first byte never yet packed into a
    /// STREAM frame (sent or not, data below this may still be unacked).
    send_offset: u64,
    /// Lowest offset a loss signal says must be re-packed; `None` means
    /// nothing outstanding is known lost.
    retransmit_from: Option<u64>,
    fin_offset: Option<u64>,
    recv_window: ReceiveWindow,
    reset_error_code: Option<u64>,
    stop_sending_error_code: Option<u64>,
    /// Set once a RESET_STREAM arrives from the peer (spec §4.1.4's
    /// receive-side counterpart to `reset_error_code`, which is ours).
    peer_reset_error_code: Option<u64>,
}

impl Stream {
    pub fn new(id: StreamId, initial_peer_max_stream_data: u64, initial_local_window: u64) -> Self {
        Self {
            id,
            send_flags: StreamSendFlags::empty(),
            send_window: SendWindow::new(initial_peer_max_stream_data),
            send_buffer: SendBuffer::default(),
            send_offset: 0,
            retransmit_from: None,
            fin_offset: None,
            recv_window: ReceiveWindow::new(initial_local_window),
            reset_error_code: None,
            stop_sending_error_code: None,
            peer_reset_error_code: None,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn send_flags(&self) -> StreamSendFlags {
        self.send_flags
    }

    pub fn set_send_flag(&mut self, flag: u32) {
        self.send_flags.set(flag);
    }

    pub fn clear_send_flag(&mut self, flag: u32) {
        self.send_flags.clear(flag);
    }

    pub fn send_window(&self) -> &SendWindow {
        &self.send_window
    }

    pub fn send_window_mut(&mut self) -> &mut SendWindow {
        &mut self.send_window
    }

    pub fn recv_window(&mut self) -> &mut ReceiveWindow {
        &mut self.recv_window
    }

    pub fn on_peer_reset(&mut self, error_code: u64) {
        self.peer_reset_error_code = Some(error_code);
    }

    pub fn peer_reset_error_code(&self) -> Option<u64> {
        self.peer_reset_error_code
    }

    /// Queues application data for send, raising `DATA` and, on the first
    /// call for a stream the peer doesn't yet know about, `OPEN`.
    pub fn queue_data(&mut self, data: &[u8], is_first_write: bool) {
        self.send_buffer.push(data);
        self.set_send_flag(StreamSendFlags::DATA);
        if is_first_write {
            self.set_send_flag(StreamSendFlags::OPEN);
        }
    }

    pub fn queue_fin(&mut self) {
        self.fin_offset = Some(self.send_offset + self.send_buffer.len() as u64);
        self.set_send_flag(StreamSendFlags::FIN);
    }

    pub fn queue_reset(&mut self, error_code: u64) {
        self.reset_error_code = Some(error_code);
        self.set_send_flag(StreamSendFlags::SEND_ABORT);
    }

    pub fn queue_stop_sending(&mut self, error_code: u64) {
        self.stop_sending_error_code = Some(error_code);
        self.set_send_flag(StreamSendFlags::RECV_ABORT);
    }

    pub fn reset_error_code(&self) -> Option<u64> {
        self.reset_error_code
    }

    pub fn stop_sending_error_code(&self) -> Option<u64> {
        self.stop_sending_error_code
    }

    pub fn send_offset(&self) -> u64 {
        self.send_offset
    }

    pub fn fin_offset(&self) -> Option<u64> {
        self.fin_offset
    }

    /// Packs up to `max_len` bytes into `scratch`, returning the offset of
    /// the first byte and whether this packs the FIN. Reads from
    /// `retransmit_from` first if a loss left a gap behind the high-water
    /// mark — bytes already paid for out of the flow control window aren't
    /// charged against it twice.
    pub fn pack(&mut self, max_len: usize, scratch: &mut Vec<u8>) -> (u64, bool) {
        let offset = self.retransmit_from.take().unwrap_or(self.send_offset);
        let old_send_offset = self.send_offset;
        let already_paid_for = old_send_offset.saturating_sub(offset);
        let budget = max_len.min((already_paid_for + self.send_window.available()) as usize);

        let packed = self.send_buffer.read_at(offset, budget, scratch);
        let new_high_water = offset + packed as u64;
        if new_high_water > old_send_offset {
            self.send_window.consume(new_high_water - old_send_offset);
            self.send_offset = new_high_water;
        }
        if new_high_water < old_send_offset {
            self.retransmit_from = Some(new_high_water);
        }

        let is_fin = self.fin_offset == Some(new_high_water);
        let buffer_end = self.send_buffer.base_offset() + self.send_buffer.len() as u64;
        if self.retransmit_from.is_none() && new_high_water == buffer_end && !is_fin {
            self.clear_send_flag(StreamSendFlags::DATA);
        }
        if self.send_window.is_blocked() {
            self.set_send_flag(StreamSendFlags::DATA_BLOCKED);
        }
        (offset, is_fin)
    }

    /// A packet carrying bytes `[offset, offset+len)` of this stream was
    /// declared lost: rewind so the next `pack()` resends them (spec
    /// §4.1.3 retransmission).
    pub fn on_loss(&mut self, offset: u64) {
        if offset < self.send_offset {
            self.retransmit_from = Some(self.retransmit_from.map_or(offset, |r| r.min(offset)));
            self.set_send_flag(StreamSendFlags::DATA);
        }
    }

    /// A packet carrying bytes `[offset, offset+len)` of this stream was
    /// acknowledged: if it was the oldest unacked data, drop it from the
    /// send buffer for good.
    pub fn on_acked(&mut self, offset: u64, len: u64) {
        if offset == self.send_buffer.base_offset() {
            self.send_buffer.advance(len);
        }
    }

    pub fn has_pending_send(&self) -> bool {
        !self.send_flags.is_empty()
    }
}

/// Streams keyed by ID plus a FIFO of IDs with pending send work. Membership
/// in the queue and the `has_pending_send()` flag state are kept in sync by
/// every mutator below — spec §3.2 invariant 5: "a stream's presence on the
/// schedule always matches whether it has at least one set send flag".
#[derive(Debug, Default)]
pub struct StreamSet {
    streams: HashMap<StreamId, Stream>,
    schedule: VecDeque<StreamId>,
    scheduled: std::collections::HashSet<StreamId>,
}

impl StreamSet {
    pub fn insert(&mut self, stream: Stream) {
        let id = stream.id();
        self.streams.insert(id, stream);
    }

    pub fn get_mut(&mut self, id: StreamId) -> Option<&mut Stream> {
        self.streams.get_mut(&id)
    }

    pub fn remove(&mut self, id: StreamId) {
        self.streams.remove(&id);
        self.scheduled.remove(&id);
        self.schedule.retain(|scheduled_id| *scheduled_id != id);
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Schedules `id` for a flush if it isn't already queued.
    pub fn schedule(&mut self, id: StreamId) {
        if self.scheduled.insert(id) {
            self.schedule.push_back(id);
        }
    }

    /// Pops the next scheduled stream, re-enqueuing it at the back if it
    /// still has pending send flags after the caller packs it (round-robin
    /// fairness across streams within one flush).
    pub fn pop_scheduled(&mut self) -> Option<StreamId> {
        let id = self.schedule.pop_front()?;
        self.scheduled.remove(&id);
        Some(id)
    }

    pub fn reschedule_if_pending(&mut self, id: StreamId) {
        if let Some(stream) = self.streams.get(&id) {
            if stream.has_pending_send() {
                self.schedule(id);
            }
        }
    }

    pub fn has_scheduled(&self) -> bool {
        !self.schedule.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quic_core::endpoint::EndpointType;
    use quic_core::stream_id::StreamType;

    fn id(n: u64) -> StreamId {
        StreamId::nth(EndpointType::Client, StreamType::Bidirectional, n).unwrap()
    }

    #[test]
    fn queue_then_pack_consumes_the_send_window() {
        let mut stream = Stream::new(id(0), 10, 100);
        stream.queue_data(b"hello world", true);
        let mut scratch = Vec::new();
        let (offset, is_fin) = stream.pack(20, &mut scratch);
        assert_eq!(offset, 0);
        assert!(!is_fin);
        assert_eq!(scratch.len(), 10, "capped by the 10-byte peer flow control window");
        assert!(stream.send_flags().is_set(StreamSendFlags::DATA_BLOCKED));
    }

    #[test]
    fn fin_is_reported_once_the_buffer_drains_past_it() {
        let mut stream = Stream::new(id(0), 100, 100);
        stream.queue_data(b"bye", true);
        stream.queue_fin();
        let mut scratch = Vec::new();
        let (_, is_fin) = stream.pack(100, &mut scratch);
        assert!(is_fin);
    }

    #[test]
    fn stream_set_schedule_round_trips() {
        let mut set = StreamSet::default();
        let a = id(0);
        set.insert(Stream::new(a, 100, 100));
        set.schedule(a);
        set.schedule(a);
        assert_eq!(set.pop_scheduled(), Some(a));
        assert_eq!(set.pop_scheduled(), None);
    }

    #[test]
    fn remove_clears_schedule_membership() {
        let mut set = StreamSet::default();
        let a = id(0);
        set.insert(Stream::new(a, 100, 100));
        set.schedule(a);
        set.remove(a);
        assert_eq!(set.pop_scheduled(), None);
    }
}
