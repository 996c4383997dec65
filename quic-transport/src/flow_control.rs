// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! Connection- and stream-level flow control (spec §4.1.4).
//!
//! Both levels use the same window-tracking shape: a sender tracks how much
//! it's allowed to send and how much it has, and raises a `DATA_BLOCKED`-
//! family flag the instant it's out of room; a receiver tracks how much it
//! has received against a limit it has advertised, and raises `MAX_DATA`
//! once the peer has used half the window (spec §4.1.4: "re-advertise at
//! the half-window crossing, not at exhaustion, so the peer never actually
//! blocks in the common case").

/// One side's view of a single flow-controlled window — connection-wide
/// `MAX_DATA`/`DATA_BLOCKED` or a single stream's `MAX_STREAM_DATA`-
/// equivalent bookkeeping (spec names both fields the same way: `max_data`,
/// `peer_max_data`).
#[derive(Clone, Copy, Debug, Default)]
pub struct SendWindow {
    /// Total bytes sent so far against this window.
    sent: u64,
    /// The peer's most recently advertised limit.
    peer_max_data: u64,
}

impl SendWindow {
    pub fn new(initial_peer_max_data: u64) -> Self {
        Self { sent: 0, peer_max_data: initial_peer_max_data }
    }

    pub fn available(&self) -> u64 {
        self.peer_max_data.saturating_sub(self.sent)
    }

    pub fn is_blocked(&self) -> bool {
        self.available() == 0
    }

    /// Consumes `len` bytes of window; the caller must have already checked
    /// `available() >= len` (spec §3.2 invariant 1: "a connection or stream
    /// never sends beyond its peer-advertised flow control limit").
    pub fn consume(&mut self, len: u64) {
        debug_assert!(len <= self.available(), "sent beyond the advertised flow control window");
        self.sent = self.sent.saturating_add(len);
    }

    /// A MAX_DATA/MAX_STREAM_DATA frame raised the peer's limit. Frames that
    /// arrive out of order or are retransmitted must never lower it.
    pub fn on_peer_max_data(&mut self, new_limit: u64) {
        self.peer_max_data = self.peer_max_data.max(new_limit);
    }

    pub fn peer_max_data(&self) -> u64 {
        self.peer_max_data
    }
}

/// The receive side of a flow-controlled window: how much we've told the
/// peer it may send, and when to raise that limit.
#[derive(Clone, Copy, Debug)]
pub struct ReceiveWindow {
    received: u64,
    max_data: u64,
    /// The window size granted each time `max_data` is raised; also the
    /// trigger threshold (raise once `received` crosses half of it past the
    /// last announced value).
    window_size: u64,
}

impl ReceiveWindow {
    pub fn new(initial_window: u64) -> Self {
        Self { received: 0, max_data: initial_window, window_size: initial_window }
    }

    pub fn max_data(&self) -> u64 {
        self.max_data
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    /// Records `len` newly received bytes. Returns `Err` if the peer
    /// exceeded the advertised limit (a FLOW_CONTROL_ERROR at the caller).
    pub fn on_receive(&mut self, len: u64) -> Result<(), quic_core::transport::Error> {
        let received = self.received.saturating_add(len);
        if received > self.max_data {
            return Err(quic_core::transport::Error::FlowControlError("received beyond advertised flow control limit"));
        }
        self.received = received;
        Ok(())
    }

    /// `true` once enough of the current window has been consumed that the
    /// limit should be raised (spec §4.1.4: at the half-window crossing).
    pub fn should_raise(&self) -> bool {
        self.max_data - self.received <= self.window_size / 2
    }

    /// Raises `max_data` by one window and returns the new limit to send in
    /// a MAX_DATA/MAX_STREAM_DATA frame.
    pub fn raise(&mut self) -> u64 {
        self.max_data = self.max_data.saturating_add(self.window_size);
        self.max_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_window_tracks_available_room() {
        let mut window = SendWindow::new(100);
        assert_eq!(window.available(), 100);
        window.consume(60);
        assert_eq!(window.available(), 40);
        assert!(!window.is_blocked());
        window.consume(40);
        assert!(window.is_blocked());
    }

    #[test]
    fn peer_max_data_never_regresses() {
        let mut window = SendWindow::new(100);
        window.on_peer_max_data(50);
        assert_eq!(window.peer_max_data(), 100);
        window.on_peer_max_data(200);
        assert_eq!(window.peer_max_data(), 200);
    }

    #[test]
    fn receive_window_raises_at_half_window_crossing() {
        let mut window = ReceiveWindow::new(100);
        assert!(!window.should_raise());
        window.on_receive(49).unwrap();
        assert!(!window.should_raise());
        window.on_receive(1).unwrap();
        assert!(window.should_raise());
        assert_eq!(window.raise(), 200);
    }

    #[test]
    fn receive_window_rejects_overrun() {
        let mut window = ReceiveWindow::new(10);
        assert!(window.on_receive(11).is_err());
    }
}
