// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

/// Whether receiving this frame obligates the peer to send an ACK
/// eventually (RFC 9000 §13.2.1). PADDING, ACK, and CONNECTION_CLOSE do not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckElicitation {
    Eliciting,
    NonEliciting,
}

impl AckElicitation {
    pub fn is_ack_eliciting(self) -> bool {
        self == AckElicitation::Eliciting
    }
}

pub trait AckElicitable {
    fn ack_elicitation(&self) -> AckElicitation;
}
