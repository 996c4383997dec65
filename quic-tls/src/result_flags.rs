// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! The bitwise-OR result of `tls_process_data` (spec §4.4.1). Hand-rolled
//! rather than pulled in from a flags crate: a `u16` and nine named bits is
//! all this ever needs to be.

use core::ops::{BitOr, BitOrAssign};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResultFlags(u16);

impl ResultFlags {
    /// The handshake step could not complete synchronously; the caller
    /// schedules a continuation and the connection suspends (spec §5
    /// "the TLS bridge suspends ... on explicit PENDING").
    pub const PENDING: Self = Self(1 << 0);
    /// Handshake bytes were produced into `state.buffer`.
    pub const DATA: Self = Self(1 << 1);
    /// `state.read_keys[level]` was populated with a freshly exported secret.
    pub const READ_KEY_UPDATED: Self = Self(1 << 2);
    /// `state.write_keys[level]` was populated with a freshly exported secret.
    pub const WRITE_KEY_UPDATED: Self = Self(1 << 3);
    /// The handshake has finished on this side.
    pub const COMPLETE: Self = Self(1 << 4);
    /// 0-RTT data offered by the client was accepted.
    pub const EARLY_DATA_ACCEPT: Self = Self(1 << 5);
    /// 0-RTT data offered by the client was rejected.
    pub const EARLY_DATA_REJECT: Self = Self(1 << 6);
    /// A new session ticket is available via the ticket callback.
    pub const TICKET: Self = Self(1 << 7);
    /// The handshake failed; `state.alert_code` carries the TLS alert.
    pub const ERROR: Self = Self(1 << 8);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for ResultFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ResultFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine_and_report_containment() {
        let flags = ResultFlags::DATA | ResultFlags::COMPLETE;
        assert!(flags.contains(ResultFlags::DATA));
        assert!(flags.contains(ResultFlags::COMPLETE));
        assert!(!flags.contains(ResultFlags::ERROR));
        assert!(!flags.contains(ResultFlags::PENDING | ResultFlags::DATA));
    }

    #[test]
    fn empty_has_no_bits() {
        assert!(ResultFlags::empty().is_empty());
        assert!(!ResultFlags::DATA.is_empty());
    }
}
