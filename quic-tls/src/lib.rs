// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! The TLS-to-QUIC bridge (spec §4.4): drives a TLS 1.3 handshake over
//! rustls's native QUIC support, routes handshake bytes by epoch, exports
//! traffic secrets to [`quic_core::crypto`]'s key hierarchy, and carries the
//! QUIC transport parameters and ALPN as ordinary TLS extensions.

mod bridge;
mod config;
mod error;
mod result_flags;
mod secret_log;
mod transport_parameters;

pub use bridge::{BufferKind, ConnectionState, ExportedSecret, Tls};
pub use config::{Config, SecurityConfig, TicketCallback, TransportParametersCallback};
pub use error::Error;
pub use result_flags::ResultFlags;

/// The four independent crypto byte streams a connection exchanges over its
/// lifetime (spec §4.4.2), matching [`quic_core::crypto::EncryptionLevel`]
/// one for one.
pub use quic_core::crypto::EncryptionLevel;
