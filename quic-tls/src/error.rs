// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! Bridge-internal failures and their mapping onto [`quic_core::transport::Error`]
//! (spec §4.4.7).

use core::fmt;

/// A failure raised by the bridge itself, independent of the `ERROR` bit
/// surfaced through [`crate::ResultFlags`] for handshake-protocol alerts.
#[derive(Debug)]
pub enum Error {
    /// rustls rejected the handshake; carries the raw TLS alert code so the
    /// connection can map it to `CRYPTO_ERROR 0x100 | alert`.
    Alert(u8),
    /// The peer's QUIC transport parameters extension was malformed or
    /// missing where required (spec §4.4.4). Fatal, maps to alert 0x2F
    /// (handshake_failure).
    MissingTransportParameters,
    /// No mutually supported ALPN protocol (spec §4.4.5). Fatal, maps to
    /// alert 0x78 (no_application_protocol).
    NoApplicationProtocol,
    /// rustls reported a failure constructing or driving the connection
    /// (certificate loading, config build, handshake I/O).
    Rustls(rustls::Error),
    /// A bridge-internal allocation or invariant failure (spec §4.4.7:
    /// "any bridge-internal allocation failure is fatal").
    Internal(&'static str),
}

impl Error {
    /// The 8-bit TLS alert value this failure maps to on the wire (RFC 9001
    /// §4.8's `CRYPTO_ERROR_BASE | alert`).
    pub fn alert_code(&self) -> u8 {
        match self {
            Error::Alert(alert) => *alert,
            Error::MissingTransportParameters => 0x2F,
            Error::NoApplicationProtocol => 0x78,
            Error::Rustls(rustls::Error::InvalidCertificate(_)) => 0x2A,
            Error::Rustls(_) => 0x28,
            Error::Internal(_) => 0x50,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Alert(alert) => write!(f, "peer sent TLS alert {alert:#x}"),
            Error::MissingTransportParameters => write!(f, "missing QUIC transport parameters extension"),
            Error::NoApplicationProtocol => write!(f, "no mutually supported ALPN protocol"),
            Error::Rustls(err) => write!(f, "rustls error: {err}"),
            Error::Internal(reason) => write!(f, "tls bridge internal error: {reason}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl From<rustls::Error> for Error {
    fn from(err: rustls::Error) -> Self {
        match err {
            rustls::Error::NoApplicationProtocol => Error::NoApplicationProtocol,
            rustls::Error::AlertReceived(alert) => Error::Alert(u8::from(alert)),
            other => Error::Rustls(other),
        }
    }
}

impl From<Error> for quic_core::transport::Error {
    fn from(err: Error) -> Self {
        quic_core::transport::Error::CryptoError { alert: err.alert_code(), reason: "tls handshake failed" }
    }
}
