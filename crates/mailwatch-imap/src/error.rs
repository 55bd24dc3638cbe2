//! Error types for the watcher library.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while monitoring a mailbox.
///
/// Apart from configuration problems (which never reach this crate), every
/// variant ends the current session and is retried by the supervisor; there
/// is no per-variant retry policy.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// No tagged completion arrived before the per-command deadline.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// Server closed the connection without a final tagged completion.
    #[error("Unexpected end of stream while reading from server")]
    UnexpectedEof,

    /// Server answered a command with a non-OK tagged completion.
    ///
    /// Carries the full response line as the server-reported reason.
    #[error("Server returned error: {0}")]
    Status(String),

    /// Mailbox selection failed.
    #[error("Cannot examine mailbox {mailbox}: {source}")]
    Mailbox {
        /// The mailbox that could not be examined.
        mailbox: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
