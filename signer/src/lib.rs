//! Signing sessions for venue trade instructions.
//!
//! A [SigningService] owns every [session::Session] (one per private key), tracks each
//! session's nonce, and signs create-order, cancel-order, and auth-token messages. The
//! [Boundary] wraps the service for embedding applications that need a single failure
//! sentinel instead of typed errors.

use std::{fmt, time::Duration};
use thiserror::Error;
use tradesign_types::{FieldError, SIGNATURE_LENGTH};

pub mod boundary;
pub mod capability;
pub mod config;
pub mod defaults;
pub mod metrics;
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
pub mod nonce;
pub mod registry;
pub mod service;
pub mod session;

pub use boundary::Boundary;
pub use capability::{
    CapabilityError, HttpNonceSource, KeyManager, KeyManagerFactory, MessageHasher, NonceSource,
};
pub use config::{Config, ConfigError, ValidatedConfig};
pub use nonce::{NonceCounter, NonceError};
pub use registry::{SessionId, SessionRegistry};
pub use service::{SignedTransaction, SigningService};
pub use session::{Account, SecretKey};

/// Coarse classification of every [Error], matching what an embedding application can act on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input: key encoding, session handle, argument range, buffer size.
    Input,
    /// Nonce mismatch or floor violation.
    State,
    /// Initial nonce fetch failed.
    Network,
    /// Key manager construction, signing, or signature length failure.
    Crypto,
    /// Anything unanticipated, including panics caught at the boundary.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Input => "input",
            ErrorKind::State => "state",
            ErrorKind::Network => "network",
            ErrorKind::Crypto => "crypto",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Error type for signer operations.
///
/// No variant carries key material, so every error is safe to log.
#[derive(Error, Debug)]
pub enum Error {
    #[error("error decoding private key")]
    InvalidPrivateKey,
    #[error("wrong session index: {0}")]
    UnknownSession(i64),
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
    #[error("{name} buffer has length {got} (expected {expected})")]
    BufferLength {
        name: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("deadline should be within {} hours", .max.as_secs() / 3600)]
    DeadlineTooFar { deadline: i64, max: Duration },
    #[error("nonce mismatch: session expects {expected}, got {got}")]
    NonceMismatch { expected: i64, got: i64 },
    #[error(transparent)]
    Nonce(#[from] NonceError),
    #[error("error getting next nonce: {0}")]
    Network(#[from] tradesign_client::Error),
    #[error("error creating key manager: {0}")]
    KeyManager(#[source] CapabilityError),
    #[error("error signing transaction: {0}")]
    Signing(#[source] CapabilityError),
    #[error("invalid signature length: expected {expected}, got {0}", expected = SIGNATURE_LENGTH)]
    SignatureLength(usize),
    #[error("error encoding message: {0}")]
    Encoding(#[from] FieldError),
    #[error("internal fault: {0}")]
    Internal(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidPrivateKey
            | Error::UnknownSession(_)
            | Error::OutOfRange { .. }
            | Error::BufferLength { .. }
            | Error::DeadlineTooFar { .. } => ErrorKind::Input,
            Error::NonceMismatch { .. } | Error::Nonce(_) => ErrorKind::State,
            Error::Network(_) => ErrorKind::Network,
            Error::KeyManager(_) | Error::Signing(_) | Error::SignatureLength(_) => {
                ErrorKind::Crypto
            }
            Error::Encoding(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for signer operations.
pub type Result<T> = std::result::Result<T, Error>;
