//! Capabilities the signer depends on but does not implement.
//!
//! The hash over field elements, the signature scheme, and the venue's nonce endpoint all
//! live outside this crate. Each is reached through a trait so the service can be driven by
//! real implementations in production and by the `mocks` feature in tests.

use crate::session::SecretKey;
use std::time::Duration;
use tradesign_client::Client;
use tradesign_types::{Element, TxDigest};

/// Error returned by a signing capability. Must not embed key material.
pub type CapabilityError = Box<dyn std::error::Error + Send + Sync>;

/// Deterministic, pure hash from field elements to a fixed-size digest.
pub trait MessageHasher: Send + Sync {
    fn hash(&self, elements: &[Element]) -> TxDigest;
}

/// Signs digests with a key it was constructed from.
pub trait KeyManager: Send + Sync {
    /// Returns the raw signature. Callers reject anything that is not exactly
    /// [tradesign_types::SIGNATURE_LENGTH] bytes.
    fn sign(&self, digest: &TxDigest) -> Result<Vec<u8>, CapabilityError>;
}

/// Builds a [KeyManager] from a raw private key.
pub trait KeyManagerFactory: Send + Sync {
    fn construct(&self, secret: &SecretKey) -> Result<Box<dyn KeyManager>, CapabilityError>;
}

/// Reports the next nonce the venue expects for an account's API key.
pub trait NonceSource: Send + Sync {
    fn next_nonce(
        &self,
        endpoint: &str,
        account_index: i64,
        api_key_index: u8,
    ) -> Result<i64, tradesign_client::Error>;
}

/// [NonceSource] backed by the venue's HTTP API.
#[derive(Clone, Debug)]
pub struct HttpNonceSource {
    timeout: Duration,
}

impl HttpNonceSource {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl NonceSource for HttpNonceSource {
    fn next_nonce(
        &self,
        endpoint: &str,
        account_index: i64,
        api_key_index: u8,
    ) -> Result<i64, tradesign_client::Error> {
        Client::new(endpoint, self.timeout)?.next_nonce(account_index, api_key_index)
    }
}
