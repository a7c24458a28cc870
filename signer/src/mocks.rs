//! Deterministic capabilities for exercising the signer without a venue or a real signature
//! scheme.

use crate::{
    capability::{CapabilityError, KeyManager, KeyManagerFactory, MessageHasher, NonceSource},
    session::SecretKey,
};
use commonware_cryptography::{Hasher, Sha256};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::Duration,
};
use tradesign_types::{Element, TxDigest, DIGEST_LENGTH, SIGNATURE_LENGTH};

/// Hashes the little-endian bytes of each element with SHA-256, then stretches the result to
/// [DIGEST_LENGTH] bytes with a second SHA-256 pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Hasher;

impl MessageHasher for Sha256Hasher {
    fn hash(&self, elements: &[Element]) -> TxDigest {
        let mut hasher = Sha256::new();
        for element in elements {
            hasher.update(&element.to_le_bytes());
        }
        let first = hasher.finalize();
        let second = Sha256::hash(first.as_ref());

        let mut digest = [0u8; DIGEST_LENGTH];
        let split = first.as_ref().len();
        digest[..split].copy_from_slice(first.as_ref());
        digest[split..].copy_from_slice(&second.as_ref()[..DIGEST_LENGTH - split]);
        digest
    }
}

/// Signs by hashing its seed together with the digest. Output length is configurable so
/// tests can feed malformed signatures to the service.
#[derive(Clone, Debug)]
pub struct MockKeyManager {
    seed: Vec<u8>,
    signature_length: usize,
    fail: bool,
}

impl MockKeyManager {
    pub fn new(seed: &[u8]) -> Self {
        Self {
            seed: seed.to_vec(),
            signature_length: SIGNATURE_LENGTH,
            fail: false,
        }
    }
}

impl KeyManager for MockKeyManager {
    fn sign(&self, digest: &TxDigest) -> Result<Vec<u8>, CapabilityError> {
        if self.fail {
            return Err("mock signer refused".into());
        }
        let mut signature = Vec::with_capacity(self.signature_length);
        let mut counter = 0u8;
        while signature.len() < self.signature_length {
            let mut hasher = Sha256::new();
            hasher.update(&self.seed);
            hasher.update(digest);
            hasher.update(&[counter]);
            signature.extend_from_slice(hasher.finalize().as_ref());
            counter = counter.wrapping_add(1);
        }
        signature.truncate(self.signature_length);
        Ok(signature)
    }
}

/// Builds [MockKeyManager]s seeded with the session's key.
#[derive(Clone, Debug)]
pub struct MockKeyManagerFactory {
    fail_construct: bool,
    fail_sign: bool,
    signature_length: usize,
    constructed: Arc<AtomicUsize>,
}

impl Default for MockKeyManagerFactory {
    fn default() -> Self {
        Self {
            fail_construct: false,
            fail_sign: false,
            signature_length: SIGNATURE_LENGTH,
            constructed: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockKeyManagerFactory {
    pub fn fail_construct(mut self, fail: bool) -> Self {
        self.fail_construct = fail;
        self
    }

    pub fn fail_sign(mut self, fail: bool) -> Self {
        self.fail_sign = fail;
        self
    }

    pub fn signature_length(mut self, length: usize) -> Self {
        self.signature_length = length;
        self
    }

    /// Number of key managers successfully constructed.
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }
}

impl KeyManagerFactory for MockKeyManagerFactory {
    fn construct(&self, secret: &SecretKey) -> Result<Box<dyn KeyManager>, CapabilityError> {
        if self.fail_construct {
            return Err("mock key rejected".into());
        }
        self.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockKeyManager {
            seed: secret.as_bytes().to_vec(),
            signature_length: self.signature_length,
            fail: self.fail_sign,
        }))
    }
}

/// Builds key managers that panic when asked to sign.
#[derive(Clone, Copy, Debug, Default)]
pub struct PanickingKeyManagerFactory;

struct PanickingKeyManager;

impl KeyManager for PanickingKeyManager {
    fn sign(&self, _: &TxDigest) -> Result<Vec<u8>, CapabilityError> {
        panic!("signing device crashed");
    }
}

impl KeyManagerFactory for PanickingKeyManagerFactory {
    fn construct(&self, _: &SecretKey) -> Result<Box<dyn KeyManager>, CapabilityError> {
        Ok(Box::new(PanickingKeyManager))
    }
}

#[derive(Debug)]
struct NonceScript {
    queue: VecDeque<Result<i64, tradesign_client::Error>>,
    default: i64,
    delay: Option<Duration>,
}

/// Nonce source that replays scripted results, falling back to a fixed nonce.
///
/// Clones share the same script and call counter.
#[derive(Clone, Debug)]
pub struct MockNonceSource {
    script: Arc<Mutex<NonceScript>>,
    calls: Arc<AtomicUsize>,
}

impl MockNonceSource {
    pub fn new(default: i64) -> Self {
        Self {
            script: Arc::new(Mutex::new(NonceScript {
                queue: VecDeque::new(),
                default,
                delay: None,
            })),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn script(&self) -> MutexGuard<'_, NonceScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep before answering each request.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.script().delay = Some(delay);
        self
    }

    /// Answer the next unscripted request with `nonce`.
    pub fn push(&self, nonce: i64) {
        self.script().queue.push_back(Ok(nonce));
    }

    /// Fail the next unscripted request as the venue would on an API error.
    pub fn fail_next(&self) {
        self.script().queue.push_back(Err(tradesign_client::Error::Api {
            code: 21100,
            message: "account not found".to_string(),
        }));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl NonceSource for MockNonceSource {
    fn next_nonce(
        &self,
        _endpoint: &str,
        _account_index: i64,
        _api_key_index: u8,
    ) -> Result<i64, tradesign_client::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (next, delay) = {
            let mut script = self.script();
            let next = script.queue.pop_front().unwrap_or(Ok(script.default));
            (next, script.delay)
        };
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hasher_is_deterministic() {
        let elements = [Element::from_u32(1), Element::from_i64(-1)];
        assert_eq!(Sha256Hasher.hash(&elements), Sha256Hasher.hash(&elements));
        assert_ne!(
            Sha256Hasher.hash(&elements),
            Sha256Hasher.hash(&elements[..1])
        );
    }

    #[test]
    fn test_key_manager_lengths() {
        let digest = [7u8; DIGEST_LENGTH];
        let manager = MockKeyManager::new(b"seed");
        assert_eq!(manager.sign(&digest).unwrap().len(), SIGNATURE_LENGTH);

        let short = MockKeyManager {
            signature_length: 10,
            ..manager.clone()
        };
        assert_eq!(short.sign(&digest).unwrap().len(), 10);
        assert_eq!(
            short.sign(&digest).unwrap()[..],
            manager.sign(&digest).unwrap()[..10]
        );
    }

    #[test]
    fn test_nonce_script() {
        let source = MockNonceSource::new(9);
        source.fail_next();
        source.push(4);
        assert!(source.next_nonce("", 0, 0).is_err());
        assert_eq!(source.next_nonce("", 0, 0).unwrap(), 4);
        assert_eq!(source.next_nonce("", 0, 0).unwrap(), 9);
        assert_eq!(source.calls(), 3);
    }
}
