use crate::{capability::KeyManager, nonce::NonceCounter, Error, Result};
use commonware_cryptography::{
    sha256::{Digest, Sha256},
    Hasher,
};
use commonware_utils::from_hex_formatted;
use std::{
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tradesign_types::{Signature, TxDigest, TxHeader};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Raw private key bytes. Zeroed on drop and never printed.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidPrivateKey);
        }
        Ok(Self(bytes))
    }

    /// Decode a hex key, with or without a `0x` prefix.
    pub fn from_hex(value: &str) -> Result<Self> {
        let bytes = from_hex_formatted(value).ok_or(Error::InvalidPrivateKey)?;
        Self::from_bytes(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Digest used to index sessions by key without storing the key twice.
    pub(crate) fn fingerprint(&self) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(&self.0);
        hasher.finalize()
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Identifies the signer within the venue's account model. Fixed when a session is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Account {
    pub chain_id: u32,
    pub account_index: i64,
    pub api_key_index: u8,
}

impl Account {
    pub(crate) fn header(&self, nonce: i64, expired_at: i64) -> TxHeader {
        TxHeader {
            chain_id: self.chain_id,
            nonce,
            expired_at,
            account_index: self.account_index,
            api_key_index: self.api_key_index,
        }
    }
}

/// Signing state for one private key.
pub struct Session {
    secret: SecretKey,
    account: Account,
    nonce: Mutex<NonceCounter>,
    key_manager: Box<dyn KeyManager>,
}

impl Session {
    pub(crate) fn new(
        secret: SecretKey,
        account: Account,
        initial_nonce: i64,
        key_manager: Box<dyn KeyManager>,
    ) -> Self {
        Self {
            secret,
            account,
            nonce: Mutex::new(NonceCounter::new(initial_nonce)),
            key_manager,
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub(crate) fn holds(&self, secret: &SecretKey) -> bool {
        self.secret == *secret
    }

    // A panic while the lock is held cannot tear the counter (every mutation is a single
    // assignment after validation), so a poisoned lock is still safe to use.
    fn counter(&self) -> MutexGuard<'_, NonceCounter> {
        self.nonce.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn nonce_floor(&self) -> i64 {
        self.counter().floor()
    }

    pub fn next_nonce(&self) -> Result<i64> {
        Ok(self.counter().current()?)
    }

    pub fn advance_nonce(&self) -> Result<i64> {
        let nonce = self.counter().advance()?;
        debug!(account_index = self.account.account_index, nonce, "advanced nonce");
        Ok(nonce)
    }

    pub fn rewind_nonce(&self) -> Result<i64> {
        let nonce = self.counter().rewind()?;
        debug!(account_index = self.account.account_index, nonce, "rewound nonce");
        Ok(nonce)
    }

    /// Run `f` with the transaction header for `nonce`, provided `nonce` is the session's
    /// current one. The nonce lock is held until `f` returns, so the nonce cannot move
    /// between the check and the signature.
    pub(crate) fn with_current_nonce<T>(
        &self,
        nonce: i64,
        expired_at: i64,
        f: impl FnOnce(&TxHeader) -> Result<T>,
    ) -> Result<T> {
        let counter = self.counter();
        let expected = counter.current()?;
        if nonce != expected {
            return Err(Error::NonceMismatch {
                expected,
                got: nonce,
            });
        }
        f(&self.account.header(nonce, expired_at))
    }

    pub(crate) fn sign(&self, digest: &TxDigest) -> Result<Signature> {
        let raw = self.key_manager.sign(digest).map_err(Error::Signing)?;
        Signature::try_from(raw).map_err(Error::SignatureLength)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("secret", &"<redacted>")
            .field("account", &self.account)
            .field("nonce", &*self.counter())
            .finish()
    }
}
