use crate::{
    capability::{HttpNonceSource, KeyManagerFactory, MessageHasher, NonceSource},
    config::ValidatedConfig,
    metrics::Metrics,
    registry::{SessionId, SessionRegistry},
    session::{Account, SecretKey, Session},
    Error, Result,
};
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::{debug, info};
use tradesign_types::{
    AuthToken, CancelOrder, CreateOrder, Element, Signature, CANCEL_ORDER_FIELDS,
    CREATE_ORDER_FIELDS,
};

/// An encoded transaction and the signature over its digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction<const N: usize> {
    pub elements: [Element; N],
    pub signature: Signature,
}

/// Owns every signing session and performs all session, nonce, and signing operations.
///
/// Safe to share across threads: registration is serialized, and each session's nonce is
/// guarded by its own lock.
pub struct SigningService {
    registry: SessionRegistry,
    nonces: Arc<dyn NonceSource>,
    key_managers: Arc<dyn KeyManagerFactory>,
    hasher: Arc<dyn MessageHasher>,
    max_auth_token_lifetime: Option<Duration>,
    metrics: Metrics,
}

impl SigningService {
    pub fn new(
        config: &ValidatedConfig,
        nonces: Arc<dyn NonceSource>,
        key_managers: Arc<dyn KeyManagerFactory>,
        hasher: Arc<dyn MessageHasher>,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(),
            nonces,
            key_managers,
            hasher,
            max_auth_token_lifetime: config.max_auth_token_lifetime,
            metrics: Metrics::default(),
        }
    }

    /// Create a service that fetches initial nonces over HTTP.
    pub fn with_http(
        config: &ValidatedConfig,
        key_managers: Arc<dyn KeyManagerFactory>,
        hasher: Arc<dyn MessageHasher>,
    ) -> Self {
        let nonces = Arc::new(HttpNonceSource::new(config.nonce_fetch_timeout));
        Self::new(config, nonces, key_managers, hasher)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn session(&self, id: SessionId) -> Result<Arc<Session>> {
        self.registry.get(id)
    }

    /// Return the session for `private_key_hex`, creating it if this key has not been seen.
    ///
    /// Creation fetches the account's next nonce from `endpoint` and builds a key manager.
    /// If either fails, no session is registered. A key that is already registered returns
    /// its existing handle without contacting `endpoint`, even if `account` differs.
    pub fn get_or_create_session(
        &self,
        endpoint: &str,
        private_key_hex: &str,
        account: Account,
    ) -> Result<SessionId> {
        let secret = SecretKey::from_hex(private_key_hex)?;
        let (id, created) = self.registry.get_or_create(secret, |secret| {
            let nonce =
                self.nonces
                    .next_nonce(endpoint, account.account_index, account.api_key_index)?;
            let key_manager = self
                .key_managers
                .construct(&secret)
                .map_err(Error::KeyManager)?;
            Ok(Session::new(secret, account, nonce, key_manager))
        })?;

        if created {
            self.metrics.sessions.inc();
            info!(
                session = %id,
                chain_id = account.chain_id,
                account_index = account.account_index,
                api_key_index = account.api_key_index,
                "created signing session"
            );
        }
        Ok(id)
    }

    pub fn next_nonce(&self, id: SessionId) -> Result<i64> {
        self.session(id)?.next_nonce()
    }

    pub fn advance_nonce(&self, id: SessionId) -> Result<i64> {
        self.session(id)?.advance_nonce()
    }

    pub fn rewind_nonce(&self, id: SessionId) -> Result<i64> {
        self.session(id)?.rewind_nonce()
    }

    /// Encode and sign `encode`'s output under the session's current nonce.
    fn sign_transaction<const N: usize>(
        &self,
        id: SessionId,
        nonce: i64,
        expired_at: i64,
        encode: impl FnOnce(&tradesign_types::TxHeader) -> [Element; N],
    ) -> Result<SignedTransaction<N>> {
        let session = self.session(id)?;
        let result = session.with_current_nonce(nonce, expired_at, |header| {
            let elements = encode(header);
            let digest = self.hasher.hash(&elements);
            let signature = session.sign(&digest)?;
            Ok(SignedTransaction {
                elements,
                signature,
            })
        });

        match &result {
            Ok(_) => {
                self.metrics.signatures.inc();
                debug!(session = %id, nonce, fields = N, "signed transaction");
            }
            Err(Error::NonceMismatch { .. }) => {
                self.metrics.nonce_mismatches.inc();
            }
            Err(_) => {}
        }
        result
    }

    pub fn sign_create_order(
        &self,
        id: SessionId,
        order: &CreateOrder,
        nonce: i64,
        expired_at: i64,
    ) -> Result<SignedTransaction<CREATE_ORDER_FIELDS>> {
        self.sign_transaction(id, nonce, expired_at, |header| order.encode(header))
    }

    pub fn sign_cancel_order(
        &self,
        id: SessionId,
        cancel: &CancelOrder,
        nonce: i64,
        expired_at: i64,
    ) -> Result<SignedTransaction<CANCEL_ORDER_FIELDS>> {
        self.sign_transaction(id, nonce, expired_at, |header| cancel.encode(header))
    }

    /// Sign an auth token valid until `deadline` (unix seconds). Does not touch the nonce.
    pub fn auth_token(&self, id: SessionId, deadline: i64) -> Result<Signature> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| Error::Internal(format!("system clock before unix epoch: {err}")))?;
        let now = i64::try_from(now.as_secs())
            .map_err(|_| Error::Internal("system clock out of range".to_string()))?;
        self.auth_token_at(id, deadline, now)
    }

    /// [Self::auth_token] with an explicit current time.
    pub fn auth_token_at(&self, id: SessionId, deadline: i64, now: i64) -> Result<Signature> {
        let session = self.session(id)?;
        if let Some(max) = self.max_auth_token_lifetime {
            let max_secs = i64::try_from(max.as_secs()).unwrap_or(i64::MAX);
            if deadline.saturating_sub(now) > max_secs {
                return Err(Error::DeadlineTooFar { deadline, max });
            }
        }

        let account = session.account();
        let token = AuthToken {
            deadline,
            account_index: account.account_index,
            api_key_index: account.api_key_index,
        };
        let elements = token.encode()?;
        let digest = self.hasher.hash(&elements);
        let signature = session.sign(&digest)?;

        self.metrics.signatures.inc();
        debug!(session = %id, deadline, "signed auth token");
        Ok(signature)
    }
}
