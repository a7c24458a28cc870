use crate::{
    session::{SecretKey, Session},
    Error, Result,
};
use commonware_cryptography::sha256::Digest;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// Stable handle to a registered session: its position in registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(usize);

impl SessionId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for SessionId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
struct Inner {
    sessions: Vec<Arc<Session>>,
    by_key: HashMap<Digest, SessionId>,
}

impl Inner {
    fn find(&self, secret: &SecretKey) -> Option<SessionId> {
        let id = *self.by_key.get(&secret.fingerprint())?;
        self.sessions[id.0].holds(secret).then_some(id)
    }
}

/// Append-only set of sessions, at most one per private key.
///
/// Lookups take a shared lock. Registration is serialized by a separate creation lock, so a
/// slow nonce fetch for one key never blocks signing on existing sessions, and two callers
/// racing on the same key always end up with the same handle.
#[derive(Default)]
pub struct SessionRegistry {
    creation: Mutex<()>,
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: SessionId) -> Result<Arc<Session>> {
        self.read()
            .sessions
            .get(id.0)
            .cloned()
            .ok_or(Error::UnknownSession(id.0 as i64))
    }

    pub fn find(&self, secret: &SecretKey) -> Option<SessionId> {
        self.read().find(secret)
    }

    /// Return the session holding `secret`, registering one built by `create` if none exists.
    ///
    /// The boolean is true when `create` ran and succeeded. If `create` fails nothing is
    /// registered and a later call with the same key may retry.
    pub fn get_or_create(
        &self,
        secret: SecretKey,
        create: impl FnOnce(SecretKey) -> Result<Session>,
    ) -> Result<(SessionId, bool)> {
        if let Some(id) = self.find(&secret) {
            return Ok((id, false));
        }

        let _creation = self.creation.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = self.find(&secret) {
            return Ok((id, false));
        }

        let fingerprint = secret.fingerprint();
        let session = create(secret)?;

        let mut inner = self.write();
        let id = SessionId(inner.sessions.len());
        inner.sessions.push(Arc::new(session));
        inner.by_key.insert(fingerprint, id);
        Ok((id, true))
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mocks::MockKeyManager, session::Account};
    use std::{sync::Barrier, thread, time::Duration};

    fn key(hex: &str) -> SecretKey {
        SecretKey::from_hex(hex).unwrap()
    }

    fn account() -> Account {
        Account {
            chain_id: 1,
            account_index: 2,
            api_key_index: 3,
        }
    }

    fn build(initial_nonce: i64) -> impl FnOnce(SecretKey) -> Result<Session> {
        move |secret| {
            Ok(Session::new(
                secret,
                account(),
                initial_nonce,
                Box::new(MockKeyManager::new(b"seed")),
            ))
        }
    }

    #[test]
    fn test_handles_follow_registration_order() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty());

        let (first, created) = registry.get_or_create(key("01"), build(0)).unwrap();
        assert!(created);
        let (second, created) = registry.get_or_create(key("02"), build(0)).unwrap();
        assert!(created);

        assert_eq!(first, SessionId(0));
        assert_eq!(second, SessionId(1));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_same_key_returns_same_handle() {
        let registry = SessionRegistry::new();
        let (first, _) = registry.get_or_create(key("aa"), build(10)).unwrap();
        let (again, created) = registry
            .get_or_create(key("0xaa"), |_| panic!("must not rebuild"))
            .unwrap();
        assert_eq!(first, again);
        assert!(!created);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find(&key("aa")), Some(first));
    }

    #[test]
    fn test_failed_creation_registers_nothing() {
        let registry = SessionRegistry::new();
        let result = registry.get_or_create(key("bb"), |_| {
            Err(Error::Internal("nonce endpoint down".into()))
        });
        assert!(result.is_err());
        assert!(registry.is_empty());
        assert_eq!(registry.find(&key("bb")), None);

        let (id, created) = registry.get_or_create(key("bb"), build(4)).unwrap();
        assert!(created);
        assert_eq!(id, SessionId(0));
        assert_eq!(registry.get(id).unwrap().next_nonce().unwrap(), 4);
    }

    #[test]
    fn test_unknown_handle() {
        let registry = SessionRegistry::new();
        assert!(matches!(
            registry.get(SessionId(0)),
            Err(Error::UnknownSession(0))
        ));
        registry.get_or_create(key("01"), build(0)).unwrap();
        assert!(registry.get(SessionId(0)).is_ok());
        assert!(matches!(
            registry.get(SessionId(1)),
            Err(Error::UnknownSession(1))
        ));
    }

    #[test]
    fn test_concurrent_registration_of_one_key() {
        let registry = Arc::new(SessionRegistry::new());
        let barrier = Arc::new(Barrier::new(8));
        let built = Arc::new(Mutex::new(0usize));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                let built = built.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry
                        .get_or_create(key("cafe"), |secret| {
                            thread::sleep(Duration::from_millis(20));
                            *built.lock().unwrap() += 1;
                            build(0)(secret)
                        })
                        .unwrap()
                        .0
                })
            })
            .collect();

        let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(*built.lock().unwrap(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookups_proceed_during_slow_creation() {
        let registry = Arc::new(SessionRegistry::new());
        let (existing, _) = registry.get_or_create(key("01"), build(7)).unwrap();

        let started = Arc::new(Barrier::new(2));
        let slow = {
            let registry = registry.clone();
            let started = started.clone();
            thread::spawn(move || {
                registry
                    .get_or_create(key("02"), |secret| {
                        started.wait();
                        thread::sleep(Duration::from_millis(200));
                        build(0)(secret)
                    })
                    .unwrap()
            })
        };

        started.wait();
        let session = registry.get(existing).unwrap();
        assert_eq!(session.advance_nonce().unwrap(), 8);
        assert_eq!(registry.len(), 1);

        slow.join().unwrap();
        assert_eq!(registry.len(), 2);
    }
}
