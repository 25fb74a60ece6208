//! Process-local session store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    collections::{HashMap, hash_map::Entry},
    sync::{Mutex, MutexGuard},
    time::Duration,
};
use uuid::Uuid;

use super::{Result, SessionRecord, SessionStore, StoreError, clamp_ttl};

/// Sessions kept in a mutex-guarded map.
///
/// Not shared across processes; use [`super::PgSessionStore`] when more than one
/// instance serves the same cookies.
#[derive(Debug)]
pub struct MemoryStore<P> {
    sessions: Mutex<HashMap<Uuid, SessionRecord<P>>>,
    ttl: Option<Duration>,
}

impl<P> MemoryStore<P> {
    /// Sessions never expire until deleted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: None,
        }
    }

    /// Expire sessions `ttl` after creation, clamped to
    /// [`super::MIN_TTL`]..=[`super::MAX_TTL`].
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(clamp_ttl(ttl));
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Number of stored records, expired ones included.
    ///
    /// Reads as zero once the lock is poisoned; the store operations report
    /// that state as [`StoreError::BackendUnavailable`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().map_or(0, |sessions| sessions.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn insert_record(&self, record: SessionRecord<P>) {
        if let Ok(mut sessions) = self.lock() {
            sessions.insert(record.id, record);
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, SessionRecord<P>>>> {
        self.sessions
            .lock()
            .map_err(|_| StoreError::BackendUnavailable("memory store lock is poisoned".into()))
    }

    fn expiry_from(&self, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(self.ttl?).ok()?;
        created_at.checked_add_signed(ttl)
    }
}

impl<P> Default for MemoryStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<P> SessionStore<P> for MemoryStore<P>
where
    P: Clone + Send + Sync + 'static,
{
    async fn create(&self, id: Uuid, payload: &P) -> Result<()> {
        let created_at = Utc::now();
        let record = SessionRecord {
            id,
            payload: payload.clone(),
            created_at,
            expires_at: self.expiry_from(created_at),
        };

        match self.lock()?.entry(id) {
            Entry::Occupied(_) => Err(StoreError::DuplicateIdentifier),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<SessionRecord<P>>> {
        let mut sessions = self.lock()?;
        let now = Utc::now();

        let Some(record) = sessions.get(&id) else {
            return Ok(None);
        };
        if !record.is_expired_at(now) {
            return Ok(Some(record.clone()));
        }

        sessions.remove(&id);
        Ok(None)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.lock()?.remove(&id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let mut sessions = self.lock()?;
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired_at(now));
        Ok(u64::try_from(before - sessions.len()).unwrap_or(u64::MAX))
    }
}
