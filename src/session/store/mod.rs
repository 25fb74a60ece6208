//! Session storage backends.
//!
//! Both backends implement [`SessionStore`]; callers pick one at startup and
//! hand it to the facade as `Arc<dyn SessionStore<P>>`.
//!
//! - [`MemoryStore`]: a mutex-guarded map, only valid for a single process.
//! - [`PgSessionStore`]: a PostgreSQL table, safe to share between processes.
//!
//! Expiry is enforced lazily on `get`; [`spawn_expiry_sweeper`] optionally
//! reclaims expired rows in the background.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{DEFAULT_TABLE, DEFAULT_TTL, PgSessionStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    /// `create` hit an id that is already stored.
    #[error("session identifier already exists")]
    DuplicateIdentifier,
    #[error("session backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("session payload could not be encoded or decoded")]
    Payload(#[from] serde_json::Error),
    #[error("invalid session table name: {0:?}")]
    InvalidTableName(String),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Shortest session lifetime a store keeps; shorter ones are raised to it.
pub const MIN_TTL: Duration = Duration::from_secs(1);
/// Longest session lifetime a store keeps (366 days); longer ones are capped.
pub const MAX_TTL: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Applied by every store's `with_ttl`.
pub(crate) fn clamp_ttl(ttl: Duration) -> Duration {
    ttl.clamp(MIN_TTL, MAX_TTL)
}

/// A stored session as returned by [`SessionStore::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord<P> {
    pub id: Uuid,
    pub payload: P,
    pub created_at: DateTime<Utc>,
    /// `None` when the backend keeps the session until it is deleted.
    pub expires_at: Option<DateTime<Utc>>,
}

impl<P> SessionRecord<P> {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

#[async_trait]
pub trait SessionStore<P>: Send + Sync
where
    P: Send + Sync + 'static,
{
    /// Insert a new session.
    ///
    /// # Errors
    /// [`StoreError::DuplicateIdentifier`] if `id` is already stored.
    async fn create(&self, id: Uuid, payload: &P) -> Result<()>;

    /// Look up a live session; expired sessions read as `None`.
    async fn get(&self, id: Uuid) -> Result<Option<SessionRecord<P>>>;

    /// Remove a session. Removing an unknown id is not an error.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Physically remove expired sessions, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64>;
}

/// Spawn a task that calls [`SessionStore::purge_expired`] every `interval`.
///
/// Failures are logged and the loop keeps going.
pub fn spawn_expiry_sweeper<P>(
    store: Arc<dyn SessionStore<P>>,
    interval: Duration,
) -> tokio::task::JoinHandle<()>
where
    P: Send + Sync + 'static,
{
    tokio::spawn(async move {
        loop {
            sleep(interval).await;

            match store.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => debug!("purged {removed} expired sessions"),
                Err(err) => error!("session expiry sweep failed: {err}"),
            }
        }
    })
}
