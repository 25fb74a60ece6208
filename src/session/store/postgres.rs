//! PostgreSQL session store.
//!
//! One row per session, keyed by id. Every operation is a single statement,
//! so concurrency is left to the primary key and PostgreSQL row locking.
//! Expired rows stay in the table until [`SessionStore::purge_expired`] runs,
//! but `get` never returns them.
//!
//! The table is not created on demand; run [`PgSessionStore::create_schema`]
//! (or apply [`PgSessionStore::schema`]) during deployment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use super::{Result, SessionRecord, SessionStore, StoreError, clamp_ttl};

pub const DEFAULT_TABLE: &str = "sessions";
pub const DEFAULT_TTL: Duration = Duration::from_secs(12 * 60 * 60);

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
    table: String,
    ttl: Duration,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table: DEFAULT_TABLE.to_string(),
            ttl: DEFAULT_TTL,
        }
    }

    /// Use a table other than `sessions`.
    ///
    /// # Errors
    /// [`StoreError::InvalidTableName`] unless `table` is a plain SQL identifier.
    pub fn with_table(mut self, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !valid_identifier(&table) {
            return Err(StoreError::InvalidTableName(table));
        }
        self.table = table;
        Ok(self)
    }

    /// Session lifetime, clamped to [`super::MIN_TTL`]..=[`super::MAX_TTL`].
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = clamp_ttl(ttl);
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// DDL statements for the configured table.
    #[must_use]
    pub fn schema_statements(&self) -> Vec<String> {
        ddl(&self.table)
    }

    /// The DDL as one script, suitable for `psql`.
    #[must_use]
    pub fn schema(&self) -> String {
        script(&self.table)
    }

    /// The DDL script for `table`, without a connection pool.
    ///
    /// # Errors
    /// [`StoreError::InvalidTableName`] unless `table` is a plain SQL identifier.
    pub fn schema_for(table: &str) -> Result<String> {
        if !valid_identifier(table) {
            return Err(StoreError::InvalidTableName(table.to_string()));
        }
        Ok(script(table))
    }

    /// Create the table and index if they do not exist.
    ///
    /// # Errors
    /// [`StoreError::BackendUnavailable`] if a statement fails.
    pub async fn create_schema(&self) -> Result<()> {
        for statement in self.schema_statements() {
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "CREATE",
                db.statement = statement.as_str()
            );
            sqlx::query(&statement)
                .execute(&self.pool)
                .instrument(span)
                .await
                .map_err(|err| backend("failed to create session schema", &err))?;
        }
        Ok(())
    }

    /// Round trip to the database, used by health checks.
    ///
    /// # Errors
    /// [`StoreError::BackendUnavailable`] if the database cannot be reached.
    pub async fn ping(&self) -> Result<()> {
        let span = tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| backend("failed to ping database", &err))?;
        Ok(())
    }

    fn ttl_seconds(&self) -> i64 {
        i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX)
    }
}

#[async_trait]
impl<P> SessionStore<P> for PgSessionStore
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn create(&self, id: Uuid, payload: &P) -> Result<()> {
        let payload = serde_json::to_value(payload)?;
        let query = format!(
            "INSERT INTO {} (id, payload, expires_at) \
             VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))",
            self.table
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(payload)
            .bind(self.ttl_seconds())
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateIdentifier),
            Err(err) => Err(backend("failed to insert session", &err)),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<SessionRecord<P>>> {
        // Rows past expires_at are still physically present until purged.
        let query = format!(
            "SELECT id, payload, created_at, expires_at FROM {} \
             WHERE id = $1 AND expires_at > NOW()",
            self.table
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| backend("failed to lookup session", &err))?;

        row.map(|row| record_from_row(&row)).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let query = format!("DELETE FROM {} WHERE id = $1", self.table);
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query.as_str()
        );
        sqlx::query(&query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| backend("failed to delete session", &err))?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let query = format!("DELETE FROM {} WHERE expires_at <= NOW()", self.table);
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query.as_str()
        );
        let result = sqlx::query(&query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| backend("failed to purge expired sessions", &err))?;
        Ok(result.rows_affected())
    }
}

fn ddl(table: &str) -> Vec<String> {
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n    \
             id UUID PRIMARY KEY,\n    \
             payload JSONB NOT NULL,\n    \
             created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),\n    \
             expires_at TIMESTAMPTZ NOT NULL\n\
             );"
        ),
        format!("CREATE INDEX IF NOT EXISTS {table}_expires_at_idx ON {table} (expires_at);"),
    ]
}

fn script(table: &str) -> String {
    let mut script = ddl(table).join("\n\n");
    script.push('\n');
    script
}

fn record_from_row<P: DeserializeOwned>(row: &PgRow) -> Result<SessionRecord<P>> {
    let column = |err: sqlx::Error| backend("failed to decode session row", &err);

    let payload: serde_json::Value = row.try_get("payload").map_err(column)?;
    let expires_at: DateTime<Utc> = row.try_get("expires_at").map_err(column)?;

    Ok(SessionRecord {
        id: row.try_get("id").map_err(column)?,
        payload: serde_json::from_value(payload)?,
        created_at: row.try_get("created_at").map_err(column)?,
        expires_at: Some(expires_at),
    })
}

fn backend(context: &str, err: &sqlx::Error) -> StoreError {
    StoreError::BackendUnavailable(format!("{context}: {err}"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| code.as_ref() == UNIQUE_VIOLATION),
        _ => false,
    }
}

fn valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    // PostgreSQL truncates identifiers at 63 bytes; leave room for the index suffix.
    name.len() <= 48
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
