//! # Sessiongate
//!
//! Server-validated cookie sessions for `axum` services.
//!
//! A successful login stores a session record under a random UUID and sets an
//! `HttpOnly` cookie holding that UUID and its HMAC-SHA256 signature. Each
//! request is authenticated in two steps:
//!
//! 1. **Signature:** the cookie must verify under the server secret and the
//!    configured namespace, otherwise it is never resolved to an identifier.
//! 2. **Store lookup:** the identifier must still exist in the session store and
//!    must not be past its `expires_at`.
//!
//! Logging out deletes the record, so a replayed cookie is rejected at once even
//! though the browser may still hold it.
//!
//! ## Stores
//!
//! - [`session::MemoryStore`] keeps sessions in a mutex-guarded map and only
//!   suits a single process.
//! - [`session::PgSessionStore`] keeps them in a `PostgreSQL` table and can be
//!   shared by any number of instances. Expired rows read as missing and can be
//!   purged by the optional background sweeper.
//!
//! The `sessiongate` binary wraps the library in a small HTTP service (see
//! [`api`]).

pub mod api;
pub mod cli;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
