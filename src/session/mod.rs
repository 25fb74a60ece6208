//! Server-validated cookie sessions.
//!
//! A login stores a record under a fresh UUID and hands the browser an
//! HttpOnly cookie carrying that UUID plus an HMAC. Every request re-checks
//! the MAC and then the store, so deleting the record on logout invalidates
//! the cookie immediately, whatever its `Max-Age` says.

mod auth;
pub mod config;
pub mod cookie;
pub mod store;
pub mod token;
pub mod verifier;

pub use auth::{AuthError, SessionAuth};
pub use config::{ConfigError, SessionConfig};
pub use cookie::{CookieFrontend, CookieParams, SameSite};
pub use store::{
    MAX_TTL, MIN_TTL, MemoryStore, PgSessionStore, SessionRecord, SessionStore, StoreError,
    spawn_expiry_sweeper,
};
pub use token::{TokenCodec, TokenError};
pub use verifier::{Predicate, Rejection, SessionVerifier, VerifiedSession, VerifyError};
