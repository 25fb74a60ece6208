//! Per-request session verification.
//!
//! A raw cookie value goes through three checks, in order: the token
//! signature, the store lookup, and the acceptance predicate. The first
//! failing check decides the [`Rejection`].

use std::{fmt, sync::Arc};
use thiserror::Error;
use uuid::Uuid;

use super::{
    store::{SessionRecord, SessionStore, StoreError},
    token::TokenCodec,
};

/// Application check run on the payload of an otherwise valid session.
pub type Predicate<P> = Arc<dyn Fn(&P) -> bool + Send + Sync>;

/// Why a request was not authenticated.
///
/// Only for logs and metrics; callers see one "unauthorized" outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingCookie,
    SignatureInvalid,
    NotFound,
    Denied,
}

impl Rejection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingCookie => "missing_cookie",
            Self::SignatureInvalid => "signature_invalid",
            Self::NotFound => "not_found",
            Self::Denied => "denied",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("session rejected: {0}")]
    Rejected(Rejection),
    #[error(transparent)]
    Backend(#[from] StoreError),
}

/// A session that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession<P> {
    pub id: Uuid,
    pub record: SessionRecord<P>,
}

impl<P> VerifiedSession<P> {
    #[must_use]
    pub fn payload(&self) -> &P {
        &self.record.payload
    }
}

pub struct SessionVerifier<P> {
    codec: TokenCodec,
    store: Arc<dyn SessionStore<P>>,
    predicate: Predicate<P>,
}

impl<P> SessionVerifier<P>
where
    P: Send + Sync + 'static,
{
    /// A verifier that accepts every stored session.
    #[must_use]
    pub fn new(codec: TokenCodec, store: Arc<dyn SessionStore<P>>) -> Self {
        Self {
            codec,
            store,
            predicate: Arc::new(|_| true),
        }
    }

    #[must_use]
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&P) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    /// Resolve a raw cookie value to its session.
    ///
    /// # Errors
    /// [`VerifyError::Rejected`] when any check fails, [`VerifyError::Backend`]
    /// when the store cannot answer.
    pub async fn verify(&self, raw: Option<&str>) -> Result<VerifiedSession<P>, VerifyError> {
        let raw = raw.ok_or(VerifyError::Rejected(Rejection::MissingCookie))?;

        let id = self
            .codec
            .verify(raw)
            .map_err(|_| VerifyError::Rejected(Rejection::SignatureInvalid))?;

        let record = self
            .store
            .get(id)
            .await?
            .ok_or(VerifyError::Rejected(Rejection::NotFound))?;

        if !(self.predicate)(&record.payload) {
            return Err(VerifyError::Rejected(Rejection::Denied));
        }

        Ok(VerifiedSession { id, record })
    }
}

impl<P> fmt::Debug for SessionVerifier<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
