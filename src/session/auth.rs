//! Caller-facing session operations.
//!
//! [`SessionAuth`] ties one store to one cookie: `login` stores a record and
//! sets the cookie, `authenticate` resolves a request back to its record, and
//! `logout` deletes the record and clears the cookie.

use axum::http::{
    HeaderMap,
    header::{InvalidHeaderValue, SET_COOKIE},
};
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use super::{
    config::{ConfigError, SessionConfig},
    cookie::CookieFrontend,
    store::{SessionStore, StoreError},
    token::TokenCodec,
    verifier::{SessionVerifier, VerifiedSession, VerifyError},
};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing cookie, bad signature, unknown session or a refused payload.
    #[error("unauthorized")]
    Unauthorized,
    #[error("session identifier already exists")]
    DuplicateIdentifier,
    #[error(transparent)]
    Backend(StoreError),
    #[error("session cookie is not a valid header value")]
    Header(#[from] InvalidHeaderValue),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateIdentifier => Self::DuplicateIdentifier,
            other => Self::Backend(other),
        }
    }
}

/// Login, authentication and logout over one store and one cookie.
pub struct SessionAuth<P> {
    store: Arc<dyn SessionStore<P>>,
    frontend: CookieFrontend,
    verifier: SessionVerifier<P>,
    auto_error: bool,
}

impl<P> SessionAuth<P>
where
    P: Send + Sync + 'static,
{
    /// # Errors
    /// Returns [`ConfigError`] if the secret is too short or the cookie
    /// settings cannot be rendered into a valid `Set-Cookie` header.
    pub fn new(config: SessionConfig, store: Arc<dyn SessionStore<P>>) -> Result<Self, ConfigError> {
        config.validate()?;

        let codec = TokenCodec::new(config.secret(), config.namespace())?;
        let frontend = CookieFrontend::new(
            config.cookie_name(),
            config.cookie_params().clone(),
            codec.clone(),
        );
        let verifier = SessionVerifier::new(codec, Arc::clone(&store));

        Ok(Self {
            store,
            frontend,
            verifier,
            auto_error: config.auto_error(),
        })
    }

    /// Only sessions whose payload satisfies `predicate` authenticate.
    #[must_use]
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&P) -> bool + Send + Sync + 'static,
    {
        self.verifier = self.verifier.with_predicate(predicate);
        self
    }

    #[must_use]
    pub fn frontend(&self) -> &CookieFrontend {
        &self.frontend
    }

    #[must_use]
    pub fn auto_error(&self) -> bool {
        self.auto_error
    }

    /// Store a new session for `payload` and set its cookie on `headers`.
    ///
    /// # Errors
    /// [`AuthError::DuplicateIdentifier`] on an id collision, otherwise any
    /// store or header failure.
    pub async fn login(&self, payload: &P, headers: &mut HeaderMap) -> Result<Uuid, AuthError> {
        let id = Uuid::new_v4();
        // Render the cookie before storing anything.
        let mut cookie = HeaderMap::new();
        self.frontend.attach(&mut cookie, id)?;

        self.store.create(id, payload).await?;
        for value in cookie.get_all(SET_COOKIE) {
            headers.append(SET_COOKIE, value.clone());
        }
        debug!("session {id} created");
        Ok(id)
    }

    /// Resolve the session carried by the request `headers`.
    ///
    /// A rejected request is `Err(AuthError::Unauthorized)` when `auto_error`
    /// is set and `Ok(None)` otherwise.
    ///
    /// # Errors
    /// [`AuthError::Backend`] when the store fails; these are never folded
    /// into a rejection.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<VerifiedSession<P>>, AuthError> {
        let raw = self.frontend.extract(headers);

        match self.verifier.verify(raw.as_deref()).await {
            Ok(session) => Ok(Some(session)),
            Err(VerifyError::Rejected(reason)) => {
                debug!("session rejected: {reason}");
                if self.auto_error {
                    Err(AuthError::Unauthorized)
                } else {
                    Ok(None)
                }
            }
            Err(VerifyError::Backend(err)) => {
                error!("session lookup failed: {err}");
                Err(AuthError::Backend(err))
            }
        }
    }

    /// Delete the session server-side and clear the cookie on `headers`.
    ///
    /// Logging out an unknown or already deleted session succeeds.
    ///
    /// # Errors
    /// Any store or header failure.
    pub async fn logout(&self, id: Uuid, headers: &mut HeaderMap) -> Result<(), AuthError> {
        self.store.delete(id).await?;
        self.frontend.clear(headers)?;
        debug!("session {id} deleted");
        Ok(())
    }
}

impl<P> fmt::Debug for SessionAuth<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionAuth")
            .field("frontend", &self.frontend)
            .field("auto_error", &self.auto_error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{
        cookie::CookieParams,
        store::{MemoryStore, SessionRecord},
    };
    use async_trait::async_trait;
    use axum::http::{
        HeaderValue,
        header::{COOKIE, SET_COOKIE},
    };
    use secrecy::SecretString;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Payload {
        user_id: String,
    }

    fn payload(user_id: &str) -> Payload {
        Payload {
            user_id: user_id.to_string(),
        }
    }

    fn config() -> SessionConfig {
        SessionConfig::new(SecretString::from(
            "0123456789abcdef0123456789abcdef".to_string(),
        ))
    }

    fn auth(config: SessionConfig) -> (SessionAuth<Payload>, Arc<MemoryStore<Payload>>) {
        let store = Arc::new(MemoryStore::new());
        let auth = SessionAuth::new(config, store.clone())
            .unwrap_or_else(|err| panic!("session auth: {err}"));
        (auth, store)
    }

    // Turns the response `Set-Cookie` into the next request's `Cookie`.
    fn replay(response: &HeaderMap) -> HeaderMap {
        let mut request = HeaderMap::new();
        if let Some(pair) = response
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
        {
            if let Ok(value) = HeaderValue::from_str(pair) {
                request.insert(COOKIE, value);
            }
        }
        request
    }

    #[tokio::test]
    async fn login_authenticate_logout_replay() -> anyhow::Result<()> {
        let (auth, _store) = auth(config());

        let mut response = HeaderMap::new();
        let id = auth.login(&payload("u1"), &mut response).await?;
        let cookie = replay(&response);

        let session = auth
            .authenticate(&cookie)
            .await?
            .ok_or_else(|| anyhow::anyhow!("session missing"))?;
        assert_eq!(session.id, id);
        assert_eq!(session.payload(), &payload("u1"));

        let mut response = HeaderMap::new();
        auth.logout(id, &mut response).await?;
        let cleared = response
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(cleared.starts_with("session=;"));
        assert!(cleared.contains("Max-Age=0"));

        assert!(matches!(
            auth.authenticate(&cookie).await,
            Err(AuthError::Unauthorized)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn logout_twice_succeeds() -> anyhow::Result<()> {
        let (auth, store) = auth(config());
        let mut response = HeaderMap::new();
        let id = auth.login(&payload("u1"), &mut response).await?;

        auth.logout(id, &mut HeaderMap::new()).await?;
        auth.logout(id, &mut HeaderMap::new()).await?;
        assert!(store.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn without_auto_error_rejections_are_absent() -> anyhow::Result<()> {
        let (auth, _store) = auth(config().with_auto_error(false));
        assert!(!auth.auto_error());

        assert!(auth.authenticate(&HeaderMap::new()).await?.is_none());

        let mut forged = HeaderMap::new();
        forged.insert(COOKIE, HeaderValue::from_static("session=abc.def"));
        assert!(auth.authenticate(&forged).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn cookie_from_other_namespace_is_rejected() -> anyhow::Result<()> {
        let (admin, _) = auth(config().with_namespace("admin"));
        let (public, _) = auth(config().with_namespace("public"));

        let mut response = HeaderMap::new();
        admin.login(&payload("u1"), &mut response).await?;
        assert!(matches!(
            public.authenticate(&replay(&response)).await,
            Err(AuthError::Unauthorized)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn predicate_refusal_looks_like_any_rejection() -> anyhow::Result<()> {
        let (auth, _store) = auth(config());
        let auth = auth.with_predicate(|payload: &Payload| payload.user_id != "banned");

        let mut response = HeaderMap::new();
        auth.login(&payload("banned"), &mut response).await?;
        assert!(matches!(
            auth.authenticate(&replay(&response)).await,
            Err(AuthError::Unauthorized)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn custom_cookie_name_and_params() -> anyhow::Result<()> {
        let config = config()
            .with_cookie_name("sid")
            .with_cookie_params(CookieParams::default().with_max_age(60).with_secure(false));
        let (auth, _store) = auth(config);

        let mut response = HeaderMap::new();
        auth.login(&payload("u1"), &mut response).await?;
        let cookie = response
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(cookie.starts_with("sid="));
        assert!(cookie.ends_with("; HttpOnly; SameSite=Lax; Max-Age=60; Path=/"));
        assert!(auth.authenticate(&replay(&response)).await?.is_some());
        Ok(())
    }

    #[test]
    fn invalid_config_is_refused() {
        let store: Arc<dyn SessionStore<Payload>> = Arc::new(MemoryStore::new());
        let weak = SessionConfig::new(SecretString::from("short".to_string()));
        assert!(matches!(
            SessionAuth::new(weak, Arc::clone(&store)),
            Err(ConfigError::Token(_))
        ));
        assert!(matches!(
            SessionAuth::new(config().with_cookie_name("a b"), store),
            Err(ConfigError::InvalidCookieName(_))
        ));
    }

    struct FlakyStore;

    #[async_trait]
    impl SessionStore<Payload> for FlakyStore {
        async fn create(&self, _id: Uuid, _payload: &Payload) -> crate::session::store::Result<()> {
            Err(StoreError::DuplicateIdentifier)
        }

        async fn get(&self, _id: Uuid) -> crate::session::store::Result<Option<SessionRecord<Payload>>> {
            Err(StoreError::BackendUnavailable("connection refused".into()))
        }

        async fn delete(&self, _id: Uuid) -> crate::session::store::Result<()> {
            Err(StoreError::BackendUnavailable("connection refused".into()))
        }

        async fn purge_expired(&self) -> crate::session::store::Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn store_failures_surface() -> anyhow::Result<()> {
        let auth = SessionAuth::new(config().with_auto_error(false), Arc::new(FlakyStore))?;

        let mut response = HeaderMap::new();
        assert!(matches!(
            auth.login(&payload("u1"), &mut response).await,
            Err(AuthError::DuplicateIdentifier)
        ));
        assert!(response.is_empty());

        let mut request = HeaderMap::new();
        let signed = TokenCodec::new(config().secret(), "sessiongate")?.sign(Uuid::new_v4());
        request.insert(COOKIE, HeaderValue::from_str(&format!("session={signed}"))?);
        assert!(matches!(
            auth.authenticate(&request).await,
            Err(AuthError::Backend(StoreError::BackendUnavailable(_)))
        ));

        assert!(matches!(
            auth.logout(Uuid::new_v4(), &mut response).await,
            Err(AuthError::Backend(_))
        ));
        assert!(response.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unrenderable_cookie_stores_nothing() -> anyhow::Result<()> {
        let (mut auth, store) = auth(config());
        // Bypasses config validation, which would refuse this name.
        let codec = TokenCodec::new(config().secret(), "sessiongate")?;
        auth.frontend = CookieFrontend::new("bad\nname", CookieParams::default(), codec);

        let mut response = HeaderMap::new();
        assert!(matches!(
            auth.login(&payload("u1"), &mut response).await,
            Err(AuthError::Header(_))
        ));
        assert!(response.is_empty());
        assert!(store.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn login_keeps_existing_set_cookie_headers() -> anyhow::Result<()> {
        let (auth, _store) = auth(config());
        let mut response = HeaderMap::new();
        response.insert(SET_COOKIE, HeaderValue::from_static("theme=dark; Path=/"));

        auth.login(&payload("u1"), &mut response).await?;
        let cookies: Vec<_> = response
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0], "theme=dark; Path=/");
        assert!(cookies[1].starts_with("session="));
        Ok(())
    }

    #[tokio::test]
    async fn zero_ttl_sessions_still_authenticate() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::<Payload>::new().with_ttl(std::time::Duration::ZERO));
        let auth = SessionAuth::new(config(), store)?;

        let mut response = HeaderMap::new();
        let id = auth.login(&payload("u1"), &mut response).await?;
        let session = auth
            .authenticate(&replay(&response))
            .await?
            .ok_or_else(|| anyhow::anyhow!("session missing"))?;
        assert_eq!(session.id, id);
        Ok(())
    }
}
