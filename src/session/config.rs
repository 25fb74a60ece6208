//! Session configuration, fixed once [`super::SessionAuth`] is built.

use secrecy::SecretString;
use thiserror::Error;

use super::{
    cookie::{CookieParams, SameSite},
    token::TokenError,
};

pub const DEFAULT_COOKIE_NAME: &str = "session";
pub const DEFAULT_NAMESPACE: &str = "sessiongate";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("invalid cookie name: {0:?}")]
    InvalidCookieName(String),
    #[error("invalid cookie {attribute}: {value:?}")]
    InvalidCookieAttribute {
        attribute: &'static str,
        value: String,
    },
    #[error("SameSite=None cookies must be Secure")]
    InsecureSameSiteNone,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    cookie_name: String,
    namespace: String,
    secret: SecretString,
    auto_error: bool,
    cookie: CookieParams,
}

impl SessionConfig {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            secret,
            auto_error: true,
            cookie: CookieParams::default(),
        }
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Domain-separates tokens of verifiers that share one secret.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// `true`: rejected requests are `AuthError::Unauthorized`.
    /// `false`: rejected requests authenticate as `None`.
    #[must_use]
    pub fn with_auto_error(mut self, auto_error: bool) -> Self {
        self.auto_error = auto_error;
        self
    }

    #[must_use]
    pub fn with_cookie_params(mut self, cookie: CookieParams) -> Self {
        self.cookie = cookie;
        self
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    #[must_use]
    pub fn auto_error(&self) -> bool {
        self.auto_error
    }

    #[must_use]
    pub fn cookie_params(&self) -> &CookieParams {
        &self.cookie
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !is_cookie_token(&self.cookie_name) {
            return Err(ConfigError::InvalidCookieName(self.cookie_name.clone()));
        }

        let path = self.cookie.path();
        if path.is_empty() || !is_attribute_value(path) {
            return Err(ConfigError::InvalidCookieAttribute {
                attribute: "path",
                value: path.to_string(),
            });
        }
        if let Some(domain) = self.cookie.domain() {
            if domain.is_empty() || !is_attribute_value(domain) {
                return Err(ConfigError::InvalidCookieAttribute {
                    attribute: "domain",
                    value: domain.to_string(),
                });
            }
        }

        if self.cookie.same_site() == SameSite::None && !self.cookie.secure() {
            return Err(ConfigError::InsecureSameSiteNone);
        }

        Ok(())
    }
}

// RFC 6265 cookie-name: an RFC 2616 token.
fn is_cookie_token(name: &str) -> bool {
    const SEPARATORS: &str = "()<>@,;:\\\"/[]?={} \t";
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii() && !c.is_ascii_control() && !SEPARATORS.contains(c))
}

fn is_attribute_value(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii() && !c.is_ascii_control() && c != ';')
}
