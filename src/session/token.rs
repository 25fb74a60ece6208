//! Signed session tokens.
//!
//! A token is `<id>.<mac>`: the session id in its simple (32 lowercase hex
//! digits) form and the unpadded base64url HMAC-SHA256 of
//! `id || 0x00 || namespace` under the shared secret. The token carries no
//! expiry; the session store decides how long an id stays valid.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Shortest secret accepted by [`TokenCodec::new`].
pub const MIN_SECRET_BYTES: usize = 32;

const SEPARATOR: char = '.';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Any token that does not verify, whatever the reason.
    #[error("invalid session token")]
    SignatureInvalid,
    #[error("session secret must be at least {MIN_SECRET_BYTES} bytes")]
    WeakSecret,
}

/// Signs and verifies session ids.
#[derive(Clone)]
pub struct TokenCodec {
    keyed: HmacSha256,
    namespace: String,
}

impl TokenCodec {
    /// Build a codec for `namespace` keyed with `secret`.
    ///
    /// # Errors
    /// Returns [`TokenError::WeakSecret`] if the secret is shorter than
    /// [`MIN_SECRET_BYTES`].
    pub fn new(secret: &SecretString, namespace: impl Into<String>) -> Result<Self, TokenError> {
        let secret = secret.expose_secret().as_bytes();
        if secret.len() < MIN_SECRET_BYTES {
            return Err(TokenError::WeakSecret);
        }
        let keyed = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::WeakSecret)?;

        Ok(Self {
            keyed,
            namespace: namespace.into(),
        })
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Produce the cookie value for `id`.
    #[must_use]
    pub fn sign(&self, id: Uuid) -> String {
        let id_text = id.simple().to_string();
        let tag = self.mac_for(&id_text).finalize().into_bytes();
        format!(
            "{id_text}{SEPARATOR}{}",
            Base64UrlUnpadded::encode_string(&tag)
        )
    }

    /// Recover the session id from a cookie value.
    ///
    /// # Errors
    /// Returns [`TokenError::SignatureInvalid`] for every token that was not
    /// produced by [`TokenCodec::sign`] with the same secret and namespace,
    /// including tokens that fail to parse at all.
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let (id_text, tag_text) = token
            .split_once(SEPARATOR)
            .ok_or(TokenError::SignatureInvalid)?;

        let tag =
            Base64UrlUnpadded::decode_vec(tag_text).map_err(|_| TokenError::SignatureInvalid)?;
        // Reject encodings with stray trailing bits so every accepted token has one spelling.
        if Base64UrlUnpadded::encode_string(&tag) != tag_text {
            return Err(TokenError::SignatureInvalid);
        }

        self.mac_for(id_text)
            .verify_slice(&tag)
            .map_err(|_| TokenError::SignatureInvalid)?;

        let id = Uuid::try_parse(id_text).map_err(|_| TokenError::SignatureInvalid)?;
        if id.simple().to_string() != id_text {
            return Err(TokenError::SignatureInvalid);
        }

        Ok(id)
    }

    fn mac_for(&self, id_text: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(id_text.as_bytes());
        mac.update(&[0]);
        mac.update(self.namespace.as_bytes());
        mac
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
