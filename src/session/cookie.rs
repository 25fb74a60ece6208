//! Reading and writing the session cookie.
//!
//! The frontend only moves signed tokens between headers and the codec. It
//! never talks to the store: clearing the cookie does not end the session on
//! the server, [`super::SessionAuth::logout`] does both.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::token::TokenCodec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lax" => Ok(Self::Lax),
            "none" => Ok(Self::None),
            _ => Err(format!("invalid SameSite value: {value}")),
        }
    }
}

/// Browser-side cookie attributes.
///
/// These only tell the browser when to send or drop the cookie; whether a
/// session is valid is decided by the store. `HttpOnly` is always set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieParams {
    max_age: Option<u64>,
    secure: bool,
    same_site: SameSite,
    domain: Option<String>,
    path: String,
}

impl Default for CookieParams {
    fn default() -> Self {
        Self {
            max_age: None,
            secure: true,
            same_site: SameSite::default(),
            domain: None,
            path: "/".to_string(),
        }
    }
}

impl CookieParams {
    /// Browser expiry in seconds; without it the cookie lasts for the browser session.
    #[must_use]
    pub fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    #[must_use]
    pub fn without_max_age(mut self) -> Self {
        self.max_age = None;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn max_age(&self) -> Option<u64> {
        self.max_age
    }

    #[must_use]
    pub fn secure(&self) -> bool {
        self.secure
    }

    #[must_use]
    pub fn same_site(&self) -> SameSite {
        self.same_site
    }

    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Moves session tokens in and out of HTTP headers.
#[derive(Debug, Clone)]
pub struct CookieFrontend {
    name: String,
    params: CookieParams,
    codec: TokenCodec,
}

impl CookieFrontend {
    #[must_use]
    pub fn new(name: impl Into<String>, params: CookieParams, codec: TokenCodec) -> Self {
        Self {
            name: name.into(),
            params,
            codec,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn params(&self) -> &CookieParams {
        &self.params
    }

    /// Raw value of the session cookie, if the request carries a non-empty one.
    #[must_use]
    pub fn extract(&self, headers: &HeaderMap) -> Option<String> {
        for header in headers.get_all(COOKIE) {
            let Ok(value) = header.to_str() else {
                continue;
            };
            for pair in value.split(';') {
                let Some((key, val)) = pair.trim().split_once('=') else {
                    continue;
                };
                if key.trim() != self.name {
                    continue;
                }
                let val = val.trim().trim_matches('"');
                // The first cookie with our name wins, even when empty.
                return (!val.is_empty()).then(|| val.to_string());
            }
        }
        None
    }

    /// Add a `Set-Cookie` header carrying the signed token for `id`.
    ///
    /// # Errors
    /// Returns an error if the rendered cookie is not a valid header value.
    pub fn attach(&self, headers: &mut HeaderMap, id: Uuid) -> Result<(), InvalidHeaderValue> {
        let token = self.codec.sign(id);
        let cookie = self.render(&token, self.params.max_age);
        headers.append(SET_COOKIE, HeaderValue::from_str(&cookie)?);
        Ok(())
    }

    /// Add a `Set-Cookie` header that makes the browser drop the session cookie.
    ///
    /// # Errors
    /// Returns an error if the rendered cookie is not a valid header value.
    pub fn clear(&self, headers: &mut HeaderMap) -> Result<(), InvalidHeaderValue> {
        let cookie = self.render("", Some(0));
        headers.append(SET_COOKIE, HeaderValue::from_str(&cookie)?);
        Ok(())
    }

    fn render(&self, value: &str, max_age: Option<u64>) -> String {
        let mut cookie = format!("{}={value}; HttpOnly", self.name);
        if self.params.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str("; SameSite=");
        cookie.push_str(self.params.same_site.as_str());
        if let Some(max_age) = max_age {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        if let Some(domain) = &self.params.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        cookie.push_str("; Path=");
        cookie.push_str(&self.params.path);
        cookie
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn frontend(params: CookieParams) -> CookieFrontend {
        let secret = SecretString::from("0123456789abcdef0123456789abcdef".to_string());
        let codec =
            TokenCodec::new(&secret, "cookie").unwrap_or_else(|err| panic!("codec: {err}"));
        CookieFrontend::new("session", params, codec)
    }

    fn set_cookies(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok().map(str::to_string))
            .collect()
    }

    #[test]
    fn extract_finds_named_cookie() {
        let frontend = frontend(CookieParams::default());
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; session=abc.def ; lang=en"),
        );
        assert_eq!(frontend.extract(&headers), Some("abc.def".to_string()));
    }

    #[test]
    fn extract_scans_every_cookie_header() {
        let frontend = frontend(CookieParams::default());
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("session=\"abc.def\""));
        assert_eq!(frontend.extract(&headers), Some("abc.def".to_string()));
    }

    #[test]
    fn extract_absent_or_empty() {
        let frontend = frontend(CookieParams::default());
        assert_eq!(frontend.extract(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("session=; other=1"));
        assert_eq!(frontend.extract(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sessionx=1; xsession=2; session"));
        assert_eq!(frontend.extract(&headers), None);
    }

    #[test]
    fn attach_renders_all_attributes() -> anyhow::Result<()> {
        let params = CookieParams::default()
            .with_max_age(3600)
            .with_same_site(SameSite::Strict)
            .with_domain("example.com")
            .with_path("/app");
        let frontend = frontend(params);
        let id = Uuid::new_v4();

        let mut headers = HeaderMap::new();
        frontend.attach(&mut headers, id)?;

        let token = frontend.codec.sign(id);
        assert_eq!(
            set_cookies(&headers),
            vec![format!(
                "session={token}; HttpOnly; Secure; SameSite=Strict; Max-Age=3600; Domain=example.com; Path=/app"
            )]
        );
        Ok(())
    }

    #[test]
    fn attach_minimal_insecure_cookie() -> anyhow::Result<()> {
        let frontend = frontend(CookieParams::default().with_secure(false));
        let mut headers = HeaderMap::new();
        frontend.attach(&mut headers, Uuid::new_v4())?;

        let cookies = set_cookies(&headers);
        assert_eq!(cookies.len(), 1);
        let cookie = &cookies[0];
        assert!(cookie.starts_with("session="));
        assert!(cookie.ends_with("; HttpOnly; SameSite=Lax; Path=/"));
        assert!(!cookie.contains("Secure"));
        assert!(!cookie.contains("Max-Age"));
        Ok(())
    }

    #[test]
    fn attached_cookie_round_trips_through_extract() -> anyhow::Result<()> {
        let frontend = frontend(CookieParams::default());
        let id = Uuid::new_v4();
        let mut response = HeaderMap::new();
        frontend.attach(&mut response, id)?;

        let set_cookie = set_cookies(&response).remove(0);
        let pair = set_cookie.split(';').next().unwrap_or_default().to_string();
        let mut request = HeaderMap::new();
        request.insert(COOKIE, HeaderValue::from_str(&pair)?);

        let raw = frontend.extract(&request);
        assert_eq!(raw.as_deref().map(|raw| frontend.codec.verify(raw)), Some(Ok(id)));
        Ok(())
    }

    #[test]
    fn clear_expires_immediately_with_matching_scope() -> anyhow::Result<()> {
        let frontend = frontend(CookieParams::default().with_max_age(60).with_domain("example.com"));
        let mut headers = HeaderMap::new();
        frontend.clear(&mut headers)?;
        assert_eq!(
            set_cookies(&headers),
            vec![
                "session=; HttpOnly; Secure; SameSite=Lax; Max-Age=0; Domain=example.com; Path=/"
                    .to_string()
            ]
        );
        Ok(())
    }

    #[test]
    fn same_site_parses_case_insensitively() {
        assert_eq!("STRICT".parse::<SameSite>(), Ok(SameSite::Strict));
        assert_eq!("lax".parse::<SameSite>(), Ok(SameSite::Lax));
        assert_eq!("None".parse::<SameSite>(), Ok(SameSite::None));
        assert!("sometimes".parse::<SameSite>().is_err());
    }
}
