//! Encrypted session cookie encoding.
//!
//! The whole session lives in one cookie, encrypted and authenticated with a
//! key derived from the configured secret. A cookie that fails to decrypt or
//! decode is treated the same as no cookie at all.

use std::fmt;
use std::time::Duration;

use axum::http::HeaderMap;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, Key};
use chrono::Utc;
use sha2::{Digest, Sha512};
use trustgate_access::{AccessError, Session};

/// Cookie attributes the session is written with.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    /// Cookie name.
    pub name: String,
    /// Cookie `Path` attribute.
    pub path: String,
    /// Whether the cookie is hidden from scripts.
    pub http_only: bool,
    /// Session lifetime, also used as the cookie's `Max-Age`. Zero makes a
    /// browser-session cookie with no `Max-Age` and no stored expiry.
    pub ttl: Duration,
}

/// Reads and writes the session cookie.
#[derive(Clone)]
pub struct SessionCodec {
    key: Key,
    settings: CookieSettings,
    ttl: Option<chrono::Duration>,
    max_age: Option<time::Duration>,
}

/// Derives the cookie encryption key from the configured secret.
///
/// The secret is stretched to the 64 bytes the cookie key needs with SHA-512,
/// so any non-empty string is usable.
pub fn derive_key(secret: &str) -> Result<Key, SessionError> {
    if secret.is_empty() {
        return Err(SessionError::EmptySecret);
    }

    let digest = Sha512::digest(secret.as_bytes());
    Key::try_from(digest.as_slice()).map_err(|e| SessionError::InvalidKey(e.to_string()))
}

impl SessionCodec {
    /// Creates a codec for the given key and cookie settings.
    pub fn new(key: Key, settings: CookieSettings) -> Result<Self, SessionError> {
        if settings.ttl.is_zero() {
            return Ok(Self {
                key,
                settings,
                ttl: None,
                max_age: None,
            });
        }

        let ttl = chrono::Duration::from_std(settings.ttl)
            .ok()
            .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
            .ok_or(SessionError::TtlOutOfRange(settings.ttl))?;
        let max_age = time::Duration::try_from(settings.ttl)
            .map_err(|_| SessionError::TtlOutOfRange(settings.ttl))?;

        Ok(Self {
            key,
            settings,
            ttl: Some(ttl),
            max_age: Some(max_age),
        })
    }

    /// Reads the session from the request's cookies.
    ///
    /// Returns `None` when there is no session cookie or it was not produced
    /// with this codec's key. The returned session may still be empty or
    /// expired; see [`Session::identity`].
    pub fn read(&self, headers: &HeaderMap) -> Option<Session> {
        let jar = PrivateCookieJar::from_headers(headers, self.key.clone());
        let cookie = jar.get(&self.settings.name)?;

        match decode(cookie.value()) {
            Ok(session) => Some(
                session.with_cookie_attributes(self.settings.path.clone(), self.settings.http_only),
            ),
            Err(err) => {
                tracing::debug!(error = %err, "ignoring undecodable session cookie");
                None
            }
        }
    }

    /// Returns the identity of the request's session, if it has a live one.
    pub fn identity(&self, headers: &HeaderMap) -> Option<String> {
        self.read(headers)
            .and_then(|session| session.identity().map(str::to_string))
    }

    /// Creates a fresh session for `email` with this codec's lifetime.
    pub fn start(&self, email: String, access_token: String) -> Session {
        let session = match self.ttl {
            Some(ttl) => Session::new(email, access_token, ttl),
            None => Session::browser_bound(email, access_token),
        };
        session.with_cookie_attributes(self.settings.path.clone(), self.settings.http_only)
    }

    /// Encodes `session` into a cookie jar ready to be returned with a response.
    pub fn write(&self, session: &Session) -> Result<PrivateCookieJar, SessionError> {
        let value =
            serde_json::to_string(session).map_err(|e| SessionError::Encode(e.to_string()))?;

        let mut cookie = Cookie::build((self.settings.name.clone(), value))
            .path(self.settings.path.clone())
            .http_only(self.settings.http_only);
        if let Some(max_age) = self.max_age {
            cookie = cookie.max_age(max_age);
        }

        Ok(PrivateCookieJar::new(self.key.clone()).add(cookie))
    }

    /// Encodes a session with its identity cleared.
    ///
    /// Logout overwrites the cookie rather than deleting it, so a cleared
    /// session is still authenticated by the key.
    pub fn clear(&self) -> Result<PrivateCookieJar, SessionError> {
        self.write(&Session::cleared(self.ttl))
    }
}

fn decode(value: &str) -> Result<Session, AccessError> {
    serde_json::from_str(value).map_err(|e| AccessError::MalformedSession {
        reason: e.to_string(),
    })
}

/// Session cookie errors.
#[derive(Debug)]
pub enum SessionError {
    /// The session secret is empty.
    EmptySecret,
    /// The derived key was rejected.
    InvalidKey(String),
    /// The session lifetime cannot be represented.
    TtlOutOfRange(Duration),
    /// The session could not be serialized.
    Encode(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySecret => write!(f, "session secret must not be empty"),
            Self::InvalidKey(msg) => write!(f, "invalid session key: {}", msg),
            Self::TtlOutOfRange(ttl) => write!(f, "session TTL {:?} is out of range", ttl),
            Self::Encode(msg) => write!(f, "failed to encode session: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}
