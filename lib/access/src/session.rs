//! Client-held session records.
//!
//! A session lives entirely inside the encrypted session cookie. The gateway
//! keeps no server-side copy: it is created after a successful OAuth callback
//! and destroyed by logout (values cleared) or by the cookie expiring. A
//! session without an expiry lasts until the browser discards the cookie.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated caller's session.
///
/// Only `email`, `access_token` and `expires_at` travel inside the cookie
/// value. The cookie path and http-only flag are cookie attributes and are
/// filled in from configuration when the session is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The authenticated email address. Empty for a cleared session.
    email: String,
    /// Access token from the completed OAuth exchange for `email`.
    access_token: String,
    /// When the session expires, if ever.
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    /// Cookie `Path` attribute.
    #[serde(skip)]
    cookie_path: String,
    /// Cookie `HttpOnly` attribute.
    #[serde(skip)]
    http_only: bool,
}

impl Session {
    /// Creates a session for `email` valid for `ttl`.
    #[must_use]
    pub fn new(email: String, access_token: String, ttl: Duration) -> Self {
        Self {
            email,
            access_token,
            expires_at: Some(Utc::now() + ttl),
            cookie_path: "/".to_string(),
            http_only: true,
        }
    }

    /// Creates a session for `email` with no expiry of its own.
    #[must_use]
    pub fn browser_bound(email: String, access_token: String) -> Self {
        Self {
            expires_at: None,
            ..Self::new(email, access_token, Duration::zero())
        }
    }

    /// Creates a session with its identity cleared, as written on logout.
    #[must_use]
    pub fn cleared(ttl: Option<Duration>) -> Self {
        match ttl {
            Some(ttl) => Self::new(String::new(), String::new(), ttl),
            None => Self::browser_bound(String::new(), String::new()),
        }
    }

    /// Sets the cookie attributes the session is written with.
    #[must_use]
    pub fn with_cookie_attributes(mut self, cookie_path: String, http_only: bool) -> Self {
        self.cookie_path = cookie_path;
        self.http_only = http_only;
        self
    }

    /// Returns the authenticated email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the OAuth access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns when the session expires, or `None` if it never does.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns the cookie path.
    #[must_use]
    pub fn cookie_path(&self) -> &str {
        &self.cookie_path
    }

    /// Returns true if the cookie is http-only.
    #[must_use]
    pub fn http_only(&self) -> bool {
        self.http_only
    }

    /// Returns true if the session carries no identity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_empty()
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Returns the session's identity if it is present and unexpired.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        (!self.is_empty() && !self.is_expired()).then_some(self.email.as_str())
    }
}
