//! Shared application state.

use std::sync::Arc;

use trustgate_access::TrustPolicy;
use trustgate_core::Result as CoreResult;

use crate::auth::{OAuthExchanger, SessionCodec};
use crate::config::{ConfigError, GatewayConfig};
use crate::proxy::{ProxyForwarder, SkipAuthMatcher};

/// State shared by every request. Built once at startup and never mutated.
pub struct AppState {
    /// Which identities may reach the backend.
    pub trust: TrustPolicy,
    /// Session cookie codec.
    pub sessions: SessionCodec,
    /// OAuth client for the identity provider.
    pub oauth: OAuthExchanger,
    /// Backend forwarder.
    pub forwarder: ProxyForwarder,
    /// Routes forwarded without authentication.
    pub skip_auth: SkipAuthMatcher,
    /// Path the identity provider redirects back to.
    pub callback_path: String,
    /// Optional access-request link for the login page.
    pub admin_contact: Option<String>,
}

impl AppState {
    /// Builds the state from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the HTTP clients cannot be created.
    pub fn from_config(config: GatewayConfig) -> CoreResult<Arc<Self>, ConfigError> {
        let sessions = SessionCodec::new(config.session_key, config.cookie).map_err(|e| {
            ConfigError::Invalid {
                key: "session.ttl",
                reason: e.to_string(),
            }
        })?;
        let oauth = OAuthExchanger::new(&config.oauth).map_err(|e| ConfigError::Invalid {
            key: "oauth",
            reason: e.to_string(),
        })?;
        let forwarder =
            ProxyForwarder::new(config.backend_url, config.raw_url).map_err(|e| {
                ConfigError::Invalid {
                    key: "proxy.backend_url",
                    reason: e.to_string(),
                }
            })?;

        tracing::debug!(backend = %forwarder.origin(), raw_url = forwarder.raw_url(), "backend origin");
        tracing::debug!(path = %config.callback_path, "OAuth callback path");
        for pattern in config.skip_auth.patterns() {
            tracing::debug!(pattern = pattern.template(), "skipping authentication");
        }

        Ok(Arc::new(Self {
            trust: config.trust,
            sessions,
            oauth,
            forwarder,
            skip_auth: config.skip_auth,
            callback_path: config.callback_path,
            admin_contact: config.admin_contact,
        }))
    }
}
