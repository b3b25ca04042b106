//! OAuth identity-provider configuration.
//!
//! This module provides configuration types for connecting to an external
//! OAuth2 authorization-code provider. The endpoints default to Google's.

use serde::{Deserialize, Serialize};

/// Default authorization endpoint.
pub const DEFAULT_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/auth";

/// Default token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.google.com/o/oauth2/token";

/// Default profile endpoint, queried with the access token to learn the email.
pub const DEFAULT_PROFILE_URL: &str = "https://www.googleapis.com/oauth2/v1/userinfo?alt=json";

/// Configuration for the OAuth identity provider.
///
/// Field names follow the configuration file: `client_id`, `secret`,
/// `callback` and `scope`. Fields with defaults can be omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// The OAuth2 client ID registered with the provider.
    client_id: String,
    /// The OAuth2 client secret.
    #[serde(rename = "secret")]
    client_secret: String,
    /// Absolute redirect URI for the callback
    /// (e.g., "https://gate.example.com/oauth2callback").
    #[serde(rename = "callback")]
    redirect_uri: String,
    /// Scopes to request, separated by spaces or `+`.
    #[serde(default = "default_scope")]
    scope: String,
    /// The provider's authorization endpoint.
    #[serde(default = "default_authorize_url")]
    authorize_url: String,
    /// The provider's token endpoint.
    #[serde(default = "default_token_url")]
    token_url: String,
    /// The provider's profile endpoint.
    #[serde(default = "default_profile_url")]
    profile_url: String,
    /// Timeout for token and profile requests, in seconds.
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

fn default_scope() -> String {
    "https://www.googleapis.com/auth/userinfo.email".to_string()
}

fn default_authorize_url() -> String {
    DEFAULT_AUTHORIZE_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_profile_url() -> String {
    DEFAULT_PROFILE_URL.to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl OAuthConfig {
    /// Creates a new OAuth configuration with defaults for optional fields.
    #[must_use]
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            scope: default_scope(),
            authorize_url: default_authorize_url(),
            token_url: default_token_url(),
            profile_url: default_profile_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Creates a configuration builder for more customization.
    #[must_use]
    pub fn builder(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> OAuthConfigBuilder {
        OAuthConfigBuilder::new(client_id, client_secret, redirect_uri)
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the OAuth2 redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Returns the scopes to request.
    ///
    /// `+` is accepted as a separator so URL-style scope strings copied from
    /// provider documentation work unchanged.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .split(['+', ' '])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Returns the authorization endpoint.
    #[must_use]
    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    /// Returns the token endpoint.
    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Returns the profile endpoint.
    #[must_use]
    pub fn profile_url(&self) -> &str {
        &self.profile_url
    }

    /// Returns the network timeout for provider requests, in seconds.
    #[must_use]
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }
}

/// Builder for `OAuthConfig`.
#[derive(Debug)]
pub struct OAuthConfigBuilder {
    config: OAuthConfig,
}

impl OAuthConfigBuilder {
    /// Creates a new builder with required fields.
    #[must_use]
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            config: OAuthConfig::new(client_id, client_secret, redirect_uri),
        }
    }

    /// Sets the scopes to request.
    #[must_use]
    pub fn scope(mut self, scope: String) -> Self {
        self.config.scope = scope;
        self
    }

    /// Sets the authorization endpoint.
    #[must_use]
    pub fn authorize_url(mut self, url: String) -> Self {
        self.config.authorize_url = url;
        self
    }

    /// Sets the token endpoint.
    #[must_use]
    pub fn token_url(mut self, url: String) -> Self {
        self.config.token_url = url;
        self
    }

    /// Sets the profile endpoint.
    #[must_use]
    pub fn profile_url(mut self, url: String) -> Self {
        self.config.profile_url = url;
        self
    }

    /// Sets the provider request timeout.
    #[must_use]
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.timeout_seconds = seconds;
        self
    }

    /// Builds the `OAuthConfig`.
    #[must_use]
    pub fn build(self) -> OAuthConfig {
        self.config
    }
}
