//! Centralized gateway configuration.
//!
//! Settings are layered with the `config` crate: the TOML file first, then
//! `TRUSTGATE_*` environment variables (`__` between nested keys, e.g.
//! `TRUSTGATE_OAUTH__SECRET`), then command-line flags. The merged settings
//! are validated once into an immutable [`GatewayConfig`].

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum_extra::extract::cookie::Key;
use config::{Config, Environment, File, FileFormat};
use reqwest::Url;
use serde::Deserialize;
use trustgate_access::{OAuthConfig, TrustPolicy};
use trustgate_core::{Result as CoreResult, parse_ttl};

use crate::auth::session::{CookieSettings, derive_key};
use crate::cli::Cli;
use crate::proxy::SkipAuthMatcher;

/// Default configuration file, read when present.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Settings as read from file, environment and flags.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Which identities may reach the backend.
    #[serde(flatten)]
    pub trust: TrustPolicy,

    /// Link shown on the login page for requesting access.
    #[serde(default)]
    pub admin_contact: Option<String>,

    /// Identity provider settings.
    pub oauth: OAuthConfig,

    /// Backend settings.
    pub proxy: ProxySettings,

    /// Session cookie settings.
    #[serde(default)]
    pub session: SessionSettings,
}

/// Backend settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxySettings {
    /// Origin requests are forwarded to.
    pub backend_url: String,

    /// Route patterns forwarded without authentication.
    #[serde(default)]
    pub skip_auth: Vec<String>,

    /// Forward the request path exactly as received.
    #[serde(default)]
    pub disable_url_decode: bool,
}

/// Session cookie settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Secret the cookie key is derived from.
    #[serde(default)]
    pub secret: String,

    /// Session lifetime, e.g. `30d`.
    #[serde(default = "default_session_ttl")]
    pub ttl: String,

    /// Cookie `Path` attribute.
    #[serde(default = "default_session_path")]
    pub path: String,

    /// Cookie `HttpOnly` attribute.
    #[serde(default = "default_http_only")]
    pub http_only: bool,

    /// Cookie name.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_session_ttl() -> String {
    "30d".to_string()
}

fn default_session_path() -> String {
    "/".to_string()
}

fn default_http_only() -> bool {
    true
}

fn default_cookie_name() -> String {
    "trustgate".to_string()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            ttl: default_session_ttl(),
            path: default_session_path(),
            http_only: default_http_only(),
            cookie_name: default_cookie_name(),
        }
    }
}

/// Validated runtime configuration.
pub struct GatewayConfig {
    pub bind: SocketAddr,
    pub trust: TrustPolicy,
    pub admin_contact: Option<String>,
    pub oauth: OAuthConfig,
    /// Path component of the OAuth redirect URI.
    pub callback_path: String,
    pub backend_url: Url,
    pub raw_url: bool,
    pub skip_auth: SkipAuthMatcher,
    pub session_key: Key,
    pub cookie: CookieSettings,
}

/// Environment source used by [`load`].
pub fn environment() -> Environment {
    Environment::with_prefix("TRUSTGATE")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("trusted_emails")
        .with_list_parse_key("proxy.skip_auth")
}

/// Loads and validates configuration from the file, the process
/// environment and `cli`.
///
/// # Errors
///
/// Returns an error if a source cannot be read or a setting is missing or
/// invalid.
pub fn load(cli: &Cli) -> CoreResult<GatewayConfig, ConfigError> {
    let settings = read_settings(cli, environment())?;
    validate(settings)
}

/// Merges the configuration sources into [`Settings`].
///
/// The file named by `--config` must exist; the default file is optional.
pub fn read_settings(cli: &Cli, env: Environment) -> CoreResult<Settings, ConfigError> {
    let (path, required) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    let overrides = [
        ("session.secret", cli.session_secret.clone()),
        ("session.path", cli.session_path.clone()),
        ("session.ttl", cli.session_ttl.clone()),
        ("oauth.scope", cli.oauth_scope.clone()),
        ("oauth.client_id", cli.oauth_client_id.clone()),
        ("oauth.secret", cli.oauth_secret.clone()),
        ("oauth.callback", cli.oauth_callback.clone()),
        ("proxy.backend_url", cli.backend_url.clone()),
        ("trusted_domain", cli.trusted_domain.clone()),
        ("bind", cli.bind.clone()),
    ];

    let mut builder = Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml).required(required))
        .add_source(env)
        .set_override_option("session.http_only", cli.session_http_only)
        .map_err(load_error)?;
    for (key, value) in overrides {
        builder = builder.set_override_option(key, value).map_err(load_error)?;
    }

    let settings = builder
        .build()
        .map_err(load_error)?
        .try_deserialize()
        .map_err(load_error)?;

    Ok(settings)
}

fn load_error(e: config::ConfigError) -> ConfigError {
    ConfigError::Load {
        details: e.to_string(),
    }
}

/// Validates merged settings into the runtime configuration.
///
/// # Errors
///
/// Returns an error naming the first invalid setting.
pub fn validate(settings: Settings) -> CoreResult<GatewayConfig, ConfigError> {
    let bind = settings
        .bind
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::invalid("bind", e))?;

    let oauth = settings.oauth;
    require("oauth.client_id", oauth.client_id())?;
    require("oauth.secret", oauth.client_secret())?;
    require("oauth.callback", oauth.redirect_uri())?;
    let callback = Url::parse(oauth.redirect_uri())
        .map_err(|e| ConfigError::invalid("oauth.callback", e))?;
    let callback_path = callback.path().to_string();

    require("proxy.backend_url", &settings.proxy.backend_url)?;
    let backend_url = Url::parse(&settings.proxy.backend_url)
        .map_err(|e| ConfigError::invalid("proxy.backend_url", e))?;
    if !matches!(backend_url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            "proxy.backend_url",
            format!("unsupported scheme '{}'", backend_url.scheme()),
        )
        .into());
    }

    let skip_auth = SkipAuthMatcher::new(&settings.proxy.skip_auth)
        .map_err(|e| ConfigError::invalid("proxy.skip_auth", e))?;

    let session = settings.session;
    require("session.secret", &session.secret)?;
    let session_key =
        derive_key(&session.secret).map_err(|e| ConfigError::invalid("session.secret", e))?;
    let ttl = parse_ttl(&session.ttl).map_err(|e| ConfigError::invalid("session.ttl", e))?;
    require("session.cookie_name", &session.cookie_name)?;

    if settings.trust.is_empty() {
        tracing::warn!("no trusted_domain or trusted_emails configured; every login will be refused");
    }

    Ok(GatewayConfig {
        bind,
        trust: settings.trust,
        admin_contact: settings.admin_contact.filter(|c| !c.is_empty()),
        oauth,
        callback_path,
        backend_url,
        raw_url: settings.proxy.disable_url_decode,
        skip_auth,
        session_key,
        cookie: CookieSettings {
            name: session.cookie_name,
            path: session.path,
            http_only: session.http_only,
            ttl,
        },
    })
}

fn require(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Missing { key })
    } else {
        Ok(())
    }
}

/// Startup configuration errors. Always fatal.
#[derive(Debug)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    Load { details: String },
    /// A required setting is absent or empty.
    Missing { key: &'static str },
    /// A setting has an unusable value.
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl fmt::Display) -> Self {
        Self::Invalid {
            key,
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { details } => write!(f, "failed to load configuration: {}", details),
            Self::Missing { key } => write!(f, "missing required setting '{}'", key),
            Self::Invalid { key, reason } => write!(f, "invalid setting '{}': {}", key, reason),
        }
    }
}

impl std::error::Error for ConfigError {}
