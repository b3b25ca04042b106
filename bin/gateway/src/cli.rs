//! Command-line interface.
//!
//! Every flag except `--config` and `--verbose` overrides the matching
//! configuration key from the file and environment.

use std::path::PathBuf;

use clap::Parser;

/// Authenticating reverse proxy in front of an internal web service.
#[derive(Debug, Default, Parser)]
#[command(name = "trustgate", version, about)]
pub struct Cli {
    /// Configuration file. Defaults to `config.toml` when present.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Secret the session cookie key is derived from.
    #[arg(long, value_name = "SECRET")]
    pub session_secret: Option<String>,

    /// Cookie path.
    #[arg(long, value_name = "PATH")]
    pub session_path: Option<String>,

    /// Session lifetime, e.g. `30d` or `1d12h`.
    #[arg(long, value_name = "TTL")]
    pub session_ttl: Option<String>,

    /// Whether the session cookie is hidden from scripts.
    #[arg(long, value_name = "BOOL")]
    pub session_http_only: Option<bool>,

    /// OAuth scopes, separated by spaces or `+`.
    #[arg(long, value_name = "SCOPE")]
    pub oauth_scope: Option<String>,

    /// OAuth client ID.
    #[arg(long, value_name = "ID")]
    pub oauth_client_id: Option<String>,

    /// OAuth client secret.
    #[arg(long, value_name = "SECRET")]
    pub oauth_secret: Option<String>,

    /// Absolute OAuth redirect URI; its path is served as the callback.
    #[arg(long, value_name = "URL")]
    pub oauth_callback: Option<String>,

    /// Backend origin requests are forwarded to.
    #[arg(long, value_name = "URL")]
    pub backend_url: Option<String>,

    /// Email suffix to trust, including the `@`.
    #[arg(long, value_name = "SUFFIX")]
    pub trusted_domain: Option<String>,

    /// Address to listen on.
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Log at debug level.
    #[arg(short, long)]
    pub verbose: bool,
}
