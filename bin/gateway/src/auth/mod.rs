//! Authentication for the gateway.
//!
//! This module provides:
//! - The OAuth authorization-code exchange with the identity provider
//! - The encrypted, client-held session cookie
//! - The callback and logout handlers
//!
//! # Session Model
//!
//! Sessions are stateless: everything the gateway knows about a caller is in
//! the session cookie, encrypted and authenticated with a key derived from
//! the configured secret. Nothing is stored server-side, so an issued cookie
//! stays valid until it expires or the secret is rotated.

pub mod oauth;
pub mod routes;
pub mod session;

pub use oauth::{ExchangeError, Identity, OAuthExchanger};
pub use routes::{callback, logout};
pub use session::{CookieSettings, SessionCodec, SessionError};
