//! Identity checks and session records for the trustgate gateway.
//!
//! This crate provides:
//! - The trust policy deciding which emails may reach the backend (`TrustPolicy`)
//! - The client-held session record (`Session`)
//! - Identity-provider settings (`OAuthConfig`)
//! - Access error types
//!
//! # Access Control Model
//!
//! Access is a single allow/deny decision over the email address the
//! identity provider reports. There are no roles or per-route rules.
//!
//! # Example
//!
//! ```
//! use trustgate_access::{Session, TrustPolicy};
//! use chrono::Duration;
//!
//! let policy = TrustPolicy::new(
//!     Some("@example.com".to_string()),
//!     ["contractor@partner.org".to_string()],
//! );
//!
//! assert!(policy.is_trusted("alice@example.com"));
//! assert!(policy.is_trusted("contractor@partner.org"));
//! assert!(!policy.is_trusted("mallory@example.org"));
//!
//! let session = Session::new(
//!     "alice@example.com".to_string(),
//!     "access-token".to_string(),
//!     Duration::days(30),
//! );
//! assert_eq!(session.identity(), Some("alice@example.com"));
//! ```

pub mod error;
pub mod oauth;
pub mod session;
pub mod trust;

// Re-export main types at crate root
pub use error::AccessError;
pub use oauth::{OAuthConfig, OAuthConfigBuilder};
pub use session::Session;
pub use trust::TrustPolicy;
