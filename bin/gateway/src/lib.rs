//! trustgate gateway server.
//!
//! This crate provides the HTTP front end that sits between users and an
//! internal web service: it logs users in with an OAuth identity provider,
//! keeps their identity in an encrypted cookie, and forwards requests from
//! trusted identities to the backend with an `X-Forwarded-User` header.

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod debug;
pub mod error;
pub mod pages;
pub mod proxy;
pub mod router;

pub use app::AppState;
pub use config::{ConfigError, GatewayConfig};
pub use error::GatewayError;
pub use router::{RequestState, router};
