//! Core utilities for the trustgate authenticating gateway.
//!
//! This crate provides the foundational error handling and the small parsers
//! shared by the gateway's configuration layer.

pub mod error;
pub mod ttl;

pub use error::Result;
pub use ttl::{TtlError, parse_ttl};
