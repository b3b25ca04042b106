//! Per-request error type and the outermost error boundary.
//!
//! Every failure a handler can return ends up here and is rendered as the
//! failure page with status 500. Panics are caught by [`panic_response`],
//! which renders the same page, so a single bad request never takes the
//! process down.

use std::any::Any;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use trustgate_access::AccessError;

use crate::auth::oauth::ExchangeError;
use crate::auth::session::SessionError;
use crate::pages;
use crate::proxy::ForwardError;

/// Errors that end a request with the failure page.
#[derive(Debug)]
pub enum GatewayError {
    /// The identity is not trusted.
    Access(AccessError),
    /// The OAuth exchange failed.
    Exchange(ExchangeError),
    /// The session cookie could not be written.
    Session(SessionError),
    /// The backend could not be reached.
    Forward(ForwardError),
}

impl GatewayError {
    /// Status the failure page is rendered with.
    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access(e) => write!(f, "{}", e),
            Self::Exchange(e) => write!(f, "{}", e),
            Self::Session(e) => write!(f, "{}", e),
            Self::Forward(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Access(e) => Some(e),
            Self::Exchange(e) => Some(e),
            Self::Session(e) => Some(e),
            Self::Forward(e) => Some(e),
        }
    }
}

impl From<AccessError> for GatewayError {
    fn from(e: AccessError) -> Self {
        Self::Access(e)
    }
}

impl From<ExchangeError> for GatewayError {
    fn from(e: ExchangeError) -> Self {
        Self::Exchange(e)
    }
}

impl From<SessionError> for GatewayError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

impl From<ForwardError> for GatewayError {
    fn from(e: ForwardError) -> Self {
        Self::Forward(e)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            Self::Access(e) if e.is_user_facing() => {
                tracing::warn!(error = %self, "request refused");
            }
            Self::Exchange(_) => {
                tracing::warn!(error = %self, "OAuth exchange failed");
            }
            _ => {
                tracing::error!(error = %self, "request failed");
            }
        }

        let status = self.status();
        (status, pages::error_page(status, &self.to_string())).into_response()
    }
}

/// Renders a caught handler panic as the failure page.
///
/// Used as the `CatchPanicLayer` handler.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };

    tracing::error!(panic = %detail, "handler panicked");

    let status = StatusCode::INTERNAL_SERVER_ERROR;
    (status, pages::error_page(status, detail)).into_response()
}
