//! Request dispatch.
//!
//! Every request is classified on its own, with no state carried between
//! requests:
//!
//! 1. a skip-auth route is forwarded anonymously;
//! 2. the OAuth callback completes the login flow;
//! 3. `/logout` clears the session;
//! 4. `/dbg*` echoes the request;
//! 5. anything else needs a session whose email the trust policy accepts,
//!    and gets the login page otherwise.
//!
//! The state a request finished in is attached to its response as a
//! [`RequestState`] extension.

use std::fmt;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::app::AppState;
use crate::error::{GatewayError, panic_response};
use crate::{auth, debug, pages};

/// Path that clears the session.
pub const LOGOUT_PATH: &str = "/logout";

/// Prefix of the debug echo route.
pub const DEBUG_PREFIX: &str = "/dbg";

/// Where a request is in the authentication flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// No usable session cookie.
    NoSession,
    /// An identity is known and is being checked against the trust policy.
    AwaitingTrustCheck,
    /// The request is being relayed to the backend.
    Forwarding,
    /// The caller is shown the login page.
    LoginPrompt,
    /// The identity provider redirected back with a code.
    OAuthCallback,
    /// The request ended with the failure page.
    Failed,
}

impl RequestState {
    /// Records a transition into this state.
    pub fn enter(self) -> Self {
        tracing::debug!(state = %self, "request state");
        self
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoSession => "no-session",
            Self::AwaitingTrustCheck => "awaiting-trust-check",
            Self::Forwarding => "forwarding",
            Self::LoginPrompt => "login-prompt",
            Self::OAuthCallback => "oauth-callback",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Route a request was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SkipAuth,
    Callback,
    Logout,
    Debug,
    Protected,
}

impl Route {
    /// Classifies a request URI. Skip-auth patterns take precedence.
    pub fn classify(state: &AppState, uri: &Uri) -> Self {
        let path = uri.path();
        if state.skip_auth.is_match(path) {
            Self::SkipAuth
        } else if path == state.callback_path {
            Self::Callback
        } else if path == LOGOUT_PATH {
            Self::Logout
        } else if path.starts_with(DEBUG_PREFIX) {
            Self::Debug
        } else {
            Self::Protected
        }
    }
}

/// Builds the gateway router.
pub fn router(state: Arc<AppState>) -> Router {
    with_boundary(Router::new().fallback(dispatch).with_state(state))
}

/// Wraps a router in the error boundary and request tracing.
pub fn with_boundary(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let route = Route::classify(&state, request.uri());
    tracing::debug!(route = ?route, path = %request.uri().path(), "dispatching");

    let result = match route {
        Route::SkipAuth => state
            .forwarder
            .forward(request, None)
            .await
            .map(|response| (RequestState::Forwarding.enter(), response))
            .map_err(GatewayError::from),
        Route::Callback => {
            RequestState::OAuthCallback.enter();
            auth::callback(&state, request.uri())
                .await
                .map(|response| (RequestState::OAuthCallback, response))
        }
        Route::Logout => auth::logout(&state).map(|response| (RequestState::NoSession, response)),
        Route::Debug => Ok((RequestState::NoSession, debug::echo(request).await)),
        Route::Protected => protected(&state, request).await,
    };

    let (final_state, mut response) = match result {
        Ok(outcome) => outcome,
        Err(err) => (RequestState::Failed.enter(), err.into_response()),
    };
    response.extensions_mut().insert(final_state);
    response
}

/// Serves a route that requires a trusted session.
async fn protected(
    state: &AppState,
    request: Request,
) -> Result<(RequestState, Response), GatewayError> {
    let Some(email) = state.sessions.identity(request.headers()) else {
        RequestState::NoSession.enter();
        let return_path = request
            .uri()
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        let authorize_url = state.oauth.authorize_url(return_path);
        let page = pages::login_page(&authorize_url, state.admin_contact.as_deref());
        return Ok((RequestState::LoginPrompt.enter(), page.into_response()));
    };

    RequestState::AwaitingTrustCheck.enter();
    state.trust.authorize(&email)?;

    let response = state.forwarder.forward(request, Some(&email)).await?;
    Ok((RequestState::Forwarding.enter(), response))
}
