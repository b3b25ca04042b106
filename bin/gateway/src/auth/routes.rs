//! OAuth callback and logout handlers.

use axum::extract::Query;
use axum::http::header::LOCATION;
use axum::http::{HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::oauth::ExchangeError;
use crate::app::AppState;
use crate::error::GatewayError;
use crate::router::RequestState;

/// Query parameters the identity provider sends to the callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    code: String,
    /// The original request URI, round-tripped through the provider.
    #[serde(default)]
    state: String,
    /// Set instead of `code` when the user or provider refused.
    error: Option<String>,
}

/// Completes the OAuth flow.
///
/// A trusted identity gets a fresh session cookie and is redirected to the
/// URI it originally asked for. Anything else fails without a cookie.
pub async fn callback(state: &AppState, uri: &Uri) -> Result<Response, GatewayError> {
    let query = Query::<CallbackQuery>::try_from_uri(uri)
        .map(|Query(query)| query)
        .unwrap_or_default();

    if let Some(reason) = query.error {
        return Err(ExchangeError::Denied(reason).into());
    }

    let identity = state.oauth.exchange(&query.code).await?;

    RequestState::AwaitingTrustCheck.enter();
    state.trust.authorize(&identity.email)?;

    tracing::info!(email = %identity.email, "session established");
    let session = state.sessions.start(identity.email, identity.access_token);
    let jar = state.sessions.write(&session)?;

    Ok((jar, found(redirect_target(&query.state))).into_response())
}

/// Clears the session and redirects to the site root.
pub fn logout(state: &AppState) -> Result<Response, GatewayError> {
    let jar = state.sessions.clear()?;
    Ok((jar, found("/")).into_response())
}

/// Returns where to send the user after login.
///
/// Only same-site paths are honored; an empty or foreign target goes to `/`.
/// This deliberately departs from redirecting to `state` verbatim, which
/// would make the callback an open redirect.
fn redirect_target(state: &str) -> &str {
    let same_site =
        state.starts_with('/') && !state.starts_with("//") && !state.starts_with("/\\");
    if same_site { state } else { "/" }
}

fn found(location: &str) -> Response {
    let location = HeaderValue::from_str(location).unwrap_or(HeaderValue::from_static("/"));
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}
