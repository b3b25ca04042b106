//! OAuth authorization-code client using the oauth2 crate.
//!
//! The gateway sends unauthenticated callers to the provider's authorization
//! endpoint with their original request URI in `state`, then trades the code
//! it receives on the callback for an access token and asks the provider's
//! profile endpoint whose token it is.

use std::fmt;
use std::time::Duration;

use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tracing::instrument;
use trustgate_access::OAuthConfig;

/// Client with the authorization and token endpoints configured.
type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Performs the authorization-code exchange against the identity provider.
pub struct OAuthExchanger {
    client: ConfiguredClient,
    scopes: Vec<Scope>,
    profile_url: reqwest::Url,
    http_client: reqwest::Client,
}

/// The identity established by a completed exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub access_token: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("email", &self.email)
            .field("access_token", &"[redacted]")
            .finish()
    }
}

/// Subset of the provider's profile response the gateway needs.
#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(default)]
    email: String,
}

impl OAuthExchanger {
    /// Creates a new exchanger from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &OAuthConfig) -> Result<Self, ExchangeError> {
        let auth_url = AuthUrl::new(config.authorize_url().to_string()).map_err(|e| {
            ExchangeError::Configuration(format!("invalid authorization URL: {}", e))
        })?;
        let token_url = TokenUrl::new(config.token_url().to_string())
            .map_err(|e| ExchangeError::Configuration(format!("invalid token URL: {}", e)))?;
        let redirect_url = RedirectUrl::new(config.redirect_uri().to_string())
            .map_err(|e| ExchangeError::Configuration(format!("invalid callback URL: {}", e)))?;
        let profile_url = reqwest::Url::parse(config.profile_url())
            .map_err(|e| ExchangeError::Configuration(format!("invalid profile URL: {}", e)))?;

        let client = BasicClient::new(ClientId::new(config.client_id().to_string()))
            .set_client_secret(ClientSecret::new(config.client_secret().to_string()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        // The token endpoint must not be able to bounce us elsewhere.
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.timeout_seconds()))
            .build()
            .map_err(|e| {
                ExchangeError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        let scopes = config
            .scopes()
            .into_iter()
            .map(|scope| Scope::new(scope.to_string()))
            .collect();

        Ok(Self {
            client,
            scopes,
            profile_url,
            http_client,
        })
    }

    /// Builds the provider authorization URL.
    ///
    /// `return_path` travels through the provider untouched as `state` and
    /// comes back on the callback.
    pub fn authorize_url(&self, return_path: &str) -> String {
        let state = return_path.to_string();
        let (auth_url, _state) = self
            .client
            .authorize_url(move || CsrfToken::new(state))
            .add_scopes(self.scopes.iter().cloned())
            .add_extra_param("access_type", "offline")
            .url();

        auth_url.to_string()
    }

    /// Exchanges an authorization code for an access token and resolves the
    /// token's email address.
    ///
    /// Failures are terminal for the request; nothing is retried.
    #[instrument(skip_all)]
    pub async fn exchange(&self, code: &str) -> Result<Identity, ExchangeError> {
        if code.is_empty() {
            return Err(ExchangeError::MissingCode);
        }

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| ExchangeError::TokenRequest(e.to_string()))?;

        let access_token = token_response.access_token().secret().clone();
        tracing::debug!("token exchange succeeded, fetching profile");

        let email = self.fetch_email(&access_token).await?;
        tracing::debug!(email = %email, "resolved identity from profile");

        Ok(Identity {
            email,
            access_token,
        })
    }

    async fn fetch_email(&self, access_token: &str) -> Result<String, ExchangeError> {
        let response = self
            .http_client
            .get(self.profile_url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ExchangeError::ProfileRequest(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExchangeError::ProfileRequest(format!(
                "profile endpoint returned {}",
                response.status()
            )));
        }

        let profile: Profile = response
            .json()
            .await
            .map_err(|e| ExchangeError::ProfileParse(e.to_string()))?;

        if profile.email.is_empty() {
            return Err(ExchangeError::MissingEmail);
        }

        Ok(profile.email)
    }
}

/// OAuth exchange errors.
#[derive(Debug)]
pub enum ExchangeError {
    /// Configuration error (invalid URLs, etc.)
    Configuration(String),
    /// The callback carried no authorization code.
    MissingCode,
    /// The provider reported an error instead of a code.
    Denied(String),
    /// The code could not be exchanged for a token.
    TokenRequest(String),
    /// The profile endpoint could not be queried.
    ProfileRequest(String),
    /// The profile response was not valid JSON.
    ProfileParse(String),
    /// The profile response had no email address.
    MissingEmail,
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "OAuth configuration error: {}", msg),
            Self::MissingCode => write!(f, "OAuth callback is missing the authorization code"),
            Self::Denied(reason) => write!(f, "identity provider denied the request: {}", reason),
            Self::TokenRequest(msg) => write!(f, "OAuth token exchange failed: {}", msg),
            Self::ProfileRequest(msg) => write!(f, "profile request failed: {}", msg),
            Self::ProfileParse(msg) => write!(f, "profile response could not be parsed: {}", msg),
            Self::MissingEmail => write!(f, "profile response has no email address"),
        }
    }
}

impl std::error::Error for ExchangeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server_uri: &str) -> OAuthConfig {
        OAuthConfig::builder(
            "client-id".to_string(),
            "client-secret".to_string(),
            "http://gate.test/oauth2callback".to_string(),
        )
        .scope("openid+email".to_string())
        .authorize_url(format!("{server_uri}/authorize"))
        .token_url(format!("{server_uri}/token"))
        .profile_url(format!("{server_uri}/userinfo"))
        .timeout_seconds(5)
        .build()
    }

    fn query_value(url: &str, key: &str) -> Option<String> {
        let url = reqwest::Url::parse(url).expect("valid URL");
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn authorize_url_carries_return_path_as_state() {
        let exchanger = OAuthExchanger::new(&config_for("http://idp.test")).expect("exchanger");
        let url = exchanger.authorize_url("/jobs/build?branch=main&n=1");

        assert!(url.starts_with("http://idp.test/authorize?"));
        assert_eq!(
            query_value(&url, "state").as_deref(),
            Some("/jobs/build?branch=main&n=1")
        );
        assert_eq!(query_value(&url, "response_type").as_deref(), Some("code"));
        assert_eq!(query_value(&url, "client_id").as_deref(), Some("client-id"));
        assert_eq!(
            query_value(&url, "redirect_uri").as_deref(),
            Some("http://gate.test/oauth2callback")
        );
        assert_eq!(query_value(&url, "scope").as_deref(), Some("openid email"));
        assert_eq!(query_value(&url, "access_type").as_deref(), Some("offline"));
    }

    #[test]
    fn invalid_endpoint_is_a_configuration_error() {
        let config = OAuthConfig::builder(
            "id".to_string(),
            "secret".to_string(),
            "not a url".to_string(),
        )
        .build();

        let result = OAuthExchanger::new(&config);
        assert!(matches!(result, Err(ExchangeError::Configuration(_))));
    }

    #[tokio::test]
    async fn exchange_resolves_email() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=good-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-123",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer access-123"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"email": "bob@corp.com"})),
            )
            .mount(&server)
            .await;

        let exchanger = OAuthExchanger::new(&config_for(&server.uri())).expect("exchanger");
        let identity = exchanger.exchange("good-code").await.expect("exchange");

        assert_eq!(identity.email, "bob@corp.com");
        assert_eq!(identity.access_token, "access-123");
        assert!(!format!("{identity:?}").contains("access-123"));
    }

    #[tokio::test]
    async fn rejected_code_is_token_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
            )
            .mount(&server)
            .await;

        let exchanger = OAuthExchanger::new(&config_for(&server.uri())).expect("exchanger");
        let err = exchanger.exchange("stale").await.expect_err("should fail");

        assert!(matches!(err, ExchangeError::TokenRequest(_)));
    }

    #[tokio::test]
    async fn profile_without_email_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-123",
                "token_type": "bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "42"})))
            .mount(&server)
            .await;

        let exchanger = OAuthExchanger::new(&config_for(&server.uri())).expect("exchanger");
        let err = exchanger.exchange("code").await.expect_err("should fail");

        assert!(matches!(err, ExchangeError::MissingEmail));
    }

    #[tokio::test]
    async fn unparseable_profile_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-123",
                "token_type": "bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let exchanger = OAuthExchanger::new(&config_for(&server.uri())).expect("exchanger");
        let err = exchanger.exchange("code").await.expect_err("should fail");

        assert!(matches!(err, ExchangeError::ProfileParse(_)));
    }

    #[tokio::test]
    async fn unreachable_provider_fails() {
        // Nothing listens on port 9 of the loopback interface.
        let exchanger =
            OAuthExchanger::new(&config_for("http://127.0.0.1:9")).expect("exchanger");
        let err = exchanger.exchange("code").await.expect_err("should fail");

        assert!(matches!(err, ExchangeError::TokenRequest(_)));
    }

    #[tokio::test]
    async fn empty_code_is_rejected_without_network() {
        let exchanger = OAuthExchanger::new(&config_for("http://idp.test")).expect("exchanger");
        let err = exchanger.exchange("").await.expect_err("should fail");

        assert!(matches!(err, ExchangeError::MissingCode));
    }
}
