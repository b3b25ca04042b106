//! Reverse proxy to the backend origin.
//!
//! Requests are re-issued against the origin with a hyper client, streaming
//! the body in both directions. The outbound target is an `http::Uri` built
//! as a string, so in raw mode the request-line path reaches the backend
//! byte for byte, dot segments included. The forwarder owns the identity
//! header: whatever the client sent as `X-Forwarded-User` is dropped, and the
//! gateway's own value is set only for requests that passed the trust check.

pub mod skip;

use std::error::Error as StdError;
use std::fmt;
use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::header::{
    CONNECTION, HOST, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE, TRAILER, TRANSFER_ENCODING,
    UPGRADE,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Uri};
use axum::response::Response;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use reqwest::Url;

pub use skip::{PatternError, SkipAuthMatcher, SkipPattern};

/// Header carrying the trusted email to the backend.
pub const X_FORWARDED_USER: HeaderName = HeaderName::from_static("x-forwarded-user");

/// Header listing the client addresses a request passed through.
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// Headers that describe a single connection and must not be relayed.
const HOP_BY_HOP: [HeaderName; 8] = [
    CONNECTION,
    KEEP_ALIVE,
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    TE,
    TRAILER,
    TRANSFER_ENCODING,
    UPGRADE,
];

type BackendClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Forwards requests to the backend origin.
#[derive(Debug, Clone)]
pub struct ProxyForwarder {
    client: BackendClient,
    origin: Url,
    /// `scheme://host[:port]` of the origin, without its path.
    base: String,
    raw_url: bool,
}

impl ProxyForwarder {
    /// Creates a forwarder for `origin`.
    ///
    /// With `raw_url` set the request path is forwarded exactly as it appeared
    /// on the request line instead of percent-decoded.
    pub fn new(origin: Url, raw_url: bool) -> Result<Self, ForwardError> {
        let base = origin_base(&origin)?;

        // Redirects are never followed; they go back to the client as-is.
        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            origin,
            base,
            raw_url,
        })
    }

    /// Returns the backend origin.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Returns true if paths are forwarded undecoded.
    pub fn raw_url(&self) -> bool {
        self.raw_url
    }

    /// Computes the backend URI for a request URI.
    pub fn target_url(&self, uri: &Uri) -> Result<Uri, ForwardError> {
        let target = if self.raw_url {
            let mut target = format!(
                "{}{}",
                self.base,
                join_paths(self.origin.path(), uri.path())
            );
            if let Some(query) = uri.query() {
                target.push('?');
                target.push_str(query);
            }
            target
        } else {
            let path = urlencoding::decode(uri.path())
                .map_err(|e| ForwardError::InvalidPath(format!("{}: {}", uri.path(), e)))?;
            let mut url = self.origin.clone();
            url.set_path(&join_paths(self.origin.path(), &path));
            url.set_query(uri.query());
            String::from(url)
        };

        target
            .parse::<Uri>()
            .map_err(|e| ForwardError::InvalidPath(format!("{}: {}", target, e)))
    }

    /// Forwards `request` to the backend and relays its response.
    ///
    /// `identity` is the trusted email, or `None` for skip-auth routes.
    pub async fn forward(
        &self,
        request: Request,
        identity: Option<&str>,
    ) -> Result<Response, ForwardError> {
        let (parts, body) = request.into_parts();
        let target = self.target_url(&parts.uri)?;

        let client_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(HOST);
        headers.remove(X_FORWARDED_USER);
        if let Some(email) = identity {
            let value = HeaderValue::from_str(email)
                .map_err(|_| ForwardError::InvalidHeader(email.to_string()))?;
            headers.insert(X_FORWARDED_USER, value);
        }
        if let Some(addr) = client_addr {
            append_forwarded_for(&mut headers, addr)?;
        }

        tracing::debug!(
            method = %parts.method,
            url = %target,
            identity = identity.unwrap_or("-"),
            "forwarding to backend"
        );

        // A fresh HTTP/1.1 request; the client's own version and extensions
        // stay on the inbound side.
        let mut outbound = Request::new(body);
        *outbound.method_mut() = parts.method;
        *outbound.uri_mut() = target;
        *outbound.headers_mut() = headers;

        let upstream = self
            .client
            .request(outbound)
            .await
            .map_err(|e| ForwardError::Upstream(error_chain(&e)))?;

        let (parts, body) = upstream.into_parts();
        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::new(body));
        *response.status_mut() = parts.status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Returns `scheme://host[:port]` for an http(s) origin.
fn origin_base(origin: &Url) -> Result<String, ForwardError> {
    let scheme = origin.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(ForwardError::InvalidOrigin(format!(
            "unsupported scheme '{}'",
            scheme
        )));
    }
    let host = origin
        .host_str()
        .ok_or_else(|| ForwardError::InvalidOrigin(format!("'{}' has no host", origin)))?;

    Ok(match origin.port() {
        Some(port) => format!("{}://{}:{}", scheme, host, port),
        None => format!("{}://{}", scheme, host),
    })
}

/// Flattens an error and its sources into one message.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Joins the origin's path prefix and a request path with exactly one slash.
fn join_paths(prefix: &str, path: &str) -> String {
    match (prefix.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", prefix, &path[1..]),
        (false, false) => format!("{}/{}", prefix, path),
        _ => format!("{}{}", prefix, path),
    }
}

/// Removes hop-by-hop headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, addr: SocketAddr) -> Result<(), ForwardError> {
    let client = addr.ip().to_string();
    let prior: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    let chain = if prior.is_empty() {
        client
    } else {
        format!("{}, {}", prior.join(", "), client)
    };

    let value =
        HeaderValue::from_str(&chain).map_err(|_| ForwardError::InvalidHeader(chain.clone()))?;
    headers.insert(X_FORWARDED_FOR, value);
    Ok(())
}

/// Backend forwarding errors.
#[derive(Debug)]
pub enum ForwardError {
    /// The backend origin cannot be forwarded to.
    InvalidOrigin(String),
    /// The request path could not be decoded.
    InvalidPath(String),
    /// A header value could not be encoded.
    InvalidHeader(String),
    /// The backend could not be reached or the exchange broke off.
    Upstream(String),
}

impl fmt::Display for ForwardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOrigin(msg) => write!(f, "invalid backend origin: {}", msg),
            Self::InvalidPath(msg) => write!(f, "invalid request path {}", msg),
            Self::InvalidHeader(value) => write!(f, "invalid header value '{}'", value),
            Self::Upstream(msg) => write!(f, "backend request failed: {}", msg),
        }
    }
}

impl std::error::Error for ForwardError {}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn forwarder(origin: &str, raw_url: bool) -> ProxyForwarder {
        ProxyForwarder::new(Url::parse(origin).expect("origin"), raw_url).expect("forwarder")
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf-8")
    }

    #[test]
    fn join_paths_uses_single_slash() {
        assert_eq!(join_paths("/", "/a"), "/a");
        assert_eq!(join_paths("/base", "/a"), "/base/a");
        assert_eq!(join_paths("/base/", "/a"), "/base/a");
        assert_eq!(join_paths("/base", "a"), "/base/a");
        assert_eq!(join_paths("/base/", "a"), "/base/a");
    }

    #[test]
    fn target_url_joins_origin_prefix() {
        let forwarder = forwarder("http://backend.test:9000/app", false);
        let url = forwarder
            .target_url(&Uri::from_static("/jobs/1?view=full"))
            .expect("url");
        assert_eq!(url.to_string(), "http://backend.test:9000/app/jobs/1?view=full");
    }

    #[test]
    fn target_url_decodes_path_by_default() {
        let forwarder = forwarder("http://backend.test", false);
        let url = forwarder
            .target_url(&Uri::from_static("/files/a%2Fb?x=%2F"))
            .expect("url");
        assert_eq!(url.path(), "/files/a/b");
        assert_eq!(url.query(), Some("x=%2F"));
    }

    #[test]
    fn target_url_keeps_raw_path() {
        let forwarder = forwarder("http://backend.test", true);
        let url = forwarder
            .target_url(&Uri::from_static("/files/a%2Fb?x=%2F"))
            .expect("url");
        assert_eq!(url.path(), "/files/a%2Fb");
        assert_eq!(url.query(), Some("x=%2F"));
    }

    #[test]
    fn raw_mode_leaves_dot_segments_alone() {
        let forwarder = forwarder("http://backend.test", true);
        for raw in ["/a/%2e%2e/b", "/a/../b", "/a/./b", "/job/x%2Fy/../z"] {
            let url = forwarder
                .target_url(&Uri::from_static(raw))
                .expect("url");
            assert_eq!(url.path(), raw);
        }
    }

    #[test]
    fn raw_mode_keeps_origin_prefix_and_port() {
        let forwarder = forwarder("https://backend.test:8443/base/", true);
        let url = forwarder
            .target_url(&Uri::from_static("/x/../y?q=1"))
            .expect("url");
        assert_eq!(url.to_string(), "https://backend.test:8443/base/x/../y?q=1");
    }

    #[test]
    fn origin_must_be_http() {
        let result = ProxyForwarder::new(Url::parse("ftp://backend.test").expect("url"), false);
        assert!(matches!(result, Err(ForwardError::InvalidOrigin(_))));
    }

    #[test]
    fn undecodable_path_is_rejected() {
        let forwarder = forwarder("http://backend.test", false);
        let result = forwarder.target_url(&Uri::from_static("/bad%FF"));
        assert!(matches!(result, Err(ForwardError::InvalidPath(_))));
    }

    #[test]
    fn hop_by_hop_headers_are_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("close, x-session-hint"));
        headers.insert("x-session-hint", HeaderValue::from_static("1"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert("accept", HeaderValue::from_static("text/html"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("accept"));
    }

    #[test]
    fn forwarded_for_is_appended() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("10.0.0.1"));

        append_forwarded_for(&mut headers, "192.0.2.7:5555".parse().expect("addr"))
            .expect("append");

        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1, 192.0.2.7");
    }

    #[tokio::test]
    async fn forwards_request_with_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/items"))
            .and(query_param("q", "1"))
            .and(header("x-forwarded-user", "alice@corp.com"))
            .and(body_string("payload"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-backend", "yes")
                    .set_body_string("created"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/items?q=1")
            .header("x-forwarded-user", "mallory@evil.com")
            .body(Body::from("payload"))
            .expect("request");

        let response = forwarder(&server.uri(), false)
            .forward(request, Some("alice@corp.com"))
            .await
            .expect("forward");

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-backend"], "yes");
        assert_eq!(body_text(response).await, "created");

        let received = server.received_requests().await.expect("recorded");
        let values: Vec<_> = received[0].headers.get_all("x-forwarded-user").iter().collect();
        assert_eq!(values, vec!["alice@corp.com"]);
    }

    #[tokio::test]
    async fn anonymous_forward_strips_client_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthz"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let mut request = Request::builder()
            .uri("/healthz")
            .header("x-forwarded-user", "mallory@evil.com")
            .body(Body::empty())
            .expect("request");
        request
            .extensions_mut()
            .insert(ConnectInfo("198.51.100.4:40000".parse::<SocketAddr>().expect("addr")));

        let response = forwarder(&server.uri(), false)
            .forward(request, None)
            .await
            .expect("forward");
        assert_eq!(response.status(), StatusCode::OK);

        let received = server.received_requests().await.expect("recorded");
        assert!(!received[0].headers.contains_key("x-forwarded-user"));
        assert_eq!(received[0].headers["x-forwarded-for"], "198.51.100.4");
    }

    #[tokio::test]
    async fn raw_mode_preserves_encoded_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let request = Request::builder()
            .uri("/repo/a%2Fb/raw")
            .body(Body::empty())
            .expect("request");

        forwarder(&server.uri(), true)
            .forward(request, Some("alice@corp.com"))
            .await
            .expect("forward");

        let received = server.received_requests().await.expect("recorded");
        assert_eq!(received[0].url.path(), "/repo/a%2Fb/raw");
    }

    /// Accepts one connection and returns the request line it carried.
    async fn capture_request_line(listener: TcpListener) -> String {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut received = Vec::new();
        let mut chunk = [0u8; 1024];
        while !received.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut chunk).await.expect("read");
            if n == 0 {
                break;
            }
            received.extend_from_slice(&chunk[..n]);
        }
        stream
            .write_all(b"HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n")
            .await
            .expect("write");

        String::from_utf8_lossy(&received)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    }

    #[tokio::test]
    async fn raw_mode_sends_request_line_path_verbatim() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let origin = format!("http://{}/base", listener.local_addr().expect("addr"));
        let backend = tokio::spawn(capture_request_line(listener));

        let request = Request::builder()
            .uri("/a/%2e%2e/b/../c?x=1")
            .body(Body::empty())
            .expect("request");

        let response = forwarder(&origin, true)
            .forward(request, Some("alice@corp.com"))
            .await
            .expect("forward");

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            backend.await.expect("backend"),
            "GET /base/a/%2e%2e/b/../c?x=1 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn backend_redirect_is_relayed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
            .mount(&server)
            .await;

        let request = Request::builder()
            .uri("/old")
            .body(Body::empty())
            .expect("request");

        let response = forwarder(&server.uri(), false)
            .forward(request, Some("alice@corp.com"))
            .await
            .expect("forward");

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/new");
    }

    #[tokio::test]
    async fn unreachable_backend_fails() {
        let request = Request::builder()
            .uri("/")
            .body(Body::empty())
            .expect("request");

        let result = forwarder("http://127.0.0.1:9", false)
            .forward(request, Some("alice@corp.com"))
            .await;

        assert!(matches!(result, Err(ForwardError::Upstream(_))));
    }
}
