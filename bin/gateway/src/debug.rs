//! Debug echo: shows a request exactly as the gateway received it.

use std::fmt::Write;

use axum::extract::Request;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};

/// Largest body the echo will read.
const MAX_BODY: usize = 1024 * 1024;

/// Dumps the request line, headers and body as plain text.
pub async fn echo(request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let mut dump = String::new();
    let _ = write!(dump, "{} {} {:?}\r\n", parts.method, parts.uri, parts.version);
    for (name, value) in &parts.headers {
        let _ = write!(
            dump,
            "{}: {}\r\n",
            name,
            String::from_utf8_lossy(value.as_bytes())
        );
    }
    dump.push_str("\r\n");

    match axum::body::to_bytes(body, MAX_BODY).await {
        Ok(bytes) => dump.push_str(&String::from_utf8_lossy(&bytes)),
        Err(e) => {
            tracing::debug!(error = %e, "debug echo could not read body");
            let _ = write!(dump, "<body unavailable: {}>", e);
        }
    }

    ([(CONTENT_TYPE, "text/plain; charset=utf-8")], dump).into_response()
}
