//! Static HTML pages served by the gateway.

use axum::http::StatusCode;
use axum::response::Html;

/// Renders the login page linking to the identity provider.
///
/// When `admin_contact` is set, the page also tells users who to ask for
/// access.
pub fn login_page(authorize_url: &str, admin_contact: Option<&str>) -> Html<String> {
    let contact = admin_contact
        .map(|href| {
            format!(
                r#"
    <p style="margin-top: 3em">
    For access, contact the <a href="{}">administrator</a>.
    </p>"#,
                escape_html(href)
            )
        })
        .unwrap_or_default();

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Login page</title></head>
<body>
<div style="text-align: center; font-size: 80%; font-family: Arial, sans-serif">
    <p><a href="{}">Log in</a> with your account</p>{}
</div>
</body>
</html>
"#,
        escape_html(authorize_url),
        contact
    ))
}

/// Renders the generic failure page.
pub fn error_page(status: StatusCode, message: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Error</title></head>
<body>
<h2>The request could not be completed:</h2>
<h2>Code: {}<br>
Message: «{}»
</h2>
<a href="/">return to main page</a>
</body>
</html>
"#,
        status.as_u16(),
        escape_html(message)
    ))
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
