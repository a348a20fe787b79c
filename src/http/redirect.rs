//! Plaintext responder: sends every client to HTTPS.
//!
//! GET and HEAD requests get a `302 Found` pointing at the same host and
//! request target over HTTPS. Anything else gets `400 Bad Request`.

use axum::http::header::{HOST, LOCATION};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;

/// Router answering every request with a redirect to `https_port`.
pub fn redirect_router(https_port: u16) -> Router {
    Router::new().fallback(move |method: Method, headers: HeaderMap, uri: Uri| async move {
        redirect_to_https(&method, &headers, &uri, https_port)
    })
}

fn redirect_to_https(method: &Method, headers: &HeaderMap, uri: &Uri, https_port: u16) -> Response {
    if *method != Method::GET && *method != Method::HEAD {
        return (StatusCode::BAD_REQUEST, "Use HTTPS").into_response();
    }

    let host = headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .map(strip_port)
        .filter(|h| !h.is_empty());
    let Some(host) = host else {
        return (StatusCode::BAD_REQUEST, "Missing Host").into_response();
    };

    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let https_url = if https_port == 443 {
        format!("https://{host}{target}")
    } else {
        format!("https://{host}:{https_port}{target}")
    };

    tracing::debug!(from = %uri, to = %https_url, "Redirecting HTTP to HTTPS");

    (StatusCode::FOUND, [(LOCATION, https_url)]).into_response()
}

// Bracketed IPv6 literals keep their brackets.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}
