//! Security response headers.
//!
//! Every response from the wrapped handler carries the following, inspired by
//! <https://securityheaders.com>:
//!
//! ```text
//! X-Clacks-Overhead: GNU Terry Pratchett
//! Content-Security-Policy: [see CSP]
//! Referrer-Policy: no-referrer
//! Strict-Transport-Security: max-age=63072000; includeSubDomains
//! X-Content-Type-Options: nosniff
//! X-Frame-Options: DENY
//! X-XSS-Protection: 1; mode=block
//! ```
//!
//! Values set by the wrapped handler are overwritten.

use http::header::{
    HeaderName, HeaderValue, CONTENT_SECURITY_POLICY, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY,
    X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use const_format::formatcp;
use tower_http::set_header::SetResponseHeaderLayer;

use super::Middleware;

pub const X_CLACKS_OVERHEAD: HeaderName = HeaderName::from_static("x-clacks-overhead");

pub const CLACKS_OVERHEAD: &str = "GNU Terry Pratchett";

/// Content-Security-Policy applied to every response.
///
/// Only self-hosted CSS, images and PDF documents are allowed. Scripts, forms
/// and frames are refused.
pub const CSP: &str = concat!(
    "default-src 'none';",
    "style-src 'self';",
    "img-src 'self';",
    "object-src 'self';",
    "base-uri 'none';",
    "form-action 'none';",
    "frame-ancestors 'none';",
    "plugin-types application/pdf"
);

/// Two years, in seconds.
pub const HSTS_MAX_AGE_SECS: u32 = 63_072_000;

pub const HSTS: &str = formatcp!("max-age={}; includeSubDomains", HSTS_MAX_AGE_SECS);

/// The header set applied by [`secure_headers`], in application order.
pub fn secure_header_values() -> [(HeaderName, HeaderValue); 7] {
    [
        (X_CLACKS_OVERHEAD, HeaderValue::from_static(CLACKS_OVERHEAD)),
        (CONTENT_SECURITY_POLICY, HeaderValue::from_static(CSP)),
        (REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
        (STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS)),
        (X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
        (X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")),
    ]
}

/// Middleware adding the security headers to every response.
///
/// Never rejects or short-circuits a request and never touches the body.
pub fn secure_headers() -> Middleware {
    Middleware::new(|handler| {
        secure_header_values()
            .into_iter()
            .fold(handler, |handler, (name, value)| {
                handler.layer(SetResponseHeaderLayer::overriding(name, value))
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    const EXPECTED: [(&str, &str); 7] = [
        ("x-clacks-overhead", "GNU Terry Pratchett"),
        (
            "content-security-policy",
            "default-src 'none';style-src 'self';img-src 'self';object-src 'self';\
             base-uri 'none';form-action 'none';frame-ancestors 'none';plugin-types application/pdf",
        ),
        ("referrer-policy", "no-referrer"),
        (
            "strict-transport-security",
            "max-age=63072000; includeSubDomains",
        ),
        ("x-content-type-options", "nosniff"),
        ("x-frame-options", "DENY"),
        ("x-xss-protection", "1; mode=block"),
    ];

    async fn call(handler: Router) -> axum::response::Response {
        secure_headers()
            .wrap(handler)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn assert_secure(response: &axum::response::Response) {
        for (name, expected) in EXPECTED {
            let got = response.headers().get(name).map(|v| v.to_str().unwrap());
            assert_eq!(got, Some(expected), "{name} header is incorrect");
            assert_eq!(response.headers().get_all(name).iter().count(), 1);
        }
    }

    #[tokio::test]
    async fn test_secure_headers_present_and_body_untouched() {
        let response = call(Router::new().route("/", get(|| async { "test" }))).await;

        assert_secure(&response);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"test");
    }

    #[tokio::test]
    async fn test_secure_headers_override_handler_values() {
        let handler = Router::new().route(
            "/",
            get(|| async {
                (
                    [
                        (X_FRAME_OPTIONS, "SAMEORIGIN"),
                        (REFERRER_POLICY, "unsafe-url"),
                    ],
                    "framed",
                )
                    .into_response()
            }),
        );

        let response = call(handler).await;

        assert_secure(&response);
    }

    #[tokio::test]
    async fn test_secure_headers_on_error_responses() {
        let handler = Router::new().route(
            "/",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );

        let response = call(handler).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_secure(&response);
    }

    #[tokio::test]
    async fn test_secure_headers_on_fallback() {
        let handler = Router::new().fallback(|| async { StatusCode::NOT_FOUND });

        let response = call(handler).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_secure(&response);
    }

    #[test]
    fn test_hsts_is_two_years() {
        assert_eq!(HSTS_MAX_AGE_SECS, 2 * 365 * 24 * 60 * 60);
        assert_eq!(HSTS, "max-age=63072000; includeSubDomains");
    }
}
