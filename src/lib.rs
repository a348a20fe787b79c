//! aws - a small, secure static file server.
//!
//! Serves a directory over HTTPS with certificates obtained automatically from
//! Let's Encrypt, a hardened TLS configuration, security response headers and
//! a Combined Log Format access log. A plaintext listener redirects to HTTPS.

pub mod config;
pub mod http;
pub mod middleware;
pub mod tls;
