//! Static file serving for the TLS listener.

use std::path::Path;

use axum::Router;
use tower_http::services::ServeDir;

/// Router serving files under `root`, bound at `/`.
///
/// Directory requests are answered with the directory's `index.html`.
pub fn file_server(root: impl AsRef<Path>) -> Router {
    Router::new().fallback_service(ServeDir::new(root))
}
