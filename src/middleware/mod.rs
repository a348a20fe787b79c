//! Request handler decorators.
//!
//! A [`Middleware`] turns one handler into another. Middlewares are built once
//! at startup and combined with [`chain`]; nothing here runs per request except
//! the layers the middlewares install.

pub mod access_log;
pub mod headers;

use std::fmt;
use std::sync::Arc;

use axum::Router;

pub use access_log::{combined_log_format, LogSink};
pub use headers::secure_headers;

/// A transform from one request handler to another.
#[derive(Clone)]
pub struct Middleware(Arc<dyn Fn(Router) -> Router + Send + Sync>);

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware")
    }
}

impl Middleware {
    pub fn new<F>(wrap: F) -> Self
    where
        F: Fn(Router) -> Router + Send + Sync + 'static,
    {
        Self(Arc::new(wrap))
    }

    /// Wrap `handler`, returning the decorated handler.
    pub fn wrap(&self, handler: Router) -> Router {
        (self.0)(handler)
    }
}

/// Combine `middlewares` into one.
///
/// Earlier middlewares wrap later ones, so at request time they run first:
///
/// ```text
/// chain([m1, m2]).wrap(handler)  ==  m1.wrap(m2.wrap(handler))
/// ```
///
/// An empty chain returns the handler unchanged.
pub fn chain<I>(middlewares: I) -> Middleware
where
    I: IntoIterator<Item = Middleware>,
{
    let middlewares: Vec<Middleware> = middlewares.into_iter().collect();
    Middleware::new(move |handler| {
        middlewares
            .iter()
            .rev()
            .fold(handler, |handler, middleware| middleware.wrap(handler))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::extract::Request;
    use axum::http::StatusCode;
    use axum::middleware::{from_fn, Next};
    use axum::routing::get;
    use std::sync::Mutex;
    use tower::ServiceExt;

    type Calls = Arc<Mutex<Vec<&'static str>>>;

    fn recording(name: &'static str, calls: &Calls) -> Middleware {
        let calls = calls.clone();
        Middleware::new(move |handler| {
            let calls = calls.clone();
            handler.layer(from_fn(move |request: Request, next: Next| {
                let calls = calls.clone();
                async move {
                    calls.lock().unwrap().push(name);
                    next.run(request).await
                }
            }))
        })
    }

    fn handler(calls: &Calls) -> Router {
        let calls = calls.clone();
        Router::new().route(
            "/",
            get(move || {
                let calls = calls.clone();
                async move {
                    calls.lock().unwrap().push("handler");
                    "body"
                }
            }),
        )
    }

    async fn call(router: Router) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_chain_runs_earlier_middlewares_first() {
        let calls = Calls::default();
        let chained = chain([recording("middleware1", &calls), recording("middleware2", &calls)]);

        call(chained.wrap(handler(&calls))).await;

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["middleware1", "middleware2", "handler"]
        );
    }

    #[tokio::test]
    async fn test_chain_matches_nested_wrapping() {
        let chained_calls = Calls::default();
        let nested_calls = Calls::default();

        let chained = chain([
            recording("m1", &chained_calls),
            recording("m2", &chained_calls),
        ])
        .wrap(handler(&chained_calls));
        let nested = recording("m1", &nested_calls)
            .wrap(recording("m2", &nested_calls).wrap(handler(&nested_calls)));

        assert_eq!(call(chained).await, call(nested).await);
        assert_eq!(*chained_calls.lock().unwrap(), *nested_calls.lock().unwrap());
    }

    #[tokio::test]
    async fn test_empty_chain_is_identity() {
        let calls = Calls::default();

        let (status, body) = call(chain([]).wrap(handler(&calls))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "body");
        assert_eq!(*calls.lock().unwrap(), vec!["handler"]);
    }
}
