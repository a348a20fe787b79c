//! Server assembled from independent options.
//!
//! A [`Server`] starts from platform defaults (no timeouts, no TLS, an empty
//! router) and each [`ServerOption`] overwrites one part of it:
//!
//! ```no_run
//! use std::time::Duration;
//! use aws::http::server::{self, Server};
//!
//! let srv = Server::new([
//!     server::timeout(Duration::from_secs(10)),
//!     server::handle(axum::Router::new()),
//! ]);
//! assert_eq!(srv.read_timeout(), Some(Duration::from_secs(10)));
//! ```
//!
//! Options are applied in the order given; two options touching the same field
//! resolve to the last one. Options never fail and never validate.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::accept::DefaultAcceptor;
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use rustls::ServerConfig;

use super::accept::{ServerAcceptor, Timeouts};
use super::error_log::ErrorLog;

/// Listen address used by [`Server::listen_and_serve`] when none is set.
pub const DEFAULT_HTTP_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 80);

/// Listen address used by [`Server::listen_and_serve_tls`] when none is set.
pub const DEFAULT_HTTPS_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 443);

/// Terminal listener error.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("listener failed: {0}")]
    Listen(#[from] io::Error),

    #[error("TLS listener has no TLS configuration")]
    MissingTls,

    #[error("server closed")]
    Closed,
}

/// Network server configuration: listen address, timeouts, request handler,
/// TLS configuration and error log.
#[derive(Debug, Default)]
pub struct Server {
    addr: Option<SocketAddr>,
    timeouts: Timeouts,
    handler: Router,
    tls: Option<Arc<ServerConfig>>,
    error_log: ErrorLog,
}

/// A named setter applied to a [`Server`] during construction.
pub struct ServerOption(Box<dyn FnOnce(&mut Server) + Send>);

impl fmt::Debug for ServerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServerOption")
    }
}

impl ServerOption {
    fn new(apply: impl FnOnce(&mut Server) + Send + 'static) -> Self {
        Self(Box::new(apply))
    }
}

/// Set the read, write and idle timeouts to `timeout`. Zero means no timeout.
pub fn timeout(timeout: Duration) -> ServerOption {
    ServerOption::new(move |srv| {
        let timeout = (!timeout.is_zero()).then_some(timeout);
        srv.timeouts = Timeouts {
            read: timeout,
            write: timeout,
            idle: timeout,
        };
    })
}

/// Set the request handler.
pub fn handle(handler: Router) -> ServerOption {
    ServerOption::new(move |srv| srv.handler = handler)
}

/// Set the TLS configuration used by [`Server::listen_and_serve_tls`].
pub fn tls(config: Arc<ServerConfig>) -> ServerOption {
    ServerOption::new(move |srv| srv.tls = Some(config))
}

/// Set the destination for listener and connection errors.
pub fn error_log(log: ErrorLog) -> ServerOption {
    ServerOption::new(move |srv| srv.error_log = log)
}

/// Set the address the underlying listener binds to.
///
/// Only consulted by [`Server::listen_and_serve`] and
/// [`Server::listen_and_serve_tls`]; `serve` and `serve_tls` use the listener
/// they are given.
pub fn addr(addr: SocketAddr) -> ServerOption {
    ServerOption::new(move |srv| srv.addr = Some(addr))
}

impl Server {
    /// Create a server with `options` applied in order.
    ///
    /// With no options this is a plain listener with no timeouts and no TLS.
    pub fn new<I>(options: I) -> Self
    where
        I: IntoIterator<Item = ServerOption>,
    {
        let mut srv = Self::default();
        for option in options {
            (option.0)(&mut srv);
        }
        srv
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.timeouts.read
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.timeouts.write
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.timeouts.idle
    }

    pub fn handler(&self) -> &Router {
        &self.handler
    }

    pub fn tls_config(&self) -> Option<&Arc<ServerConfig>> {
        self.tls.as_ref()
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.error_log
    }

    /// Serve plain HTTP on the configured address (default `0.0.0.0:80`).
    ///
    /// Blocks until the listener stops and returns why.
    pub async fn listen_and_serve(self) -> ServerError {
        let addr = self.addr.unwrap_or(DEFAULT_HTTP_ADDR);
        tracing::info!(%addr, "Starting HTTP listener");

        let acceptor = self.acceptor(DefaultAcceptor::new());
        let service = self
            .handler
            .into_make_service_with_connect_info::<SocketAddr>();
        terminal(
            axum_server::bind(addr)
                .acceptor(acceptor)
                .serve(service)
                .await,
        )
    }

    /// Serve HTTPS on the configured address (default `0.0.0.0:443`).
    ///
    /// Blocks until the listener stops and returns why.
    pub async fn listen_and_serve_tls(self) -> ServerError {
        let addr = self.addr.unwrap_or(DEFAULT_HTTPS_ADDR);
        let Some(acceptor) = self.tls_acceptor() else {
            return ServerError::MissingTls;
        };
        tracing::info!(%addr, "Starting HTTPS listener");

        let service = self
            .handler
            .into_make_service_with_connect_info::<SocketAddr>();
        terminal(
            axum_server::bind(addr)
                .acceptor(acceptor)
                .serve(service)
                .await,
        )
    }

    /// Serve plain HTTP on an already bound listener.
    pub async fn serve(self, listener: std::net::TcpListener) -> ServerError {
        if let Err(err) = listener.set_nonblocking(true) {
            return ServerError::Listen(err);
        }
        let acceptor = self.acceptor(DefaultAcceptor::new());
        let service = self
            .handler
            .into_make_service_with_connect_info::<SocketAddr>();
        terminal(
            axum_server::from_tcp(listener)
                .acceptor(acceptor)
                .serve(service)
                .await,
        )
    }

    /// Serve HTTPS on an already bound listener.
    pub async fn serve_tls(self, listener: std::net::TcpListener) -> ServerError {
        let Some(acceptor) = self.tls_acceptor() else {
            return ServerError::MissingTls;
        };
        if let Err(err) = listener.set_nonblocking(true) {
            return ServerError::Listen(err);
        }
        let service = self
            .handler
            .into_make_service_with_connect_info::<SocketAddr>();
        terminal(
            axum_server::from_tcp(listener)
                .acceptor(acceptor)
                .serve(service)
                .await,
        )
    }

    fn acceptor<A>(&self, inner: A) -> ServerAcceptor<A> {
        ServerAcceptor::new(inner, self.timeouts, self.error_log.clone())
    }

    fn tls_acceptor(&self) -> Option<ServerAcceptor<RustlsAcceptor>> {
        let config = RustlsConfig::from_config(self.tls.clone()?);
        Some(self.acceptor(RustlsAcceptor::new(config)))
    }
}

// Listeners only stop on error; a clean return means someone closed it.
fn terminal(result: io::Result<()>) -> ServerError {
    match result {
        Ok(()) => ServerError::Closed,
        Err(err) => ServerError::Listen(err),
    }
}
