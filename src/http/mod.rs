//! HTTP serving.
//!
//! Two listeners run side by side:
//! - **Plaintext**: redirects browsers to HTTPS and refuses everything else
//! - **TLS**: serves static files with certificates issued over ACME
//!
//! Both are [`Server`] values configured with [`ServerOption`]s and started
//! together by [`supervise`], which returns as soon as either one stops.

pub mod accept;
pub mod acme;
pub mod error_log;
pub mod redirect;
pub mod server;
pub mod static_files;
pub mod supervisor;

pub use acme::{start_acme, AcmeError};
pub use error_log::ErrorLog;
pub use redirect::redirect_router;
pub use server::{Server, ServerError, ServerOption};
pub use static_files::file_server;
pub use supervisor::supervise;
