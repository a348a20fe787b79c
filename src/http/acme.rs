//! ACME certificate management.
//!
//! Certificates for the configured hostnames are issued and renewed by
//! `rustls-acme` and cached on disk, one entry per hostname. Challenges are
//! answered with TLS-ALPN-01 on the TLS listener, which is why the returned
//! resolver must be paired with a TLS config advertising
//! [`ACME_TLS_ALPN`](crate::tls::ACME_TLS_ALPN).

use std::sync::Arc;

use futures::StreamExt;
use rustls::server::ResolvesServerCert;
use rustls_acme::caches::DirCache;
use rustls_acme::AcmeConfig;

use crate::config::AcmeSettings;

/// ACME setup error
#[derive(Debug, thiserror::Error)]
pub enum AcmeError {
    #[error("Failed to create ACME cache directory '{path}': {source}")]
    CacheDir {
        path: String,
        source: std::io::Error,
    },
}

/// Start certificate management and return the resolver supplying
/// certificates during the TLS handshake.
///
/// Must be called from within a tokio runtime: the ACME event loop runs on its
/// own task for the lifetime of the process.
pub fn start_acme(settings: &AcmeSettings) -> Result<Arc<dyn ResolvesServerCert>, AcmeError> {
    let cache_dir = settings.cache_dir.clone();
    let env_name = if settings.production {
        "production"
    } else {
        "staging"
    };
    tracing::info!(
        domains = ?settings.domains,
        contact = ?settings.contact,
        cache = %cache_dir.display(),
        environment = %env_name,
        "Starting ACME certificate management"
    );

    if !settings.production {
        tracing::warn!(
            "Using Let's Encrypt staging environment - certificates will NOT be trusted by browsers"
        );
    }

    std::fs::create_dir_all(&cache_dir).map_err(|source| AcmeError::CacheDir {
        path: cache_dir.display().to_string(),
        source,
    })?;

    let mut config = AcmeConfig::new(settings.domains.clone())
        .cache(DirCache::new(cache_dir))
        .directory_lets_encrypt(settings.production);
    if let Some(contact) = &settings.contact {
        config = config.contact_push(format!("mailto:{contact}"));
    }

    let mut state = config.state();
    let resolver: Arc<dyn ResolvesServerCert> = state.resolver();

    tokio::spawn(async move {
        loop {
            match state.next().await {
                Some(Ok(event)) => {
                    tracing::info!(event = ?event, "ACME event");
                }
                Some(Err(err)) => {
                    tracing::error!(error = %err, "ACME error");
                }
                None => {
                    tracing::debug!("ACME state stream ended");
                    break;
                }
            }
        }
    });

    Ok(resolver)
}
