//! TLS policy for the HTTPS listener.
//!
//! `TlsConfig` collects everything rustls needs before a `ServerConfig` can be
//! built: the crypto provider (cipher suites and key-exchange groups), the
//! enabled protocol versions, and the ALPN protocols. [`modernise`] clamps it to
//! Mozilla's intermediate compatibility recommendations
//! (<https://wiki.mozilla.org/Security/Server_Side_TLS>).

use std::sync::Arc;

use rustls::crypto::aws_lc_rs::{self, cipher_suite, kx_group};
use rustls::crypto::{CryptoProvider, SupportedKxGroup};
use rustls::server::ResolvesServerCert;
use rustls::{ProtocolVersion, ServerConfig, SupportedCipherSuite, SupportedProtocolVersion};

/// ALPN identifier used by ACME TLS-ALPN-01 validation (RFC 8737).
pub const ACME_TLS_ALPN: &[u8] = b"acme-tls/1";

/// Key-exchange groups in preference order.
pub fn curve_preferences() -> Vec<&'static dyn SupportedKxGroup> {
    vec![kx_group::X25519, kx_group::SECP256R1, kx_group::SECP384R1]
}

/// TLS 1.2 cipher suites in preference order.
pub fn tls12_cipher_suites() -> Vec<SupportedCipherSuite> {
    vec![
        cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
        cipher_suite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
        cipher_suite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
        cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    ]
}

// TLS 1.3 suites are fixed by the protocol and are not part of the policy.
fn tls13_cipher_suites() -> Vec<SupportedCipherSuite> {
    vec![
        cipher_suite::TLS13_AES_256_GCM_SHA384,
        cipher_suite::TLS13_AES_128_GCM_SHA256,
        cipher_suite::TLS13_CHACHA20_POLY1305_SHA256,
    ]
}

/// TLS settings assembled before the rustls `ServerConfig` is built.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub provider: CryptoProvider,
    pub versions: Vec<&'static SupportedProtocolVersion>,
    pub alpn_protocols: Vec<Vec<u8>>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsConfig {
    /// Start from the aws-lc-rs defaults with every protocol version rustls
    /// supports and ALPN for HTTP/2 and HTTP/1.1.
    pub fn new() -> Self {
        Self {
            provider: aws_lc_rs::default_provider(),
            versions: rustls::ALL_VERSIONS.to_vec(),
            alpn_protocols: vec![b"h2".to_vec(), b"http/1.1".to_vec()],
        }
    }

    /// Lowest protocol version a client may negotiate.
    pub fn min_version(&self) -> Option<ProtocolVersion> {
        self.versions
            .iter()
            .map(|v| v.version)
            .min_by_key(|v| u16::from(*v))
    }

    /// Build the rustls server config, taking certificates from `resolver`.
    pub fn build(
        &self,
        resolver: Arc<dyn ResolvesServerCert>,
    ) -> Result<ServerConfig, rustls::Error> {
        let mut config = ServerConfig::builder_with_provider(Arc::new(self.provider.clone()))
            .with_protocol_versions(&self.versions)?
            .with_no_client_auth()
            .with_cert_resolver(resolver);
        config.alpn_protocols = self.alpn_protocols.clone();
        Ok(config)
    }
}

/// Overwrite curve preferences, minimum version and cipher suites.
///
/// Prior values are discarded rather than merged. The same config is returned
/// so the call can be chained:
///
/// ```
/// let config = aws::tls::modernise(&mut aws::tls::TlsConfig::new()).clone();
/// assert_eq!(config.min_version(), Some(rustls::ProtocolVersion::TLSv1_2));
/// ```
pub fn modernise(config: &mut TlsConfig) -> &mut TlsConfig {
    config.provider.kx_groups = curve_preferences();
    config.versions = vec![&rustls::version::TLS13, &rustls::version::TLS12];
    config.provider.cipher_suites = tls13_cipher_suites();
    config.provider.cipher_suites.extend(tls12_cipher_suites());
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustls::server::ClientHello;
    use rustls::sign::CertifiedKey;
    use rustls::{CipherSuite, NamedGroup};

    #[derive(Debug)]
    struct NoCertificates;

    impl ResolvesServerCert for NoCertificates {
        fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
            None
        }
    }

    fn groups(config: &TlsConfig) -> Vec<NamedGroup> {
        config.provider.kx_groups.iter().map(|g| g.name()).collect()
    }

    fn tls12_suites(config: &TlsConfig) -> Vec<CipherSuite> {
        config
            .provider
            .cipher_suites
            .iter()
            .filter(|s| s.version().version == ProtocolVersion::TLSv1_2)
            .map(|s| s.suite())
            .collect()
    }

    fn versions(config: &TlsConfig) -> Vec<ProtocolVersion> {
        config.versions.iter().map(|v| v.version).collect()
    }

    #[test]
    fn test_modernise_sets_curve_preferences() {
        let mut config = TlsConfig::new();
        modernise(&mut config);

        assert_eq!(
            groups(&config),
            vec![
                NamedGroup::X25519,
                NamedGroup::secp256r1,
                NamedGroup::secp384r1
            ]
        );
    }

    #[test]
    fn test_modernise_sets_minimum_version() {
        let mut config = TlsConfig::new();
        modernise(&mut config);

        assert_eq!(config.min_version(), Some(ProtocolVersion::TLSv1_2));
        assert_eq!(
            versions(&config),
            vec![ProtocolVersion::TLSv1_3, ProtocolVersion::TLSv1_2]
        );
    }

    #[test]
    fn test_modernise_sets_tls12_cipher_suites_in_order() {
        let mut config = TlsConfig::new();
        modernise(&mut config);

        assert_eq!(
            tls12_suites(&config),
            vec![
                CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
                CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
                CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
                CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
                CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
                CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            ]
        );
    }

    #[test]
    fn test_modernise_overwrites_prior_values() {
        let mut config = TlsConfig::new();
        config.provider.kx_groups = vec![kx_group::SECP384R1];
        config.provider.cipher_suites = vec![cipher_suite::TLS13_AES_128_GCM_SHA256];
        config.versions = vec![&rustls::version::TLS13];

        modernise(&mut config);

        assert_eq!(groups(&config).len(), 3);
        assert_eq!(tls12_suites(&config).len(), 6);
        assert_eq!(config.min_version(), Some(ProtocolVersion::TLSv1_2));
    }

    #[test]
    fn test_modernise_is_idempotent() {
        let mut once = TlsConfig::new();
        modernise(&mut once);
        let mut twice = once.clone();
        modernise(&mut twice);

        assert_eq!(groups(&once), groups(&twice));
        assert_eq!(versions(&once), versions(&twice));
        let all = |c: &TlsConfig| -> Vec<CipherSuite> {
            c.provider.cipher_suites.iter().map(|s| s.suite()).collect()
        };
        assert_eq!(all(&once), all(&twice));
    }

    #[test]
    fn test_modernise_keeps_alpn() {
        let mut config = TlsConfig::new();
        config.alpn_protocols.push(ACME_TLS_ALPN.to_vec());
        modernise(&mut config);

        assert_eq!(config.alpn_protocols.last().map(Vec::as_slice), Some(ACME_TLS_ALPN));
    }

    #[test]
    fn test_build_server_config() {
        let mut config = TlsConfig::new();
        modernise(&mut config).alpn_protocols.push(ACME_TLS_ALPN.to_vec());

        let server_config = config.build(Arc::new(NoCertificates)).unwrap();

        assert_eq!(server_config.alpn_protocols.len(), 3);
        assert_eq!(
            server_config.crypto_provider().cipher_suites.len(),
            config.provider.cipher_suites.len()
        );
    }
}
