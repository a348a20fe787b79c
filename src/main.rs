//! aws: a secure static file server.
//!
//! This is the application entry point. It parses the command line, merges it
//! over the optional TOML configuration, initializes tracing, starts ACME
//! certificate management and runs the plaintext redirect listener alongside
//! the TLS file server until either one fails.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aws::config::{AppConfig, ConfigError, DEFAULT_LOG_FILTER, ERROR_LOG_NAME};
use aws::http::server::{self, Server};
use aws::http::{file_server, redirect_router, start_acme, supervise, ErrorLog};
use aws::middleware::{chain, combined_log_format, secure_headers, LogSink};
use aws::tls::{modernise, TlsConfig, ACME_TLS_ALPN};

/// aws: serve a directory over HTTPS with automatic certificates
#[derive(Parser, Debug)]
#[command(name = "aws", version, about)]
struct Args {
    /// Hostnames to obtain certificates for and serve
    #[arg(value_name = "HOSTNAME")]
    hosts: Vec<String>,

    /// Certificate cache directory [default: ../certs]
    #[arg(short = 'c', long)]
    cert_dir: Option<PathBuf>,

    /// Directory to serve [default: .]
    #[arg(long)]
    root: Option<PathBuf>,

    /// Plaintext (redirect) listen address [default: 0.0.0.0:80]
    #[arg(long)]
    http_addr: Option<std::net::SocketAddr>,

    /// TLS listen address [default: 0.0.0.0:443]
    #[arg(long)]
    https_addr: Option<std::net::SocketAddr>,

    /// Read, write and idle timeout in seconds, 0 to disable [default: 10]
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Contact e-mail for the ACME account
    #[arg(long)]
    contact: Option<String>,

    /// Use the Let's Encrypt staging directory
    #[arg(long)]
    staging: bool,

    /// Path to configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level filter (e.g., "aws=debug,rustls_acme=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    /// Overwrite file settings with whatever was given on the command line.
    fn apply(self, config: &mut AppConfig) {
        if !self.hosts.is_empty() {
            config.acme.domains = self.hosts;
        }
        if let Some(dir) = self.cert_dir {
            config.acme.cache_dir = dir;
        }
        if let Some(root) = self.root {
            config.server.root = root;
        }
        if let Some(addr) = self.http_addr {
            config.server.http_addr = addr;
        }
        if let Some(addr) = self.https_addr {
            config.server.https_addr = addr;
        }
        if let Some(secs) = self.timeout {
            config.server.timeout_seconds = secs;
        }
        if self.contact.is_some() {
            config.acme.contact = self.contact;
        }
        if self.staging {
            config.acme.production = false;
        }
        if self.log_level.is_some() {
            config.logging.filter = self.log_level;
        }
    }
}

fn init_tracing(config: &AppConfig, cli_filter: bool) {
    // Priority: CLI > env > config > default
    let env_filter = std::env::var("RUST_LOG").ok();
    let log_filter = if cli_filter {
        config.logging.filter.clone()
    } else {
        env_filter.or_else(|| config.logging.filter.clone())
    }
    .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));
    if config.logging.is_json() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let cli_filter = args.log_level.is_some();
    args.apply(&mut config);

    match config.validate() {
        Ok(()) => {}
        Err(ConfigError::MissingHost) => {
            eprintln!("aws: missing host operand");
            eprintln!("Try 'aws -h' for more information.");
            std::process::exit(2);
        }
        Err(err) => return Err(err.into()),
    }

    init_tracing(&config, cli_filter);

    // rustls-acme may pull in a second provider; pin the process default.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    tracing::info!(
        root = %config.server.root.display(),
        http = %config.server.http_addr,
        https = %config.server.https_addr,
        timeout_seconds = config.server.timeout_seconds,
        "Loaded configuration"
    );

    let resolver = start_acme(&config.acme)?;

    let mut tls = TlsConfig::new();
    modernise(&mut tls).alpn_protocols.push(ACME_TLS_ALPN.to_vec());
    let tls_config = Arc::new(tls.build(resolver)?);

    let handler = chain([secure_headers(), combined_log_format(LogSink::stdout())])
        .wrap(file_server(&config.server.root));

    let error_log = ErrorLog::new(ERROR_LOG_NAME);
    let timeout = Duration::from_secs(config.server.timeout_seconds);

    let plain = Server::new([
        server::addr(config.server.http_addr),
        server::timeout(timeout),
        server::error_log(error_log.clone()),
        server::handle(redirect_router(config.server.https_addr.port())),
    ]);
    let secure = Server::new([
        server::addr(config.server.https_addr),
        server::timeout(timeout),
        server::error_log(error_log.clone()),
        server::handle(handler),
        server::tls(tls_config),
    ]);

    tracing::info!(
        "Starting servers at http://{} and https://{}",
        config.server.http_addr,
        config.server.https_addr
    );

    error_log.fatal(supervise(plain, secure).await)
}
