//! Command-line and environment configuration.
//!
//! Every flag can also be set through a `CUMULUS_*` environment variable;
//! flags win over the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::network::{NetworkConfig, TlsConfig, DEFAULT_MAX_BODY_BYTES, DEFAULT_PORT};
use crate::service::ServerConfig;
use crate::telemetry::LogFormat;

/// Cumulus - local cloud control-plane emulator
#[derive(Parser, Debug, Clone)]
#[command(name = "cumulus")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Bind address
    #[arg(long, env = "CUMULUS_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Listen port (0 picks a free one)
    #[arg(short, long, env = "CUMULUS_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Region reported in ARNs and endpoints
    #[arg(long, env = "CUMULUS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Account id reported in ARNs
    #[arg(long, env = "CUMULUS_ACCOUNT_ID", default_value = "000000000000")]
    pub account_id: String,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "CUMULUS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "CUMULUS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Serve Prometheus metrics on this port
    #[arg(long, env = "CUMULUS_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// PEM certificate chain; enables TLS together with --tls-key
    #[arg(long, env = "CUMULUS_TLS_CERT", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, env = "CUMULUS_TLS_KEY", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    /// Allowed CORS origins, comma separated ("*" for any)
    #[arg(long, env = "CUMULUS_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub cors_origins: Vec<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "CUMULUS_REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Seconds shutdown waits for in-flight gateway requests
    #[arg(long, env = "CUMULUS_DRAIN_TIMEOUT", default_value_t = 30)]
    pub drain_timeout_secs: u64,

    /// Largest accepted request body in bytes
    #[arg(long, env = "CUMULUS_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,
}

impl Cli {
    #[must_use]
    pub fn network_config(&self) -> NetworkConfig {
        let tls = match (&self.tls_cert, &self.tls_key) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            }),
            _ => None,
        };
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            tls,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
            max_body_bytes: self.max_body_bytes,
        }
    }

    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            region: self.region.clone(),
            account_id: self.account_id.clone(),
        }
    }

    /// Address of the Prometheus listener, when enabled.
    #[must_use]
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_port
            .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cumulus").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_config_defaults() {
        let cli = parse(&[]);
        let network = cli.network_config();
        let defaults = NetworkConfig::default();
        assert_eq!(network.host, defaults.host);
        assert_eq!(network.port, defaults.port);
        assert_eq!(network.cors_origins, defaults.cors_origins);
        assert_eq!(network.request_timeout, defaults.request_timeout);
        assert_eq!(network.drain_timeout, defaults.drain_timeout);
        assert_eq!(network.max_body_bytes, defaults.max_body_bytes);
        assert!(network.tls.is_none());
        assert_eq!(cli.server_config(), ServerConfig::default());
        assert!(cli.metrics_addr().is_none());
        assert_eq!(cli.log_format, LogFormat::Pretty);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "--port",
            "0",
            "--region",
            "eu-west-1",
            "--account-id",
            "123456789012",
            "--cors-origins",
            "http://a.test,http://b.test",
            "--log-format",
            "json",
            "--metrics-port",
            "9100",
            "--drain-timeout-secs",
            "5",
        ]);
        assert_eq!(cli.network_config().port, 0);
        assert_eq!(
            cli.network_config().cors_origins,
            vec!["http://a.test", "http://b.test"]
        );
        assert_eq!(cli.server_config().region, "eu-west-1");
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.metrics_addr().unwrap().port(), 9100);
        assert_eq!(cli.network_config().drain_timeout, Duration::from_secs(5));
    }

    #[test]
    fn tls_needs_both_files() {
        let err = Cli::try_parse_from(["cumulus", "--tls-cert", "cert.pem"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = parse(&["--tls-cert", "cert.pem", "--tls-key", "key.pem"]);
        let tls = cli.network_config().tls.unwrap();
        assert_eq!(tls.key_path, PathBuf::from("key.pem"));
    }
}
