//! TLS for PostgreSQL connections
//!
//! Reads the libpq-style `sslmode`, `sslrootcert`, `sslcert` and `sslkey`
//! parameters and builds a native-tls connector for tokio-postgres.

use native_tls::{Certificate, Identity, TlsConnector, TlsConnectorBuilder};
use postgres_native_tls::MakeTlsConnector;
use schemata_core::{ConnectionConfig, Result, SchemataError};
use std::fs;
use std::path::{Path, PathBuf};

/// libpq `sslmode` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    Disable,
    Allow,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    pub fn parse(mode: &str) -> Result<Self> {
        match mode.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "disable" => Ok(Self::Disable),
            "allow" => Ok(Self::Allow),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-full" => Ok(Self::VerifyFull),
            other => Err(SchemataError::Configuration(format!(
                "unknown sslmode '{}'",
                other
            ))),
        }
    }

    /// Mode handed to tokio-postgres. The verify modes differ only in how the
    /// connector checks the certificate.
    pub fn negotiation(self) -> tokio_postgres::config::SslMode {
        use tokio_postgres::config::SslMode as Pg;
        match self {
            Self::Disable => Pg::Disable,
            Self::Allow | Self::Prefer => Pg::Prefer,
            Self::Require | Self::VerifyCa | Self::VerifyFull => Pg::Require,
        }
    }
}

/// TLS parameters of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub mode: SslMode,
    pub root_cert: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
}

impl TlsSettings {
    /// Without an `sslmode` the connection is unencrypted.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self> {
        let mode = match config.get_string("sslmode") {
            Some(mode) => SslMode::parse(&mode)?,
            None => SslMode::Disable,
        };
        let path = |key: &str| {
            config
                .get_string(key)
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
        };
        let settings = Self {
            mode,
            root_cert: path("sslrootcert"),
            client_cert: path("sslcert"),
            client_key: path("sslkey"),
        };
        if settings.client_cert.is_some() != settings.client_key.is_some() {
            return Err(SchemataError::Configuration(
                "sslcert and sslkey must be given together".into(),
            ));
        }
        Ok(settings)
    }

    /// `None` when the mode is `disable`.
    pub fn connector(&self) -> Result<Option<MakeTlsConnector>> {
        if self.mode == SslMode::Disable {
            return Ok(None);
        }
        tracing::debug!(mode = ?self.mode, "building PostgreSQL TLS connector");

        let mut builder = TlsConnector::builder();
        self.configure_verification(&mut builder);
        if let Some(path) = &self.root_cert {
            let pem = read_pem(path)?;
            let certificate = Certificate::from_pem(&pem).map_err(|e| {
                SchemataError::Connection(format!(
                    "invalid CA certificate {}: {}",
                    path.display(),
                    e
                ))
            })?;
            builder.add_root_certificate(certificate);
        }
        if let (Some(cert), Some(key)) = (&self.client_cert, &self.client_key) {
            let identity = Identity::from_pkcs8(&read_pem(cert)?, &read_pem(key)?).map_err(|e| {
                SchemataError::Connection(format!("invalid client certificate or key: {}", e))
            })?;
            builder.identity(identity);
        }

        let connector = builder.build().map_err(|e| {
            SchemataError::Connection(format!("failed to build TLS connector: {}", e))
        })?;
        Ok(Some(MakeTlsConnector::new(connector)))
    }

    /// libpq semantics: only the verify modes check the server, except that
    /// `require` with a root certificate behaves like `verify-ca`.
    fn configure_verification(&self, builder: &mut TlsConnectorBuilder) {
        match self.mode {
            SslMode::Disable | SslMode::VerifyFull => {}
            SslMode::VerifyCa => {
                builder.danger_accept_invalid_hostnames(true);
            }
            SslMode::Require if self.root_cert.is_some() => {
                builder.danger_accept_invalid_hostnames(true);
            }
            SslMode::Allow | SslMode::Prefer | SslMode::Require => {
                builder.danger_accept_invalid_certs(true);
                builder.danger_accept_invalid_hostnames(true);
            }
        }
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        SchemataError::Connection(format!("failed to read {}: {}", path.display(), e))
    })
}
