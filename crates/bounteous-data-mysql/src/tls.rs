//! TLS/SSL configuration checks for MySQL connections.
//!
//! [`validate_tls_config`] runs whenever MySQL options are built, so an
//! inconsistent SSL setup fails at context creation instead of at connect time.
//!
//! With the `tls` feature enabled, [`build_client_config`] turns a validated
//! [`TlsConfig`] into a `rustls` client configuration the driver can use for
//! the TLS upgrade.
//!
//! # Example
//!
//! ```rust,ignore
//! use bounteous_data_mysql::{MySqlConfig, SslMode, TlsConfig};
//!
//! let config = MySqlConfig::new()
//!     .host("db.example.com")
//!     .ssl_mode(SslMode::VerifyCa)
//!     .tls_config(TlsConfig::new().ca_cert("/etc/ssl/certs/ca.pem"));
//!
//! validate_tls_config(config.ssl_mode, &config.tls_config)?;
//! ```

use bounteous_data::{ConfigError, ConfigErrorKind, Error};

use crate::config::{SslMode, TlsConfig};

/// How the server certificate is checked during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateVerification {
    /// Any certificate is accepted.
    None,
    /// The chain must lead to a trusted root. The host name is not checked.
    ChainOnly,
    /// The chain and the host name are both checked.
    Full,
}

/// Certificate checks applied for `ssl_mode`.
///
/// `danger_skip_verify` turns every mode into [`CertificateVerification::None`].
pub fn certificate_verification(
    ssl_mode: SslMode,
    tls_config: &TlsConfig,
) -> CertificateVerification {
    if tls_config.danger_skip_verify || !ssl_mode.verifies_server() {
        CertificateVerification::None
    } else if ssl_mode == SslMode::VerifyIdentity {
        CertificateVerification::Full
    } else {
        CertificateVerification::ChainOnly
    }
}

/// Validate TLS configuration for the given SSL mode.
///
/// A client certificate is only usable together with its key. Verifying
/// modes without `SslCa` trust the web PKI roots.
pub fn validate_tls_config(ssl_mode: SslMode, tls_config: &TlsConfig) -> Result<(), Error> {
    if !ssl_mode.should_try_ssl() {
        return Ok(());
    }

    if tls_config.client_cert_path.is_some() != tls_config.client_key_path.is_some() {
        return Err(tls_error(
            "Client certificate and client key must be set together for mutual TLS.",
        ));
    }

    if certificate_verification(ssl_mode, tls_config) != CertificateVerification::None
        && tls_config.ca_cert_path.is_none()
    {
        tracing::debug!(
            ssl_mode = ssl_mode.as_str(),
            "No SslCa configured, verifying against web PKI roots"
        );
    }

    Ok(())
}

fn tls_error(message: impl Into<String>) -> Error {
    Error::Config(ConfigError::new(ConfigErrorKind::Tls, message))
}

#[cfg(feature = "tls")]
pub use rustls_support::{build_client_config, server_name};

#[cfg(feature = "tls")]
mod rustls_support {
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;
    use std::sync::Arc;

    use rustls::client::WebPkiServerVerifier;
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::crypto::CryptoProvider;
    use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
    use rustls::{
        CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
    };

    use bounteous_data::Error;

    use super::{CertificateVerification, certificate_verification, tls_error, validate_tls_config};
    use crate::config::{MySqlConfig, SslMode, TlsConfig};

    /// Build a rustls client configuration for the given SSL mode.
    pub fn build_client_config(
        ssl_mode: SslMode,
        tls_config: &TlsConfig,
    ) -> Result<Arc<ClientConfig>, Error> {
        validate_tls_config(ssl_mode, tls_config)?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| tls_error(format!("unsupported TLS protocol versions: {e}")))?;

        let builder = match certificate_verification(ssl_mode, tls_config) {
            CertificateVerification::None => builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier(provider))),
            CertificateVerification::ChainOnly => {
                let verifier = webpki_verifier(tls_config, provider)?;
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(ChainOnlyVerifier(verifier)))
            }
            CertificateVerification::Full => {
                builder.with_webpki_verifier(webpki_verifier(tls_config, provider)?)
            }
        };

        let config = match (&tls_config.client_cert_path, &tls_config.client_key_path) {
            (Some(cert), Some(key)) => builder
                .with_client_auth_cert(load_certs(cert)?, load_key(key)?)
                .map_err(|e| tls_error(format!("invalid client certificate: {e}")))?,
            _ => builder.with_no_client_auth(),
        };

        Ok(Arc::new(config))
    }

    /// Server name to present for SNI when connecting with `config`.
    pub fn server_name(config: &MySqlConfig) -> Result<ServerName<'static>, Error> {
        let name = config.tls_server_name();
        ServerName::try_from(name.to_string())
            .map_err(|e| tls_error(format!("invalid TLS server name '{name}': {e}")))
    }

    /// Trust anchors from `SslCa`, or the web PKI roots when none is set.
    fn root_store(tls_config: &TlsConfig) -> Result<RootCertStore, Error> {
        let mut roots = RootCertStore::empty();
        match &tls_config.ca_cert_path {
            Some(path) => {
                for cert in load_certs(path)? {
                    roots
                        .add(cert)
                        .map_err(|e| tls_error(format!("invalid CA certificate: {e}")))?;
                }
            }
            None => roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
        }
        Ok(roots)
    }

    fn webpki_verifier(
        tls_config: &TlsConfig,
        provider: Arc<CryptoProvider>,
    ) -> Result<Arc<WebPkiServerVerifier>, Error> {
        WebPkiServerVerifier::builder_with_provider(Arc::new(root_store(tls_config)?), provider)
            .build()
            .map_err(|e| tls_error(format!("cannot build certificate verifier: {e}")))
    }

    fn open(path: &Path) -> Result<BufReader<File>, Error> {
        File::open(path)
            .map(BufReader::new)
            .map_err(|e| tls_error(format!("cannot open {}: {e}", path.display())))
    }

    fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, Error> {
        let certs = rustls_pemfile::certs(&mut open(path)?)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| tls_error(format!("cannot read {}: {e}", path.display())))?;
        if certs.is_empty() {
            return Err(tls_error(format!("no certificates found in {}", path.display())));
        }
        Ok(certs)
    }

    fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, Error> {
        rustls_pemfile::private_key(&mut open(path)?)
            .map_err(|e| tls_error(format!("cannot read {}: {e}", path.display())))?
            .ok_or_else(|| tls_error(format!("no private key found in {}", path.display())))
    }

    /// Accepts any server certificate. Used for `Preferred`/`Required` and
    /// when verification is explicitly skipped.
    #[derive(Debug)]
    struct NoVerifier(Arc<CryptoProvider>);

    impl ServerCertVerifier for NoVerifier {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            rustls::crypto::verify_tls12_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            rustls::crypto::verify_tls13_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.0.signature_verification_algorithms.supported_schemes()
        }
    }

    /// Checks the chain against the trust anchors but accepts any host name.
    /// Used for `VerifyCA`.
    #[derive(Debug)]
    struct ChainOnlyVerifier(Arc<WebPkiServerVerifier>);

    impl ServerCertVerifier for ChainOnlyVerifier {
        fn verify_server_cert(
            &self,
            end_entity: &CertificateDer<'_>,
            intermediates: &[CertificateDer<'_>],
            server_name: &ServerName<'_>,
            ocsp_response: &[u8],
            now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            match self.0.verify_server_cert(
                end_entity,
                intermediates,
                server_name,
                ocsp_response,
                now,
            ) {
                Err(rustls::Error::InvalidCertificate(
                    CertificateError::NotValidForName
                    | CertificateError::NotValidForNameContext { .. },
                )) => Ok(ServerCertVerified::assertion()),
                other => other,
            }
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            self.0.verify_tls12_signature(message, cert, dss)
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            self.0.verify_tls13_signature(message, cert, dss)
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.0.supported_verify_schemes()
        }
    }
}
