//! TLS configuration for connections to Postgres.
//!
//! Each `sslmode` maps to a certificate-verification policy:
//!
//! | mode                           | certificate chain | hostname |
//! |--------------------------------|-------------------|----------|
//! | unset, `allow`, `require`      | not checked       | no       |
//! | `verify-ca`                    | checked           | no       |
//! | `verify-full`                  | checked           | checked  |
//!
//! `disable` never negotiates TLS.

use crate::{Error, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pemfile::Item;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// SSL/TLS connection mode matching the PostgreSQL `sslmode` parameter.
///
/// An unset mode is represented as `Option::<SslMode>::None` by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    /// No TLS (plaintext connection)
    Disable,
    /// TLS used if the server offers it, certificate not verified
    Allow,
    /// TLS required, but server certificate is not verified
    Require,
    /// TLS required, server certificate must be signed by a trusted CA
    VerifyCa,
    /// TLS required, server certificate must be signed by a trusted CA and hostname must match
    VerifyFull,
}

impl SslMode {
    /// All recognised modes
    pub const ALL: [SslMode; 5] = [
        SslMode::Disable,
        SslMode::Allow,
        SslMode::Require,
        SslMode::VerifyCa,
        SslMode::VerifyFull,
    ];

    /// Whether this mode requires certificate verification (CA or full)
    pub fn requires_verification(&self) -> bool {
        matches!(self, Self::VerifyCa | Self::VerifyFull)
    }

    /// Whether the connection must fail when the server refuses TLS
    pub fn requires_tls(&self) -> bool {
        matches!(self, Self::Require | Self::VerifyCa | Self::VerifyFull)
    }

    /// Canonical `sslmode` string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Allow => "allow",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        }
    }
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SslMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| Error::InvalidSslMode {
                value: s.to_string(),
            })
    }
}

/// TLS configuration for Postgres connections.
///
/// Built from an `sslmode`; wraps the rustls `ClientConfig` handed to the
/// driver.
///
/// # Examples
///
/// ```ignore
/// use dbping::connection::{SslMode, TlsConfig};
///
/// let tls = TlsConfig::builder()
///     .sslmode(Some(SslMode::VerifyFull))
///     .ca_cert_path("/etc/ssl/certs/ca.pem")
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    sslmode: Option<SslMode>,
    ca_cert_path: Option<PathBuf>,
    client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Create a new TLS configuration builder.
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Get the rustls ClientConfig for this TLS configuration.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }

    /// Mode this configuration was built for
    pub fn sslmode(&self) -> Option<SslMode> {
        self.sslmode
    }

    /// Check if the server certificate chain is verified.
    pub fn verify_certificates(&self) -> bool {
        self.sslmode.is_some_and(|mode| mode.requires_verification())
    }

    /// Check if hostname verification is enabled.
    pub fn verify_hostname(&self) -> bool {
        self.sslmode == Some(SslMode::VerifyFull)
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("sslmode", &self.sslmode)
            .field("ca_cert_path", &self.ca_cert_path)
            .field("verify_certificates", &self.verify_certificates())
            .field("verify_hostname", &self.verify_hostname())
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builder for TLS configuration.
#[derive(Debug, Default)]
pub struct TlsConfigBuilder {
    sslmode: Option<SslMode>,
    ca_cert_path: Option<PathBuf>,
}

impl TlsConfigBuilder {
    /// Set the `sslmode` the configuration enforces.
    pub fn sslmode(mut self, mode: Option<SslMode>) -> Self {
        self.sslmode = mode;
        self
    }

    /// Set the path to a custom CA certificate file (PEM format).
    ///
    /// If not set, system root certificates are used, falling back to the
    /// bundled Mozilla roots.
    pub fn ca_cert_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Build the TLS configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - CA certificate file cannot be read
    /// - CA certificate is invalid PEM
    /// - no trusted roots are available for a verifying mode
    pub fn build(self) -> Result<TlsConfig> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

        let verifier: Arc<dyn ServerCertVerifier> = match self.sslmode {
            Some(mode) if mode.requires_verification() => {
                let roots = match &self.ca_cert_path {
                    Some(path) => load_custom_ca(path)?,
                    None => load_system_roots(),
                };
                let webpki =
                    WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider.clone())
                        .build()
                        .map_err(|e| Error::Client(format!("TLS verifier setup failed: {}", e)))?;

                if mode == SslMode::VerifyFull {
                    webpki as Arc<dyn ServerCertVerifier>
                } else {
                    Arc::new(SkipHostnameVerification { inner: webpki })
                }
            }
            _ => Arc::new(AcceptAnyServerCert {
                provider: provider.clone(),
            }) as Arc<dyn ServerCertVerifier>,
        };

        let client_config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Client(format!("TLS protocol setup failed: {}", e)))?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();

        Ok(TlsConfig {
            sslmode: self.sslmode,
            ca_cert_path: self.ca_cert_path,
            client_config: Arc::new(client_config),
        })
    }
}

/// Platform roots, or the bundled Mozilla roots when none load.
fn load_system_roots() -> RootCertStore {
    let result = rustls_native_certs::load_native_certs();

    let mut store = RootCertStore::empty();
    let (added, _ignored) = store.add_parsable_certificates(result.certs);

    if added == 0 {
        tracing::debug!(
            errors = result.errors.len(),
            "no system root certificates, using bundled roots"
        );
        store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    store
}

/// Load a custom CA certificate from a PEM file.
fn load_custom_ca(ca_path: &Path) -> Result<RootCertStore> {
    let ca_cert_data = fs::read(ca_path).map_err(|e| {
        Error::Client(format!(
            "failed to read CA certificate file '{}': {}",
            ca_path.display(),
            e
        ))
    })?;

    let mut reader = std::io::Cursor::new(&ca_cert_data);
    let mut root_store = RootCertStore::empty();
    let mut found_certs = 0;

    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(Item::X509Certificate(cert))) => {
                let (added, _) = root_store.add_parsable_certificates(std::iter::once(cert));
                found_certs += added;
            }
            // Skip non-certificate items (private keys, etc.)
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(_) => {
                return Err(Error::Client(format!(
                    "failed to parse CA certificate from '{}'",
                    ca_path.display()
                )));
            }
        }
    }

    if found_certs == 0 {
        return Err(Error::Client(format!(
            "no valid certificates found in '{}'",
            ca_path.display()
        )));
    }

    Ok(root_store)
}

/// Accepts any server certificate, still checking handshake signatures.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Full chain verification that tolerates a hostname mismatch (`verify-ca`).
#[derive(Debug)]
struct SkipHostnameVerification {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for SkipHostnameVerification {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Err(rustls::Error::InvalidCertificate(ref err)) if is_name_mismatch(err) => {
                Ok(ServerCertVerified::assertion())
            }
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

fn is_name_mismatch(err: &CertificateError) -> bool {
    matches!(
        err,
        CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. }
    )
}
