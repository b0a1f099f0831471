//! Transport-security material.

use std::path::PathBuf;

use serde::Serialize;

/// Where the certificate material came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateOrigin {
    /// Trusted material already installed on the host.
    System,
    /// Self-signed material generated by an earlier run.
    Existing,
    /// Self-signed material generated by this run.
    Generated,
}

/// Paths to a certificate, its private key and the trust bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateMaterial {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub root_cert_path: PathBuf,
    pub origin: CertificateOrigin,
}

impl CertificateMaterial {
    /// Environment overlay pointing the managed process at this material.
    #[must_use]
    pub fn to_env(&self) -> Vec<(&'static str, String)> {
        vec![
            ("SSL_CERT_PATH", self.cert_path.display().to_string()),
            ("SSL_KEY_PATH", self.key_path.display().to_string()),
            ("SSL_ROOT_CERT_PATH", self.root_cert_path.display().to_string()),
        ]
    }

    /// True when all three files exist.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cert_path.is_file() && self.key_path.is_file() && self.root_cert_path.is_file()
    }
}
