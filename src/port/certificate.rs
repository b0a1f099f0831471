//! Certificate generation port.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// Parameters for a self-signed certificate.
#[derive(Debug, Clone, Copy)]
pub struct SelfSignRequest<'a> {
    pub key_path: &'a Path,
    pub cert_path: &'a Path,
    pub common_name: &'a str,
    pub validity_days: u32,
}

/// Creates private keys and self-signed certificates.
#[async_trait]
pub trait CertificateGenerator: Send + Sync {
    /// Write a new RSA private key of `bits` size to `key_path`.
    async fn generate_key(&self, key_path: &Path, bits: u32) -> Result<()>;

    /// Write a self-signed certificate bound to an existing key.
    async fn self_sign(&self, request: SelfSignRequest<'_>) -> Result<()>;
}
