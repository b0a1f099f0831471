//! Certificate generator that records calls and writes placeholder files.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::port::{CertificateGenerator, SelfSignRequest};

#[derive(Debug, Default)]
pub struct RecordingGenerator {
    key_calls: AtomicUsize,
    sign_calls: AtomicUsize,
    fail: AtomicBool,
}

impl RecordingGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator whose every call fails.
    #[must_use]
    pub fn failing() -> Self {
        let generator = Self::default();
        generator.fail.store(true, Ordering::SeqCst);
        generator
    }

    #[must_use]
    pub fn key_calls(&self) -> usize {
        self.key_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    /// Total generator invocations.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.key_calls() + self.sign_calls()
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Certificate("generator unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CertificateGenerator for RecordingGenerator {
    async fn generate_key(&self, key_path: &Path, bits: u32) -> Result<()> {
        self.key_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        tokio::fs::write(key_path, format!("fake {bits}-bit key\n")).await?;
        Ok(())
    }

    async fn self_sign(&self, request: SelfSignRequest<'_>) -> Result<()> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        tokio::fs::write(
            request.cert_path,
            format!(
                "fake certificate CN={} days={}\n",
                request.common_name, request.validity_days
            ),
        )
        .await?;
        Ok(())
    }
}
