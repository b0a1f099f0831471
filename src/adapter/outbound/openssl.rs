//! Certificate generation through the `openssl` command-line tool.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::port::{CertificateGenerator, SelfSignRequest};

/// Runs `openssl genrsa` and `openssl req -x509`.
#[derive(Debug, Clone)]
pub struct OpenSslGenerator {
    program: String,
}

impl Default for OpenSslGenerator {
    fn default() -> Self {
        Self::new("openssl")
    }
}

impl OpenSslGenerator {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<()> {
        debug!(program = %self.program, ?args, "Running certificate tool");
        let output = Command::new(&self.program)
            .args(args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Certificate(format!("cannot run {}: {e}", self.program)))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::Certificate(format!(
            "{} {} failed ({}): {}",
            self.program,
            args.first().copied().unwrap_or_default(),
            output.status,
            stderr.trim()
        )))
    }
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| Error::Certificate(format!("non-UTF-8 path {}", path.display())))
}

#[async_trait]
impl CertificateGenerator for OpenSslGenerator {
    async fn generate_key(&self, key_path: &Path, bits: u32) -> Result<()> {
        let bits = bits.to_string();
        self.run(&["genrsa", "-out", path_arg(key_path)?, &bits])
            .await
    }

    async fn self_sign(&self, request: SelfSignRequest<'_>) -> Result<()> {
        let days = request.validity_days.to_string();
        let subject = format!("/CN={}", request.common_name);
        self.run(&[
            "req",
            "-new",
            "-x509",
            "-key",
            path_arg(request.key_path)?,
            "-out",
            path_arg(request.cert_path)?,
            "-days",
            &days,
            "-subj",
            &subject,
        ])
        .await
    }
}
