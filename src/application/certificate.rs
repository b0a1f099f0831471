//! Transport-security material provisioning.
//!
//! Lookup order: trusted system material, then complete material left in the
//! target directory by an earlier run, then fresh self-signed material.
//! Generation failures are fatal; there is no usable partial state.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::domain::{CertificateMaterial, CertificateOrigin};
use crate::error::{Error, Result};
use crate::infrastructure::config::certificates::CertificatesConfig;
use crate::port::{CertificateGenerator, SelfSignRequest};

const CERT_FILE: &str = "postgresql.crt";
const KEY_FILE: &str = "postgresql.key";
const ROOT_FILE: &str = "root.crt";

/// Ensures certificate material exists and is locked down.
pub struct CertificateProvisioner {
    config: CertificatesConfig,
    generator: Arc<dyn CertificateGenerator>,
}

impl CertificateProvisioner {
    #[must_use]
    pub fn new(config: CertificatesConfig, generator: Arc<dyn CertificateGenerator>) -> Self {
        Self { config, generator }
    }

    fn system_material(&self) -> CertificateMaterial {
        CertificateMaterial {
            cert_path: self.config.system_cert.clone(),
            key_path: self.config.system_key.clone(),
            root_cert_path: self.config.system_root.clone(),
            origin: CertificateOrigin::System,
        }
    }

    fn local_material(&self, origin: CertificateOrigin) -> CertificateMaterial {
        CertificateMaterial {
            cert_path: self.config.dir.join(CERT_FILE),
            key_path: self.config.dir.join(KEY_FILE),
            root_cert_path: self.config.dir.join(ROOT_FILE),
            origin,
        }
    }

    /// Return usable certificate material, generating it if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Certificate`] if generation, copying or permission
    /// changes fail, or a generator call exceeds its timeout.
    pub async fn ensure(&self) -> Result<CertificateMaterial> {
        let system = self.system_material();
        if system.is_complete() {
            info!(cert = %system.cert_path.display(), "Using system certificates");
            return Ok(system);
        }

        let existing = self.local_material(CertificateOrigin::Existing);
        if existing.is_complete() {
            info!(dir = %self.config.dir.display(), "Reusing previously generated certificates");
            return Ok(existing);
        }

        self.generate()
            .await
            .map_err(|e| match e {
                Error::Certificate(_) => e,
                other => Error::Certificate(other.to_string()),
            })
    }

    async fn generate(&self) -> Result<CertificateMaterial> {
        let material = self.local_material(CertificateOrigin::Generated);
        info!(dir = %self.config.dir.display(), "Generating self-signed certificates");

        tokio::fs::create_dir_all(&self.config.dir).await?;
        restrict(&self.config.dir, 0o700).await?;

        let timeout = Duration::from_secs(self.config.command_timeout_secs);
        bounded(
            timeout,
            "key generation",
            self.generator
                .generate_key(&material.key_path, self.config.key_bits),
        )
        .await?;
        bounded(
            timeout,
            "certificate signing",
            self.generator.self_sign(SelfSignRequest {
                key_path: &material.key_path,
                cert_path: &material.cert_path,
                common_name: &self.config.common_name,
                validity_days: self.config.validity_days,
            }),
        )
        .await?;

        tokio::fs::copy(&material.cert_path, &material.root_cert_path).await?;
        for path in [&material.key_path, &material.cert_path, &material.root_cert_path] {
            restrict(path, 0o600).await?;
        }

        info!(
            cert = %material.cert_path.display(),
            validity_days = self.config.validity_days,
            "Certificates generated"
        );
        Ok(material)
    }
}

async fn bounded(
    timeout: Duration,
    what: &str,
    call: impl std::future::Future<Output = Result<()>>,
) -> Result<()> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| Error::Certificate(format!("{what} timed out after {}s", timeout.as_secs())))?
}

#[cfg(unix)]
async fn restrict(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::certificate::RecordingGenerator;
    use crate::testkit::config::{config_in, install_system_certificates};

    fn provisioner(dir: &Path, generator: Arc<RecordingGenerator>) -> CertificateProvisioner {
        CertificateProvisioner::new(config_in(dir).certificates, generator)
    }

    #[tokio::test]
    async fn generates_when_nothing_exists() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(RecordingGenerator::new());
        let material = provisioner(dir.path(), generator.clone())
            .ensure()
            .await
            .unwrap();

        assert_eq!(material.origin, CertificateOrigin::Generated);
        assert!(material.is_complete());
        assert_eq!(generator.key_calls(), 1);
        assert_eq!(generator.sign_calls(), 1);
        assert_eq!(
            std::fs::read(&material.cert_path).unwrap(),
            std::fs::read(&material.root_cert_path).unwrap()
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            for path in [&material.key_path, &material.cert_path, &material.root_cert_path] {
                let mode = std::fs::metadata(path).unwrap().permissions().mode();
                assert_eq!(mode & 0o777, 0o600, "{}", path.display());
            }
            let mode = std::fs::metadata(dir.path().join("certs"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[tokio::test]
    async fn reuses_material_from_an_earlier_run() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(RecordingGenerator::new());
        let provisioner = provisioner(dir.path(), generator.clone());

        let first = provisioner.ensure().await.unwrap();
        let second = provisioner.ensure().await.unwrap();

        assert_eq!(second.origin, CertificateOrigin::Existing);
        assert_eq!(second.cert_path, first.cert_path);
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn system_material_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        install_system_certificates(dir.path());
        let generator = Arc::new(RecordingGenerator::new());

        let material = provisioner(dir.path(), generator.clone())
            .ensure()
            .await
            .unwrap();
        assert_eq!(material.origin, CertificateOrigin::System);
        assert_eq!(generator.calls(), 0);
        assert!(!dir.path().join("certs").exists());
    }

    #[tokio::test]
    async fn generator_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = provisioner(dir.path(), Arc::new(RecordingGenerator::failing()))
            .ensure()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Certificate(_)));
        assert_eq!(err.class(), crate::error::ErrorClass::Fatal);
    }
}
