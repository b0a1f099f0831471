//! Certificate provisioning idempotence.

use std::sync::Arc;

use stagehand::application::certificate::CertificateProvisioner;
use stagehand::domain::CertificateOrigin;
use stagehand::testkit::certificate::RecordingGenerator;
use stagehand::testkit::config::{config_in, install_system_certificates};

#[tokio::test]
async fn system_material_is_reused_without_generation() {
    let dir = tempfile::tempdir().unwrap();
    install_system_certificates(dir.path());
    let generator = Arc::new(RecordingGenerator::new());
    let provisioner =
        CertificateProvisioner::new(config_in(dir.path()).certificates, generator.clone());

    let first = provisioner.ensure().await.unwrap();
    let second = provisioner.ensure().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.origin, CertificateOrigin::System);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn generated_material_is_exported_to_the_service() {
    let dir = tempfile::tempdir().unwrap();
    let provisioner = CertificateProvisioner::new(
        config_in(dir.path()).certificates,
        Arc::new(RecordingGenerator::new()),
    );

    let material = provisioner.ensure().await.unwrap();
    let env = material.to_env();
    let names: Vec<_> = env.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, ["SSL_CERT_PATH", "SSL_KEY_PATH", "SSL_ROOT_CERT_PATH"]);
    assert!(env[0].1.ends_with("postgresql.crt"));
}
