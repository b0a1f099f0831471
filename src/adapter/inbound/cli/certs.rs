//! Handler for the `certs` command.

use std::sync::Arc;

use serde_json::json;

use crate::adapter::inbound::cli::output;
use crate::adapter::outbound::openssl::OpenSslGenerator;
use crate::application::certificate::CertificateProvisioner;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Ensure certificate material and print where it lives.
pub async fn execute(config: &Config) -> Result<()> {
    let provisioner = CertificateProvisioner::new(
        config.certificates.clone(),
        Arc::new(OpenSslGenerator::default()),
    );
    let material = provisioner.ensure().await?;

    if output::is_json() {
        output::document("certificates", json!(material));
        return Ok(());
    }

    output::header(env!("CARGO_PKG_VERSION"));
    output::section("Certificates");
    output::field("Origin", format!("{:?}", material.origin).to_lowercase());
    output::field("Certificate", material.cert_path.display());
    output::field("Key", material.key_path.display());
    output::field("Root", material.root_cert_path.display());
    output::success("Certificate material ready");
    Ok(())
}
