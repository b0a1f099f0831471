//! Composition root: wires host adapters into the deployment pipeline.

use std::sync::Arc;
use std::time::Duration;

use crate::adapter::outbound::host::{HostTelemetry, ProcfsInspector};
use crate::adapter::outbound::http::ReqwestProbe;
use crate::adapter::outbound::openssl::OpenSslGenerator;
use crate::adapter::outbound::sqlite::Datastore;
use crate::application::certificate::CertificateProvisioner;
use crate::application::dependency::DependencyChecker;
use crate::application::health::HealthVerifier;
use crate::application::launcher::ProcessLauncher;
use crate::application::monitor::ResourceMonitor;
use crate::application::pipeline::Pipeline;
use crate::application::steps::{
    CheckConfiguration, DeriveLimits, InitializeSchema, LaunchService, PrepareDirectories,
    ProvisionCertificates, VerifyDependencies, VerifyHealth, CHECK_CONFIGURATION,
    DERIVE_LIMITS, INITIALIZE_SCHEMA, LAUNCH_SERVICE, PREPARE_DIRECTORIES,
    PROVISION_CERTIFICATES, VERIFY_DEPENDENCIES, VERIFY_HEALTH,
};
use crate::domain::ResourceLimits;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::context::OrchestratorContext;
use crate::port::{CertificateGenerator, HttpProbe, ProcessInspector, TelemetrySource};

/// The host-facing implementations every component is built from.
#[derive(Clone)]
pub struct HostAdapters {
    pub telemetry: Arc<dyn TelemetrySource>,
    pub inspector: Arc<dyn ProcessInspector>,
    pub probe: Arc<dyn HttpProbe>,
    pub generator: Arc<dyn CertificateGenerator>,
    pub datastore: Arc<Datastore>,
}

impl HostAdapters {
    /// Adapters for the local host.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn real(config: &Config) -> Result<Self> {
        Ok(Self {
            telemetry: Arc::new(telemetry_for(config)),
            inspector: Arc::new(ProcfsInspector::new()),
            probe: Arc::new(ReqwestProbe::new(Duration::from_secs(
                config.health.request_timeout_secs,
            ))?),
            generator: Arc::new(OpenSslGenerator::default()),
            datastore: Arc::new(datastore_for(config)),
        })
    }
}

/// Host telemetry measuring disk usage where the service runs.
#[must_use]
pub fn telemetry_for(config: &Config) -> HostTelemetry {
    HostTelemetry::new(
        config.service.working_dir.clone(),
        Duration::from_millis(config.monitor.telemetry_interval_ms),
    )
}

#[must_use]
pub fn datastore_for(config: &Config) -> Datastore {
    Datastore::new(
        config.datastore.pool_size,
        Duration::from_secs(config.datastore.connect_timeout_secs),
    )
}

#[must_use]
pub fn dependency_checker(config: &Config, inspector: Arc<dyn ProcessInspector>) -> DependencyChecker {
    DependencyChecker::new(config.service.clone(), &config.datastore, inspector)
}

/// Build the eight-step deployment pipeline.
///
/// Registers the datastore pool with the shutdown controller so teardown
/// releases it.
#[must_use]
pub fn build_pipeline(
    ctx: &OrchestratorContext,
    adapters: &HostAdapters,
    configuration: CheckConfiguration,
) -> Pipeline {
    let config = ctx.config();
    ctx.shutdown().register_release(adapters.datastore.clone());

    Pipeline::new(config.dependencies.policy())
        .step(CHECK_CONFIGURATION, configuration)
        .step(
            PROVISION_CERTIFICATES,
            ProvisionCertificates::new(CertificateProvisioner::new(
                config.certificates.clone(),
                adapters.generator.clone(),
            )),
        )
        .retryable_step(
            VERIFY_DEPENDENCIES,
            VerifyDependencies::new(dependency_checker(config, adapters.inspector.clone())),
        )
        .step(
            INITIALIZE_SCHEMA,
            InitializeSchema::new(adapters.datastore.clone()),
        )
        .step(PREPARE_DIRECTORIES, PrepareDirectories)
        .step(DERIVE_LIMITS, DeriveLimits::new(adapters.telemetry.clone()))
        .step(
            LAUNCH_SERVICE,
            LaunchService::new(ProcessLauncher::new(config.service.clone())),
        )
        .step(
            VERIFY_HEALTH,
            VerifyHealth::new(HealthVerifier::new(
                adapters.probe.clone(),
                adapters.inspector.clone(),
                config.health.policy(),
                config.health.health_path.clone(),
            )),
        )
}

/// Monitor for a service launched with `applied` limits.
#[must_use]
pub fn resource_monitor(
    config: &Config,
    adapters: &HostAdapters,
    applied: ResourceLimits,
) -> ResourceMonitor {
    ResourceMonitor::new(
        adapters.telemetry.clone(),
        adapters.inspector.clone(),
        config.monitor.clone(),
        config.service.command.clone(),
        applied,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pipeline::RunScope;
    use crate::domain::RunState;
    use crate::testkit::certificate::RecordingGenerator;
    use crate::testkit::config::config_in;
    use crate::testkit::probe::ScriptedProbe;
    use crate::testkit::process::FakeInspector;
    use crate::testkit::telemetry::{nominal_snapshot, FakeTelemetry};

    fn fakes(config: &Config) -> HostAdapters {
        HostAdapters {
            telemetry: Arc::new(FakeTelemetry::new(nominal_snapshot(4096))),
            inspector: Arc::new(FakeInspector::new()),
            probe: Arc::new(ScriptedProbe::new()),
            generator: Arc::new(RecordingGenerator::new()),
            datastore: Arc::new(datastore_for(config)),
        }
    }

    #[test]
    fn pipeline_declares_steps_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OrchestratorContext::new(config_in(dir.path()));
        let pipeline = build_pipeline(
            &ctx,
            &fakes(ctx.config()),
            CheckConfiguration::with_lookup(Arc::new(|_: &str| None)),
        );
        let names: Vec<_> = pipeline.step_names().collect();
        assert_eq!(
            names,
            [
                CHECK_CONFIGURATION,
                PROVISION_CERTIFICATES,
                VERIFY_DEPENDENCIES,
                INITIALIZE_SCHEMA,
                PREPARE_DIRECTORIES,
                DERIVE_LIMITS,
                LAUNCH_SERVICE,
                VERIFY_HEALTH,
            ]
        );
    }

    #[tokio::test]
    async fn missing_configuration_halts_before_certificates() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OrchestratorContext::new(config_in(dir.path()));
        let adapters = fakes(ctx.config());
        let mut pipeline = build_pipeline(
            &ctx,
            &adapters,
            CheckConfiguration::with_lookup(Arc::new(|_: &str| None)),
        );

        let report = pipeline.run(&ctx, &RunScope::new()).await;
        assert_eq!(report.state(), RunState::Failed(0));
        assert_eq!(report.steps().len(), 1);
        assert_eq!(report.not_attempted().len(), 7);
        let (step, cause) = report.failure().unwrap();
        assert_eq!(step, CHECK_CONFIGURATION);
        assert!(cause.contains("DATABASE_URL"));
        assert!(!dir.path().join("certs").exists());
    }
}
