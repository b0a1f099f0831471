//! The deployment steps, in pipeline order.
//!
//! Each step reads what it needs from the [`RunScope`] and records what it
//! produces there. A step that finds an input missing fails with
//! [`Error::MissingArtifact`] rather than guessing.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::certificate::CertificateProvisioner;
use super::dependency::DependencyChecker;
use super::environment::ResolvedEnvironment;
use super::health::HealthVerifier;
use super::launcher::{LaunchRequest, ProcessLauncher};
use super::pipeline::{RunScope, StepAction};
use super::policy::{assess, evaluate};
use crate::adapter::outbound::sqlite::{probe_reachability, Datastore, DatastoreUrl};
use crate::error::{ConfigError, Error, Result};
use crate::infrastructure::context::OrchestratorContext;
use crate::port::TelemetrySource;

pub const CHECK_CONFIGURATION: &str = "check configuration";
pub const PROVISION_CERTIFICATES: &str = "provision certificates";
pub const VERIFY_DEPENDENCIES: &str = "verify dependencies";
pub const INITIALIZE_SCHEMA: &str = "initialize schema";
pub const PREPARE_DIRECTORIES: &str = "prepare directories";
pub const DERIVE_LIMITS: &str = "derive resource limits";
pub const LAUNCH_SERVICE: &str = "launch service";
pub const VERIFY_HEALTH: &str = "verify health";

/// Looks up a configuration value by name.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

fn missing(step: &'static str, artifact: &'static str) -> Error {
    Error::MissingArtifact { step, artifact }
}

/// Resolves the required configuration values.
pub struct CheckConfiguration {
    lookup: EnvLookup,
}

impl CheckConfiguration {
    /// Read values from the process environment.
    #[must_use]
    pub fn from_process() -> Self {
        Self::with_lookup(Arc::new(|name: &str| std::env::var(name).ok()))
    }

    #[must_use]
    pub fn with_lookup(lookup: EnvLookup) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl StepAction for CheckConfiguration {
    async fn execute(&self, ctx: &OrchestratorContext, scope: &RunScope) -> Result<()> {
        let lookup = Arc::clone(&self.lookup);
        let resolved = ResolvedEnvironment::resolve(&ctx.config().environment, move |name| lookup(name));
        if !resolved.missing().is_empty() {
            return Err(ConfigError::MissingRequired {
                names: resolved.missing().to_vec(),
            }
            .into());
        }
        scope.update(|a| a.environment = Some(resolved));
        Ok(())
    }
}

/// Ensures certificate material exists.
pub struct ProvisionCertificates {
    provisioner: CertificateProvisioner,
}

impl ProvisionCertificates {
    #[must_use]
    pub fn new(provisioner: CertificateProvisioner) -> Self {
        Self { provisioner }
    }
}

#[async_trait]
impl StepAction for ProvisionCertificates {
    async fn execute(&self, _ctx: &OrchestratorContext, scope: &RunScope) -> Result<()> {
        let material = self.provisioner.ensure().await?;
        scope.update(|a| a.certificates = Some(material));
        Ok(())
    }
}

/// Probes every dependency and secures a port.
pub struct VerifyDependencies {
    checker: DependencyChecker,
}

impl VerifyDependencies {
    #[must_use]
    pub fn new(checker: DependencyChecker) -> Self {
        Self { checker }
    }
}

#[async_trait]
impl StepAction for VerifyDependencies {
    async fn execute(&self, ctx: &OrchestratorContext, scope: &RunScope) -> Result<()> {
        let environment = scope
            .artifacts()
            .environment
            .ok_or_else(|| missing(VERIFY_DEPENDENCIES, "environment"))?;

        let status = self.checker.check(&environment, &ctx.signal()).await;
        if !status.all_ok() {
            return Err(Error::DependenciesUnmet {
                failed: status.failures(),
            });
        }
        let port = status.secured_port();
        scope.update(|a| {
            a.port = port;
            a.dependencies = Some(status);
        });
        Ok(())
    }

    async fn recover(&self, ctx: &OrchestratorContext, _scope: &RunScope) {
        let managed = ctx.process().lock().await.pid();
        if self.checker.release_conflicting_port(managed) {
            info!("Stopped a stray instance before retrying");
        }
    }
}

/// Migrates a SQLite datastore or re-verifies a network one.
pub struct InitializeSchema {
    datastore: Arc<Datastore>,
}

impl InitializeSchema {
    #[must_use]
    pub fn new(datastore: Arc<Datastore>) -> Self {
        Self { datastore }
    }
}

#[async_trait]
impl StepAction for InitializeSchema {
    async fn execute(&self, ctx: &OrchestratorContext, scope: &RunScope) -> Result<()> {
        let environment = scope
            .artifacts()
            .environment
            .ok_or_else(|| missing(INITIALIZE_SCHEMA, "environment"))?;
        let raw = environment
            .datastore_url()
            .ok_or_else(|| missing(INITIALIZE_SCHEMA, "datastore URL"))?;

        match DatastoreUrl::parse(raw)? {
            DatastoreUrl::Sqlite { path } => {
                let datastore = Arc::clone(&self.datastore);
                let tables = tokio::task::spawn_blocking(move || {
                    datastore.open(&path)?;
                    datastore.initialize_schema()
                })
                .await
                .map_err(|e| Error::Datastore(format!("schema task failed: {e}")))??;
                info!(tables = ?tables, "Schema verified");
                scope.update(|a| a.tables = tables);
            }
            url @ DatastoreUrl::Network { .. } => {
                let timeout =
                    std::time::Duration::from_secs(ctx.config().datastore.connect_timeout_secs);
                probe_reachability(&url, timeout).await?;
                info!(%url, "Network datastore reachable, schema is managed by the service");
            }
        }
        Ok(())
    }
}

/// Creates the upload directories under the working directory.
pub struct PrepareDirectories;

#[async_trait]
impl StepAction for PrepareDirectories {
    async fn execute(&self, ctx: &OrchestratorContext, _scope: &RunScope) -> Result<()> {
        let service = &ctx.config().service;
        for dir in &service.upload_dirs {
            let path = service.working_dir.join(dir);
            tokio::fs::create_dir_all(&path).await?;
            info!(path = %path.display(), "Directory ready");
        }
        Ok(())
    }
}

/// Samples host telemetry and derives the limits handed to the service.
pub struct DeriveLimits {
    telemetry: Arc<dyn TelemetrySource>,
}

impl DeriveLimits {
    #[must_use]
    pub fn new(telemetry: Arc<dyn TelemetrySource>) -> Self {
        Self { telemetry }
    }
}

#[async_trait]
impl StepAction for DeriveLimits {
    async fn execute(&self, _ctx: &OrchestratorContext, scope: &RunScope) -> Result<()> {
        let telemetry = Arc::clone(&self.telemetry);
        let snapshot = tokio::task::spawn_blocking(move || telemetry.sample())
            .await
            .map_err(|e| Error::Connection(format!("telemetry task failed: {e}")))?;

        let missing_metrics = snapshot.missing_metrics();
        if !missing_metrics.is_empty() {
            warn!(missing = ?missing_metrics, "Some host metrics are unavailable");
        }
        let assessment = assess(&snapshot);
        for reading in assessment.breaches() {
            warn!(
                signal = %reading.signal,
                value = reading.value,
                level = ?reading.level,
                "Host signal above threshold"
            );
        }
        let limits = evaluate(&snapshot);
        info!(
            host_class = ?assessment.host_class,
            overall = ?assessment.overall(),
            max_workers = limits.max_workers,
            pool_size = limits.connection_pool_size,
            max_overflow = limits.max_overflow_connections,
            pool_timeout = limits.pool_timeout_seconds,
            "Resource limits derived"
        );
        scope.update(|a| {
            a.snapshot = Some(snapshot);
            a.limits = Some(limits);
        });
        Ok(())
    }
}

/// Starts the managed service.
pub struct LaunchService {
    launcher: ProcessLauncher,
}

impl LaunchService {
    #[must_use]
    pub fn new(launcher: ProcessLauncher) -> Self {
        Self { launcher }
    }
}

#[async_trait]
impl StepAction for LaunchService {
    async fn execute(&self, ctx: &OrchestratorContext, scope: &RunScope) -> Result<()> {
        let artifacts = scope.artifacts();
        let limits = artifacts
            .limits
            .ok_or_else(|| missing(LAUNCH_SERVICE, "resource limits"))?;
        let port = artifacts
            .port
            .ok_or_else(|| missing(LAUNCH_SERVICE, "secured port"))?;

        let mut extra_env = artifacts
            .environment
            .as_ref()
            .map(ResolvedEnvironment::to_env)
            .unwrap_or_default();
        if let Some(material) = &artifacts.certificates {
            extra_env.extend(
                material
                    .to_env()
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value)),
            );
        }

        let pid = self
            .launcher
            .launch(
                ctx.process(),
                &ctx.signal(),
                LaunchRequest {
                    limits: &limits,
                    port,
                    extra_env: &extra_env,
                },
            )
            .await?;
        scope.update(|a| a.pid = Some(pid));
        Ok(())
    }
}

/// Confirms the launched service answers HTTP requests.
pub struct VerifyHealth {
    verifier: HealthVerifier,
}

impl VerifyHealth {
    #[must_use]
    pub fn new(verifier: HealthVerifier) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl StepAction for VerifyHealth {
    async fn execute(&self, ctx: &OrchestratorContext, scope: &RunScope) -> Result<()> {
        let port = scope
            .artifacts()
            .port
            .ok_or_else(|| missing(VERIFY_HEALTH, "secured port"))?;
        let base_url = ctx.config().service.base_url(port);

        if self.verifier.verify(&base_url, &ctx.signal()).await? {
            info!(%base_url, "Service is healthy");
            Ok(())
        } else {
            Err(Error::HealthCheck {
                attempts: ctx.config().health.max_attempts,
                last_error: format!("{base_url}/ never answered with an accepted status"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CertificateOrigin;
    use crate::testkit::certificate::RecordingGenerator;
    use crate::testkit::config::config_in;
    use crate::testkit::telemetry::{nominal_snapshot, FakeTelemetry};

    fn lookup(db: String) -> EnvLookup {
        Arc::new(move |name: &str| match name {
            "DATABASE_URL" => Some(db.clone()),
            _ => None,
        })
    }

    #[tokio::test]
    async fn configuration_step_fails_on_missing_datastore() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OrchestratorContext::new(config_in(dir.path()));
        let scope = RunScope::new();

        let err = CheckConfiguration::with_lookup(Arc::new(|_: &str| None))
            .execute(&ctx, &scope)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
        assert!(scope.artifacts().environment.is_none());
    }

    #[tokio::test]
    async fn configuration_step_generates_missing_secret() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OrchestratorContext::new(config_in(dir.path()));
        let scope = RunScope::new();

        CheckConfiguration::with_lookup(lookup("sqlite:///app.db".into()))
            .execute(&ctx, &scope)
            .await
            .unwrap();
        let environment = scope.artifacts().environment.unwrap();
        assert_eq!(environment.generated(), ["FLASK_SECRET_KEY".to_string()]);
        assert_eq!(environment.get("FLASK_SECRET_KEY").unwrap().len(), 48);
    }

    #[tokio::test]
    async fn certificate_step_records_material() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let step = ProvisionCertificates::new(CertificateProvisioner::new(
            config.certificates.clone(),
            Arc::new(RecordingGenerator::new()),
        ));
        let ctx = OrchestratorContext::new(config);
        let scope = RunScope::new();

        step.execute(&ctx, &scope).await.unwrap();
        let material = scope.artifacts().certificates.unwrap();
        assert_eq!(material.origin, CertificateOrigin::Generated);
    }

    #[tokio::test]
    async fn schema_step_migrates_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("app.db");
        let ctx = OrchestratorContext::new(config_in(dir.path()));
        let scope = RunScope::new();
        CheckConfiguration::with_lookup(lookup(format!("sqlite:///{}", db.display())))
            .execute(&ctx, &scope)
            .await
            .unwrap();

        let datastore = Arc::new(Datastore::new(2, std::time::Duration::from_secs(5)));
        InitializeSchema::new(datastore.clone())
            .execute(&ctx, &scope)
            .await
            .unwrap();

        let tables = scope.artifacts().tables;
        assert!(tables.iter().any(|t| t == "medication"));
        assert!(datastore.is_open());
    }

    #[tokio::test]
    async fn directories_are_created_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OrchestratorContext::new(config_in(dir.path()));
        let scope = RunScope::new();

        PrepareDirectories.execute(&ctx, &scope).await.unwrap();
        PrepareDirectories.execute(&ctx, &scope).await.unwrap();
        assert!(dir.path().join("static/uploads/prescriptions").is_dir());
    }

    #[tokio::test]
    async fn limits_step_samples_once() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = OrchestratorContext::new(config_in(dir.path()));
        let scope = RunScope::new();
        let telemetry = Arc::new(FakeTelemetry::new(nominal_snapshot(4096)));

        DeriveLimits::new(telemetry.clone())
            .execute(&ctx, &scope)
            .await
            .unwrap();
        assert_eq!(telemetry.samples(), 1);
        assert_eq!(scope.artifacts().limits.unwrap().max_workers, 4);
    }

    #[tokio::test]
    async fn launch_step_requires_limits_and_port() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let step = LaunchService::new(ProcessLauncher::new(config.service.clone()));
        let ctx = OrchestratorContext::new(config);

        let err = step.execute(&ctx, &RunScope::new()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::MissingArtifact {
                step: LAUNCH_SERVICE,
                ..
            }
        ));
    }
}
