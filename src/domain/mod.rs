//! Deployment domain types.
//!
//! Plain data shared by every layer. Nothing here performs I/O.

pub mod certificate;
pub mod dependency;
pub mod health;
pub mod limits;
pub mod report;
pub mod telemetry;

pub use certificate::{CertificateMaterial, CertificateOrigin};
pub use dependency::{Dependency, DependencyCheck, DependencyStatus};
pub use health::{is_alive_status, HealthCheckResult, ACCEPTED_STATUS_CODES};
pub use limits::ResourceLimits;
pub use report::{PipelineReport, RunState, StepOutcome, StepRecord};
pub use telemetry::{NetworkCounters, TelemetrySnapshot};
