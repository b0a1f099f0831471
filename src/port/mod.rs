//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports are the seams between the orchestrator and the host it runs on.
//! Each has a real-host adapter under [`crate::adapter`] and a fake under
//! `testkit`, so policy and pipeline logic never need a real host in tests.
//!
//! # Available Ports
//!
//! - [`TelemetrySource`] - Host metric sampling
//! - [`HttpProbe`] - HTTP GET against the managed service
//! - [`CertificateGenerator`] - Private key and self-signed certificate creation
//! - [`ProcessInspector`] - Port ownership and process-table introspection
//! - [`ResourceRelease`] - Pooled resources released on shutdown

mod certificate;
mod probe;
mod process;
mod release;
mod telemetry;

pub use certificate::{CertificateGenerator, SelfSignRequest};
pub use probe::{HttpProbe, ProbeError, ProbeResponse};
pub use process::{ProcessInfo, ProcessInspector};
pub use release::ResourceRelease;
pub use telemetry::TelemetrySource;
