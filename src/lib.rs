//! Stagehand - bring a long-running service to a verified-healthy state.
//!
//! A deployment runs as an ordered pipeline: check configuration, provision
//! certificates, verify dependencies, initialize the datastore schema,
//! prepare directories, derive resource limits from host telemetry, launch
//! the service, and verify it answers HTTP requests. The first failing step
//! halts the run and the [`domain::PipelineReport`] names it.
//!
//! # Architecture
//!
//! - [`domain`] - Plain data: snapshots, limits, dependency status, reports
//! - [`port`] - Traits at the host seams (telemetry, HTTP, certificates, processes)
//! - [`application`] - Policy, retry, the deployment components and the pipeline
//! - [`adapter`] - Real-host implementations and the command-line interface
//! - [`infrastructure`] - Configuration, context and wiring
//! - [`error`] - Error types and their retry classification
//!
//! # Features
//!
//! - `testkit` - Expose fakes for every port to integration tests
//!
//! # Example
//!
//! ```no_run
//! use stagehand::application::policy::evaluate;
//! use stagehand::domain::TelemetrySnapshot;
//!
//! let limits = evaluate(&TelemetrySnapshot::empty());
//! assert!(limits.max_workers >= 1);
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
