//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`telemetry`] - `FakeTelemetry` and snapshot builders.
//! - [`probe`] - `ScriptedProbe`, an [`HttpProbe`](crate::port::HttpProbe) that replays responses.
//! - [`certificate`] - `RecordingGenerator`, a generator that writes placeholder files.
//! - [`process`] - `FakeInspector` with configurable port owners and processes.
//! - [`release`] - `CountingRelease` for teardown assertions.
//! - [`config`] - Canonical test configurations rooted in a temp directory.

pub mod certificate;
pub mod config;
pub mod probe;
pub mod process;
pub mod release;
pub mod telemetry;
