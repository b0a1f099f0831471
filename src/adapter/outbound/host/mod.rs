//! Linux host adapters reading `/proc` and `/sys`.

pub mod process;
pub mod telemetry;

pub use process::ProcfsInspector;
pub use telemetry::HostTelemetry;
