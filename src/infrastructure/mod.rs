//! Infrastructure layer.
//!
//! Technical concerns that support the application without containing
//! deployment logic.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root wiring host adapters into the pipeline
//! - [`config`] - Configuration loading, validation and logging setup
//! - [`context`] - The per-process orchestration context

pub mod bootstrap;
pub mod config;
pub mod context;
