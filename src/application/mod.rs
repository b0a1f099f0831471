//! Application services.
//!
//! The deployment components and the pipeline that sequences them. Every
//! component talks to the host through the traits in [`crate::port`].

pub mod certificate;
pub mod dependency;
pub mod environment;
pub mod health;
pub mod launcher;
pub mod monitor;
pub mod pipeline;
pub mod policy;
pub mod retry;
pub mod shutdown;
pub mod steps;
