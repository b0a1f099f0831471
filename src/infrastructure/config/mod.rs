//! Infrastructure configuration modules.

pub mod certificates;
pub mod environment;
pub mod logging;
pub mod monitor;
pub mod retry;
pub mod service;
pub mod settings;
