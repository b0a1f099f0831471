//! Datastore adapters.
//!
//! URL classification, reachability probes, and the Diesel/SQLite pool used
//! for schema initialization.

pub mod datastore;
pub mod url;

pub use datastore::{probe_reachability, Datastore, DbPool, MIGRATIONS, REQUIRED_TABLES};
pub use url::DatastoreUrl;
