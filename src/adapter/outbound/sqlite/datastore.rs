//! Datastore reachability and the orchestrator's own SQLite pool.
//!
//! The pool exists only long enough to apply migrations and verify the
//! schema; it is registered with the shutdown controller so teardown drops it.

use std::time::Duration;

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::url::DatastoreUrl;
use crate::error::{Error, Result};
use crate::port::ResourceRelease;

/// Embedded migrations compiled from the migrations/ directory.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Tables the service expects once migrations have run.
pub const REQUIRED_TABLES: [&str; 4] = ["user", "medication", "consumption", "inventory_log"];

/// SQLite connection pool.
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

#[derive(diesel::QueryableByName)]
struct TableName {
    #[diesel(sql_type = diesel::sql_types::Text)]
    name: String,
}

/// Open and immediately close a connection to the datastore.
///
/// # Errors
///
/// Returns [`Error::Connection`] if the datastore cannot be reached within
/// `timeout`.
pub async fn probe_reachability(url: &DatastoreUrl, timeout: Duration) -> Result<()> {
    match url {
        DatastoreUrl::Sqlite { path } => {
            let path = path.clone();
            let probe = tokio::task::spawn_blocking(move || -> Result<()> {
                let mut conn = SqliteConnection::establish(&path)
                    .map_err(|e| Error::Connection(e.to_string()))?;
                diesel::sql_query("SELECT 1")
                    .execute(&mut conn)
                    .map_err(|e| Error::Connection(e.to_string()))?;
                Ok(())
            });
            match tokio::time::timeout(timeout, probe).await {
                Ok(Ok(result)) => result,
                Ok(Err(join)) => Err(Error::Connection(join.to_string())),
                Err(_) => Err(Error::Connection(format!(
                    "timed out after {}s",
                    timeout.as_secs()
                ))),
            }
        }
        DatastoreUrl::Network { host, port, .. } => {
            match tokio::time::timeout(timeout, TcpStream::connect((host.as_str(), *port))).await {
                Ok(Ok(stream)) => {
                    drop(stream);
                    Ok(())
                }
                Ok(Err(e)) => Err(Error::Connection(format!("{host}:{port}: {e}"))),
                Err(_) => Err(Error::Connection(format!(
                    "{host}:{port}: timed out after {}s",
                    timeout.as_secs()
                ))),
            }
        }
    }
}

/// Pooled SQLite access for schema initialization.
pub struct Datastore {
    pool_size: u32,
    connect_timeout: Duration,
    pool: Mutex<Option<DbPool>>,
}

impl Datastore {
    #[must_use]
    pub fn new(pool_size: u32, connect_timeout: Duration) -> Self {
        Self {
            pool_size: pool_size.max(1),
            connect_timeout,
            pool: Mutex::new(None),
        }
    }

    /// Open the pool against `path`, replacing any existing pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if no connection can be established.
    pub fn open(&self, path: &str) -> Result<()> {
        let manager = ConnectionManager::<SqliteConnection>::new(path);
        let pool = Pool::builder()
            .max_size(self.pool_size)
            .connection_timeout(self.connect_timeout)
            .build(manager)
            .map_err(|e| Error::Connection(e.to_string()))?;
        *self.pool.lock() = Some(pool);
        debug!(path, "Datastore pool opened");
        Ok(())
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.pool.lock().is_some()
    }

    fn pool(&self) -> Result<DbPool> {
        self.pool
            .lock()
            .clone()
            .ok_or_else(|| Error::Datastore("pool is not open".into()))
    }

    /// Apply pending migrations and verify the expected tables exist.
    ///
    /// Returns the names of the tables present afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if migrations fail or a required table is missing.
    pub fn initialize_schema(&self) -> Result<Vec<String>> {
        let pool = self.pool()?;
        let mut conn = pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;

        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| Error::Schema(e.to_string()))?;
        if !applied.is_empty() {
            info!(count = applied.len(), "Applied migrations");
        }

        let tables: Vec<String> = diesel::sql_query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '__diesel_schema_migrations' ORDER BY name",
        )
        .load::<TableName>(&mut conn)
        .map_err(|e| Error::Schema(e.to_string()))?
        .into_iter()
        .map(|t| t.name)
        .collect();

        let missing: Vec<&str> = REQUIRED_TABLES
            .iter()
            .copied()
            .filter(|required| !tables.iter().any(|t| t == required))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Schema(format!(
                "missing tables after migration: {}",
                missing.join(", ")
            )));
        }
        Ok(tables)
    }
}

impl ResourceRelease for Datastore {
    fn name(&self) -> &str {
        "datastore pool"
    }

    fn release(&self) {
        self.pool.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_initialization_creates_required_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let datastore = Datastore::new(2, Duration::from_secs(5));
        datastore.open(path.to_str().unwrap()).unwrap();

        let tables = datastore.initialize_schema().unwrap();
        for required in REQUIRED_TABLES {
            assert!(tables.contains(&required.to_string()), "missing {required}");
        }
    }

    #[test]
    fn schema_initialization_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let datastore = Datastore::new(1, Duration::from_secs(5));
        datastore.open(path.to_str().unwrap()).unwrap();

        let first = datastore.initialize_schema().unwrap();
        let second = datastore.initialize_schema().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn release_drops_the_pool() {
        let datastore = Datastore::new(1, Duration::from_secs(5));
        datastore.open(":memory:").unwrap();
        assert!(datastore.is_open());

        datastore.release();
        assert!(!datastore.is_open());
        assert!(matches!(
            datastore.initialize_schema(),
            Err(Error::Datastore(_))
        ));
    }

    #[tokio::test]
    async fn sqlite_file_is_reachable() {
        let dir = tempfile::tempdir().unwrap();
        let url = DatastoreUrl::Sqlite {
            path: dir.path().join("probe.db").display().to_string(),
        };
        probe_reachability(&url, Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn closed_tcp_port_is_unreachable() {
        // Bind then drop to find a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let url = DatastoreUrl::Network {
            scheme: "postgresql".into(),
            host: "127.0.0.1".into(),
            port,
        };
        let err = probe_reachability(&url, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }
}
