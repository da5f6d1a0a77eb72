//! Throwaway PostgreSQL databases cloned from a migrated template.
//!
//! The template is named after a hash of `migrations/`, so a schema change
//! produces a fresh template instead of reusing a stale one. Row counts go
//! through the synchronous `postgres` client to stay outside any Diesel
//! transaction.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use pg_embedded_setup_unpriv::test_support::{hash_directory, shared_cluster_handle};
use pg_embedded_setup_unpriv::{ClusterHandle, TemporaryDatabase};
use postgres::{Client, NoTls};
use social_backend::outbound::persistence::{DbPool, PoolConfig};
use tokio::runtime::Runtime;
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");
const TEMPLATE_NAME_PREFIX: &str = "social_template";

static TEMPLATE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn template_database_name() -> Result<String, String> {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations");
    let hash = hash_directory(dir).map_err(|err| format!("hash migrations: {err}"))?;
    let short_hash = hash.get(..8).unwrap_or(&hash);
    Ok(format!("{TEMPLATE_NAME_PREFIX}_{short_hash}"))
}

fn migrate_schema(url: &str) -> Result<(), String> {
    let mut conn = PgConnection::establish(url).map_err(|err| format!("connect: {err}"))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| format!("migration: {err}"))?;
    Ok(())
}

fn ensure_template_database(cluster: &ClusterHandle) -> Result<String, String> {
    let template_name = template_database_name()?;
    let _lock = TEMPLATE_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|err| err.into_inner());

    let exists = cluster
        .database_exists(template_name.as_str())
        .map_err(|err| format!("template check: {err:?}"))?;
    if !exists {
        cluster
            .create_database(template_name.as_str())
            .map_err(|err| format!("create template: {err:?}"))?;
        migrate_schema(&cluster.connection().database_url(&template_name))?;
    }
    Ok(template_name)
}

/// A migrated database, its pool, and the runtime that drives the pool.
pub struct TestDatabase {
    pub runtime: Runtime,
    pub pool: DbPool,
    url: String,
    _database: TemporaryDatabase,
}

impl TestDatabase {
    /// `SELECT count(*)` on `table`, outside any pooled connection.
    pub fn count_rows(&self, table: &str) -> i64 {
        let mut client = Client::connect(&self.url, NoTls).expect("connect for count");
        client
            .query_one(format!("SELECT count(*) FROM {table}").as_str(), &[])
            .expect("count rows")
            .get(0)
    }
}

/// Clone a fresh database from the template and open a pool of `max_size`.
///
/// Must be called outside a Tokio runtime.
pub fn test_database(max_size: u32) -> Result<TestDatabase, String> {
    let runtime = Runtime::new().map_err(|err| err.to_string())?;
    let cluster = shared_cluster_handle().map_err(|err| format!("{err:?}"))?;
    let template_name = ensure_template_database(cluster)?;
    let db_name = format!("test_{}", Uuid::new_v4().simple());
    let database = cluster
        .temporary_database_from_template(db_name.as_str(), template_name.as_str())
        .map_err(|err| format!("create database from template: {err:?}"))?;

    let url = database.url().to_string();
    let pool = runtime
        .block_on(DbPool::new(
            PoolConfig::new(&url).with_max_size(max_size),
        ))
        .map_err(|err| err.to_string())?;

    Ok(TestDatabase {
        runtime,
        pool,
        url,
        _database: database,
    })
}
