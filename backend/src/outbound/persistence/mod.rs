//! PostgreSQL persistence adapters using Diesel.
//!
//! Repositories translate between Diesel rows and domain types and nothing
//! more. Row structs and the schema stay private to this module. Every call
//! runs under the pool's per-operation deadline and reports overruns as the
//! port's `Timeout` variant.
//!
//! ```ignore
//! use social_backend::outbound::persistence::{DbPool, DieselPostRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/social")).await?;
//! let posts = DieselPostRepository::new(pool);
//! ```

mod diesel_account_repository;
mod diesel_post_repository;
mod error_mapping;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_account_repository::DieselAccountRepository;
pub use diesel_post_repository::DieselPostRepository;
pub use migrations::{MigrationError, run_pending_migrations};
pub use pool::{DEFAULT_OPERATION_TIMEOUT, DbPool, PoolConfig, PoolError};
