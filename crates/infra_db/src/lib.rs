//! Infrastructure Database Layer
//!
//! PostgreSQL storage for the school fee system using SQLx.
//!
//! # Architecture
//!
//! - `repositories` hold the SQL and the row types
//! - `adapters` implement the domain ports on top of them
//! - `pool` builds the connection pool and applies the schema
//!
//! Every domain operation runs inside one transaction opened by
//! `PostgresFeeStore::begin`, so balance updates and allocation rows commit
//! or roll back together.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresFeeStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/school_fees")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresFeeStore::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::{PgFeeUnitOfWork, PostgresFeeStore};
pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
