//! Domain Adapters
//!
//! Implementations of domain ports on top of the repositories.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresFeeStore;
//! use domain_fees::FeeStorePort;
//!
//! let store = PostgresFeeStore::new(pool);
//! let mut uow = store.begin().await?;
//! let categories = uow.list_categories(school_id).await?;
//! ```

pub mod fees;

pub use fees::{PgFeeUnitOfWork, PostgresFeeStore};
