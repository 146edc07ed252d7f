//! Relational store access for tabletalk.
//!
//! This crate is the only place that speaks to the database. The question
//! pipeline sees it through the [`QueryStore`] trait: schema enumeration for
//! the catalog builder, and verbatim execution of generated statements for the
//! executor.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tabletalk_db::{QueryStore, SqlStore};
//!
//! let store = SqlStore::connect("sqlite:./bank.db").await?;
//! for table in store.list_tables().await? {
//!     let columns = store.list_columns(&table).await?;
//! }
//! let rows = store.fetch_all("SELECT AVG(balance) FROM users").await?;
//! ```

mod decode;
mod error;
mod pool;
pub mod sql_guard;
mod store;
mod types;

pub use error::{DbError, Result};
pub use pool::{create_pool, DbConfig, DbPool, DbRow, COMPILED_DIALECT};
pub use sql_guard::{validate_read_only, validate_single_statement, GuardViolation};
pub use store::{QueryStore, SqlStore};
pub use types::{ColumnMeta, DbValue, Dialect, QueryRows};
