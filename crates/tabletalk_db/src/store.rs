//! The relational store seen by the question pipeline.
//!
//! `QueryStore` is the seam between the pipeline and a concrete database:
//! schema enumeration plus arbitrary statement execution. `SqlStore` is the
//! sqlx-backed implementation.

use async_trait::async_trait;
use sqlx::{Executor, Row, Statement};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::decode;
use crate::error::{DbError, Result};
use crate::pool::{create_pool, DbConfig, DbPool};
use crate::types::{ColumnMeta, Dialect, QueryRows};

/// Store operations needed to answer questions.
///
/// Implementations must be thread-safe; every call is independent and uses
/// its own connection.
#[async_trait]
pub trait QueryStore: Send + Sync {
    /// Dialect of the store, named in synthesis prompts.
    fn dialect(&self) -> Dialect;

    /// User tables, sorted by name.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Columns of one table in ordinal order.
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnMeta>>;

    /// Execute one statement verbatim and materialize every row.
    async fn fetch_all(&self, sql: &str) -> Result<QueryRows>;
}

/// sqlx-backed store.
#[derive(Clone)]
pub struct SqlStore {
    pool: DbPool,
    dialect: Dialect,
    statement_timeout: Option<Duration>,
}

impl SqlStore {
    /// Connect using a connection URL.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::open(DbConfig::from_url(url)?).await
    }

    /// Connect using an explicit configuration.
    pub async fn open(config: DbConfig) -> Result<Self> {
        let pool = create_pool(&config).await?;
        Ok(Self {
            pool,
            dialect: config.dialect,
            statement_timeout: None,
        })
    }

    /// Bound every store round-trip by `timeout`.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    /// Get the underlying connection pool (escape hatch for setup and tests).
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Close the pool.
    pub async fn close(self) {
        self.pool.close().await;
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        match self.statement_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| DbError::Timeout(limit))?,
            None => fut.await,
        }
    }

    async fn fetch_all_inner(&self, sql: &str) -> Result<QueryRows> {
        // Scoped connection: returned to the pool when `conn` drops, on every path.
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;

        let columns = match rows.first() {
            Some(first) => decode::column_names(first),
            None => {
                // No rows to read names from; ask the prepared statement.
                match (&mut *conn).prepare(sql).await {
                    Ok(statement) => statement
                        .columns()
                        .iter()
                        .map(|c| sqlx::Column::name(c).to_string())
                        .collect(),
                    Err(e) => {
                        debug!(error = %e, "Could not describe empty result set");
                        Vec::new()
                    }
                }
            }
        };
        let rows = rows.iter().map(decode::decode_row).collect();
        Ok(QueryRows::new(columns, rows))
    }

    #[cfg(feature = "sqlite")]
    async fn list_tables_inner(&self) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&mut *conn)
        .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>(0).map_err(DbError::from))
            .collect()
    }

    #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
    async fn list_tables_inner(&self) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
        )
        .fetch_all(&mut *conn)
        .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>(0).map_err(DbError::from))
            .collect()
    }

    #[cfg(feature = "sqlite")]
    async fn list_columns_inner(&self, table: &str) -> Result<Vec<ColumnMeta>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query("SELECT name, type FROM pragma_table_info(?) ORDER BY cid")
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;
        if rows.is_empty() {
            return Err(DbError::not_found(format!("table {}", table)));
        }
        rows.iter()
            .map(|r| -> Result<ColumnMeta> {
                Ok(ColumnMeta::new(
                    r.try_get::<String, _>(0)?,
                    r.try_get::<Option<String>, _>(1)?.unwrap_or_default(),
                ))
            })
            .collect()
    }

    #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
    async fn list_columns_inner(&self, table: &str) -> Result<Vec<ColumnMeta>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(
            "SELECT column_name::text, data_type::text FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 \
             ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&mut *conn)
        .await?;
        if rows.is_empty() {
            return Err(DbError::not_found(format!("table {}", table)));
        }
        rows.iter()
            .map(|r| -> Result<ColumnMeta> {
                Ok(ColumnMeta::new(
                    r.try_get::<String, _>(0)?,
                    r.try_get::<String, _>(1)?,
                ))
            })
            .collect()
    }
}

impl std::fmt::Debug for SqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlStore")
            .field("dialect", &self.dialect)
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

#[async_trait]
impl QueryStore for SqlStore {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let tables = self.bounded(self.list_tables_inner()).await?;
        info!(count = tables.len(), "Enumerated tables");
        Ok(tables)
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnMeta>> {
        self.bounded(self.list_columns_inner(table)).await
    }

    async fn fetch_all(&self, sql: &str) -> Result<QueryRows> {
        let start = Instant::now();
        let result = self.bounded(self.fetch_all_inner(sql)).await?;
        debug!(
            rows = result.len(),
            columns = result.columns.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Statement executed"
        );
        Ok(result)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::types::DbValue;

    async fn bank_store() -> SqlStore {
        let store = SqlStore::open(DbConfig::sqlite_memory()).await.unwrap();
        sqlx::query(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, balance REAL, age INTEGER)",
        )
        .execute(store.pool())
        .await
        .unwrap();
        sqlx::query("INSERT INTO users (name, balance, age) VALUES ('ada', 8000.0, 36), ('bob', 8843.0, 41)")
            .execute(store.pool())
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_list_tables_and_columns() {
        let store = bank_store().await;

        assert_eq!(store.list_tables().await.unwrap(), vec!["users".to_string()]);

        let columns = store.list_columns("users").await.unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "balance", "age"]);
        assert_eq!(columns[1].declared_type, "TEXT");
    }

    #[tokio::test]
    async fn test_list_columns_unknown_table() {
        let store = bank_store().await;
        let err = store.list_columns("ghosts").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_all_materializes_rows() {
        let store = bank_store().await;
        let result = store
            .fetch_all("SELECT AVG(balance) AS avg FROM users")
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["avg".to_string()]);
        assert_eq!(result.rows, vec![vec![DbValue::Real(8421.5)]]);
    }

    #[tokio::test]
    async fn test_fetch_all_empty_result_keeps_column_names() {
        let store = bank_store().await;
        let result = store
            .fetch_all("SELECT name, age FROM users WHERE age > 100")
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.columns, vec!["name".to_string(), "age".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_all_missing_table_is_error() {
        let store = bank_store().await;
        let err = store.fetch_all("SELECT * FROM nosuchtable").await.unwrap_err();
        assert!(err.to_string().contains("nosuchtable"));
    }
}
