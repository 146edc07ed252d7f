//! Schema catalog: the discovered shape of the store, rendered once as
//! prompt context.
//!
//! The builder walks every table and column the store reports. Text-like
//! columns with only a handful of distinct values get "enum hints" (their
//! most frequent values), which help the model write correct predicates.
//! A built [`SchemaCatalog`] is immutable; a refresh builds a new one.

use std::fmt::Write as _;
use std::time::{Duration, Instant};
use tabletalk_db::{DbError, QueryStore};
use tracing::{debug, info};

use crate::error::CatalogError;

/// Default ceiling on distinct values for a column to count as enum-like.
pub const DEFAULT_ENUM_HINT_THRESHOLD: usize = 10;

/// One sampled value and how often it occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumHint {
    pub value: String,
    pub frequency: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    /// Most frequent first. `None` unless the column looked enum-like.
    pub enum_hints: Option<Vec<EnumHint>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub name: String,
    /// Ordinal order, as reported by the store.
    pub columns: Vec<ColumnInfo>,
}

/// Tables plus their deterministic text rendering.
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    tables: Vec<TableInfo>,
    rendered: String,
}

impl SchemaCatalog {
    pub fn new(tables: Vec<TableInfo>) -> Self {
        let rendered = render(&tables);
        Self { tables, rendered }
    }

    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Text used verbatim in router and synthesizer prompts.
    pub fn rendered_text(&self) -> &str {
        &self.rendered
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }

    pub fn hinted_column_count(&self) -> usize {
        self.tables
            .iter()
            .flat_map(|t| &t.columns)
            .filter(|c| c.enum_hints.is_some())
            .count()
    }
}

/// Render tables in the prompt format:
///
/// ```text
/// Table: users
///  - status (TEXT)
///    * Possible values for status: [active, closed]
/// ```
///
/// with a blank line between tables.
pub fn render(tables: &[TableInfo]) -> String {
    let blocks: Vec<String> = tables.iter().map(render_table).collect();
    blocks.join("\n")
}

fn render_table(table: &TableInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Table: {}", table.name);
    for column in &table.columns {
        let _ = writeln!(out, " - {} ({})", column.name, column.declared_type);
        if let Some(hints) = &column.enum_hints {
            let values: Vec<&str> = hints.iter().map(|h| h.value.as_str()).collect();
            let _ = writeln!(
                out,
                "   * Possible values for {}: [{}]",
                column.name,
                values.join(", ")
            );
        }
    }
    out
}

/// Does a declared type hold text (and so deserve value sampling)?
pub fn is_textual(declared_type: &str) -> bool {
    let upper = declared_type.to_ascii_uppercase();
    ["CHAR", "TEXT", "CLOB", "STRING", "USER-DEFINED", "ENUM"]
        .iter()
        .any(|marker| upper.contains(marker))
}

/// Quote an identifier for interpolation (`"` doubled inside).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Builds a [`SchemaCatalog`] by introspecting a store.
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    enum_hint_threshold: usize,
    timeout: Option<Duration>,
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self {
            enum_hint_threshold: DEFAULT_ENUM_HINT_THRESHOLD,
            timeout: None,
        }
    }
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enum_hint_threshold(mut self, threshold: usize) -> Self {
        self.enum_hint_threshold = threshold.max(1);
        self
    }

    /// Deadline for the whole build.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn enum_hint_threshold(&self) -> usize {
        self.enum_hint_threshold
    }

    pub async fn build(&self, store: &dyn QueryStore) -> Result<SchemaCatalog, CatalogError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.build_inner(store))
                .await
                .map_err(|_| CatalogError::Timeout(limit))?,
            None => self.build_inner(store).await,
        }
    }

    async fn build_inner(&self, store: &dyn QueryStore) -> Result<SchemaCatalog, CatalogError> {
        let start = Instant::now();
        let mut tables = Vec::new();

        for table_name in store.list_tables().await? {
            let mut columns = Vec::new();
            for meta in store.list_columns(&table_name).await? {
                let enum_hints = if is_textual(&meta.declared_type) {
                    match self.sample_values(store, &table_name, &meta.name).await {
                        Ok(hints) => hints,
                        Err(e) => {
                            debug!(
                                table = %table_name,
                                column = %meta.name,
                                error = %e,
                                "Value sampling failed; omitting enum hints"
                            );
                            None
                        }
                    }
                } else {
                    None
                };
                columns.push(ColumnInfo {
                    name: meta.name,
                    declared_type: meta.declared_type,
                    enum_hints,
                });
            }
            tables.push(TableInfo {
                name: table_name,
                columns,
            });
        }

        let catalog = SchemaCatalog::new(tables);
        info!(
            tables = catalog.tables().len(),
            columns = catalog.column_count(),
            hinted_columns = catalog.hinted_column_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Schema catalog built"
        );
        Ok(catalog)
    }

    /// Most frequent values of one column, or `None` if it has none or too many.
    async fn sample_values(
        &self,
        store: &dyn QueryStore,
        table: &str,
        column: &str,
    ) -> Result<Option<Vec<EnumHint>>, DbError> {
        let col = quote_ident(column);
        // One row past the threshold tells "exactly threshold" from "more".
        let sql = format!(
            "SELECT CAST({col} AS TEXT) AS value, COUNT(*) AS frequency \
             FROM {table} WHERE {col} IS NOT NULL \
             GROUP BY {col} ORDER BY frequency DESC, value \
             LIMIT {limit}",
            col = col,
            table = quote_ident(table),
            limit = self.enum_hint_threshold + 1,
        );
        let result = store.fetch_all(&sql).await?;

        if result.is_empty() || result.len() > self.enum_hint_threshold {
            return Ok(None);
        }

        let mut hints = Vec::with_capacity(result.len());
        for row in &result.rows {
            let value = row.first().and_then(|v| v.as_text());
            let frequency = row.get(1).and_then(|v| v.as_i64());
            match (value, frequency) {
                (Some(value), Some(frequency)) => hints.push(EnumHint {
                    value: value.to_string(),
                    frequency,
                }),
                _ => {
                    return Err(DbError::not_found(format!(
                        "unexpected sample row shape for {}.{}",
                        table, column
                    )))
                }
            }
        }
        Ok(Some(hints))
    }
}
