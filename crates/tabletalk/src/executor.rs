//! Execution of generated queries.
//!
//! Generated SQL is untrusted input. Nothing that goes wrong here is an
//! error to the caller: policy rejections and store failures alike come back
//! as [`QueryResult::Failure`] so the explainer can tell the user what
//! happened.

use std::fmt::Write as _;
use std::time::Instant;
use tabletalk_db::{validate_read_only, validate_single_statement, DbValue, QueryStore};
use tracing::{debug, warn};

/// Outcome of running one query. A failure never carries rows.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Success {
        columns: Vec<String>,
        rows: Vec<Vec<DbValue>>,
    },
    Failure {
        message: String,
    },
}

impl QueryResult {
    pub fn failure(message: impl Into<String>) -> Self {
        QueryResult::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, QueryResult::Success { .. })
    }

    pub fn row_count(&self) -> usize {
        match self {
            QueryResult::Success { rows, .. } => rows.len(),
            QueryResult::Failure { .. } => 0,
        }
    }

    /// Text handed to the explainer.
    ///
    /// Failures render as the bare message. Successes render a header line
    /// and at most `row_limit` rows, with a note when rows were left out.
    pub fn render_context(&self, row_limit: usize) -> String {
        match self {
            QueryResult::Failure { message } => message.clone(),
            QueryResult::Success { columns, rows } => {
                let mut out = String::new();
                let _ = writeln!(out, "{}", columns.join(" | "));
                if rows.is_empty() {
                    out.push_str("(no rows)\n");
                    return out;
                }
                for row in rows.iter().take(row_limit) {
                    let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                    let _ = writeln!(out, "{}", cells.join(" | "));
                }
                if rows.len() > row_limit {
                    let _ = writeln!(out, "(showing first {} of {} rows)", row_limit, rows.len());
                }
                out
            }
        }
    }
}

/// Rules applied before a generated statement reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPolicy {
    /// Only a single SELECT/WITH/EXPLAIN statement may run.
    pub read_only: bool,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self { read_only: true }
    }
}

/// Run `sql` verbatim and materialize the result.
pub async fn execute(store: &dyn QueryStore, sql: &str, policy: ExecutionPolicy) -> QueryResult {
    if let Err(violation) = validate_single_statement(sql) {
        warn!(%violation, "Generated query rejected");
        return QueryResult::failure(format!("Query rejected: {}", violation));
    }
    if policy.read_only {
        if let Err(violation) = validate_read_only(sql) {
            warn!(%violation, "Generated query rejected by read-only policy");
            return QueryResult::failure(format!(
                "Query rejected by read-only policy: {}",
                violation
            ));
        }
    }

    let start = Instant::now();
    match store.fetch_all(sql).await {
        Ok(result) => {
            debug!(
                rows = result.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Query succeeded"
            );
            QueryResult::Success {
                columns: result.columns,
                rows: result.rows,
            }
        }
        Err(e) => {
            debug!(error = %e, "Query failed");
            QueryResult::failure(e.to_string())
        }
    }
}
