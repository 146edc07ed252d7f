//! Question routing.
//!
//! The model's answer is untrusted text; [`parse_route`] maps it onto the
//! closed set of routes and falls back to [`Route::Other`] for anything it
//! does not recognize exactly, so a garbled classification never leads to a
//! query.

use std::fmt;
use std::time::Duration;
use tabletalk_llm::{generate_within, LlmError, LlmProvider};
use tracing::debug;

use crate::catalog::SchemaCatalog;
use crate::prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Retrieve data: synthesize, execute, explain.
    SqlQuery,
    /// Answerable without a query: explain directly.
    DataExplain,
    /// Not about this database: reject.
    Other,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::SqlQuery => "SQL_QUERY",
            Route::DataExplain => "DATA_EXPLAIN",
            Route::Other => "OTHER",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interpret a raw classification response.
pub fn parse_route(raw: &str) -> Route {
    let normalized = raw.trim().to_ascii_uppercase();
    match normalized.as_str() {
        "SQL_QUERY" => Route::SqlQuery,
        "DATA_EXPLAIN" => Route::DataExplain,
        _ => Route::Other,
    }
}

/// Classify a question with one generation call.
pub async fn classify(
    llm: &dyn LlmProvider,
    catalog: &SchemaCatalog,
    question: &str,
    limit: Option<Duration>,
) -> Result<Route, LlmError> {
    let prompt = prompts::route_prompt(catalog.rendered_text(), question);
    let raw = generate_within(llm, &prompt, limit).await?;
    let route = parse_route(&raw);
    debug!(raw = %raw.trim(), %route, "Question classified");
    Ok(route)
}
